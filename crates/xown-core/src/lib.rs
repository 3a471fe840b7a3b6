//! xown - Shared buffer ownership and ordered member lifecycles
//!
//! [`SharedResource`] shares one heap buffer between many handles and runs a
//! single type-erased release action when the last handle goes away.
//! [`OrderedComposite`] builds a fixed set of named members in declaration
//! order, whatever order their arguments were given in, and tears them down
//! in reverse.

mod action;
pub mod args;
pub mod buffer;
pub mod composite;
pub mod error;
pub mod form;
pub mod release;
pub mod schema;
pub mod shared;

pub use args::InitArgs;
pub use buffer::RawBuffer;
pub use composite::OrderedComposite;
pub use error::{Error, Result};
pub use form::ReleaseForm;
pub use release::{release_array, release_scalar, ArrayRelease, Release, ScalarRelease};
pub use schema::{Schema, SchemaBuilder};
pub use shared::SharedResource;
