//! Error types for xown

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("null buffer pointer")]
    NullBuffer,

    #[error("unknown member: {0}")]
    UnknownMember(String),

    #[error("missing argument for member {0}")]
    MissingArgument(String),

    #[error("argument given twice for member {0}")]
    DuplicateArgument(String),

    #[error("member declared twice: {0}")]
    DuplicateMember(String),

    #[error("member name must not be empty")]
    EmptyMemberName,

    #[error("argument type mismatch for member {member}: expected {expected}, got {actual}")]
    ArgumentType {
        member: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("failed to construct member {member}: {reason}")]
    MemberConstruction { member: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
