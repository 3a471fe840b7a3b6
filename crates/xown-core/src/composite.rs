//! Composite object with declaration-ordered members

use crate::args::InitArgs;
use crate::schema::Schema;
use crate::{Error, Result};
use std::any::Any;
use std::sync::Arc;

/// Constructed members, destroyed last-to-first
struct Members {
    schema: Arc<Schema>,
    values: Vec<Box<dyn Any + Send>>,
}

impl Drop for Members {
    fn drop(&mut self) {
        while let Some(value) = self.values.pop() {
            let index = self.values.len();
            tracing::trace!(
                composite = self.schema.name(),
                member = %self.schema.members()[index].name,
                index,
                "destroying member"
            );
            drop(value);
        }
    }
}

/// Object owning a fixed set of named members
///
/// Members are built in the schema's declaration order whatever order the
/// arguments were supplied in, and destroyed in exactly the reverse order
/// after the composite's own teardown runs.
pub struct OrderedComposite {
    members: Members,
    /// Set once the setup hook has returned
    ready: bool,
}

impl OrderedComposite {
    /// Build every member, then run the composite's setup
    ///
    /// Argument names are checked against the schema before anything is
    /// built. If a member fails, those already built are destroyed in reverse
    /// order and no composite is returned.
    pub fn construct(schema: Arc<Schema>, args: InitArgs) -> Result<Self> {
        if let Some(unknown) = args.names().find(|name| schema.position(name).is_none()) {
            return Err(Error::UnknownMember(unknown.to_string()));
        }
        let mut args = args.into_map()?;

        let mut members = Members {
            schema: schema.clone(),
            values: Vec::with_capacity(schema.len()),
        };

        for (index, spec) in schema.members().iter().enumerate() {
            tracing::trace!(
                composite = schema.name(),
                member = %spec.name,
                index,
                "constructing member"
            );
            match (spec.ctor)(&spec.name, args.remove(&spec.name)) {
                Ok(value) => members.values.push(value),
                Err(e) => {
                    tracing::warn!(
                        composite = schema.name(),
                        member = %spec.name,
                        built = members.values.len(),
                        error = %e,
                        "member construction failed, rolling back"
                    );
                    return Err(e);
                }
            }
        }

        let mut composite = Self {
            members,
            ready: false,
        };
        if let Some(setup) = schema.setup() {
            setup(&composite);
        }
        composite.ready = true;

        tracing::debug!(
            composite = schema.name(),
            members = composite.len(),
            "composite constructed"
        );
        Ok(composite)
    }

    /// End the composite's lifetime now
    pub fn destruct(self) {
        drop(self)
    }

    /// Schema this composite was built from
    pub fn schema(&self) -> &Arc<Schema> {
        &self.members.schema
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.members.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.values.is_empty()
    }

    /// Member names in declaration order
    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.schema.member_names()
    }

    /// Borrow a member by name, if it has type `M`
    pub fn get<M: Any>(&self, name: &str) -> Option<&M> {
        let index = self.members.schema.position(name)?;
        self.members.values.get(index)?.downcast_ref::<M>()
    }

    /// Mutably borrow a member by name, if it has type `M`
    pub fn get_mut<M: Any>(&mut self, name: &str) -> Option<&mut M> {
        let index = self.members.schema.position(name)?;
        self.members.values.get_mut(index)?.downcast_mut::<M>()
    }
}

impl Drop for OrderedComposite {
    fn drop(&mut self) {
        if !self.ready {
            return;
        }
        tracing::trace!(composite = self.members.schema.name(), "tearing down composite");
        if let Some(teardown) = self.members.schema.teardown().cloned() {
            teardown(&*self);
        }
        // members drop afterwards, in reverse
    }
}

impl std::fmt::Debug for OrderedComposite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderedComposite")
            .field("schema", &self.members.schema.name())
            .field("members", &self.member_names().collect::<Vec<_>>())
            .finish()
    }
}
