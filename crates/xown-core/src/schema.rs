//! Composite schema: declared member order and constructors

use crate::args::ArgValue;
use crate::composite::OrderedComposite;
use crate::{Error, Result};
use std::any::Any;
use std::collections::HashSet;
use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;

/// Type-erased member constructor
type Ctor = Box<dyn Fn(&str, Option<ArgValue>) -> Result<Box<dyn Any + Send>> + Send + Sync>;

/// Composite body or teardown logic
pub(crate) type Hook = Arc<dyn Fn(&OrderedComposite) + Send + Sync>;

/// One declared member slot
pub(crate) struct MemberSpec {
    pub(crate) name: String,
    pub(crate) type_name: &'static str,
    pub(crate) ctor: Ctor,
}

/// Fixed, ordered list of member slots for a composite
///
/// Members are constructed in the order they were declared on the
/// [`SchemaBuilder`] and destroyed in reverse.
pub struct Schema {
    name: String,
    members: Vec<MemberSpec>,
    setup: Option<Hook>,
    teardown: Option<Hook>,
}

impl Schema {
    /// Start declaring a schema
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            members: Vec::new(),
            setup: None,
            teardown: None,
        }
    }

    /// Composite name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of member slots
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member names in declaration order
    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.name.as_str())
    }

    /// Declaration index of a member
    pub fn position(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| m.name == name)
    }

    pub(crate) fn members(&self) -> &[MemberSpec] {
        &self.members
    }

    pub(crate) fn setup(&self) -> Option<&Hook> {
        self.setup.as_ref()
    }

    pub(crate) fn teardown(&self) -> Option<&Hook> {
        self.teardown.as_ref()
    }
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field(
                "members",
                &self
                    .members
                    .iter()
                    .map(|m| (m.name.as_str(), m.type_name))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Builder declaring member slots in order
pub struct SchemaBuilder {
    name: String,
    members: Vec<MemberSpec>,
    setup: Option<Hook>,
    teardown: Option<Hook>,
}

impl SchemaBuilder {
    /// Declare a member that requires an argument of type `A`
    pub fn member<M, A, F>(self, name: impl Into<String>, ctor: F) -> Self
    where
        M: Any + Send,
        A: Any + Send,
        F: Fn(A) -> M + Send + Sync + 'static,
    {
        self.try_member(name, move |arg: A| Ok::<M, Infallible>(ctor(arg)))
    }

    /// Declare a member whose constructor may fail
    pub fn try_member<M, A, E, F>(self, name: impl Into<String>, ctor: F) -> Self
    where
        M: Any + Send,
        A: Any + Send,
        E: Display,
        F: Fn(A) -> std::result::Result<M, E> + Send + Sync + 'static,
    {
        let erased: Ctor = Box::new(move |member: &str, arg: Option<ArgValue>| {
            let arg = arg.ok_or_else(|| Error::MissingArgument(member.to_string()))?;
            let value = take_arg::<A>(member, arg)?;
            build_member(member, ctor(value))
        });
        self.push::<M>(name, erased)
    }

    /// Declare a member that falls back to `A::default()` when no argument is given
    pub fn member_or_default<M, A, F>(self, name: impl Into<String>, ctor: F) -> Self
    where
        M: Any + Send,
        A: Any + Send + Default,
        F: Fn(A) -> M + Send + Sync + 'static,
    {
        let erased: Ctor = Box::new(move |member: &str, arg: Option<ArgValue>| {
            let value = match arg {
                Some(arg) => take_arg::<A>(member, arg)?,
                None => A::default(),
            };
            build_member(member, Ok::<M, Infallible>(ctor(value)))
        });
        self.push::<M>(name, erased)
    }

    /// Declare a member that is default-constructed unless a value is given
    pub fn default_member<M>(self, name: impl Into<String>) -> Self
    where
        M: Any + Send + Default,
    {
        self.member_or_default(name, |value: M| value)
    }

    /// Logic run once every member is constructed
    pub fn on_setup<F>(mut self, hook: F) -> Self
    where
        F: Fn(&OrderedComposite) + Send + Sync + 'static,
    {
        self.setup = Some(Arc::new(hook));
        self
    }

    /// Logic run before any member is destroyed
    pub fn on_teardown<F>(mut self, hook: F) -> Self
    where
        F: Fn(&OrderedComposite) + Send + Sync + 'static,
    {
        self.teardown = Some(Arc::new(hook));
        self
    }

    /// Validate member names and freeze the declaration order
    pub fn build(self) -> Result<Arc<Schema>> {
        let mut seen = HashSet::with_capacity(self.members.len());
        for member in &self.members {
            if member.name.is_empty() {
                return Err(Error::EmptyMemberName);
            }
            if !seen.insert(member.name.as_str()) {
                return Err(Error::DuplicateMember(member.name.clone()));
            }
        }

        tracing::debug!(
            composite = %self.name,
            members = self.members.len(),
            "schema built"
        );

        Ok(Arc::new(Schema {
            name: self.name,
            members: self.members,
            setup: self.setup,
            teardown: self.teardown,
        }))
    }

    fn push<M: Any>(mut self, name: impl Into<String>, ctor: Ctor) -> Self {
        self.members.push(MemberSpec {
            name: name.into(),
            type_name: std::any::type_name::<M>(),
            ctor,
        });
        self
    }
}

/// Unbox an argument, checking its type
fn take_arg<A: Any>(member: &str, arg: ArgValue) -> Result<A> {
    let actual = arg.type_name;
    arg.value
        .downcast::<A>()
        .map(|value| *value)
        .map_err(|_| Error::ArgumentType {
            member: member.to_string(),
            expected: std::any::type_name::<A>(),
            actual,
        })
}

fn build_member<M, E>(member: &str, built: std::result::Result<M, E>) -> Result<Box<dyn Any + Send>>
where
    M: Any + Send,
    E: Display,
{
    match built {
        Ok(value) => Ok(Box::new(value)),
        Err(e) => Err(Error::MemberConstruction {
            member: member.to_string(),
            reason: e.to_string(),
        }),
    }
}
