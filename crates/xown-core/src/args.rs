//! Call-site arguments for composite construction

use crate::{Error, Result};
use std::any::Any;
use std::collections::HashMap;

/// One type-erased member argument
pub(crate) struct ArgValue {
    pub(crate) value: Box<dyn Any + Send>,
    pub(crate) type_name: &'static str,
}

/// Member arguments keyed by name
///
/// The order arguments are added in is kept for diagnostics only; it never
/// influences the order members are built in.
#[derive(Default)]
pub struct InitArgs {
    entries: Vec<(String, ArgValue)>,
}

impl InitArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the argument for member `name`
    pub fn arg<V: Any + Send>(mut self, name: impl Into<String>, value: V) -> Self {
        self.push(name, value);
        self
    }

    /// Add the argument for member `name` in place
    pub fn push<V: Any + Send>(&mut self, name: impl Into<String>, value: V) -> &mut Self {
        self.entries.push((
            name.into(),
            ArgValue {
                value: Box::new(value),
                type_name: std::any::type_name::<V>(),
            },
        ));
        self
    }

    /// Number of arguments given
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Member names in the order they were given
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Index the arguments by member name
    pub(crate) fn into_map(self) -> Result<HashMap<String, ArgValue>> {
        let mut map = HashMap::with_capacity(self.entries.len());
        for (name, value) in self.entries {
            if map.contains_key(&name) {
                return Err(Error::DuplicateArgument(name));
            }
            map.insert(name, value);
        }
        Ok(map)
    }
}

impl std::fmt::Debug for InitArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(name, v)| (name, v.type_name)))
            .finish()
    }
}
