//! Name registry: symbolic names mapped to unit bodies.

use core::fmt;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::unit::Unit;

/// Name a body is declared and spawned under.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(Arc<str>);

impl Name {
    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Name {
    fn from(name: &str) -> Self {
        Self(Arc::from(name))
    }
}

impl From<String> for Name {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<&Name> for Name {
    fn from(name: &Name) -> Self {
        name.clone()
    }
}

impl Borrow<str> for Name {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Behavior of a unit. Receives the unit that handed off to it.
pub type Body = Arc<dyn Fn(Unit) -> Result<()> + Send + Sync>;

/// Declared bodies, by name.
#[derive(Default)]
pub(crate) struct Registry {
    bodies: Mutex<HashMap<Name, Body>>,
}

impl Registry {
    /// Stores `body` under `name`, replacing any earlier declaration.
    pub(crate) fn declare(&self, name: Name, body: Body) {
        let replaced = self.bodies.lock().insert(name.clone(), body).is_some();
        tracing::trace!(name = %name, replaced, "body declared");
    }

    /// Returns the body declared under `name`.
    pub(crate) fn fetch(&self, name: &Name) -> Result<Body> {
        self.bodies
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::unknown_name(name))
    }

    /// Drops every declaration.
    pub(crate) fn clear(&self) {
        self.bodies.lock().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.bodies.lock().len()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bodies = self.bodies.lock();
        let mut names: Vec<_> = bodies.keys().collect();
        names.sort();
        f.debug_struct("Registry").field("names", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::unit;

    fn body(tag: &'static str) -> Body {
        Arc::new(move |_: Unit| -> Result<()> { Err(Error::user(tag)) })
    }

    #[test]
    fn redeclaring_replaces_the_body() {
        let registry = Registry::default();
        registry.declare(Name::from("t"), body("first"));
        registry.declare(Name::from("t"), body("second"));
        assert_eq!(registry.len(), 1);

        let fetched = registry.fetch(&Name::from("t")).expect("declared");
        let err = fetched(unit::current()).expect_err("body fails");
        assert_eq!(err.message(), Some("second"));
    }

    #[test]
    fn unknown_names_are_reported() {
        let registry = Registry::default();
        let err = registry.fetch(&Name::from("missing")).err().expect("unknown");
        assert_eq!(err.kind(), ErrorKind::UnknownName);
        assert_eq!(err.to_string(), "UnknownName: unknown name: missing");
    }

    #[test]
    fn clear_drops_everything() {
        let registry = Registry::default();
        registry.declare(Name::from("a"), body("a"));
        registry.declare(Name::from("b"), body("b"));
        registry.clear();
        assert_eq!(registry.len(), 0);
        assert!(format!("{registry:?}").contains("names: []"));
    }

    #[test]
    fn names_compare_with_strings() {
        let name = Name::from(String::from("worker"));
        assert_eq!(name, "worker");
        assert_eq!(name.as_str(), "worker");
        assert_eq!(name.to_string(), "worker");
    }
}
