//! Module, version and component identity, plus the monotone cache that
//! derives a [`ComponentIdentifier`] from a [`ModuleVersionIdentifier`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// A `(group, name)` pair identifying a module regardless of version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleIdentifier {
    pub group: Arc<str>,
    pub name: Arc<str>,
}

impl ModuleIdentifier {
    pub fn new(group: impl Into<Arc<str>>, name: impl Into<Arc<str>>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ModuleIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)
    }
}

/// A module at a specific version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleVersionIdentifier {
    pub module: ModuleIdentifier,
    pub version: Arc<str>,
}

impl ModuleVersionIdentifier {
    pub fn new(module: ModuleIdentifier, version: impl Into<Arc<str>>) -> Self {
        Self {
            module,
            version: version.into(),
        }
    }
}

impl fmt::Display for ModuleVersionIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.version)
    }
}

/// An opaque, resolver-assigned identity for a resolved component.
///
/// Two [`ModuleVersionIdentifier`]s that the external id-resolver maps to the
/// same string are the same component, even if construction happened on
/// different threads during the parallel metadata stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentIdentifier(Arc<str>);

impl ComponentIdentifier {
    pub fn new(raw: impl Into<Arc<str>>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Memoizing, monotone map from [`ModuleVersionIdentifier`] to
/// [`ComponentIdentifier`].
///
/// Entries are inserted at most once per key; a racing insert of the same key
/// from the parallel metadata stage is a wasted computation, not a
/// correctness problem (P6: the cache only grows and a key's value never
/// changes once observed).
#[derive(Default)]
pub struct IdentifierCache {
    entries: Mutex<HashMap<ModuleVersionIdentifier, ComponentIdentifier>>,
}

impl IdentifierCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached identifier for `key`, computing and inserting it
    /// with `compute` if absent. If two threads race on the same key, both
    /// may call `compute`, but only one result is kept and all callers
    /// observe the same value from then on.
    pub fn get_or_insert_with(
        &self,
        key: &ModuleVersionIdentifier,
        compute: impl FnOnce() -> ComponentIdentifier,
    ) -> ComponentIdentifier {
        if let Some(existing) = self.entries.lock().get(key) {
            return existing.clone();
        }
        let computed = compute();
        let mut entries = self.entries.lock();
        entries.entry(key.clone()).or_insert(computed).clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mvid(v: &str) -> ModuleVersionIdentifier {
        ModuleVersionIdentifier::new(ModuleIdentifier::new("com.example", "a"), v)
    }

    #[test]
    fn cache_is_monotone_under_repeated_insert() {
        let cache = IdentifierCache::new();
        let key = mvid("1.0");
        let first = cache.get_or_insert_with(&key, || ComponentIdentifier::new("first"));
        let second = cache.get_or_insert_with(&key, || ComponentIdentifier::new("second"));
        assert_eq!(first, second);
        assert_eq!(first.as_str(), "first");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn distinct_versions_get_distinct_entries() {
        let cache = IdentifierCache::new();
        cache.get_or_insert_with(&mvid("1.0"), || ComponentIdentifier::new("a-1.0"));
        cache.get_or_insert_with(&mvid("2.0"), || ComponentIdentifier::new("a-2.0"));
        assert_eq!(cache.len(), 2);
    }
}
