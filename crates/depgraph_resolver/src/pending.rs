//! Defers constraint-only / optional edges until some other, non-constraint
//! edge activates the same module (§4.9).

use std::collections::HashMap;

use crate::identifier::ModuleIdentifier;
use crate::ids::EdgeId;

/// Mapping from module identifier to the deferred edges declared as
/// constraint-only against it.
#[derive(Default)]
pub struct PendingDependenciesHandler {
    deferred: HashMap<ModuleIdentifier, Vec<EdgeId>>,
}

impl PendingDependenciesHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defer `edge`, declared against `module` as constraint-only.
    pub fn defer(&mut self, module: ModuleIdentifier, edge: EdgeId) {
        self.deferred.entry(module).or_default().push(edge);
    }

    /// Release and return every edge deferred against `module`, if any. Once
    /// activated a module's deferred list is empty again — a later
    /// constraint-only edge against the same module is deferred afresh (the
    /// activation already happened, so there is nothing left to defer it
    /// for, but we still record it in case resolution restarts the module).
    pub fn activate(&mut self, module: &ModuleIdentifier) -> Vec<EdgeId> {
        self.deferred.remove(module).unwrap_or_default()
    }

    pub fn has_deferred(&self, module: &ModuleIdentifier) -> bool {
        self.deferred
            .get(module)
            .is_some_and(|edges| !edges.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mid(n: &str) -> ModuleIdentifier {
        ModuleIdentifier::new("g", n)
    }

    #[test]
    fn activation_releases_all_deferred_edges_in_order() {
        let mut handler = PendingDependenciesHandler::new();
        handler.defer(mid("a"), EdgeId::new(0));
        handler.defer(mid("a"), EdgeId::new(1));
        handler.defer(mid("b"), EdgeId::new(2));

        let released = handler.activate(&mid("a"));
        assert_eq!(released, vec![EdgeId::new(0), EdgeId::new(1)]);
        assert!(!handler.has_deferred(&mid("a")));
        assert!(handler.has_deferred(&mid("b")));
    }

    #[test]
    fn activating_an_unknown_module_returns_empty() {
        let mut handler = PendingDependenciesHandler::new();
        assert!(handler.activate(&mid("missing")).is_empty());
    }
}
