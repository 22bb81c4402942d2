//! Conflict detection, batching and resolution across modules (§4.7).

use indexmap::IndexMap;
use tracing::debug;

use crate::ids::{ComponentId, ModuleId};
use crate::version::max_version;

/// A candidate version proposed for registration with the conflict handler.
#[derive(Debug, Clone)]
pub struct ModuleConflictCandidate {
    pub module: ModuleId,
    pub component: ComponentId,
    pub version: String,
}

/// Describes the outcome of registering a candidate: whether multiple
/// incompatible versions are now in play for the modules the candidate
/// dragged in, and which modules those are.
#[derive(Debug, Default)]
pub struct PotentialConflict {
    participating: Vec<ModuleId>,
}

impl PotentialConflict {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn of(participating: Vec<ModuleId>) -> Self {
        Self { participating }
    }

    pub fn conflict_exists(&self) -> bool {
        !self.participating.is_empty()
    }

    /// Invoke `action` for every module dragged into the conflict.
    pub fn with_participating_modules(&self, mut action: impl FnMut(ModuleId)) {
        for &module in &self.participating {
            action(module);
        }
    }
}

/// A tie-break resolver consulted when a module has more than one registered
/// candidate. Returns the version it prefers, or `None` to defer to the next
/// resolver (or the handler's default, highest-version, policy).
pub trait ConflictResolver: Send + Sync {
    fn select<'a>(&self, module: ModuleId, candidates: &'a [(ComponentId, String)]) -> Option<&'a str>;
}

/// Prefers whichever candidate was registered as a direct dependency of the
/// root — the tie-break rule §4.1 installs before the traversal loop runs, so
/// constraints declared directly on the root dominate transitive ones.
#[derive(Default)]
pub struct DirectDependencyForcingResolver {
    direct: std::collections::HashSet<(ModuleId, String)>,
}

impl DirectDependencyForcingResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_direct(&mut self, module: ModuleId, version: impl Into<String>) {
        self.direct.insert((module, version.into()));
    }
}

impl ConflictResolver for DirectDependencyForcingResolver {
    fn select<'a>(&self, module: ModuleId, candidates: &'a [(ComponentId, String)]) -> Option<&'a str> {
        candidates
            .iter()
            .find(|(_, v)| self.direct.contains(&(module, v.clone())))
            .map(|(_, v)| v.as_str())
    }
}

/// External contract consumed by the traversal driver (§4.7).
pub trait ConflictHandler {
    fn register_resolver(&mut self, resolver: Box<dyn ConflictResolver>);

    fn register_module(&mut self, candidate: ModuleConflictCandidate) -> PotentialConflict;

    fn has_conflicts(&self) -> bool;

    /// Pick one pending conflict and invoke `action(module, chosen_version)`
    /// for the winner.
    fn resolve_next_conflict(&mut self, action: &mut dyn FnMut(ModuleId, &str));
}

/// In-memory conflict handler: tracks, per module, every registered
/// `(component, version)` pair; a module has a conflict once it has more than
/// one distinct selectable version registered. Resolution picks the
/// highest version unless a registered [`ConflictResolver`] overrides it.
///
/// `candidates` is an `IndexMap` rather than a `HashMap` so that candidate
/// order — and therefore which entry wins a version tie — is reproducible
/// across runs instead of depending on hash iteration order.
#[derive(Default)]
pub struct DefaultConflictHandler {
    candidates: IndexMap<ModuleId, Vec<(ComponentId, String)>>,
    pending: Vec<ModuleId>,
    resolvers: Vec<Box<dyn ConflictResolver>>,
}

impl DefaultConflictHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConflictHandler for DefaultConflictHandler {
    fn register_resolver(&mut self, resolver: Box<dyn ConflictResolver>) {
        self.resolvers.push(resolver);
    }

    fn register_module(&mut self, candidate: ModuleConflictCandidate) -> PotentialConflict {
        let entry = self.candidates.entry(candidate.module).or_default();
        if !entry.iter().any(|(c, _)| *c == candidate.component) {
            entry.push((candidate.component, candidate.version.clone()));
        }

        let distinct_versions = entry
            .iter()
            .map(|(_, v)| v.as_str())
            .collect::<std::collections::HashSet<_>>()
            .len();

        if distinct_versions > 1 {
            if !self.pending.contains(&candidate.module) {
                self.pending.push(candidate.module);
            }
            debug!(module = ?candidate.module, versions = distinct_versions, "conflict registered");
            PotentialConflict::of(vec![candidate.module])
        } else {
            PotentialConflict::none()
        }
    }

    fn has_conflicts(&self) -> bool {
        !self.pending.is_empty()
    }

    fn resolve_next_conflict(&mut self, action: &mut dyn FnMut(ModuleId, &str)) {
        let Some(module) = self.pending.pop() else {
            return;
        };
        let candidates = self.candidates.get(&module).cloned().unwrap_or_default();
        if candidates.is_empty() {
            return;
        }

        let mut chosen = candidates[0].1.clone();
        for (_, v) in &candidates[1..] {
            chosen = max_version(&chosen, v).to_string();
        }
        for resolver in &self.resolvers {
            if let Some(forced) = resolver.select(module, &candidates) {
                chosen = forced.to_string();
                break;
            }
        }

        debug!(?module, chosen = %chosen, "conflict resolved");
        action(module, &chosen);
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn single_candidate_is_not_a_conflict() {
        let mut handler = DefaultConflictHandler::new();
        let module = ModuleId::new(0);
        let conflict = handler.register_module(ModuleConflictCandidate {
            module,
            component: ComponentId::new(0),
            version: "1.0".into(),
        });
        assert!(!conflict.conflict_exists());
        assert!(!handler.has_conflicts());
    }

    /// Two distinct versions registered for one module always conflict;
    /// resolution defaults to highest-version unless a forcing resolver
    /// (`DirectDependencyForcingResolver`) overrides the tie-break.
    #[rstest]
    #[case::highest_version_wins_by_default(None, "2.0")]
    #[case::direct_dependency_forcing_overrides_highest(Some("1.0"), "1.0")]
    fn resolve_next_conflict_picks_expected_version(
        #[case] forced: Option<&str>,
        #[case] expected: &str,
    ) {
        let mut handler = DefaultConflictHandler::new();
        let module = ModuleId::new(0);
        if let Some(forced_version) = forced {
            let mut forcing = DirectDependencyForcingResolver::new();
            forcing.mark_direct(module, forced_version);
            handler.register_resolver(Box::new(forcing));
        }

        handler.register_module(ModuleConflictCandidate {
            module,
            component: ComponentId::new(0),
            version: "1.0".into(),
        });
        let conflict = handler.register_module(ModuleConflictCandidate {
            module,
            component: ComponentId::new(1),
            version: "2.0".into(),
        });
        assert!(conflict.conflict_exists());
        assert!(handler.has_conflicts());

        let mut chosen = None;
        handler.resolve_next_conflict(&mut |m, v| chosen = Some((m, v.to_string())));
        similar_asserts::assert_eq!(chosen, Some((module, expected.to_string())));
        assert!(!handler.has_conflicts());
    }
}
