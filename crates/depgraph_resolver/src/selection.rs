//! Selection (§4.3) and the compatible-selection shortcut (§4.4).

use tracing::trace;

use crate::component::VisitState;
use crate::conflict::{ConflictHandler, ModuleConflictCandidate};
use crate::ids::{ComponentId, ModuleId, SelectorId};
use crate::resolve_state::ResolveState;

/// §4.4.1. A selector "agrees" with `version` when it has a preferred
/// selector that permits shortcutting and accepts `version`, and either has
/// no rejected selector or one that does not reject `version`. Selectors
/// without a version constraint at all are ignored. If no selector passing
/// `filter` carries a constraint, the result is false — the shortcut
/// requires positive evidence of agreement, not vacuous truth (§9 open
/// question; required for P5).
pub fn all_selectors_agree_with(
    rs: &ResolveState,
    selectors: &[SelectorId],
    version: &str,
    filter: impl Fn(SelectorId) -> bool,
) -> bool {
    let mut any_considered = false;
    for &selector_id in selectors {
        if !filter(selector_id) {
            continue;
        }
        let selector = &rs.selectors[selector_id.index()];
        let Some(preferred) = selector.constraint.preferred.as_ref() else {
            continue;
        };
        any_considered = true;
        if !preferred.can_short_circuit || !preferred.selector.accepts(version) {
            return false;
        }
        if let Some(rejected) = &selector.constraint.rejected {
            if rejected.selector.accepts(version) {
                return false;
            }
        }
    }
    any_considered
}

impl ResolveState {
    /// §4.4. Attempts the fast path that avoids full conflict resolution.
    /// Returns `true` if a selection decision was made (the candidate was
    /// either selected, soft-selected, or subsumed by the current
    /// selection); `false` means fall through to conflict registration.
    pub fn try_compatible_selection(&mut self, module: ModuleId, candidate: ComponentId) -> bool {
        let current = self.modules[module.index()].selected;
        if current == Some(candidate) {
            return true;
        }

        let participates = self.modules[module.index()].participates_in_replacements;
        let selectors = self.modules[module.index()].selectors.clone();
        let version = self.components[candidate.index()].version().to_string();

        match current {
            None if !participates => {
                if all_selectors_agree_with(self, &selectors, &version, |_| true) {
                    self.select_component(module, candidate, false);
                    return true;
                }
                false
            }
            Some(current_id) => {
                let candidate_resolvers = self.components[candidate.index()].all_resolvers.clone();
                let current_version = self.components[current_id.index()].version().to_string();

                if all_selectors_agree_with(self, &candidate_resolvers, &current_version, |_| true) {
                    // Every selector that chose the candidate is equally happy
                    // with what's already selected: the candidate is subsumed.
                    return true;
                }

                let not_chosen_by_candidate: Vec<SelectorId> = selectors
                    .iter()
                    .copied()
                    .filter(|s| !candidate_resolvers.contains(s))
                    .collect();

                if all_selectors_agree_with(self, &not_chosen_by_candidate, &version, |_| true) {
                    self.deselect_component(current_id, false);
                    self.select_component(module, candidate, true);
                    return true;
                }

                false
            }
            None => false, // participates_in_replacements, nothing selected yet
        }
    }

    /// §4.3. Proposes `candidate` as the resolution of an edge targeting
    /// `module`.
    pub fn perform_selection(
        &mut self,
        conflict_handler: &mut dyn ConflictHandler,
        module: ModuleId,
        candidate: ComponentId,
    ) {
        if !self.components[candidate.index()].selectable {
            trace!(?module, ?candidate, "candidate not selectable, skipping");
            return;
        }

        if self.try_compatible_selection(module, candidate) {
            return;
        }

        let version = self.components[candidate.index()].version().to_string();
        let conflict = conflict_handler.register_module(ModuleConflictCandidate {
            module,
            component: candidate,
            version,
        });

        if !conflict.conflict_exists() {
            self.select_component(module, candidate, false);
            return;
        }

        conflict.with_participating_modules(|participating_module| {
            if let Some(selected) = self.modules[participating_module.index()].selected {
                self.deselect_component(selected, true);
            }
            self.modules[participating_module.index()].selected = None;
        });
    }

    /// Re-selects the conflict handler's winner for `module`, called from
    /// the `replaceSelectionAction` the traversal loop passes to
    /// `resolveNextConflict` (§4.2). `select_component` re-points any
    /// selector still resolved against a now-superseded version and
    /// reattaches its edges.
    pub fn apply_conflict_resolution(&mut self, module: ModuleId, version: &str) {
        if let Some(component) = self.find_component(module, version) {
            self.components[component.index()].selectable = true;
            self.set_component_visit_state(component, VisitState::NotSeen);
            self.select_component(module, component, false);
            for node in self.components[component.index()].nodes.clone() {
                self.enqueue(node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::identifier::{IdentifierCache, ModuleIdentifier, ModuleVersionIdentifier};
    use crate::version::{ConstraintSide, ExactVersion, VersionConstraint, VersionRange};
    use std::sync::Arc;

    fn new_rs() -> ResolveState {
        ResolveState::new(Arc::new(IdentifierCache::new()))
    }

    #[test]
    fn s6_two_overlapping_ranges_agree_on_shared_version() {
        let mut rs = new_rs();
        let module = rs.get_or_create_module(ModuleIdentifier::new("g", "a"));
        let s1 = rs.create_selector(
            module,
            VersionConstraint::new(ConstraintSide::new(
                VersionRange {
                    min: Some("1.0".into()),
                    max: Some("2.0".into()),
                    max_inclusive: false,
                },
                true,
            )),
        );
        let s2 = rs.create_selector(
            module,
            VersionConstraint::new(ConstraintSide::new(
                VersionRange {
                    min: Some("1.5".into()),
                    max: Some("3.0".into()),
                    max_inclusive: false,
                },
                true,
            )),
        );
        assert!(all_selectors_agree_with(&rs, &[s1, s2], "1.7", |_| true));
    }

    #[test]
    fn s6_unconstrained_selector_cannot_provide_positive_evidence() {
        let mut rs = new_rs();
        let module = rs.get_or_create_module(ModuleIdentifier::new("g", "a"));
        let s1 = rs.create_selector(module, VersionConstraint::unconstrained());
        assert!(!all_selectors_agree_with(&rs, &[s1], "1.7", |_| true));
    }

    #[test]
    fn disagreement_short_circuits_to_false() {
        let mut rs = new_rs();
        let module = rs.get_or_create_module(ModuleIdentifier::new("g", "a"));
        let agree = rs.create_selector(
            module,
            VersionConstraint::new(ConstraintSide::new(ExactVersion("1.7".into()), true)),
        );
        let disagree = rs.create_selector(
            module,
            VersionConstraint::new(ConstraintSide::new(ExactVersion("9.9".into()), true)),
        );
        assert!(!all_selectors_agree_with(&rs, &[agree, disagree], "1.7", |_| true));
    }

    /// A single exact-version selector only provides positive evidence of
    /// agreement when its preferred side is allowed to short-circuit at all;
    /// with `can_short_circuit = false` it blocks agreement even though the
    /// version matches.
    #[rstest]
    #[case::short_circuiting_selector_agrees(true, true)]
    #[case::non_short_circuiting_selector_blocks(false, false)]
    fn single_exact_selector_agreement_depends_on_short_circuit_flag(
        #[case] can_short_circuit: bool,
        #[case] expected: bool,
    ) {
        let mut rs = new_rs();
        let module = rs.get_or_create_module(ModuleIdentifier::new("g", "a"));
        let s1 = rs.create_selector(
            module,
            VersionConstraint::new(ConstraintSide::new(ExactVersion("1.7".into()), can_short_circuit)),
        );
        similar_asserts::assert_eq!(all_selectors_agree_with(&rs, &[s1], "1.7", |_| true), expected);
    }

    #[test]
    fn compatible_selection_selects_when_nothing_selected_and_all_agree() {
        let mut rs = new_rs();
        let module = rs.get_or_create_module(ModuleIdentifier::new("g", "a"));
        let version_id = ModuleVersionIdentifier::new(ModuleIdentifier::new("g", "a"), "1.0");
        let component = rs.get_or_create_component(module, version_id);
        rs.create_selector(
            module,
            VersionConstraint::new(ConstraintSide::new(ExactVersion("1.0".into()), true)),
        );

        assert!(rs.try_compatible_selection(module, component));
        assert_eq!(rs.modules[module.index()].selected, Some(component));
    }
}
