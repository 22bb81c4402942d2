//! Component and module state: one resolved module version, and one module
//! across all its candidate versions.

use crate::identifier::{ComponentIdentifier, ModuleIdentifier, ModuleVersionIdentifier};
use crate::ids::{ComponentId, ModuleId, NodeId, SelectorId};

/// Tri-value visit marker used only by the assembly stage (§4.8) to drive a
/// cycle-tolerant topological walk without recursion depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitState {
    NotSeen,
    Visiting,
    Visited,
}

/// One module across all candidate versions encountered during the resolve
/// (§3). Exactly one `ComponentState` is selected at any time after the
/// first selection, until a conflict deselects it.
#[derive(Debug)]
pub struct ModuleResolveState {
    pub id: ModuleId,
    pub identifier: ModuleIdentifier,
    pub selected: Option<ComponentId>,
    pub selectors: Vec<SelectorId>,
    /// Whether this module participates in the replacement graph
    /// (`ModuleReplacementsData`, §6) — when true, compatible-selection
    /// Case A never applies (§4.4).
    pub participates_in_replacements: bool,
}

impl ModuleResolveState {
    pub fn new(id: ModuleId, identifier: ModuleIdentifier) -> Self {
        Self {
            id,
            identifier,
            selected: None,
            selectors: Vec::new(),
            participates_in_replacements: false,
        }
    }

    pub fn is_selected(&self, candidate: ComponentId) -> bool {
        self.selected == Some(candidate)
    }
}

/// One candidate version of a module (§3). At most one `ComponentState`
/// exists per [`ModuleVersionIdentifier`] per resolve.
#[derive(Debug)]
pub struct ComponentState {
    pub id: ComponentId,
    pub module: ModuleId,
    pub version_id: ModuleVersionIdentifier,
    pub component_identifier: Option<ComponentIdentifier>,
    pub nodes: Vec<NodeId>,
    pub is_selected: bool,
    /// Cleared when this version is ruled out by conflict resolution or
    /// replacement; a non-selectable component is never re-proposed by
    /// `performSelection` (§4.3).
    pub selectable: bool,
    pub visit_state: VisitState,
    /// Every `SelectorState` that chose this version (`allResolvers`, §4.4).
    pub all_resolvers: Vec<SelectorId>,
}

impl ComponentState {
    pub fn new(id: ComponentId, module: ModuleId, version_id: ModuleVersionIdentifier) -> Self {
        Self {
            id,
            module,
            version_id,
            component_identifier: None,
            nodes: Vec::new(),
            is_selected: false,
            selectable: true,
            visit_state: VisitState::NotSeen,
            all_resolvers: Vec::new(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version_id.version
    }
}
