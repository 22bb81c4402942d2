//! The global graph registry and ready-queue for one `resolve` call (§4).
//!
//! Components, nodes, edges and selectors are arena-allocated in the `Vec`s
//! below and referred to elsewhere by the index newtypes in [`crate::ids`].
//! The arena lives for exactly the duration of one [`crate::driver::Resolver::resolve`]
//! call (§9 design notes).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::component::{ComponentState, ModuleResolveState, VisitState};
use crate::edge::EdgeState;
use crate::identifier::{IdentifierCache, ModuleIdentifier, ModuleVersionIdentifier};
use crate::ids::{ComponentId, EdgeId, ModuleId, NodeId, SelectorId};
use crate::node::{NodeState, QueueState};
use crate::pending::PendingDependenciesHandler;
use crate::selector::SelectorState;
use crate::version::VersionConstraint;

pub struct ResolveState {
    pub modules: Vec<ModuleResolveState>,
    pub components: Vec<ComponentState>,
    pub nodes: Vec<NodeState>,
    pub edges: Vec<EdgeState>,
    pub selectors: Vec<SelectorState>,

    module_index: HashMap<ModuleIdentifier, ModuleId>,
    component_index: HashMap<ModuleVersionIdentifier, ComponentId>,

    queue: VecDeque<NodeId>,

    pub id_cache: Arc<IdentifierCache>,
    pub root_component: Option<ComponentId>,
    pub pending: PendingDependenciesHandler,
}

impl ResolveState {
    pub fn new(id_cache: Arc<IdentifierCache>) -> Self {
        Self {
            modules: Vec::new(),
            components: Vec::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
            selectors: Vec::new(),
            module_index: HashMap::new(),
            component_index: HashMap::new(),
            queue: VecDeque::new(),
            id_cache,
            root_component: None,
            pending: PendingDependenciesHandler::new(),
        }
    }

    pub fn get_or_create_module(&mut self, identifier: ModuleIdentifier) -> ModuleId {
        if let Some(&id) = self.module_index.get(&identifier) {
            return id;
        }
        let id = ModuleId::new(self.modules.len());
        self.modules
            .push(ModuleResolveState::new(id, identifier.clone()));
        self.module_index.insert(identifier, id);
        id
    }

    /// Returns the existing component for `version_id` if one was already
    /// created this resolve, creating it otherwise (§3 invariant: at most one
    /// `ComponentState` per `ModuleVersionIdentifier` per resolve).
    pub fn get_or_create_component(
        &mut self,
        module: ModuleId,
        version_id: ModuleVersionIdentifier,
    ) -> ComponentId {
        if let Some(&id) = self.component_index.get(&version_id) {
            return id;
        }
        let id = ComponentId::new(self.components.len());
        self.components
            .push(ComponentState::new(id, module, version_id.clone()));
        self.component_index.insert(version_id, id);
        id
    }

    pub fn find_component(&self, module: ModuleId, version: &str) -> Option<ComponentId> {
        let identifier = self.modules[module.index()].identifier.clone();
        self.component_index
            .get(&ModuleVersionIdentifier::new(identifier, version.to_string()))
            .copied()
    }

    pub fn create_selector(
        &mut self,
        module: ModuleId,
        constraint: VersionConstraint,
    ) -> SelectorId {
        let id = SelectorId::new(self.selectors.len());
        self.selectors.push(SelectorState::new(id, module, constraint));
        self.modules[module.index()].selectors.push(id);
        id
    }

    /// Creates a node (configuration) for `component`, registers it, and
    /// pushes it onto the ready queue.
    pub fn create_node(&mut self, component: ComponentId, configuration: &str) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(NodeState::new(id, component, configuration));
        self.components[component.index()].nodes.push(id);
        self.queue.push_back(id);
        id
    }

    pub fn create_edge(
        &mut self,
        from: NodeId,
        dependency: crate::edge::DependencyMetadata,
        selector: SelectorId,
    ) -> EdgeId {
        let id = EdgeId::new(self.edges.len());
        self.edges.push(EdgeState::new(id, from, dependency, selector));
        self.nodes[from.index()].outgoing_edges.push(id);
        self.selectors[selector.index()].edges.push(id);
        id
    }

    pub fn enqueue(&mut self, node: NodeId) {
        self.nodes[node.index()].queue_state = QueueState::Pending;
        self.queue.push_back(node);
    }

    pub fn dequeue(&mut self) -> Option<NodeId> {
        while let Some(node) = self.queue.pop_front() {
            if self.nodes[node.index()].queue_state == QueueState::Pending {
                self.nodes[node.index()].queue_state = QueueState::Expanded;
                return Some(node);
            }
        }
        None
    }

    pub fn is_queue_empty(&self) -> bool {
        !self
            .queue
            .iter()
            .any(|&n| self.nodes[n.index()].queue_state == QueueState::Pending)
    }

    /// Attaches `edge` to every node of `target`, materializing a node for
    /// its default configuration if none exists yet. Newly materialized
    /// nodes are pushed onto the ready queue (§4.6).
    ///
    /// If `edge` was already attached to a *different* component (its
    /// selector having since been re-pointed elsewhere, e.g. by
    /// `select_component`'s stale-selector reattachment), that old
    /// attachment is undone first and the old target pruned if it is left
    /// unreachable. Re-attaching to the same target it already has is a
    /// no-op beyond ensuring the bookkeeping is present.
    pub fn attach_edge_to_component(&mut self, edge: EdgeId, target: ComponentId) {
        if self.edges[edge.index()].target_component != Some(target) {
            let old_target_nodes = std::mem::take(&mut self.edges[edge.index()].target_nodes);
            for old_node in old_target_nodes {
                self.nodes[old_node.index()].incoming_edges.retain(|&e| e != edge);
                let still_reachable = !self.nodes[old_node.index()].incoming_edges.is_empty();
                if !still_reachable && self.nodes[old_node.index()].selected {
                    self.prune_node(old_node);
                }
            }
        }

        let existing_nodes = self.components[target.index()].nodes.clone();
        let target_nodes = if existing_nodes.is_empty() {
            vec![self.create_node(target, "default")]
        } else {
            existing_nodes
        };

        self.edges[edge.index()].target_component = Some(target);
        self.edges[edge.index()].target_nodes = target_nodes.clone();
        for &node_id in &target_nodes {
            if !self.nodes[node_id.index()].incoming_edges.contains(&edge) {
                self.nodes[node_id.index()].incoming_edges.push(edge);
            }
            self.nodes[node_id.index()].selected = true;
        }
    }

    /// Marks `component` deselected and recursively prunes every
    /// configuration that loses all incoming reachability as a result (§3
    /// invariant). `mark_unselectable` additionally rules the component out
    /// from future proposals — set when a conflict resolver ruled against it
    /// (§4.3's deselect-version action), left false for the softer
    /// replacement in compatible-selection Case B.
    pub fn deselect_component(&mut self, component: ComponentId, mark_unselectable: bool) {
        let comp = &mut self.components[component.index()];
        comp.is_selected = false;
        if mark_unselectable {
            comp.selectable = false;
        }
        let nodes = comp.nodes.clone();
        for node in nodes {
            self.prune_node(node);
        }
    }

    fn prune_node(&mut self, node: NodeId) {
        if !self.nodes[node.index()].selected {
            return;
        }
        self.nodes[node.index()].selected = false;

        let outgoing = self.nodes[node.index()].outgoing_edges.clone();
        for edge_id in outgoing {
            let target_nodes = std::mem::take(&mut self.edges[edge_id.index()].target_nodes);
            self.edges[edge_id.index()].target_component = None;
            for target_node in target_nodes {
                self.nodes[target_node.index()]
                    .incoming_edges
                    .retain(|&e| e != edge_id);
                let still_reachable = !self.nodes[target_node.index()].incoming_edges.is_empty();
                if !still_reachable && self.nodes[target_node.index()].selected {
                    self.prune_node(target_node);
                }
            }
        }
    }

    /// Selects `candidate` for `module`, deselecting whatever was previously
    /// selected. `soft` preserves the prior selection's conflict-handler
    /// bookkeeping (§9 design notes) — it never marks the old selection
    /// unselectable, only out of reach from the root.
    pub fn select_component(&mut self, module: ModuleId, candidate: ComponentId, soft: bool) {
        tracing::trace!(?module, ?candidate, soft, "selecting component");
        let previous = self.modules[module.index()].selected;
        if let Some(previous) = previous {
            if previous != candidate {
                self.deselect_component(previous, false);
            }
        }
        self.modules[module.index()].selected = Some(candidate);
        self.components[candidate.index()].is_selected = true;
        self.components[candidate.index()].selectable = true;
        for node in self.components[candidate.index()].nodes.clone() {
            self.nodes[node.index()].selected = true;
        }

        self.reattach_stale_selectors(module, candidate);
    }

    /// Re-points every selector of `module` still resolved against some
    /// other, now-superseded component at `candidate`, and reattaches its
    /// edges. Selectors that have not resolved anything yet are left alone —
    /// they still have to go through `performSelection` themselves.
    ///
    /// Needed because a consumer's edge is attached to whatever component its
    /// selector resolved to at the time; when that component is later
    /// deselected out from under it (compatible-selection Case B, or a
    /// conflict-resolution winner change, §4.2/§4.4), the edge would
    /// otherwise stay cut loose forever.
    fn reattach_stale_selectors(&mut self, module: ModuleId, candidate: ComponentId) {
        let selectors = self.modules[module.index()].selectors.clone();
        for selector_id in selectors {
            let selector = &self.selectors[selector_id.index()];
            if selector.failure.is_some() {
                continue;
            }
            match selector.resolved_to {
                None => continue,
                Some(existing) if existing == candidate => continue,
                Some(_) => {}
            }

            self.selectors[selector_id.index()].resolved_to = Some(candidate);
            if !self.components[candidate.index()]
                .all_resolvers
                .contains(&selector_id)
            {
                self.components[candidate.index()].all_resolvers.push(selector_id);
            }

            let edges = self.selectors[selector_id.index()].edges.clone();
            for edge_id in edges {
                if self.edges[edge_id.index()].failure.is_some() {
                    continue;
                }
                self.attach_edge_to_component(edge_id, candidate);
            }
        }
    }

    pub fn component_visit_state(&self, component: ComponentId) -> VisitState {
        self.components[component.index()].visit_state
    }

    pub fn set_component_visit_state(&mut self, component: ComponentId, state: VisitState) {
        self.components[component.index()].visit_state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::ModuleIdentifier;

    fn rs() -> ResolveState {
        ResolveState::new(Arc::new(IdentifierCache::new()))
    }

    #[test]
    fn component_identity_is_stable_per_module_version() {
        let mut state = rs();
        let module = state.get_or_create_module(ModuleIdentifier::new("g", "a"));
        let v1 = ModuleVersionIdentifier::new(ModuleIdentifier::new("g", "a"), "1.0");
        let c1 = state.get_or_create_component(module, v1.clone());
        let c2 = state.get_or_create_component(module, v1);
        assert_eq!(c1, c2);
        assert_eq!(state.components.len(), 1);
    }

    #[test]
    fn deselecting_a_component_prunes_unreachable_targets() {
        let mut state = rs();
        let module_a = state.get_or_create_module(ModuleIdentifier::new("g", "a"));
        let module_b = state.get_or_create_module(ModuleIdentifier::new("g", "b"));
        let a = state.get_or_create_component(
            module_a,
            ModuleVersionIdentifier::new(ModuleIdentifier::new("g", "a"), "1.0"),
        );
        let b = state.get_or_create_component(
            module_b,
            ModuleVersionIdentifier::new(ModuleIdentifier::new("g", "b"), "1.0"),
        );
        let node_a = state.create_node(a, "default");
        let selector = state.create_selector(module_b, VersionConstraint::unconstrained());
        let edge = state.create_edge(
            node_a,
            crate::edge::DependencyMetadata::required(
                ModuleIdentifier::new("g", "b"),
                VersionConstraint::unconstrained(),
            ),
            selector,
        );
        state.attach_edge_to_component(edge, b);
        let node_b = state.components[b.index()].nodes[0];
        assert!(state.nodes[node_b.index()].selected);

        state.select_component(module_a, a, false);
        state.deselect_component(a, true);

        assert!(!state.nodes[node_a.index()].selected);
        assert!(!state.nodes[node_b.index()].selected);
        assert!(state.edges[edge.index()].target_component.is_none());
    }
}
