//! Consumer-first emission of the selected sub-graph to a visitor (§4.8).

use std::collections::{HashMap, HashSet};

use crate::component::VisitState;
use crate::ids::{ComponentId, NodeId, SelectorId};
use crate::resolve_state::ResolveState;

/// Driven with the protocol of §4.8. Ordering contract: `start` precedes all
/// node/edge callbacks; every `visit_node` precedes all `visit_edges` for any
/// node; for any acyclic pair `(A -> B)`, `A`'s `visit_edges` is called
/// before `B`'s. For cyclic components the order within the cycle is
/// unspecified but each node's `visit_edges` is called exactly once.
pub trait DependencyGraphVisitor {
    fn start(&mut self, root: ComponentId, rs: &ResolveState);
    fn visit_selector(&mut self, selector: SelectorId, rs: &ResolveState);
    fn visit_node(&mut self, node: NodeId, rs: &ResolveState);
    fn visit_edges(&mut self, node: NodeId, rs: &ResolveState);
    fn finish(&mut self, root: ComponentId, rs: &ResolveState);
}

/// Walks the selected sub-graph in consumer-first order and drives `visitor`
/// through the protocol above.
pub fn assemble(rs: &ResolveState, root: ComponentId, visitor: &mut dyn DependencyGraphVisitor) {
    visitor.start(root, rs);

    for selector in &rs.selectors {
        visitor.visit_selector(selector.id, rs);
    }

    for node in &rs.nodes {
        if node.selected {
            visitor.visit_node(node.id, rs);
        }
    }

    let mut visit_state: HashMap<ComponentId, VisitState> = HashMap::new();
    let mut work: Vec<ComponentId> = Vec::new();
    for module in &rs.modules {
        if let Some(component) = module.selected {
            work.push(component);
            visit_state.entry(component).or_insert(VisitState::NotSeen);
        }
    }

    let mut index = 0usize;
    while index < work.len() {
        let component = work[index];
        let state = visit_state
            .get(&component)
            .copied()
            .unwrap_or(VisitState::NotSeen);

        match state {
            VisitState::Visited => {
                work.remove(index);
            }
            VisitState::Visiting => {
                emit_edges(rs, component, visitor);
                visit_state.insert(component, VisitState::Visited);
                work.remove(index);
            }
            VisitState::NotSeen => {
                visit_state.insert(component, VisitState::Visiting);

                let mut seen_consumers = HashSet::new();
                let mut to_insert = Vec::new();
                for &node_id in &rs.components[component.index()].nodes {
                    if !rs.nodes[node_id.index()].selected {
                        continue;
                    }
                    for &edge_id in &rs.nodes[node_id.index()].incoming_edges {
                        let from_node = rs.edges[edge_id.index()].from;
                        let from_component = rs.nodes[from_node.index()].component;
                        if from_component == component {
                            continue;
                        }
                        let is_not_seen = visit_state
                            .get(&from_component)
                            .copied()
                            .unwrap_or(VisitState::NotSeen)
                            == VisitState::NotSeen;
                        if is_not_seen && seen_consumers.insert(from_component) {
                            to_insert.push(from_component);
                        }
                    }
                }

                if to_insert.is_empty() {
                    emit_edges(rs, component, visitor);
                    visit_state.insert(component, VisitState::Visited);
                    work.remove(index);
                } else {
                    for (offset, consumer) in to_insert.into_iter().enumerate() {
                        visit_state
                            .entry(consumer)
                            .or_insert(VisitState::NotSeen);
                        work.insert(index + offset, consumer);
                    }
                }
            }
        }
    }

    visitor.finish(root, rs);
}

fn emit_edges(rs: &ResolveState, component: ComponentId, visitor: &mut dyn DependencyGraphVisitor) {
    for &node_id in &rs.components[component.index()].nodes {
        if rs.nodes[node_id.index()].selected {
            visitor.visit_edges(node_id, rs);
        }
    }
}
