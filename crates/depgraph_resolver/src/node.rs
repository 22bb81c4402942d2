//! A configuration (variant) of a [`crate::component::ComponentState`].

use crate::ids::{ComponentId, EdgeId, NodeId};

/// Whether the driver has computed this node's outgoing edges yet. Tracked
/// separately from `selected` so a node pruned and later re-expanded does not
/// recompute edges it already has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// Not yet popped from the ready queue.
    Pending,
    /// Outgoing edges computed, selection/fetch/attach in progress or done.
    Expanded,
}

/// A configuration of a [`crate::component::ComponentState`] (§3). Created
/// when its owner component is first selected, or when an incoming edge
/// first targets it.
#[derive(Debug)]
pub struct NodeState {
    pub id: NodeId,
    pub component: ComponentId,
    pub configuration: String,
    pub incoming_edges: Vec<EdgeId>,
    pub outgoing_edges: Vec<EdgeId>,
    /// Is this configuration reachable from the root under the current
    /// selections? Flipped as the surrounding graph is pruned or re-expanded.
    pub selected: bool,
    pub queue_state: QueueState,
}

impl NodeState {
    pub fn new(id: NodeId, component: ComponentId, configuration: impl Into<String>) -> Self {
        Self {
            id,
            component,
            configuration: configuration.into(),
            incoming_edges: Vec::new(),
            outgoing_edges: Vec::new(),
            selected: true,
            queue_state: QueueState::Pending,
        }
    }
}
