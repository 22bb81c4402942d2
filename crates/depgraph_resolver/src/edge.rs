//! Directed dependency edges and the metadata that produced them.

use crate::identifier::ModuleIdentifier;
use crate::ids::{ComponentId, NodeId, SelectorId};
use crate::version::VersionConstraint;

/// The originating declaration for an edge, in source order. Edge enumeration
/// order per node must be preserved from this order (§5 ordering guarantees).
#[derive(Debug, Clone)]
pub struct DependencyMetadata {
    pub requested: ModuleIdentifier,
    pub constraint: VersionConstraint,
    /// Constraint-only / optional edge: deferred by the
    /// [`crate::pending::PendingDependenciesHandler`] until some other
    /// non-constraint edge requires the same module (§4.9).
    pub constraint_only: bool,
    /// Marked edges skip the parallel metadata stage (§4.5 condition c).
    pub fast_resolve: bool,
}

impl DependencyMetadata {
    pub fn required(requested: ModuleIdentifier, constraint: VersionConstraint) -> Self {
        Self {
            requested,
            constraint,
            constraint_only: false,
            fast_resolve: false,
        }
    }

    pub fn constraint_only(requested: ModuleIdentifier, constraint: VersionConstraint) -> Self {
        Self {
            requested,
            constraint,
            constraint_only: true,
            fast_resolve: false,
        }
    }

    pub fn fast_resolve(mut self) -> Self {
        self.fast_resolve = true;
        self
    }
}

/// A recoverable per-edge failure (§7 kinds 2 and 3). Recorded on the edge;
/// never aborts the resolve.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EdgeFailure {
    #[error("could not resolve '{0}' to a component")]
    UnresolvableSelector(ModuleIdentifier),

    #[error("failed to fetch metadata for '{0}': {1}")]
    MetadataFetch(ModuleIdentifier, String),
}

/// A directed dependency from a node (the *from*) to a set of target nodes
/// within a target component (§3). Immutable in origin and declared
/// constraint; target attachment is assigned during §4.6.
#[derive(Debug)]
pub struct EdgeState {
    pub id: crate::ids::EdgeId,
    pub from: NodeId,
    pub dependency: DependencyMetadata,
    pub selector: SelectorId,
    pub target_component: Option<ComponentId>,
    pub target_nodes: Vec<NodeId>,
    pub failure: Option<EdgeFailure>,
}

impl EdgeState {
    pub fn new(
        id: crate::ids::EdgeId,
        from: NodeId,
        dependency: DependencyMetadata,
        selector: SelectorId,
    ) -> Self {
        Self {
            id,
            from,
            dependency,
            selector,
            target_component: None,
            target_nodes: Vec::new(),
            failure: None,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.target_component.is_some() && self.failure.is_none()
    }
}
