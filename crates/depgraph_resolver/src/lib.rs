//! `depgraph-resolver` resolves a build tool's declared dependencies into a
//! concrete, conflict-free dependency graph.
//!
//! The entry point is [`Resolver::resolve`], driven by a set of collaborator
//! traits (module/version identifiers to components, component metadata
//! fetch, conflict resolution) the embedding build tool supplies. The result
//! is streamed to a [`DependencyGraphVisitor`] in consumer-first order rather
//! than returned as one big owned graph, so a large resolve never needs to
//! hold two copies of it in memory at once.

mod assembly;
mod component;
mod conflict;
mod driver;
mod edge;
mod error;
mod external;
mod identifier;
mod ids;
mod node;
mod pending;
mod resolve_state;
mod selection;
mod selector;
mod version;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use assembly::{assemble, DependencyGraphVisitor};
pub use component::{ComponentState, ModuleResolveState, VisitState};
pub use conflict::{
    ConflictHandler, ConflictResolver, DefaultConflictHandler, DirectDependencyForcingResolver,
    ModuleConflictCandidate, PotentialConflict,
};
pub use driver::{
    CancellationToken, Resolver, ResolverCollaborators, ResolverConfig, ResolverConfigBuilder,
};
pub use edge::{DependencyMetadata, EdgeFailure, EdgeState};
pub use error::{ResolveError, ResolveResult};
pub use external::{
    AttributesSchema, BuildOperationExecutor, ComponentMetaDataResolver, ComponentMetadata,
    ComponentSelectorConverter, ConfigurationMetadata, DependencySubstitutionApplicator,
    DependencyToComponentIdResolver, FetchOperation, IdentitySubstitutionApplicator,
    ImmutableAttributesFactory, ModuleExclusions, ModuleReplacementsData, NoModuleExclusions,
    NoModuleReplacements, RayonBuildOperationExecutor, ResolveContextToComponentResolver,
    RootComponent,
};
pub use identifier::{ComponentIdentifier, IdentifierCache, ModuleIdentifier, ModuleVersionIdentifier};
pub use ids::{ComponentId, EdgeId, ModuleId, NodeId, SelectorId};
pub use node::{NodeState, QueueState};
pub use resolve_state::ResolveState;
pub use selector::SelectorState;
pub use version::{ConstraintSide, ExactVersion, VersionConstraint, VersionRange, VersionSelector};
