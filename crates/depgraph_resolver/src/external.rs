//! External collaborators (§6). This core only specifies their interfaces;
//! remote repository I/O, POM/Ivy parsing, variant/attribute matching and
//! substitution policy all live on the other side of these traits.

use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::component::ComponentState;
use crate::edge::{DependencyMetadata, EdgeFailure};
use crate::identifier::{ComponentIdentifier, ModuleIdentifier, ModuleVersionIdentifier};
use crate::selector::SelectorState;
use crate::version::VersionConstraint;

/// Resolves a selector's declared constraint to one concrete version and its
/// component id. May perform I/O (repository lookups, redirect following).
pub trait DependencyToComponentIdResolver: Send + Sync {
    fn resolve(
        &self,
        requested: &ModuleIdentifier,
        constraint: &VersionConstraint,
    ) -> Result<(String, ComponentIdentifier), EdgeFailure>;
}

/// Fetches full component metadata (its configurations and their outgoing
/// dependencies). Must answer [`Self::is_fetching_metadata_cheap`] without
/// I/O so the driver can decide whether a component qualifies for the
/// parallel stage (§4.5).
pub trait ComponentMetaDataResolver: Send + Sync {
    fn is_fetching_metadata_cheap(&self, id: &ComponentIdentifier) -> bool;

    fn resolve_metadata(
        &self,
        id: &ComponentIdentifier,
    ) -> Result<ComponentMetadata, EdgeFailure>;
}

/// A resolved component's dependency metadata: its configurations and, per
/// configuration, the outgoing [`DependencyMetadata`] in source order.
#[derive(Debug, Clone, Default)]
pub struct ComponentMetadata {
    pub configurations: Vec<ConfigurationMetadata>,
}

#[derive(Debug, Clone)]
pub struct ConfigurationMetadata {
    pub name: String,
    pub dependencies: Vec<DependencyMetadata>,
}

/// Turns the root resolution context into the root component.
pub trait ResolveContextToComponentResolver: Send + Sync {
    fn resolve_root(&self) -> Result<RootComponent, String>;
}

/// The root component plus the constraints declared directly on it, used to
/// seed the direct-dependency forcing resolver (§4.1).
pub struct RootComponent {
    pub version_id: ModuleVersionIdentifier,
    pub component_identifier: ComponentIdentifier,
    pub configurations: Vec<ConfigurationMetadata>,
}

/// Intersects exclude rules along an edge. The default, permissive
/// implementation excludes nothing; a real build tool supplies one backed by
/// its exclude-rule DSL.
pub trait ModuleExclusions: Send + Sync {
    fn excludes(&self, from: &ModuleIdentifier, candidate: &ModuleIdentifier) -> bool;
}

#[derive(Default)]
pub struct NoModuleExclusions;

impl ModuleExclusions for NoModuleExclusions {
    fn excludes(&self, _from: &ModuleIdentifier, _candidate: &ModuleIdentifier) -> bool {
        false
    }
}

/// Reports whether a module participates in a replacement relation; when it
/// does, compatible-selection Case A never applies (§4.4).
pub trait ModuleReplacementsData: Send + Sync {
    fn participates_in_replacements(&self, module: &ModuleIdentifier) -> bool;
}

#[derive(Default)]
pub struct NoModuleReplacements;

impl ModuleReplacementsData for NoModuleReplacements {
    fn participates_in_replacements(&self, _module: &ModuleIdentifier) -> bool {
        false
    }
}

/// Rewrites selectors before resolution (e.g. project substitution). The
/// default implementation is the identity rewrite.
pub trait DependencySubstitutionApplicator: Send + Sync {
    fn apply(&self, dependency: DependencyMetadata) -> DependencyMetadata;
}

#[derive(Default)]
pub struct IdentitySubstitutionApplicator;

impl DependencySubstitutionApplicator for IdentitySubstitutionApplicator {
    fn apply(&self, dependency: DependencyMetadata) -> DependencyMetadata {
        dependency
    }
}

/// A submitted unit of work for the build-operation executor (§4.5, §6):
/// fetch the metadata for one component.
pub struct FetchOperation {
    pub component_identifier: ComponentIdentifier,
}

/// Exposes `runAll` with barrier semantics: the caller blocks until every
/// submitted fetch has completed, in no particular order internally, but the
/// results are returned aligned with the input order so the driver can
/// attach edges deterministically (§4.6).
pub trait BuildOperationExecutor: Send + Sync {
    fn run_all(
        &self,
        resolver: &dyn ComponentMetaDataResolver,
        operations: Vec<FetchOperation>,
    ) -> Vec<Result<ComponentMetadata, EdgeFailure>>;
}

/// Default executor: fans the batch out across a `rayon` scope and blocks
/// the calling (driver) thread until every fetch in the batch completes —
/// the barrier semantics §4.5 and §5 require.
#[derive(Default)]
pub struct RayonBuildOperationExecutor;

impl BuildOperationExecutor for RayonBuildOperationExecutor {
    fn run_all(
        &self,
        resolver: &dyn ComponentMetaDataResolver,
        operations: Vec<FetchOperation>,
    ) -> Vec<Result<ComponentMetadata, EdgeFailure>> {
        let mut results = Vec::with_capacity(operations.len());
        operations
            .into_par_iter()
            .map(|op| resolver.resolve_metadata(&op.component_identifier))
            .collect_into_vec(&mut results);
        results
    }
}

/// Unused directly by the core (variant/attribute matching is consumed by
/// node materialization in a full build tool), kept as a named seam per §6
/// so a consumer's `NodeState` extension point has something to implement
/// against.
pub trait AttributesSchema: Send + Sync {}

pub trait ImmutableAttributesFactory: Send + Sync {}

/// Converts between a consumer's own selector representation and the
/// `ComponentState` this core tracks internally.
pub trait ComponentSelectorConverter: Send + Sync {
    fn convert(&self, component: &ComponentState) -> ModuleVersionIdentifier {
        component.version_id.clone()
    }
}

/// Selector-state helper: reports whether the given selector is still
/// unresolved, used by the driver when deciding whether to re-propose a
/// candidate (kept here rather than on `SelectorState` itself so external
/// crates can implement their own notion of "unresolved" without depending on
/// our internal arena).
pub fn is_unresolved(selector: &SelectorState) -> bool {
    !selector.is_resolved()
}
