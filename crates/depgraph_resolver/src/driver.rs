//! The traversal driver (§4.1, §4.2): the main loop that selects, fetches and
//! attaches edges until the queue and the conflict handler both drain.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, instrument, trace, warn};

use crate::assembly::{assemble, DependencyGraphVisitor};
use crate::component::VisitState;
use crate::conflict::{ConflictHandler, DefaultConflictHandler, DirectDependencyForcingResolver};
use crate::edge::DependencyMetadata;
use crate::external::{
    BuildOperationExecutor, ComponentMetaDataResolver, ComponentMetadata,
    DependencySubstitutionApplicator, FetchOperation, IdentitySubstitutionApplicator,
    ModuleExclusions, ModuleReplacementsData, NoModuleExclusions, NoModuleReplacements,
    RayonBuildOperationExecutor, ResolveContextToComponentResolver,
};
use crate::identifier::{ComponentIdentifier, IdentifierCache, ModuleIdentifier};
use crate::ids::{EdgeId, ModuleId, NodeId};
use crate::resolve_state::ResolveState;
use crate::error::{ResolveError, ResolveResult};

/// Threshold from §4.5: fetch in parallel only when at least this many
/// eligible edges are found in one node's batch; below it, fetch serially
/// during attachment.
const DEFAULT_PARALLEL_FETCH_THRESHOLD: usize = 2;

/// A cooperative cancellation flag an embedding build tool can trip from
/// another thread to stop a resolve in progress (§5). The driver checks it
/// between traversal-loop iterations and at the start of each of the three
/// edge-resolution phases; it does not interrupt an in-flight metadata fetch,
/// which is the executor's responsibility to cancel.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Typed, defaulted configuration for a [`Resolver`].
pub struct ResolverConfig {
    pub parallel_fetch_threshold: usize,
    pub cancellation: Option<CancellationToken>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            parallel_fetch_threshold: DEFAULT_PARALLEL_FETCH_THRESHOLD,
            cancellation: None,
        }
    }
}

pub struct ResolverConfigBuilder {
    config: ResolverConfig,
}

impl ResolverConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ResolverConfig::default(),
        }
    }

    pub fn parallel_fetch_threshold(mut self, threshold: usize) -> Self {
        self.config.parallel_fetch_threshold = threshold;
        self
    }

    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.config.cancellation = Some(token);
        self
    }

    pub fn build(self) -> ResolverConfig {
        self.config
    }
}

impl Default for ResolverConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the driver needs from the embedding build tool (§6).
pub struct ResolverCollaborators {
    pub id_resolver: Box<dyn crate::external::DependencyToComponentIdResolver>,
    pub metadata_resolver: Box<dyn ComponentMetaDataResolver>,
    pub root_resolver: Box<dyn ResolveContextToComponentResolver>,
    pub conflict_handler: Box<dyn ConflictHandler>,
    pub exclusions: Box<dyn ModuleExclusions>,
    pub replacements: Box<dyn ModuleReplacementsData>,
    pub substitution: Box<dyn DependencySubstitutionApplicator>,
    pub executor: Box<dyn BuildOperationExecutor>,
}

impl ResolverCollaborators {
    pub fn new(
        id_resolver: impl crate::external::DependencyToComponentIdResolver + 'static,
        metadata_resolver: impl ComponentMetaDataResolver + 'static,
        root_resolver: impl ResolveContextToComponentResolver + 'static,
    ) -> Self {
        Self {
            id_resolver: Box::new(id_resolver),
            metadata_resolver: Box::new(metadata_resolver),
            root_resolver: Box::new(root_resolver),
            conflict_handler: Box::new(DefaultConflictHandler::new()),
            exclusions: Box::new(NoModuleExclusions),
            replacements: Box::new(NoModuleReplacements),
            substitution: Box::new(IdentitySubstitutionApplicator),
            executor: Box::new(RayonBuildOperationExecutor),
        }
    }
}

/// Drives one dependency graph resolution (§4.1).
pub struct Resolver {
    config: ResolverConfig,
    id_cache: Arc<IdentifierCache>,
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            id_cache: Arc::new(IdentifierCache::new()),
        }
    }

    fn check_cancelled(&self) -> ResolveResult<()> {
        if self
            .config
            .cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            return Err(ResolveError::Cancelled);
        }
        Ok(())
    }

    /// Resolves `collaborators.root_resolver`'s root component and emits the
    /// resulting graph to `visitor` in consumer-first order.
    ///
    /// If resolving the root fails, this returns an error and `visitor` is
    /// never called (§4.1 failure mode, §7 kind 1).
    #[instrument(skip_all)]
    pub fn resolve(
        &self,
        mut collaborators: ResolverCollaborators,
        visitor: &mut dyn DependencyGraphVisitor,
    ) -> ResolveResult<()> {
        let root = collaborators
            .root_resolver
            .resolve_root()
            .map_err(ResolveError::UnresolvableRoot)?;

        let mut rs = ResolveState::new(self.id_cache.clone());
        let root_module = rs.get_or_create_module(root.version_id.module.clone());
        let root_component = rs.get_or_create_component(root_module, root.version_id.clone());
        rs.components[root_component.index()].component_identifier =
            Some(root.component_identifier.clone());
        rs.root_component = Some(root_component);

        let mut metadata_cache: HashMap<ComponentIdentifier, ComponentMetadata> = HashMap::new();
        metadata_cache.insert(
            root.component_identifier.clone(),
            ComponentMetadata {
                configurations: root.configurations,
            },
        );

        rs.select_component(root_module, root_component, false);

        // §4.1 step 3: direct dependencies of the root dominate transitive
        // ones on conflict.
        let mut direct_forcing = DirectDependencyForcingResolver::new();
        for config in &metadata_cache[&root.component_identifier].configurations {
            for dep in &config.dependencies {
                let module = rs.get_or_create_module(dep.requested.clone());
                if let Ok((version, _)) = collaborators
                    .id_resolver
                    .resolve(&dep.requested, &dep.constraint)
                {
                    direct_forcing.mark_direct(module, version);
                }
            }
        }
        collaborators
            .conflict_handler
            .register_resolver(Box::new(direct_forcing));

        for node in rs.components[root_component.index()].nodes.clone() {
            rs.enqueue(node);
        }
        if rs.components[root_component.index()].nodes.is_empty() {
            let node = rs.create_node(root_component, "default");
            rs.nodes[node.index()].selected = true;
        }

        self.run_traversal_loop(&mut rs, &mut collaborators, &mut metadata_cache)?;

        rs.set_component_visit_state(root_component, VisitState::NotSeen);
        assemble(&rs, root_component, visitor);

        Ok(())
    }

    fn run_traversal_loop(
        &self,
        rs: &mut ResolveState,
        collaborators: &mut ResolverCollaborators,
        metadata_cache: &mut HashMap<ComponentIdentifier, ComponentMetadata>,
    ) -> ResolveResult<()> {
        loop {
            self.check_cancelled()?;
            if let Some(node) = rs.dequeue() {
                let edges = self.compute_outgoing_edges(rs, node, collaborators, metadata_cache);
                self.resolve_edges(rs, collaborators, metadata_cache, node, edges)?;
            } else if collaborators.conflict_handler.has_conflicts() {
                let mut winner: Option<(ModuleId, String)> = None;
                collaborators
                    .conflict_handler
                    .resolve_next_conflict(&mut |module, version| {
                        winner = Some((module, version.to_string()));
                    });
                if let Some((module, version)) = winner {
                    debug!(?module, %version, "applying conflict resolution");
                    rs.apply_conflict_resolution(module, &version);
                } else {
                    return Err(ResolveError::ConflictHandlerFailure(
                        rs.modules.first().map(|m| m.identifier.clone()).unwrap_or_else(|| {
                            ModuleIdentifier::new("unknown", "unknown")
                        }),
                    ));
                }
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Computes a node's outgoing edges from its component's metadata,
    /// applying substitution and exclusions and deferring constraint-only
    /// dependencies to the pending-dependencies handler (§4.9).
    fn compute_outgoing_edges(
        &self,
        rs: &mut ResolveState,
        node: NodeId,
        collaborators: &ResolverCollaborators,
        metadata_cache: &mut HashMap<ComponentIdentifier, ComponentMetadata>,
    ) -> Vec<EdgeId> {
        let component = rs.nodes[node.index()].component;
        let configuration_name = rs.nodes[node.index()].configuration.clone();
        let owning_module = rs.components[component.index()].module;
        let owning_module_identifier = rs.modules[owning_module.index()].identifier.clone();

        let Some(component_identifier) = rs.components[component.index()]
            .component_identifier
            .clone()
        else {
            return Vec::new();
        };

        if !metadata_cache.contains_key(&component_identifier) {
            match collaborators
                .metadata_resolver
                .resolve_metadata(&component_identifier)
            {
                Ok(metadata) => {
                    metadata_cache.insert(component_identifier.clone(), metadata);
                }
                Err(err) => {
                    warn!(%component_identifier, error = %err, "failed to fetch metadata");
                    return Vec::new();
                }
            }
        }

        let metadata = &metadata_cache[&component_identifier];
        let dependencies: Vec<DependencyMetadata> = metadata
            .configurations
            .iter()
            .find(|c| c.name == configuration_name)
            .or_else(|| metadata.configurations.first())
            .map(|c| c.dependencies.clone())
            .unwrap_or_default();

        let mut edges = Vec::with_capacity(dependencies.len());
        for dependency in dependencies {
            let dependency = collaborators.substitution.apply(dependency);
            if collaborators
                .exclusions
                .excludes(&owning_module_identifier, &dependency.requested)
            {
                continue;
            }

            let target_module = rs.get_or_create_module(dependency.requested.clone());
            let selector = rs.create_selector(target_module, dependency.constraint.clone());
            let constraint_only = dependency.constraint_only;
            let edge = rs.create_edge(node, dependency, selector);

            if constraint_only {
                rs.pending.defer(dependency_module(rs, target_module), edge);
                continue;
            }

            edges.push(edge);

            let activated = rs.pending.activate(&dependency_module(rs, target_module));
            edges.extend(activated);
        }
        edges
    }

    /// §4.2's three-phase barrier: serial select, parallel fetch, serial
    /// attach.
    fn resolve_edges(
        &self,
        rs: &mut ResolveState,
        collaborators: &mut ResolverCollaborators,
        metadata_cache: &mut HashMap<ComponentIdentifier, ComponentMetadata>,
        _node: NodeId,
        edges: Vec<EdgeId>,
    ) -> ResolveResult<()> {
        // Phase 1: serial select.
        self.check_cancelled()?;
        for &edge in &edges {
            let dependency = rs.edges[edge.index()].dependency.clone();
            let selector_id = rs.edges[edge.index()].selector;
            let module = rs.selectors[selector_id.index()].module;

            match collaborators
                .id_resolver
                .resolve(&dependency.requested, &dependency.constraint)
            {
                Ok((version, component_identifier)) => {
                    let version_id = crate::identifier::ModuleVersionIdentifier::new(
                        dependency.requested.clone(),
                        version,
                    );
                    let component_identifier = rs
                        .id_cache
                        .get_or_insert_with(&version_id, || component_identifier);
                    let component = rs.get_or_create_component(module, version_id);
                    rs.components[component.index()].component_identifier =
                        Some(component_identifier);
                    rs.selectors[selector_id.index()].resolved_to = Some(component);
                    rs.components[component.index()]
                        .all_resolvers
                        .push(selector_id);

                    rs.perform_selection(&mut *collaborators.conflict_handler, module, component);
                }
                Err(failure) => {
                    warn!(module = %dependency.requested, error = %failure, "unresolvable selector");
                    rs.selectors[selector_id.index()].failure = Some(failure);
                }
            }
        }

        // Phase 2: parallel fetch for components that qualify (§4.5).
        self.check_cancelled()?;
        let mut eligible: Vec<EdgeId> = Vec::new();
        for &edge in &edges {
            if self.is_fetch_eligible(rs, collaborators, metadata_cache, edge) {
                eligible.push(edge);
            }
        }

        if eligible.len() >= self.config.parallel_fetch_threshold {
            trace!(count = eligible.len(), "dispatching parallel metadata fetch batch");
            let mut operations: Vec<FetchOperation> = Vec::with_capacity(eligible.len());
            for &edge in &eligible {
                let target = rs.selectors[rs.edges[edge.index()].selector.index()]
                    .resolved_to
                    .expect("fetch-eligible edge has a resolved target");
                operations.push(FetchOperation {
                    component_identifier: rs.components[target.index()]
                        .component_identifier
                        .clone()
                        .expect("resolved component has an identifier"),
                });
            }
            let results = collaborators
                .executor
                .run_all(collaborators.metadata_resolver.as_ref(), operations);
            for (edge, result) in eligible.iter().zip(results) {
                let target = rs.selectors[rs.edges[edge.index()].selector.index()]
                    .resolved_to
                    .unwrap();
                let component_identifier = rs.components[target.index()]
                    .component_identifier
                    .clone()
                    .unwrap();
                match result {
                    Ok(metadata) => {
                        metadata_cache.insert(component_identifier, metadata);
                    }
                    Err(failure) => {
                        warn!(%component_identifier, error = %failure, "parallel metadata fetch failed");
                        rs.edges[edge.index()].failure = Some(failure);
                    }
                }
            }
        }

        // Phase 3: serial attach, in the edge order computed above.
        self.check_cancelled()?;
        for edge in edges {
            if rs.edges[edge.index()].failure.is_some() {
                continue;
            }
            let selector_id = rs.edges[edge.index()].selector;
            let selector = &rs.selectors[selector_id.index()];
            if let Some(failure) = &selector.failure {
                rs.edges[edge.index()].failure = Some(failure.clone());
                continue;
            }
            let Some(target) = selector.resolved_to else {
                continue;
            };
            if !rs.components[target.index()].selectable {
                continue;
            }
            rs.attach_edge_to_component(edge, target);
        }
        Ok(())
    }

    fn is_fetch_eligible(
        &self,
        rs: &ResolveState,
        collaborators: &ResolverCollaborators,
        metadata_cache: &HashMap<ComponentIdentifier, ComponentMetadata>,
        edge: EdgeId,
    ) -> bool {
        if rs.edges[edge.index()].dependency.fast_resolve {
            return false;
        }
        let selector = rs.edges[edge.index()].selector;
        let Some(target) = rs.selectors[selector.index()].resolved_to else {
            return false;
        };
        if !rs.components[target.index()].is_selected {
            return false;
        }
        let Some(identifier) = &rs.components[target.index()].component_identifier else {
            return false;
        };
        if metadata_cache.contains_key(identifier) {
            return false;
        }
        !collaborators
            .metadata_resolver
            .is_fetching_metadata_cheap(identifier)
    }
}

fn dependency_module(rs: &ResolveState, module: ModuleId) -> ModuleIdentifier {
    rs.modules[module.index()].identifier.clone()
}
