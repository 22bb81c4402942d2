//! In-memory fakes for exercising [`crate::Resolver`] without a real build
//! tool (§10.4/§10.5): a tiny repository keyed by `(group, name,
//! version)`, a root resolver over it, and a visitor that records the
//! callback order so tests can assert on it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::edge::{DependencyMetadata, EdgeFailure};
use crate::external::{
    ComponentMetaDataResolver, ComponentMetadata, ConfigurationMetadata,
    DependencyToComponentIdResolver, ResolveContextToComponentResolver, RootComponent,
};
use crate::identifier::{ComponentIdentifier, ModuleIdentifier};
use crate::ids::{ComponentId, NodeId, SelectorId};
use crate::resolve_state::ResolveState;
use crate::version::{max_version, VersionConstraint};
use crate::DependencyGraphVisitor;

/// A declared dependency on some other fake module, as registered with
/// [`FakeRepository::add`] or [`FakeRoot::new`].
#[derive(Debug, Clone)]
pub struct FakeDependency {
    pub group: String,
    pub name: String,
    pub constraint: VersionConstraint,
    pub constraint_only: bool,
}

impl FakeDependency {
    pub fn required(group: &str, name: &str, constraint: VersionConstraint) -> Self {
        Self {
            group: group.to_string(),
            name: name.to_string(),
            constraint,
            constraint_only: false,
        }
    }

    pub fn constraint_only(group: &str, name: &str, constraint: VersionConstraint) -> Self {
        Self {
            group: group.to_string(),
            name: name.to_string(),
            constraint,
            constraint_only: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct FakeComponent {
    dependencies: Vec<FakeDependency>,
}

fn component_identifier(group: &str, name: &str, version: &str) -> ComponentIdentifier {
    ComponentIdentifier::new(format!("{group}:{name}:{version}"))
}

fn split_identifier(id: &ComponentIdentifier) -> (String, String, String) {
    let mut parts = id.as_str().splitn(3, ':');
    (
        parts.next().unwrap_or_default().to_string(),
        parts.next().unwrap_or_default().to_string(),
        parts.next().unwrap_or_default().to_string(),
    )
}

fn to_metadata(dependencies: &[FakeDependency]) -> ComponentMetadata {
    ComponentMetadata {
        configurations: vec![ConfigurationMetadata {
            name: "default".to_string(),
            dependencies: dependencies
                .iter()
                .map(|d| DependencyMetadata {
                    requested: ModuleIdentifier::new(d.group.clone(), d.name.clone()),
                    constraint: d.constraint.clone(),
                    constraint_only: d.constraint_only,
                    fast_resolve: false,
                })
                .collect(),
        }],
    }
}

/// An in-memory repository of `(group, name, version) -> dependencies`,
/// doubling as both the [`DependencyToComponentIdResolver`] (picks the
/// highest registered version matching a constraint) and the
/// [`ComponentMetaDataResolver`] a real build tool would keep separate.
#[derive(Default)]
pub struct FakeRepository {
    versions: Mutex<HashMap<(String, String), Vec<String>>>,
    components: Mutex<HashMap<(String, String, String), FakeComponent>>,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one `(group, name, version)` with its declared dependencies.
    pub fn add(&self, group: &str, name: &str, version: &str, dependencies: Vec<FakeDependency>) {
        self.versions
            .lock()
            .unwrap()
            .entry((group.to_string(), name.to_string()))
            .or_default()
            .push(version.to_string());
        self.components.lock().unwrap().insert(
            (group.to_string(), name.to_string(), version.to_string()),
            FakeComponent { dependencies },
        );
    }
}

impl DependencyToComponentIdResolver for FakeRepository {
    fn resolve(
        &self,
        requested: &ModuleIdentifier,
        constraint: &VersionConstraint,
    ) -> Result<(String, ComponentIdentifier), EdgeFailure> {
        let key = (requested.group.to_string(), requested.name.to_string());
        let candidates = self.versions.lock().unwrap().get(&key).cloned().unwrap_or_default();
        let matching: Vec<&String> = candidates.iter().filter(|v| constraint.matches(v)).collect();

        let Some((&first, rest)) = matching.split_first() else {
            return Err(EdgeFailure::UnresolvableSelector(requested.clone()));
        };
        let mut chosen = first.clone();
        for v in rest {
            chosen = max_version(&chosen, v).to_string();
        }
        let identifier = component_identifier(&requested.group, &requested.name, &chosen);
        Ok((chosen, identifier))
    }
}

impl ComponentMetaDataResolver for FakeRepository {
    fn is_fetching_metadata_cheap(&self, _id: &ComponentIdentifier) -> bool {
        false
    }

    fn resolve_metadata(&self, id: &ComponentIdentifier) -> Result<ComponentMetadata, EdgeFailure> {
        let (group, name, version) = split_identifier(id);
        let components = self.components.lock().unwrap();
        let component = components
            .get(&(group.clone(), name.clone(), version))
            .ok_or_else(|| {
                EdgeFailure::MetadataFetch(
                    ModuleIdentifier::new(group, name),
                    "unknown component".to_string(),
                )
            })?;
        Ok(to_metadata(&component.dependencies))
    }
}

/// Lets a single `Arc<FakeRepository>` be handed to
/// [`crate::ResolverCollaborators::new`] in both the id-resolver and
/// metadata-resolver slots, so tests populate one repository and see it from
/// both collaborators rather than keeping two in sync.
impl DependencyToComponentIdResolver for Arc<FakeRepository> {
    fn resolve(
        &self,
        requested: &ModuleIdentifier,
        constraint: &VersionConstraint,
    ) -> Result<(String, ComponentIdentifier), EdgeFailure> {
        (**self).resolve(requested, constraint)
    }
}

impl ComponentMetaDataResolver for Arc<FakeRepository> {
    fn is_fetching_metadata_cheap(&self, id: &ComponentIdentifier) -> bool {
        (**self).is_fetching_metadata_cheap(id)
    }

    fn resolve_metadata(&self, id: &ComponentIdentifier) -> Result<ComponentMetadata, EdgeFailure> {
        (**self).resolve_metadata(id)
    }
}

/// The root of a toy graph: a fixed `(group, name, version)` with its own
/// declared dependencies, used directly as a [`ResolveContextToComponentResolver`].
pub struct FakeRoot {
    pub group: String,
    pub name: String,
    pub version: String,
    pub dependencies: Vec<FakeDependency>,
}

impl FakeRoot {
    pub fn new(group: &str, name: &str, version: &str, dependencies: Vec<FakeDependency>) -> Self {
        Self {
            group: group.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            dependencies,
        }
    }
}

impl ResolveContextToComponentResolver for FakeRoot {
    fn resolve_root(&self) -> Result<RootComponent, String> {
        let module = ModuleIdentifier::new(self.group.clone(), self.name.clone());
        Ok(RootComponent {
            version_id: crate::identifier::ModuleVersionIdentifier::new(module, self.version.clone()),
            component_identifier: component_identifier(&self.group, &self.name, &self.version),
            configurations: to_metadata(&self.dependencies).configurations,
        })
    }
}

/// Records the order in which the assembly stage (§4.8) drives its callbacks,
/// for tests to assert consumer-first ordering and cycle tolerance against.
///
/// `ResolveState` does not outlive one `Resolver::resolve` call, so alongside
/// the raw ids this also snapshots each visited node's `(group, name,
/// version)` identity — the form a caller-side integration test actually
/// wants to assert against once `resolve` has returned.
#[derive(Default)]
pub struct RecordingVisitor {
    pub started: bool,
    pub finished: bool,
    pub selectors_visited: Vec<SelectorId>,
    pub nodes_visited: Vec<NodeId>,
    pub edges_visited: Vec<NodeId>,
    pub edges_visited_identity: Vec<(String, String, String)>,
}

impl DependencyGraphVisitor for RecordingVisitor {
    fn start(&mut self, _root: ComponentId, _rs: &ResolveState) {
        self.started = true;
    }

    fn visit_selector(&mut self, selector: SelectorId, _rs: &ResolveState) {
        self.selectors_visited.push(selector);
    }

    fn visit_node(&mut self, node: NodeId, _rs: &ResolveState) {
        self.nodes_visited.push(node);
    }

    fn visit_edges(&mut self, node: NodeId, rs: &ResolveState) {
        self.edges_visited.push(node);
        self.edges_visited_identity.push(node_identity(rs, node));
    }

    fn finish(&mut self, _root: ComponentId, _rs: &ResolveState) {
        self.finished = true;
    }
}

/// Looks up the `(group, name, version)` a node's component resolved to, for
/// test assertions that want to talk about modules rather than arena ids.
pub fn node_identity(rs: &ResolveState, node: NodeId) -> (String, String, String) {
    let component = rs.nodes[node.index()].component;
    let module = rs.components[component.index()].module;
    let identifier = &rs.modules[module.index()].identifier;
    (
        identifier.group.to_string(),
        identifier.name.to_string(),
        rs.components[component.index()].version().to_string(),
    )
}
