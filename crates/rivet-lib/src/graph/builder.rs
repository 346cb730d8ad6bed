//! Graph expansion
//!
//! Depth-first, single-threaded expansion of requirements into a
//! [`DependencyGraph`]. Requirements are visited in declaration order:
//! `requires`, then `test_requires`, then tool requirements, so the host
//! subgraph of a node is always complete before its build-context subgraph.
//!
//! Within one conflict scope the first reference fixed for a package name
//! wins; a later requirement that does not accept it fails the build
//! immediately. The host graph is one scope and every tool requirement opens
//! a fresh one, so tool subtrees resolve independently of their consumers.

use super::{Dependency, DependencyGraph, GraphError, GraphNode, NodeId, NodeOrigin};
use crate::lockfile::LockedResolution;
use crate::observer::{ResolutionEvent, ResolutionObserver};
use crate::package_id::{PackageIdentifier, resolve_options};
use crate::primitives::{Context, PackageReference, RefExpression, ReferenceError};
use crate::profile::Profile;
use crate::recipe::{RecipeDeclaration, RecipeProvider, RequireEdge};
use crate::resolver::{Located, ReferenceResolver};
use crate::storage::SourceSet;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace};

/// Shared flag that aborts a running graph build between edge expansions
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
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

/// What the graph is built for
#[derive(Debug, Clone)]
pub enum RootRequest {
    /// Command-line requirements with no recipe of their own
    Virtual(RecipeDeclaration),
    /// The user's own project
    Consumer {
        reference: PackageReference,
        declaration: RecipeDeclaration,
    },
}

impl RootRequest {
    /// Virtual root requiring each of `texts`
    pub fn requires(texts: &[&str]) -> Result<Self, ReferenceError> {
        Ok(Self::Virtual(RecipeDeclaration::default().with_requires(texts)?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NodeKey {
    reference: String,
    context: Context,
    settings: BTreeMap<String, String>,
    options: BTreeMap<String, String>,
}

/// Reference fixed for a name within a conflict scope
#[derive(Debug, Clone)]
struct Fixed {
    located: Located,
    requirer: String,
}

struct Inputs<'p> {
    host: &'p Profile,
    build: &'p Profile,
    locked: Option<LockedResolution<'p>>,
}

impl Inputs<'_> {
    fn profile(&self, context: Context) -> &Profile {
        match context {
            Context::Host => self.host,
            Context::Build => self.build,
        }
    }
}

pub struct GraphBuilder<'a> {
    resolver: ReferenceResolver<'a>,
    recipes: &'a dyn RecipeProvider,
    observer: &'a dyn ResolutionObserver,
    identifier: PackageIdentifier,
    cancel: CancelFlag,
    declarations: HashMap<String, RecipeDeclaration>,
    index: HashMap<NodeKey, NodeId>,
    scopes: Vec<HashMap<String, Fixed>>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(
        sources: &'a SourceSet,
        recipes: &'a dyn RecipeProvider,
        observer: &'a dyn ResolutionObserver,
    ) -> Self {
        Self {
            resolver: ReferenceResolver::new(sources, observer),
            recipes,
            observer,
            identifier: PackageIdentifier::default(),
            cancel: CancelFlag::new(),
            declarations: HashMap::new(),
            index: HashMap::new(),
            scopes: Vec::new(),
        }
    }

    /// Re-check remotes for newer revisions even when the cache has a match
    pub fn with_update(mut self, update: bool) -> Self {
        self.resolver = self.resolver.with_update(update);
        self
    }

    pub fn with_identifier(mut self, identifier: PackageIdentifier) -> Self {
        self.identifier = identifier;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Expand `root` into a complete graph with package IDs attached
    pub fn build(
        mut self,
        root: RootRequest,
        host: &Profile,
        build: &Profile,
        locked: Option<LockedResolution<'_>>,
    ) -> Result<DependencyGraph, GraphError> {
        let inputs = Inputs {
            host,
            build,
            locked,
        };
        self.check_cancelled()?;

        let (root_node, declaration) = match root {
            RootRequest::Virtual(declaration) => (
                GraphNode::new(None, Context::Host, NodeOrigin::VirtualRoot),
                declaration,
            ),
            RootRequest::Consumer {
                reference,
                declaration,
            } => {
                let mut node =
                    GraphNode::new(Some(reference.clone()), Context::Host, NodeOrigin::Consumer);
                node.package_type = declaration.package_type;
                node.settings = host.settings_for(&declaration.settings);
                node.options = resolve_options(host, &reference, &declaration)?;
                node.package_id_modes = declaration.package_id_modes.clone();
                (node, declaration)
            }
        };

        let mut graph = DependencyGraph::with_root(root_node);
        let root_id = graph.root();
        let mut root_scope = HashMap::new();
        if let Some(reference) = graph[root_id].reference.clone() {
            root_scope.insert(
                reference.name.clone(),
                Fixed {
                    located: Located {
                        reference,
                        origin: NodeOrigin::Consumer,
                    },
                    requirer: "root".to_string(),
                },
            );
        }
        self.scopes.push(root_scope);

        debug!(root = %graph[root_id].display_name(), "Expanding dependency graph");
        let mut ancestors = vec![root_id];
        self.expand(&mut graph, &inputs, root_id, &declaration, 0, &mut ancestors)?;

        self.assign_package_ids(&mut graph, &inputs)?;
        graph.validate_acyclic()?;
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Dependency graph complete"
        );
        Ok(graph)
    }

    fn check_cancelled(&self) -> Result<(), GraphError> {
        if self.cancel.is_cancelled() {
            return Err(GraphError::Cancelled);
        }
        Ok(())
    }

    fn declaration(&mut self, reference: &PackageReference) -> Result<RecipeDeclaration, GraphError> {
        let key = reference.to_string();
        if let Some(declaration) = self.declarations.get(&key) {
            return Ok(declaration.clone());
        }
        let declaration =
            self.recipes
                .declaration(reference)
                .map_err(|source| GraphError::Recipe {
                    reference: key.clone(),
                    source,
                })?;
        self.declarations.insert(key, declaration.clone());
        Ok(declaration)
    }

    /// Requirement edges of a node in visit order
    fn edges_for(
        &self,
        node: &GraphNode,
        declaration: &RecipeDeclaration,
        inputs: &Inputs<'_>,
    ) -> Result<Vec<RequireEdge>, GraphError> {
        let mut edges: Vec<RequireEdge> = declaration
            .requires
            .iter()
            .chain(&declaration.test_requires)
            .chain(&declaration.tool_requires)
            .cloned()
            .collect();

        let injected = inputs
            .profile(node.context)
            .tool_requires_for(node.reference.as_ref())
            .map_err(|source| GraphError::Profile {
                node: node.display_name(),
                source,
            })?;
        for edge in injected {
            if !edges
                .iter()
                .any(|e| e.traits.build && e.name() == edge.name())
            {
                edges.push(edge);
            }
        }
        Ok(edges)
    }

    fn expand(
        &mut self,
        graph: &mut DependencyGraph,
        inputs: &Inputs<'_>,
        node: NodeId,
        declaration: &RecipeDeclaration,
        scope: usize,
        ancestors: &mut Vec<NodeId>,
    ) -> Result<(), GraphError> {
        let edges = self.edges_for(&graph[node], declaration, inputs)?;
        for edge in edges {
            self.expand_edge(graph, inputs, node, edge, scope, ancestors)?;
        }
        inherit_visible(graph, node);
        Ok(())
    }

    fn expand_edge(
        &mut self,
        graph: &mut DependencyGraph,
        inputs: &Inputs<'_>,
        parent: NodeId,
        edge: RequireEdge,
        scope: usize,
        ancestors: &mut Vec<NodeId>,
    ) -> Result<(), GraphError> {
        self.check_cancelled()?;

        let parent_name = graph[parent].display_name();
        let (context, scope) = if edge.traits.build {
            self.scopes.push(HashMap::new());
            (Context::Build, self.scopes.len() - 1)
        } else {
            (graph[parent].context, scope)
        };
        let name = edge.name().to_string();

        if let Some(position) = ancestors
            .iter()
            .position(|a| graph[*a].context == context && graph[*a].name() == Some(name.as_str()))
        {
            let mut path: Vec<String> = ancestors[position..]
                .iter()
                .map(|a| graph[*a].display_name())
                .collect();
            path.push(edge.expression.to_string());
            return Err(GraphError::Cycle { path });
        }

        let profile = inputs.profile(context);
        let forced = profile
            .override_for(&name)
            .map_err(|source| GraphError::Profile {
                node: parent_name.clone(),
                source,
            })?;
        let expression = forced.clone().unwrap_or_else(|| edge.expression.clone());

        let located = self.fix_reference(&expression, context, scope, &parent_name, inputs)?;
        if let Some(forced) = forced {
            if !edge.expression.accepts(&located.reference) {
                self.observer.on_event(&ResolutionEvent::OverrideApplied {
                    name: name.clone(),
                    context,
                    requested: edge.expression.to_string(),
                    forced: forced.to_string(),
                });
                graph.add_warning(format!(
                    "{} requires {}, overridden to {}",
                    parent_name, edge.expression, located.reference
                ));
            }
        }

        let reference = located.reference.clone();
        let declaration = self.declaration(&reference)?;
        let settings = profile.settings_for(&declaration.settings);
        let options = resolve_options(profile, &reference, &declaration)?;
        let key = NodeKey {
            reference: reference.to_string(),
            context,
            settings: settings.clone(),
            options: options.clone(),
        };

        let edge = RequireEdge::new(expression, edge.traits);
        if let Some(&existing) = self.index.get(&key) {
            self.observer.on_event(&ResolutionEvent::DiamondCollapsed {
                reference: reference.to_string(),
                context,
                requested_by: parent_name,
            });
            attach(graph, parent, edge, existing);
            return Ok(());
        }

        let mut node = GraphNode::new(Some(reference.clone()), context, located.origin.clone());
        node.package_type = declaration.package_type;
        node.settings = settings;
        node.options = options;
        node.package_id_modes = declaration.package_id_modes.clone();
        let id = graph.add_node(node);
        self.index.insert(key, id);
        self.observer.on_event(&ResolutionEvent::NodeResolved {
            reference: reference.to_string(),
            context,
            origin: origin_label(&located.origin),
        });
        attach(graph, parent, edge, id);

        ancestors.push(id);
        self.expand(graph, inputs, id, &declaration, scope, ancestors)?;
        ancestors.pop();
        Ok(())
    }

    /// Reference for `expression` in `scope`: the one already fixed there,
    /// or a fresh resolution that becomes fixed.
    fn fix_reference(
        &mut self,
        expression: &RefExpression,
        context: Context,
        scope: usize,
        requirer: &str,
        inputs: &Inputs<'_>,
    ) -> Result<Located, GraphError> {
        let name = expression.name();
        let Some(fixed) = self.scopes[scope].get(name).cloned() else {
            let located = self
                .resolver
                .resolve_located(expression, context, inputs.locked.as_ref())?;
            self.scopes[scope].insert(
                name.to_string(),
                Fixed {
                    located: located.clone(),
                    requirer: requirer.to_string(),
                },
            );
            return Ok(located);
        };

        let accepted = match expression {
            RefExpression::Alias { .. } => {
                let target = self
                    .resolver
                    .resolve(expression, context, inputs.locked.as_ref())?;
                target == fixed.located.reference
            }
            _ => expression.accepts(&fixed.located.reference),
        };
        if accepted {
            trace!(%name, reference = %fixed.located.reference, "Requirement satisfied by fixed reference");
            return Ok(fixed.located);
        }

        self.observer.on_event(&ResolutionEvent::ConflictDetected {
            name: name.to_string(),
            context,
            fixed: fixed.located.reference.to_string(),
            requested: expression.to_string(),
            requested_by: requirer.to_string(),
        });
        Err(GraphError::VersionConflict {
            name: name.to_string(),
            context,
            fixed: fixed.located.reference.to_string(),
            fixed_by: fixed.requirer,
            requested: expression.to_string(),
            requested_by: requirer.to_string(),
        })
    }

    /// Package IDs bottom-up, checked against locked IDs when present
    fn assign_package_ids(
        &self,
        graph: &mut DependencyGraph,
        inputs: &Inputs<'_>,
    ) -> Result<(), GraphError> {
        for id in graph.dependency_first_order() {
            let Some(reference) = graph[id].reference.clone() else {
                continue;
            };
            self.check_cancelled()?;
            let package_id = self.identifier.compute(graph, id)?;
            let context = graph[id].context;
            self.observer.on_event(&ResolutionEvent::PackageIdComputed {
                reference: reference.to_string(),
                context,
                package_id: package_id.to_string(),
            });

            let locked_id = inputs
                .locked
                .and_then(|l| l.lockfile.package_id_for(&reference, context).cloned());
            if let Some(locked_id) = locked_id {
                if locked_id != package_id {
                    self.observer.on_event(&ResolutionEvent::LockedPackageIdMismatch {
                        reference: reference.to_string(),
                        context,
                        locked: locked_id.to_string(),
                        computed: package_id.to_string(),
                    });
                    graph.add_warning(format!(
                        "{} ({}) has package ID {}, lockfile records {}",
                        reference, context, package_id, locked_id
                    ));
                }
            }
            graph.node_mut(id).package_id = Some(package_id);
        }
        Ok(())
    }
}

fn origin_label(origin: &NodeOrigin) -> String {
    match origin {
        NodeOrigin::Cache => "cache".to_string(),
        NodeOrigin::Remote(name) => format!("remote:{}", name),
        NodeOrigin::VirtualRoot => "virtual".to_string(),
        NodeOrigin::Consumer => "consumer".to_string(),
    }
}

fn attach(graph: &mut DependencyGraph, parent: NodeId, edge: RequireEdge, target: NodeId) {
    let dependency = Dependency { edge, target };
    let node = graph.node_mut(parent);
    if !node.dependencies.contains(&dependency) {
        node.dependencies.push(dependency);
    }
}

/// Give `node` the visible host dependencies of its direct host dependencies.
/// Build and test edges never propagate.
fn inherit_visible(graph: &mut DependencyGraph, node: NodeId) {
    let mut inherited: Vec<Dependency> = Vec::new();
    for direct in &graph[node].dependencies {
        if direct.edge.traits.build || direct.edge.traits.test {
            continue;
        }
        for transitive in &graph[direct.target].dependencies {
            let traits = transitive.edge.traits;
            if !traits.visible || traits.build || traits.test {
                continue;
            }
            let target = &graph[transitive.target];
            let known = graph[node]
                .dependencies
                .iter()
                .chain(inherited.iter())
                .any(|d| {
                    let existing = &graph[d.target];
                    d.target == transitive.target
                        || (existing.context == target.context && existing.name() == target.name())
                });
            if known {
                continue;
            }
            let mut traits = traits.inherited();
            traits.visible = direct.edge.traits.visible;
            inherited.push(Dependency {
                edge: RequireEdge::new(transitive.edge.expression.clone(), traits),
                target: transitive.target,
            });
        }
    }
    graph.node_mut(node).dependencies.extend(inherited);
}

#[cfg(test)]
mod tests {
    include!("builder.test.rs");
}
