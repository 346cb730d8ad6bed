//! Dependency graph: an arena of resolved nodes with ordered dependency edges
//!
//! The graph owns every node; edges refer to nodes by [`NodeId`]. Once the
//! builder finishes, the graph exposes dependency-first orderings for
//! package ID computation and build-order levels for the build executor.

pub mod builder;

pub use builder::{CancelFlag, GraphBuilder, RootRequest};

use crate::binary::BinaryStatus;
use crate::package_id::{PackageId, PackageIdentityError};
use crate::primitives::{Context, PackageReference};
use crate::recipe::{PackageIdMode, PackageType, RecipeError, RequireEdge};
use crate::resolver::ResolveError;
use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Index;
use thiserror::Error;

/// Errors that abort a graph build
#[derive(Debug, Error)]
pub enum GraphError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(
        "Version conflict for '{name}' in {context} context: {requested_by} requires {requested}, \
         but {fixed_by} already fixed {fixed}"
    )]
    VersionConflict {
        name: String,
        context: Context,
        fixed: String,
        fixed_by: String,
        requested: String,
        requested_by: String,
    },

    #[error("Dependency loop detected: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error(transparent)]
    PackageIdentity(#[from] PackageIdentityError),

    #[error("Failed to evaluate recipe {reference}: {source}")]
    Recipe {
        reference: String,
        source: RecipeError,
    },

    #[error("Invalid profile for {node}: {source}")]
    Profile {
        node: String,
        source: crate::profile::ProfileError,
    },

    #[error("Graph resolution cancelled")]
    Cancelled,
}

/// Index of a node inside its [`DependencyGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a node's recipe came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOrigin {
    Cache,
    Remote(String),
    /// Synthetic root holding command-line requirements
    VirtualRoot,
    /// The user's own project recipe
    Consumer,
}

impl NodeOrigin {
    pub fn is_root(&self) -> bool {
        matches!(self, Self::VirtualRoot | Self::Consumer)
    }
}

/// One outgoing edge of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub edge: RequireEdge,
    pub target: NodeId,
}

/// A resolved package in a given context and configuration
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: NodeId,
    /// `None` only for a virtual root
    pub reference: Option<PackageReference>,
    pub context: Context,
    pub package_type: PackageType,
    pub settings: BTreeMap<String, String>,
    pub options: BTreeMap<String, String>,
    pub dependencies: Vec<Dependency>,
    pub package_id: Option<PackageId>,
    pub binary_status: Option<BinaryStatus>,
    /// Remote a `Download` binary comes from
    pub binary_remote: Option<String>,
    pub origin: NodeOrigin,
    pub package_id_modes: BTreeMap<String, PackageIdMode>,
}

impl GraphNode {
    pub(crate) fn new(
        reference: Option<PackageReference>,
        context: Context,
        origin: NodeOrigin,
    ) -> Self {
        Self {
            id: NodeId(0),
            reference,
            context,
            package_type: PackageType::default(),
            settings: BTreeMap::new(),
            options: BTreeMap::new(),
            dependencies: Vec::new(),
            package_id: None,
            binary_status: None,
            binary_remote: None,
            origin,
            package_id_modes: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.reference.as_ref().map(|r| r.name.as_str())
    }

    /// Reference text, or a placeholder for the virtual root
    pub fn display_name(&self) -> String {
        match &self.reference {
            Some(reference) => reference.to_string(),
            None => "<virtual root>".to_string(),
        }
    }

    /// Dependency on `name`, if the node has one
    pub fn dependency_named(&self, name: &str) -> Option<&Dependency> {
        self.dependencies.iter().find(|d| d.edge.name() == name)
    }
}

/// Arena-backed dependency graph
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    root: NodeId,
    nodes: Vec<GraphNode>,
    warnings: Vec<String>,
}

impl DependencyGraph {
    pub(crate) fn with_root(root: GraphNode) -> Self {
        let mut graph = Self {
            root: NodeId(0),
            nodes: Vec::new(),
            warnings: Vec::new(),
        };
        graph.root = graph.add_node(root);
        graph
    }

    pub(crate) fn add_node(&mut self, mut node: GraphNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.id = id;
        self.nodes.push(node);
        id
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut GraphNode {
        &mut self.nodes[id.0]
    }

    pub(crate) fn add_warning(&mut self, warning: String) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(id.0)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.dependencies.len()).sum()
    }

    /// Warnings recorded during resolution (overrides, lockfile mismatches)
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Nodes for package `name` in `context`
    pub fn find(&self, name: &str, context: Context) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.context == context && n.name() == Some(name))
            .map(|n| n.id)
            .collect()
    }

    /// Nodes with an edge to `id`
    pub fn dependents_of(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.dependencies.iter().any(|d| d.target == id))
            .map(|n| n.id)
            .collect()
    }

    /// Every node reachable from the root, dependencies before dependents
    pub fn dependency_first_order(&self) -> Vec<NodeId> {
        let mut visited = vec![false; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root, 0usize)];
        visited[self.root.0] = true;

        while let Some((id, next)) = stack.pop() {
            let dependencies = &self.nodes[id.0].dependencies;
            if next < dependencies.len() {
                stack.push((id, next + 1));
                let target = dependencies[next].target;
                if !visited[target.0] {
                    visited[target.0] = true;
                    stack.push((target, 0));
                }
            } else {
                order.push(id);
            }
        }
        order
    }

    fn petgraph_view<F>(&self, keep: F) -> (DiGraph<NodeId, ()>, HashMap<NodeId, NodeIndex>)
    where
        F: Fn(&GraphNode, &Dependency) -> bool,
    {
        let mut view = DiGraph::new();
        let mut index = HashMap::new();
        for node in &self.nodes {
            index.insert(node.id, view.add_node(node.id));
        }
        for node in &self.nodes {
            for dependency in node.dependencies.iter().filter(|d| keep(node, d)) {
                // Edge direction: dependency -> dependent, so toposort yields
                // dependencies first
                view.add_edge(index[&dependency.target], index[&node.id], ());
            }
        }
        (view, index)
    }

    /// Check that same-context, non-build edges form no cycle
    pub fn validate_acyclic(&self) -> Result<(), GraphError> {
        let same_context = |node: &GraphNode, dep: &Dependency| {
            !dep.edge.traits.build && self.nodes[dep.target.0].context == node.context
        };
        let (view, _) = self.petgraph_view(&same_context);
        if !is_cyclic_directed(&view) {
            return Ok(());
        }
        Err(GraphError::Cycle {
            path: self.find_cycle(&same_context).unwrap_or_default(),
        })
    }

    fn find_cycle<F>(&self, keep: &F) -> Option<Vec<String>>
    where
        F: Fn(&GraphNode, &Dependency) -> bool,
    {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = Vec::new();
        for node in &self.nodes {
            if !visited[node.id.0] {
                if let Some(cycle) = self.dfs_cycle(node.id, keep, &mut visited, &mut stack) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    fn dfs_cycle<F>(
        &self,
        id: NodeId,
        keep: &F,
        visited: &mut Vec<bool>,
        stack: &mut Vec<NodeId>,
    ) -> Option<Vec<String>>
    where
        F: Fn(&GraphNode, &Dependency) -> bool,
    {
        visited[id.0] = true;
        stack.push(id);
        let node = &self.nodes[id.0];
        for dependency in node.dependencies.iter().filter(|d| keep(node, d)) {
            if let Some(start) = stack.iter().position(|&n| n == dependency.target) {
                let mut path: Vec<String> = stack[start..]
                    .iter()
                    .map(|n| self.nodes[n.0].display_name())
                    .collect();
                path.push(self.nodes[dependency.target.0].display_name());
                return Some(path);
            }
            if !visited[dependency.target.0] {
                if let Some(cycle) = self.dfs_cycle(dependency.target, keep, visited, stack) {
                    return Some(cycle);
                }
            }
        }
        stack.pop();
        None
    }

    /// Build-order levels: every node in a level depends only on nodes of
    /// earlier levels. Root nodes (virtual or consumer) are left out.
    /// Nodes within a level are sorted by reference text.
    pub fn build_order(&self) -> Result<Vec<Vec<NodeId>>, GraphError> {
        let (view, _) = self.petgraph_view(|_, _| true);
        let sorted = toposort(&view, None).map_err(|cycle| GraphError::Cycle {
            path: vec![self.nodes[view[cycle.node_id()].0].display_name()],
        })?;

        let mut level_of: HashMap<NodeId, usize> = HashMap::new();
        for index in sorted {
            let id = view[index];
            let node = &self.nodes[id.0];
            if node.origin.is_root() {
                continue;
            }
            let level = node
                .dependencies
                .iter()
                .filter_map(|d| level_of.get(&d.target))
                .map(|l| l + 1)
                .max()
                .unwrap_or(0);
            level_of.insert(id, level);
        }

        let depth = level_of.values().copied().max().map_or(0, |m| m + 1);
        let mut levels: Vec<Vec<NodeId>> = vec![Vec::new(); depth];
        for (id, level) in level_of {
            levels[level].push(id);
        }
        for level in &mut levels {
            level.sort_by_key(|id| (self.nodes[id.0].display_name(), self.nodes[id.0].context));
        }
        Ok(levels)
    }

    /// Build-order levels rendered as reference text with context
    pub fn build_order_references(&self) -> Result<Vec<Vec<String>>, GraphError> {
        Ok(self
            .build_order()?
            .into_iter()
            .map(|level| {
                level
                    .into_iter()
                    .map(|id| {
                        let node = &self.nodes[id.0];
                        format!("{} ({})", node.display_name(), node.context)
                    })
                    .collect()
            })
            .collect())
    }
}

impl Index<NodeId> for DependencyGraph {
    type Output = GraphNode;

    fn index(&self, id: NodeId) -> &GraphNode {
        &self.nodes[id.0]
    }
}

#[cfg(test)]
mod tests {
    include!("mod.test.rs");
}
