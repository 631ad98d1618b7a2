//! Graph view of a resolved assignment, used to verify it and to print it.

use std::collections::{HashMap, HashSet};
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};
use petgraph::Direction;

use crate::index::{CatalogIndex, UnitId, UnitVersionId};
use crate::resolver::Solution;

/// A chosen unit version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SolutionNode {
    pub unit_version: UnitVersionId,
    pub name: String,
    pub version: String,
}

impl fmt::Display for SolutionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Dependency edge, labelled with the constraint the dependent places on
/// the target (if any).
#[derive(Debug, Clone)]
pub struct SolutionEdge {
    pub constraint: Option<String>,
}

/// The chosen unit versions and the dependency edges between them.
pub struct SolutionGraph {
    graph: DiGraph<SolutionNode, SolutionEdge>,
    nodes: HashMap<UnitId, NodeIndex>,
}

impl SolutionGraph {
    pub fn build(index: &CatalogIndex, solution: &Solution) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();
        for (unit, uv) in solution.iter() {
            let unit_version = index.unit_version(uv);
            let idx = graph.add_node(SolutionNode {
                unit_version: uv,
                name: unit_version.name.clone(),
                version: unit_version.version.to_string(),
            });
            nodes.insert(unit, idx);
        }

        for (unit, uv) in solution.iter() {
            let from = nodes[&unit];
            let unit_version = index.unit_version(uv);
            for dependency in unit_version.dependencies() {
                let Some(&to) = nodes.get(dependency) else {
                    continue;
                };
                let constraint = unit_version
                    .constraints()
                    .iter()
                    .map(|&c| index.constraint(c))
                    .find(|c| c.unit == *dependency)
                    .map(|c| c.version_constraint.to_string());
                graph.add_edge(from, to, SolutionEdge { constraint });
            }
        }

        Self { graph, nodes }
    }

    /// Every way the assignment breaks its own requirements: a chosen
    /// version whose dependency was left out, or whose constraint rejects the
    /// version chosen for the target.
    pub fn violations(&self, index: &CatalogIndex) -> Vec<String> {
        let mut violations = Vec::new();
        for idx in self.graph.node_indices() {
            let node = &self.graph[idx];
            let unit_version = index.unit_version(node.unit_version);
            for &dependency in unit_version.dependencies() {
                if !self.nodes.contains_key(&dependency) {
                    violations.push(format!(
                        "{node} requires {}, which was not chosen",
                        index.unit_name(dependency)
                    ));
                }
            }
            for &constraint in unit_version.constraints() {
                let target = index.constraint(constraint).unit;
                if let Some(&to) = self.nodes.get(&target) {
                    let chosen = self.graph[to].unit_version;
                    if !index.is_satisfied(constraint, chosen) {
                        violations.push(format!(
                            "{node} requires {}, but {} was chosen",
                            index.constraint(constraint),
                            self.graph[to]
                        ));
                    }
                }
            }
        }
        violations
    }

    pub fn find(&self, name: &str) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|&idx| self.graph[idx].name == name)
    }

    pub fn node(&self, idx: NodeIndex) -> &SolutionNode {
        &self.graph[idx]
    }

    pub fn dependencies_of(&self, idx: NodeIndex) -> Vec<(NodeIndex, &SolutionEdge)> {
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.target(), e.weight()))
            .collect()
    }

    pub fn dependents_of(&self, idx: NodeIndex) -> Vec<(NodeIndex, &SolutionEdge)> {
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| (e.source(), e.weight()))
            .collect()
    }

    /// Nodes nothing depends on, sorted by name.
    pub fn roots(&self) -> Vec<NodeIndex> {
        let mut roots: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&idx| self.dependents_of(idx).is_empty())
            .collect();
        roots.sort_by(|a, b| self.graph[*a].name.cmp(&self.graph[*b].name));
        roots
    }

    /// Render the assignment as a tree starting from [`roots`](Self::roots).
    /// Nodes only reachable through a cycle start a tree of their own.
    pub fn print_tree(&self, max_depth: Option<usize>) -> String {
        let mut output = String::new();
        let roots = self.tree_roots();
        let count = roots.len();
        let mut visited = HashSet::new();
        for (i, root) in roots.into_iter().enumerate() {
            self.print_subtree(
                &mut output,
                root,
                None,
                "",
                i == count - 1,
                0,
                max_depth,
                &mut visited,
            );
        }
        output
    }

    fn tree_roots(&self) -> Vec<NodeIndex> {
        let mut roots = self.roots();
        let mut reached = HashSet::new();
        for &root in &roots {
            self.mark_reachable(root, &mut reached);
        }

        let mut rest: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|idx| !reached.contains(idx))
            .collect();
        rest.sort_by(|a, b| self.graph[*a].name.cmp(&self.graph[*b].name));
        for idx in rest {
            if !reached.contains(&idx) {
                self.mark_reachable(idx, &mut reached);
                roots.push(idx);
            }
        }
        roots
    }

    fn mark_reachable(&self, start: NodeIndex, reached: &mut HashSet<NodeIndex>) {
        let mut dfs = Dfs::new(&self.graph, start);
        while let Some(idx) = dfs.next(&self.graph) {
            reached.insert(idx);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn print_subtree(
        &self,
        output: &mut String,
        idx: NodeIndex,
        edge: Option<&SolutionEdge>,
        prefix: &str,
        is_last: bool,
        depth: usize,
        max_depth: Option<usize>,
        visited: &mut HashSet<NodeIndex>,
    ) {
        let connector = match (depth, is_last) {
            (0, _) => "",
            (_, true) => "└── ",
            (_, false) => "├── ",
        };
        let node = &self.graph[idx];
        match edge.and_then(|e| e.constraint.as_deref()) {
            Some(constraint) => {
                output.push_str(&format!("{prefix}{connector}{node} ({constraint})\n"))
            }
            None => output.push_str(&format!("{prefix}{connector}{node}\n")),
        }

        if max_depth.is_some_and(|max| depth >= max) {
            return;
        }
        if !visited.insert(idx) {
            return;
        }

        let child_prefix = match depth {
            0 => String::new(),
            _ => format!("{prefix}{}", if is_last { "    " } else { "│   " }),
        };
        let mut deps = self.dependencies_of(idx);
        deps.sort_by(|a, b| self.graph[a.0].name.cmp(&self.graph[b.0].name));
        let count = deps.len();
        for (i, (child, edge)) in deps.into_iter().enumerate() {
            self.print_subtree(
                output,
                child,
                Some(edge),
                &child_prefix,
                i == count - 1,
                depth + 1,
                max_depth,
                visited,
            );
        }

        visited.remove(&idx);
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
