//! Install-order graph.
//!
//! Nodes are eligible components, edges run from a dependency to the
//! component that must be installed after it. Ordering is a Kahn topological
//! sort that always releases the ready node with the lowest declaration
//! index, so identical input always yields an identical order.

use crate::core::ConfigError;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    name: String,
    index: usize,
}

#[derive(Debug, Default)]
pub struct InstallGraph {
    graph: DiGraph<Node, ()>,
    node_map: HashMap<String, NodeIndex>,
}

impl InstallGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component; `index` is its declaration position.
    pub fn add_component(&mut self, name: &str, index: usize) {
        if self.node_map.contains_key(name) {
            return;
        }
        let idx = self.graph.add_node(Node {
            name: name.to_string(),
            index,
        });
        self.node_map.insert(name.to_string(), idx);
    }

    /// Require `dependency` to be installed before `dependent`.
    ///
    /// Returns `false` and adds nothing when either side is not in the graph.
    pub fn add_edge(&mut self, dependency: &str, dependent: &str) -> bool {
        let (Some(&from), Some(&to)) = (self.node_map.get(dependency), self.node_map.get(dependent))
        else {
            return false;
        };
        if !self.graph.contains_edge(from, to) {
            self.graph.add_edge(from, to, ());
        }
        true
    }

    /// Fail with the members of the first cycle found, closing name repeated.
    pub fn detect_cycles(&self) -> Result<(), ConfigError> {
        let mut colors: HashMap<NodeIndex, Color> =
            self.graph.node_indices().map(|n| (n, Color::White)).collect();
        let mut path = Vec::new();

        for node in self.nodes_by_declaration() {
            if colors.get(&node) == Some(&Color::White)
                && let Some(members) = self.dfs_visit(node, &mut colors, &mut path)
            {
                return Err(ConfigError::Cycle {
                    members,
                });
            }
        }
        Ok(())
    }

    fn dfs_visit(
        &self,
        node: NodeIndex,
        colors: &mut HashMap<NodeIndex, Color>,
        path: &mut Vec<NodeIndex>,
    ) -> Option<Vec<String>> {
        colors.insert(node, Color::Gray);
        path.push(node);

        let mut next: Vec<NodeIndex> = self.graph.neighbors(node).collect();
        next.sort_by_key(|n| self.graph[*n].index);

        for neighbor in next {
            match colors.get(&neighbor) {
                Some(Color::Gray) => {
                    let start = path.iter().position(|n| *n == neighbor).unwrap_or(0);
                    let mut members: Vec<String> =
                        path[start..].iter().map(|n| self.graph[*n].name.clone()).collect();
                    members.push(self.graph[neighbor].name.clone());
                    return Some(members);
                }
                Some(Color::White) => {
                    if let Some(cycle) = self.dfs_visit(neighbor, colors, path) {
                        return Some(cycle);
                    }
                }
                _ => {}
            }
        }

        path.pop();
        colors.insert(node, Color::Black);
        None
    }

    /// Dependencies first; ties broken by declaration index.
    pub fn topological_order(&self) -> Result<Vec<String>, ConfigError> {
        self.detect_cycles()?;

        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|n| (n, self.graph.neighbors_directed(n, Direction::Incoming).count()))
            .collect();

        let mut ready: BinaryHeap<Reverse<(usize, NodeIndex)>> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(n, _)| Reverse((self.graph[*n].index, *n)))
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse((_, node))) = ready.pop() {
            order.push(self.graph[node].name.clone());
            for dependent in self.graph.neighbors(node) {
                if let Some(degree) = in_degree.get_mut(&dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse((self.graph[dependent].index, dependent)));
                    }
                }
            }
        }

        if order.len() != self.graph.node_count() {
            let members = in_degree
                .iter()
                .filter(|(_, degree)| **degree > 0)
                .map(|(n, _)| self.graph[*n].name.clone())
                .collect();
            return Err(ConfigError::Cycle {
                members,
            });
        }
        Ok(order)
    }

    fn nodes_by_declaration(&self) -> Vec<NodeIndex> {
        let mut nodes: Vec<NodeIndex> = self.graph.node_indices().collect();
        nodes.sort_by_key(|n| self.graph[*n].index);
        nodes
    }
}
