// src/resolver/graph.rs

//! Dependency graph data structures and algorithms
//!
//! Provides graph construction, topological sorting and cycle detection. The
//! graph is generic over its node key so the package resolver (nodes are
//! producer-scoped package names) and the feature arranger (nodes are branch
//! indices) share one implementation. All maps are ordered so every traversal
//! is deterministic.

use std::collections::{BTreeMap, BTreeSet};

/// Directed graph where an edge `from -> to` means `from` depends on `to`
#[derive(Debug, Clone)]
pub struct DependencyGraph<N: Ord + Clone> {
    /// Every node, including ones without edges
    nodes: BTreeSet<N>,
    /// Map from node to the nodes it depends on
    edges: BTreeMap<N, BTreeSet<N>>,
    /// Map from node to the nodes that depend on it (reverse edges)
    reverse_edges: BTreeMap<N, BTreeSet<N>>,
}

impl<N: Ord + Clone> Default for DependencyGraph<N> {
    fn default() -> Self {
        Self {
            nodes: BTreeSet::new(),
            edges: BTreeMap::new(),
            reverse_edges: BTreeMap::new(),
        }
    }
}

impl<N: Ord + Clone> DependencyGraph<N> {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: N) {
        self.nodes.insert(node);
    }

    /// Record that `from` depends on `to`; both become nodes
    pub fn add_edge(&mut self, from: N, to: N) {
        self.nodes.insert(from.clone());
        self.nodes.insert(to.clone());
        self.reverse_edges
            .entry(to.clone())
            .or_default()
            .insert(from.clone());
        self.edges.entry(from).or_default().insert(to);
    }

    /// Direct dependencies of a node
    pub fn dependencies(&self, node: &N) -> impl Iterator<Item = &N> {
        self.edges.get(node).into_iter().flatten()
    }

    /// Nodes depending directly on this node
    pub fn dependents(&self, node: &N) -> impl Iterator<Item = &N> {
        self.reverse_edges.get(node).into_iter().flatten()
    }

    /// Topological sort using Kahn's algorithm
    ///
    /// Returns nodes with dependencies before dependents. Among nodes that are
    /// ready at the same time the smallest key goes first. On a cycle the
    /// offending path is returned as the error.
    pub fn topological_sort(&self) -> Result<Vec<N>, Vec<N>> {
        let mut pending: BTreeMap<&N, usize> = self
            .nodes
            .iter()
            .map(|n| (n, self.edges.get(n).map_or(0, BTreeSet::len)))
            .collect();

        let mut ready: BTreeSet<&N> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(n, _)| *n)
            .collect();

        let mut result = Vec::with_capacity(self.nodes.len());
        while let Some(node) = ready.pop_first() {
            result.push(node.clone());
            for dependent in self.dependents(node) {
                if let Some(count) = pending.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if result.len() != self.nodes.len() {
            return Err(self.detect_cycle().unwrap_or_default());
        }
        Ok(result)
    }

    /// Detect a cycle in the graph
    ///
    /// Returns the cycle as a path that starts and ends with the same node,
    /// or None if the graph is acyclic.
    pub fn detect_cycle(&self) -> Option<Vec<N>> {
        let mut visited = BTreeSet::new();
        let mut stack = Vec::new();

        for node in &self.nodes {
            if !visited.contains(node) {
                if let Some(cycle) = self.dfs_cycle_detect(node, &mut visited, &mut stack) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    /// DFS helper for cycle detection; `stack` is the current path
    fn dfs_cycle_detect<'a>(
        &'a self,
        node: &'a N,
        visited: &mut BTreeSet<&'a N>,
        stack: &mut Vec<&'a N>,
    ) -> Option<Vec<N>> {
        visited.insert(node);
        stack.push(node);

        for dep in self.dependencies(node) {
            if let Some(pos) = stack.iter().position(|n| *n == dep) {
                let mut cycle: Vec<N> = stack[pos..].iter().map(|n| (*n).clone()).collect();
                cycle.push(dep.clone());
                return Some(cycle);
            }
            if !visited.contains(dep) {
                if let Some(cycle) = self.dfs_cycle_detect(dep, visited, stack) {
                    return Some(cycle);
                }
            }
        }

        stack.pop();
        None
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topological_sort() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("a", "b");
        graph.add_edge("b", "c");
        graph.add_node("d");

        let order = graph.topological_sort().unwrap();
        let pos = |n| order.iter().position(|x| *x == n).unwrap();
        assert!(pos("c") < pos("b"));
        assert!(pos("b") < pos("a"));
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn test_smallest_ready_first() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(0, 3);
        graph.add_node(1);
        graph.add_node(2);

        assert_eq!(graph.topological_sort().unwrap(), vec![1, 2, 3, 0]);
    }

    #[test]
    fn test_detect_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("a", "b");
        graph.add_edge("b", "c");
        graph.add_edge("c", "a");

        let cycle = graph.detect_cycle().unwrap();
        assert_eq!(cycle, vec!["a", "b", "c", "a"]);
        assert_eq!(graph.topological_sort().unwrap_err(), cycle);
    }

    #[test]
    fn test_no_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("a", "b");
        graph.add_edge("a", "c");
        graph.add_edge("b", "c");
        assert!(graph.detect_cycle().is_none());
    }

    #[test]
    fn test_self_loop() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("a", "a");
        assert_eq!(graph.detect_cycle().unwrap(), vec!["a", "a"]);
    }
}
