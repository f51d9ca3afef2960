//! Generic directed graph used for dependency resolution and topological scheduling.
//!
//! This crate underlies the recipe dependency graph built by a Jakefile's
//! `ParallelExecutor`: nodes are recipes, edges point from a recipe to each of
//! its dependencies, and the graph is built without rejecting cycles eagerly —
//! callers run [`DAG::find_cycles`] once construction is complete and turn that
//! into a hard error before any work is scheduled.
//!
//! # Example
//!
//! ```
//! use jake_graph::{DAG, NodeId};
//!
//! let mut dag = DAG::<&str, ()>::new();
//! let a = dag.add_node("a");
//! let b = dag.add_node("b");
//! let c = dag.add_node("c");
//!
//! // b depends on a, c depends on b
//! dag.add_edge(a, b, ()).unwrap();
//! dag.add_edge(b, c, ()).unwrap();
//!
//! let order = dag.topological_sort().unwrap();
//! assert_eq!(order, vec![a, b, c]);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(unused_results)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Node identifier in the graph. Stable for the lifetime of the graph it was
/// created in; never reused even after nodes are removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Error types for graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A cycle was found among the given node IDs, in traversal order.
    #[error("cycle detected: {}", format_cycle(.0))]
    CycleDetected(Vec<NodeId>),

    /// Node not found.
    #[error("node {0} not found in graph")]
    NodeNotFound(NodeId),
}

fn format_cycle(ids: &[NodeId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Result type for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct Node<N> {
    data: N,
    // this node -> its dependencies
    outgoing: HashSet<NodeId>,
    // dependents -> this node
    incoming: HashSet<NodeId>,
}

/// Generic directed graph.
///
/// Unlike a strict DAG, [`DAG::add_edge`] does not reject cycles on
/// insertion — graph construction for a Jakefile target walks recipe
/// dependencies depth-first and may add an edge before the rest of the
/// cycle is known. Call [`DAG::find_cycles`] once the graph is fully built.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DAG<N, E> {
    nodes: HashMap<NodeId, Node<N>>,
    edges: Vec<(NodeId, NodeId, E)>,
    next_id: usize,
}

impl<N, E> Default for DAG<N, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N, E> DAG<N, E> {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: Vec::new(),
            next_id: 0,
        }
    }

    /// Add a node and return its ID.
    pub fn add_node(&mut self, data: N) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        let _ = self.nodes.insert(
            id,
            Node {
                data,
                outgoing: HashSet::new(),
                incoming: HashSet::new(),
            },
        );
        id
    }

    /// Add a directed edge `from -> to` meaning `to` is a prerequisite of
    /// `from` (i.e. `from` depends on `to`). Adding the same edge twice is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` if either endpoint doesn't exist.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, data: E) -> GraphResult<()> {
        if !self.nodes.contains_key(&from) {
            return Err(GraphError::NodeNotFound(from));
        }
        if !self.nodes.contains_key(&to) {
            return Err(GraphError::NodeNotFound(to));
        }

        if let Some(from_node) = self.nodes.get_mut(&from) {
            if from_node.outgoing.contains(&to) {
                return Ok(());
            }
            let _ = from_node.outgoing.insert(to);
        }
        if let Some(to_node) = self.nodes.get_mut(&to) {
            let _ = to_node.incoming.insert(from);
        }
        self.edges.push((from, to, data));

        Ok(())
    }

    /// Get a reference to a node's data.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` if the node doesn't exist.
    pub fn node(&self, id: NodeId) -> GraphResult<&N> {
        self.nodes
            .get(&id)
            .map(|node| &node.data)
            .ok_or(GraphError::NodeNotFound(id))
    }

    /// Get a mutable reference to a node's data.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` if the node doesn't exist.
    pub fn node_mut(&mut self, id: NodeId) -> GraphResult<&mut N> {
        self.nodes
            .get_mut(&id)
            .map(|node| &mut node.data)
            .ok_or(GraphError::NodeNotFound(id))
    }

    /// All node IDs, in no particular order.
    #[must_use]
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Direct dependencies of `id` (nodes it points to).
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` if the node doesn't exist.
    pub fn dependencies(&self, id: NodeId) -> GraphResult<Vec<NodeId>> {
        self.nodes
            .get(&id)
            .map(|node| node.outgoing.iter().copied().collect())
            .ok_or(GraphError::NodeNotFound(id))
    }

    /// Direct dependents of `id` (nodes that point to it).
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` if the node doesn't exist.
    pub fn dependents(&self, id: NodeId) -> GraphResult<Vec<NodeId>> {
        self.nodes
            .get(&id)
            .map(|node| node.incoming.iter().copied().collect())
            .ok_or(GraphError::NodeNotFound(id))
    }

    /// In-degree, i.e. the number of unresolved dependencies `id` has.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` if the node doesn't exist.
    pub fn in_degree(&self, id: NodeId) -> GraphResult<usize> {
        self.nodes
            .get(&id)
            .map(|node| node.outgoing.len())
            .ok_or(GraphError::NodeNotFound(id))
    }

    /// Topologically sort the graph using Kahn's algorithm, dependencies
    /// before dependents.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::CycleDetected` if the graph contains a cycle.
    pub fn topological_sort(&self) -> GraphResult<Vec<NodeId>> {
        let mut remaining: HashMap<NodeId, usize> = self
            .nodes
            .iter()
            .map(|(&id, node)| (id, node.outgoing.len()))
            .collect();

        let mut queue: VecDeque<NodeId> = remaining
            .iter()
            .filter(|&(_, &deg)| deg == 0)
            .map(|(&id, _)| id)
            .collect();

        let mut result = Vec::with_capacity(self.nodes.len());
        while let Some(id) = queue.pop_front() {
            result.push(id);
            if let Some(node) = self.nodes.get(&id) {
                for &dependent in &node.incoming {
                    if let Some(deg) = remaining.get_mut(&dependent) {
                        *deg -= 1;
                        if *deg == 0 {
                            queue.push_back(dependent);
                        }
                    }
                }
            }
        }

        if result.len() == self.nodes.len() {
            Ok(result)
        } else {
            Err(self
                .find_cycles()
                .into_iter()
                .next()
                .map(GraphError::CycleDetected)
                .unwrap_or_else(|| GraphError::CycleDetected(Vec::new())))
        }
    }

    /// Find cycles via three-color depth-first search (white = unvisited,
    /// gray = on the current path, black = fully explored). Returns one
    /// vector of node IDs per cycle found, in traversal order.
    #[must_use]
    pub fn find_cycles(&self) -> Vec<Vec<NodeId>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let mut color: HashMap<NodeId, Color> =
            self.nodes.keys().map(|&id| (id, Color::White)).collect();
        let mut path = Vec::new();
        let mut cycles = Vec::new();

        fn visit<N, E>(
            dag: &DAG<N, E>,
            id: NodeId,
            color: &mut HashMap<NodeId, Color>,
            path: &mut Vec<NodeId>,
            cycles: &mut Vec<Vec<NodeId>>,
        ) {
            color.insert(id, Color::Gray);
            path.push(id);

            if let Some(node) = dag.nodes.get(&id) {
                for &dep in &node.outgoing {
                    match color.get(&dep).copied().unwrap_or(Color::White) {
                        Color::White => visit(dag, dep, color, path, cycles),
                        Color::Gray => {
                            let start = path.iter().position(|&n| n == dep).unwrap_or(0);
                            cycles.push(path[start..].to_vec());
                        }
                        Color::Black => {}
                    }
                }
            }

            let _ = path.pop();
            color.insert(id, Color::Black);
        }

        for &id in self.nodes.keys() {
            if color.get(&id).copied() == Some(Color::White) {
                visit(self, id, &mut color, &mut path, &mut cycles);
            }
        }

        cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_graph() {
        let dag = DAG::<String, ()>::new();
        assert_eq!(dag.node_count(), 0);
        assert_eq!(dag.edge_count(), 0);
    }

    #[test]
    fn add_nodes_and_edges() {
        let mut dag = DAG::<String, ()>::new();
        let a = dag.add_node("a".to_string());
        let b = dag.add_node("b".to_string());
        dag.add_edge(a, b, ()).unwrap();
        assert_eq!(dag.edge_count(), 1);
        assert_eq!(dag.dependencies(a).unwrap(), vec![b]);
        assert_eq!(dag.dependents(b).unwrap(), vec![a]);
    }

    #[test]
    fn duplicate_edge_is_noop() {
        let mut dag = DAG::<String, ()>::new();
        let a = dag.add_node("a".to_string());
        let b = dag.add_node("b".to_string());
        dag.add_edge(a, b, ()).unwrap();
        dag.add_edge(a, b, ()).unwrap();
        assert_eq!(dag.edge_count(), 1);
    }

    #[test]
    fn topological_sort_orders_dependencies_first() {
        let mut dag = DAG::<&str, ()>::new();
        let a = dag.add_node("a");
        let b = dag.add_node("b");
        let c = dag.add_node("c");
        // a depends on b, b depends on c
        dag.add_edge(a, b, ()).unwrap();
        dag.add_edge(b, c, ()).unwrap();

        let order = dag.topological_sort().unwrap();
        let pos = |n: NodeId| order.iter().position(|&x| x == n).unwrap();
        assert!(pos(c) < pos(b));
        assert!(pos(b) < pos(a));
    }

    #[test]
    fn cycle_detection() {
        let mut dag = DAG::<&str, ()>::new();
        let a = dag.add_node("a");
        let b = dag.add_node("b");
        let c = dag.add_node("c");
        dag.add_edge(a, b, ()).unwrap();
        dag.add_edge(b, c, ()).unwrap();
        dag.add_edge(c, a, ()).unwrap();

        assert!(dag.topological_sort().is_err());
        let cycles = dag.find_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 3);
    }

    #[test]
    fn diamond_dependency_visits_shared_node_once() {
        let mut dag = DAG::<&str, ()>::new();
        let root = dag.add_node("root");
        let a = dag.add_node("a");
        let b = dag.add_node("b");
        let shared = dag.add_node("shared");
        dag.add_edge(root, a, ()).unwrap();
        dag.add_edge(root, b, ()).unwrap();
        dag.add_edge(a, shared, ()).unwrap();
        dag.add_edge(b, shared, ()).unwrap();

        assert_eq!(dag.node_count(), 4);
        let order = dag.topological_sort().unwrap();
        assert_eq!(order.len(), 4);
        let pos = |n: NodeId| order.iter().position(|&x| x == n).unwrap();
        assert!(pos(shared) < pos(a));
        assert!(pos(shared) < pos(b));
    }

    #[test]
    fn in_degree_tracks_unresolved_dependencies() {
        let mut dag = DAG::<&str, ()>::new();
        let a = dag.add_node("a");
        let b = dag.add_node("b");
        let c = dag.add_node("c");
        dag.add_edge(a, b, ()).unwrap();
        dag.add_edge(a, c, ()).unwrap();
        assert_eq!(dag.in_degree(a).unwrap(), 2);
        assert_eq!(dag.in_degree(b).unwrap(), 0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn round_trips_through_json() {
        let mut dag = DAG::<String, u32>::new();
        let a = dag.add_node("a".to_string());
        let b = dag.add_node("b".to_string());
        dag.add_edge(a, b, 7).unwrap();

        let json = serde_json::to_string(&dag).unwrap();
        let restored: DAG<String, u32> = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.node_count(), dag.node_count());
        assert_eq!(restored.edge_count(), dag.edge_count());
        assert_eq!(restored.dependencies(a).unwrap(), dag.dependencies(a).unwrap());
    }
}
