//! The pipeline graph store
//!
//! `GraphStore` owns the nodes and edges of one pipeline and enforces
//! the connection rules: handle-type compatibility, single incoming
//! edge per target handle, and DAG-ness (cycles are rejected at
//! connect time rather than detected at submit time).

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{GraphError, Result};
use crate::types::{GraphEdge, GraphNode, Handle, NodeData, NodeId};

/// Holds the nodes and edges of a pipeline graph
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphStore {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    edge_counter: usize,
}

impl GraphStore {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node with a generated ID; no side effects on other nodes
    pub fn add_node(&mut self, data: NodeData, position: (f64, f64)) -> NodeId {
        let id = uuid::Uuid::new_v4().to_string();
        self.add_node_with_id(id.clone(), data, position);
        id
    }

    /// Insert a node with an explicit ID
    ///
    /// An existing node with the same ID is replaced.
    pub fn add_node_with_id(
        &mut self,
        id: impl Into<String>,
        data: NodeData,
        position: (f64, f64),
    ) {
        let id = id.into();
        self.nodes.retain(|n| n.id != id);
        self.nodes.push(GraphNode { id, data, position });
    }

    /// Remove a node and every edge touching it
    pub fn remove_node(&mut self, id: &str) -> Option<GraphNode> {
        let pos = self.nodes.iter().position(|n| n.id == id)?;
        let node = self.nodes.remove(pos);
        self.edges.retain(|e| e.source != id && e.target != id);
        Some(node)
    }

    /// Connect a source handle to a target handle
    ///
    /// Validation happens entirely client-side before any mutation:
    /// both endpoints must exist, the declared types must be
    /// compatible, the target handle must be free, and the new edge
    /// must not close a cycle.
    pub fn connect(&mut self, source: &Handle, target: &Handle) -> Result<&GraphEdge> {
        if self.find_node(&source.node_id).is_none() {
            return Err(GraphError::NodeNotFound(source.node_id.clone()));
        }
        if self.find_node(&target.node_id).is_none() {
            return Err(GraphError::NodeNotFound(target.node_id.clone()));
        }
        if source.node_id == target.node_id {
            return Err(GraphError::SelfLoop(source.node_id.clone()));
        }
        if !source.data_type.is_compatible_with(&target.data_type) {
            return Err(GraphError::IncompatibleTypes {
                source_type: source.data_type,
                target_type: target.data_type,
            });
        }

        // A target handle accepts at most one incoming edge
        let occupied = self
            .edges
            .iter()
            .any(|e| e.target == target.node_id && e.target_handle == target.handle_id);
        if occupied {
            return Err(GraphError::DuplicateConnection {
                node_id: target.node_id.clone(),
                handle: target.handle_id.clone(),
            });
        }

        // source -> target closes a cycle iff target is already an
        // ancestor of source
        if self.ancestors_of(&source.node_id).contains(&target.node_id) {
            return Err(GraphError::CycleDetected);
        }

        self.edge_counter += 1;
        let edge = GraphEdge {
            id: format!("edge-{}", self.edge_counter),
            source: source.node_id.clone(),
            source_handle: source.handle_id.clone(),
            target: target.node_id.clone(),
            target_handle: target.handle_id.clone(),
        };
        log::debug!(
            "connect: {}:{} -> {}:{}",
            edge.source,
            edge.source_handle,
            edge.target,
            edge.target_handle
        );
        self.edges.push(edge);
        Ok(&self.edges[self.edges.len() - 1])
    }

    /// Append an already-validated edge, bypassing connect-time checks
    ///
    /// Import path only; the caller re-validates DAG-ness afterwards.
    pub(crate) fn push_restored_edge(&mut self, edge: GraphEdge) {
        if let Some(n) = edge
            .id
            .strip_prefix("edge-")
            .and_then(|s| s.parse::<usize>().ok())
        {
            self.edge_counter = self.edge_counter.max(n);
        }
        self.edges.push(edge);
    }

    /// Remove an edge by ID
    pub fn remove_edge(&mut self, edge_id: &str) -> Option<GraphEdge> {
        let pos = self.edges.iter().position(|e| e.id == edge_id)?;
        Some(self.edges.remove(pos))
    }

    /// Find a node by ID
    pub fn find_node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Find a node by ID (mutable)
    pub fn find_node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// All nodes in insertion order
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// All edges in insertion order
    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    /// Get edges coming into a node
    pub fn incoming_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a GraphEdge> {
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    /// Get edges going out of a node
    pub fn outgoing_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a GraphEdge> {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    /// IDs of the nodes this node directly depends on
    pub fn dependencies(&self, node_id: &str) -> Vec<NodeId> {
        self.incoming_edges(node_id)
            .map(|e| e.source.clone())
            .collect()
    }

    /// IDs of the nodes that directly depend on this node
    pub fn dependents(&self, node_id: &str) -> Vec<NodeId> {
        self.outgoing_edges(node_id)
            .map(|e| e.target.clone())
            .collect()
    }

    /// All nodes reachable by following edges backward from `id`
    ///
    /// Iterative traversal with an explicit visited set; `id` itself is
    /// not included.
    pub fn ancestors_of(&self, id: &str) -> HashSet<NodeId> {
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut stack: Vec<NodeId> = self.dependencies(id);

        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            for dep in self.dependencies(&current) {
                if !visited.contains(&dep) {
                    stack.push(dep);
                }
            }
        }
        visited
    }

    /// Stable topological ordering of all nodes
    ///
    /// Kahn's algorithm seeded and expanded in insertion order, so the
    /// result is deterministic. Fails with `CycleDetected` if the edge
    /// set contains a cycle (possible only via import, since `connect`
    /// rejects cycles).
    pub fn topological_order(&self) -> Result<Vec<NodeId>> {
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        for node in &self.nodes {
            in_degree.insert(&node.id, 0);
        }
        for edge in &self.edges {
            *in_degree.entry(&edge.target).or_insert(0) += 1;
        }

        let mut queue: VecDeque<&str> = self
            .nodes
            .iter()
            .filter(|n| in_degree.get(n.id.as_str()) == Some(&0))
            .map(|n| n.id.as_str())
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(node_id) = queue.pop_front() {
            order.push(node_id.to_string());
            for edge in &self.edges {
                if edge.source == node_id {
                    if let Some(deg) = in_degree.get_mut(edge.target.as_str()) {
                        *deg -= 1;
                        if *deg == 0 {
                            queue.push_back(&edge.target);
                        }
                    }
                }
            }
        }

        if order.len() < self.nodes.len() {
            return Err(GraphError::CycleDetected);
        }
        Ok(order)
    }

    /// Algorithm nodes whose parameters differ from their last
    /// committed run, in insertion order
    pub fn force_run_list(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.data.is_update())
            .map(|n| n.id.clone())
            .collect()
    }

    /// All algorithm node IDs, in insertion order
    pub fn algorithm_node_ids(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| matches!(n.data, NodeData::Algorithm(_)))
            .map(|n| n.id.clone())
            .collect()
    }
}
