//! Workflow persistence (import/export)
//!
//! The interchange format mirrors the REST resource: a `nodeDict`
//! keyed by node ID and an `edgeDict` keyed by edge ID. Round-tripping
//! reproduces an equivalent graph: node kinds, labels, paths,
//! parameter values, and committed display filters all survive;
//! transient state (dirty flags, drafts, run baselines) does not, so
//! an imported graph starts clean.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::store::GraphStore;
use crate::types::{EdgeId, GraphEdge, NodeData, NodeId};

/// A serialized pipeline graph
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Nodes keyed by ID
    pub node_dict: BTreeMap<NodeId, WorkflowNode>,
    /// Edges keyed by ID
    pub edge_dict: BTreeMap<EdgeId, WorkflowEdge>,
}

/// A node entry in the persistence format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNode {
    /// Kind-specific payload (type, label, path, param, dataFilterParam)
    pub data: NodeData,
    /// Editor position
    #[serde(default)]
    pub position: (f64, f64),
}

/// An edge entry in the persistence format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEdge {
    pub source: NodeId,
    pub source_handle: String,
    pub target: NodeId,
    pub target_handle: String,
}

/// Serialize a graph into the interchange format
pub fn export(store: &GraphStore) -> Workflow {
    let node_dict = store
        .nodes()
        .iter()
        .map(|node| {
            (
                node.id.clone(),
                WorkflowNode {
                    data: node.data.clone(),
                    position: node.position,
                },
            )
        })
        .collect();
    let edge_dict = store
        .edges()
        .iter()
        .map(|edge| {
            (
                edge.id.clone(),
                WorkflowEdge {
                    source: edge.source.clone(),
                    source_handle: edge.source_handle.clone(),
                    target: edge.target.clone(),
                    target_handle: edge.target_handle.clone(),
                },
            )
        })
        .collect();
    Workflow {
        node_dict,
        edge_dict,
    }
}

/// Rebuild a graph from the interchange format
///
/// Edge endpoints are validated against the node dictionary and the
/// resulting edge set must be acyclic. Algorithm nodes come back
/// clean: their run baseline is the imported parameter tree and the
/// committed filter doubles as the draft.
pub fn import(workflow: Workflow) -> Result<GraphStore> {
    let mut store = GraphStore::new();

    for (id, entry) in workflow.node_dict {
        let mut data = entry.data;
        if let Some(algo) = data.as_algorithm_mut() {
            algo.original_params = algo.params.clone();
            algo.draft_data_filter = algo.data_filter.clone();
            algo.is_update = false;
            algo.is_update_filter = false;
        }
        store.add_node_with_id(id, data, entry.position);
    }

    let mut edges = Vec::with_capacity(workflow.edge_dict.len());
    for (id, entry) in workflow.edge_dict {
        if store.find_node(&entry.source).is_none() {
            return Err(GraphError::NodeNotFound(entry.source));
        }
        if store.find_node(&entry.target).is_none() {
            return Err(GraphError::NodeNotFound(entry.target));
        }
        edges.push(GraphEdge {
            id,
            source: entry.source,
            source_handle: entry.source_handle,
            target: entry.target,
            target_handle: entry.target_handle,
        });
    }
    store.restore_edges(edges)?;

    Ok(store)
}

impl GraphStore {
    /// Install imported edges wholesale, then verify DAG-ness
    pub(crate) fn restore_edges(&mut self, edges: Vec<GraphEdge>) -> Result<()> {
        for edge in edges {
            self.push_restored_edge(edge);
        }
        // topological_order fails on a cyclic edge set
        self.topological_order().map(|_| ())
    }
}
