//! The remote compute backend collaborator
//!
//! The coordinator talks to the job runner exclusively through the
//! `RunBackend` trait, so orchestration logic is unit-testable with a
//! scripted mock and the HTTP transport stays an implementation
//! detail (`HttpBackend`).

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use flowdeck_graph::persist::WorkflowNode;
use flowdeck_graph::{FilterParam, GraphStore, NodeId};

use crate::error::Result;
use crate::session::{NodeResult, OutputRef};

/// The submit request body
///
/// `node_dict` is keyed by node ID and emitted in topological order so
/// the backend can schedule dependencies without re-sorting. Algorithm
/// entries deliberately exclude the committed display filter: a plain
/// run always executes unfiltered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPayload {
    pub workspace_id: String,
    /// Present on a fresh submit, absent on a re-run by uid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub node_dict: serde_json::Map<String, serde_json::Value>,
    pub edge_dict: serde_json::Map<String, serde_json::Value>,
    /// Nodes explicitly requested to re-execute
    pub force_run_list: Vec<NodeId>,
}

impl SubmitPayload {
    /// Build the submit body from the current graph
    ///
    /// Fails with `CycleDetected` if the graph is not a DAG (possible
    /// only through import, never through interactive edits).
    pub fn from_graph(
        store: &GraphStore,
        workspace_id: impl Into<String>,
        name: Option<&str>,
    ) -> Result<Self> {
        let mut node_dict = serde_json::Map::new();
        for node_id in store.topological_order()? {
            let Some(node) = store.find_node(&node_id) else {
                continue;
            };
            let mut data = node.data.clone();
            if let Some(algo) = data.as_algorithm_mut() {
                algo.data_filter = None;
            }
            let entry = WorkflowNode {
                data,
                position: node.position,
            };
            node_dict.insert(node_id, serde_json::to_value(entry)?);
        }

        let mut edge_dict = serde_json::Map::new();
        for edge in store.edges() {
            edge_dict.insert(edge.id.clone(), serde_json::to_value(edge)?);
        }

        Ok(Self {
            workspace_id: workspace_id.into(),
            name: name.map(String::from),
            node_dict,
            edge_dict,
            force_run_list: store.force_run_list(),
        })
    }
}

/// Acknowledgement of a submit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAck {
    /// Backend-assigned run identifier
    pub uid: String,
}

/// One poll response: per-node results plus an overall progress hint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    /// Results keyed by node ID; absent nodes are still queued
    #[serde(default)]
    pub node_results: HashMap<NodeId, NodeResult>,
    /// Optional human-readable progress message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Response to a node-scoped filter request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterResponse {
    /// Updated output references for the filtered node
    #[serde(default)]
    pub output_refs: Vec<OutputRef>,
}

/// External collaborator driving the remote job runner
///
/// One implementation per transport; orchestration semantics live in
/// the coordinator, never here.
#[async_trait]
pub trait RunBackend: Send + Sync {
    /// Submit a fresh run; the backend assigns a new uid
    async fn submit(&self, payload: &SubmitPayload) -> Result<SubmitAck>;

    /// Re-run under an existing uid (no new history entry)
    async fn resubmit(&self, uid: &str, payload: &SubmitPayload) -> Result<SubmitAck>;

    /// Fetch results for the given pending nodes
    async fn poll(&self, uid: &str, pending: &[NodeId]) -> Result<PollResponse>;

    /// Request cancellation of a run
    async fn cancel(&self, uid: &str) -> Result<()>;

    /// Re-execute a single node under a display filter
    ///
    /// `None` resets the node to its unfiltered output.
    async fn filter(
        &self,
        uid: &str,
        node_id: &str,
        filter: Option<&FilterParam>,
    ) -> Result<FilterResponse>;
}
