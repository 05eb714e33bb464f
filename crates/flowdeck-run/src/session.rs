//! Run-session state
//!
//! One `RunSession` tracks one remote execution attempt, identified by
//! the backend-assigned `uid` plus a client-local `generation` used by
//! the stale-response guard: every new submit bumps the generation, so
//! a poll response started under an older generation is discarded
//! instead of merged.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use flowdeck_graph::{DataType, NodeId};

/// Lifecycle of a run session
///
/// Transitions are monotonic: `Idle -> Submitting -> StartSuccess ->
/// Running -> {Finished | Aborted | Canceled}`. A terminal state only
/// ever changes by a brand-new submit replacing the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// No run has been submitted
    Idle,
    /// Submit call in flight
    Submitting,
    /// Backend acknowledged the submit
    StartSuccess,
    /// At least one poll merged and results are still pending
    Running,
    /// All pending nodes resolved successfully
    Finished,
    /// A node reported an unrecoverable error (or polling gave up)
    Aborted,
    /// The user canceled the run
    Canceled,
}

impl RunStatus {
    /// True for states the session can never leave on its own
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Finished | RunStatus::Aborted | RunStatus::Canceled
        )
    }

    /// True while the poll loop should keep merging results
    pub fn is_active(&self) -> bool {
        matches!(self, RunStatus::StartSuccess | RunStatus::Running)
    }
}

/// Per-node status inside a poll response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeResultStatus {
    /// The node finished and its outputs are available
    Success,
    /// Still executing
    Running,
    /// Unrecoverable execution failure
    Error,
}

impl NodeResultStatus {
    /// True when no further results will arrive for the node
    pub fn is_terminal(&self) -> bool {
        !matches!(self, NodeResultStatus::Running)
    }
}

/// Reference to one backend-side output artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRef {
    /// What kind of data the artifact holds
    pub data_type: DataType,
    /// Backend-relative artifact path
    pub path: String,
}

/// The reported result for one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResult {
    pub status: NodeResultStatus,
    /// Error detail for inline display, present on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Output artifacts, present on success
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_refs: Vec<OutputRef>,
}

impl NodeResult {
    /// A successful result carrying the given outputs
    pub fn success(output_refs: Vec<OutputRef>) -> Self {
        Self {
            status: NodeResultStatus::Success,
            message: None,
            output_refs,
        }
    }

    /// A still-running placeholder
    pub fn running() -> Self {
        Self {
            status: NodeResultStatus::Running,
            message: None,
            output_refs: Vec::new(),
        }
    }

    /// A failed result with an error message
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: NodeResultStatus::Error,
            message: Some(message.into()),
            output_refs: Vec::new(),
        }
    }
}

/// The tracked state of one remote execution attempt
#[derive(Debug, Clone)]
pub struct RunSession {
    /// Backend-assigned run identifier
    pub uid: String,
    /// Client-local submit counter for the stale-response guard
    pub generation: u64,
    /// Lifecycle state
    pub status: RunStatus,
    /// Nodes whose results are still awaited
    pub pending: HashSet<NodeId>,
    /// Results merged so far
    pub results: HashMap<NodeId, NodeResult>,
}

impl RunSession {
    /// Create a freshly acknowledged session
    pub fn new(uid: impl Into<String>, generation: u64, pending: HashSet<NodeId>) -> Self {
        Self {
            uid: uid.into(),
            generation,
            status: RunStatus::StartSuccess,
            pending,
            results: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(RunStatus::Finished.is_terminal());
        assert!(RunStatus::Aborted.is_terminal());
        assert!(RunStatus::Canceled.is_terminal());
        assert!(!RunStatus::Running.is_terminal());

        assert!(RunStatus::StartSuccess.is_active());
        assert!(RunStatus::Running.is_active());
        assert!(!RunStatus::Idle.is_active());
        assert!(!RunStatus::Submitting.is_active());
        assert!(!RunStatus::Canceled.is_active());
    }

    #[test]
    fn test_node_result_terminality() {
        assert!(NodeResult::success(vec![]).status.is_terminal());
        assert!(NodeResult::error("boom").status.is_terminal());
        assert!(!NodeResult::running().status.is_terminal());
    }

    #[test]
    fn test_node_result_wire_shape() {
        let json = serde_json::to_value(NodeResult::error("division by zero")).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "division by zero");
        assert!(json.get("outputRefs").is_none());
    }
}
