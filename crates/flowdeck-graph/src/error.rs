//! Error types for the graph crate

use thiserror::Error;

use crate::types::{DataType, HandleId, NodeId};

/// Result type alias using GraphError
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors that can occur while editing or serializing a pipeline graph
///
/// Connection errors are raised before any mutation, so a failed
/// `connect` leaves the graph untouched.
#[derive(Debug, Error)]
pub enum GraphError {
    /// An operation referenced a node that does not exist
    #[error("unknown node '{0}'")]
    NodeNotFound(NodeId),

    /// An edge endpoint pair referenced the same node
    #[error("cannot connect node '{0}' to itself")]
    SelfLoop(NodeId),

    /// Declared handle types are not compatible
    #[error("incompatible handle types: {source_type:?} -> {target_type:?}")]
    IncompatibleTypes {
        source_type: DataType,
        target_type: DataType,
    },

    /// The target handle already has an incoming edge
    #[error("target handle '{handle}' on node '{node_id}' already has a connection")]
    DuplicateConnection { node_id: NodeId, handle: HandleId },

    /// The connection (or imported graph) would contain a cycle
    #[error("connection would create a cycle")]
    CycleDetected,

    /// A parameter operation targeted a non-algorithm node
    #[error("node '{0}' is not an algorithm node")]
    NotAnAlgorithmNode(NodeId),

    /// A parameter path did not resolve inside the node's tree
    #[error("invalid parameter path '{path}' on node '{node_id}'")]
    InvalidParamPath { node_id: NodeId, path: String },

    /// An input-node operation targeted an algorithm node
    #[error("node '{0}' is not an input node")]
    NotAnInputNode(NodeId),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
