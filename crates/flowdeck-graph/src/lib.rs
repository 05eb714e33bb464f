//! Flowdeck Graph - pipeline graph model and staleness tracking
//!
//! This crate owns the editable state of a data-processing pipeline:
//!
//! - A node/edge graph with type-checked connection rules (`GraphStore`)
//! - Per-node parameter trees with structural dirty detection
//! - Memoized ancestor-staleness resolution (`StalenessPass`)
//! - The workflow interchange format for import/export (`persist`)
//!
//! It performs no I/O and no computation of its own; run orchestration
//! against the compute backend lives in `flowdeck-run`.

pub mod builder;
pub mod error;
pub mod params;
pub mod persist;
pub mod staleness;
pub mod store;
pub mod types;

// Re-export key types
pub use builder::GraphBuilder;
pub use error::{GraphError, Result};
pub use persist::{export, import, Workflow};
pub use staleness::StalenessPass;
pub use store::GraphStore;
pub use types::{
    AlgorithmNode, DataType, FilePath, FilterParam, FilterRange, GraphEdge, GraphNode, Handle,
    InputNode, NodeData, NodeId, ParamTree,
};
