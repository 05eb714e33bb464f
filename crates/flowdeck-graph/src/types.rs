//! Core types for pipeline graphs
//!
//! These types define the structure of a data-processing pipeline,
//! including nodes (file inputs and algorithm steps), edges, typed
//! handles, and per-node parameter trees.

use serde::{Deserialize, Serialize};

/// Unique identifier for a node
pub type NodeId = String;

/// Unique identifier for an edge
pub type EdgeId = String;

/// Unique identifier for a handle on a node
pub type HandleId = String;

/// A parameter tree: nested key/value mapping for one node.
///
/// Composite parameters nest as JSON objects. With `preserve_order`
/// enabled, insertion order survives serialization while equality
/// stays order-insensitive, which is exactly what dirty detection
/// needs.
pub type ParamTree = serde_json::Map<String, serde_json::Value>;

/// The data type declared on a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Accepts any type
    Any,
    /// Raw imaging stack
    Image,
    /// Fluorescence traces
    Fluorescence,
    /// Behavioral time course
    Behavior,
    /// Generic time series
    TimeSeries,
    /// Cell classification table
    IscellData,
    /// Region-of-interest masks
    Roi,
    /// Scatter output
    Scatter,
    /// Bar output
    Bar,
    /// Heatmap output
    Heatmap,
    /// Rendered HTML output
    Html,
    /// MATLAB data file
    Matlab,
    /// Microscope vendor file
    Microscope,
    /// Delimited table file
    Csv,
    /// HDF5 container file
    Hdf5,
}

impl DataType {
    /// Check if this type can connect to another type
    pub fn is_compatible_with(&self, other: &DataType) -> bool {
        // Any type is compatible with everything
        if matches!(self, DataType::Any) || matches!(other, DataType::Any) {
            return true;
        }

        // CSV tables and behavioral time courses interchange
        if matches!(self, DataType::Csv) && matches!(other, DataType::Behavior) {
            return true;
        }
        if matches!(self, DataType::Behavior) && matches!(other, DataType::Csv) {
            return true;
        }

        // Exact type match
        self == other
    }
}

/// Selected file path(s) for an input node
///
/// Some input kinds take a single file, others (e.g. multi-plane
/// recordings) take a list. The wire format is a bare string or array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilePath {
    /// A single file
    Single(String),
    /// An ordered list of files
    Many(Vec<String>),
}

/// A half-open range used by display filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRange {
    pub start: u64,
    pub end: u64,
}

/// A node-scoped display filter
///
/// Narrows the visualized output (frame window, ROI subset) without
/// representing a full pipeline parameter change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterParam {
    /// Ranges along the first (time) dimension
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dim1: Vec<FilterRange>,
    /// ROI index ranges
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roi: Vec<FilterRange>,
}

impl FilterParam {
    /// True if the filter selects nothing (equivalent to no filter)
    pub fn is_empty(&self) -> bool {
        self.dim1.is_empty() && self.roi.is_empty()
    }
}

/// A file-input node: provides data loaded from disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputNode {
    /// Data type produced by this input
    pub file_type: DataType,
    /// Selected file path(s), if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<FilePath>,
    /// Load parameters (e.g. sampling rate)
    #[serde(default)]
    pub param: ParamTree,
}

/// An algorithm node: one remote-executed processing step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgorithmNode {
    /// Dotted path identifying the backend function
    pub function_path: String,
    /// Human-readable label
    pub label: String,
    /// Current parameter tree
    #[serde(default)]
    pub params: ParamTree,
    /// Parameters as of the last committed run (not persisted)
    #[serde(skip)]
    pub original_params: ParamTree,
    /// Committed display filter
    #[serde(
        rename = "dataFilterParam",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub data_filter: Option<FilterParam>,
    /// Uncommitted display filter edit (not persisted)
    #[serde(skip)]
    pub draft_data_filter: Option<FilterParam>,
    /// Whether `params` differs from `original_params`
    #[serde(skip)]
    pub is_update: bool,
    /// Whether the draft filter differs from the committed one
    #[serde(skip)]
    pub is_update_filter: bool,
}

impl AlgorithmNode {
    /// Create a clean algorithm node with the given parameters
    pub fn new(
        function_path: impl Into<String>,
        label: impl Into<String>,
        params: ParamTree,
    ) -> Self {
        Self {
            function_path: function_path.into(),
            label: label.into(),
            original_params: params.clone(),
            params,
            data_filter: None,
            draft_data_filter: None,
            is_update: false,
            is_update_filter: false,
        }
    }

    /// Recompute `is_update` from structural comparison with the
    /// last committed parameters
    pub fn recompute_update(&mut self) {
        self.is_update = self.params != self.original_params;
    }

    /// Recompute `is_update_filter` from the draft/committed pair
    ///
    /// An empty draft and an absent committed filter are considered
    /// equivalent so a reset of a never-filtered node stays clean.
    pub fn recompute_filter_update(&mut self) {
        let draft_empty = self
            .draft_data_filter
            .as_ref()
            .map(|f| f.is_empty())
            .unwrap_or(true);
        let committed_empty = self
            .data_filter
            .as_ref()
            .map(|f| f.is_empty())
            .unwrap_or(true);
        self.is_update_filter = if draft_empty && committed_empty {
            false
        } else {
            self.draft_data_filter != self.data_filter
        };
    }

    /// Commit the current parameters as the new baseline
    pub fn commit_params(&mut self) {
        self.original_params = self.params.clone();
        self.is_update = false;
    }

    /// Commit the draft display filter
    pub fn commit_filter(&mut self) {
        self.data_filter = self.draft_data_filter.clone();
        self.is_update_filter = false;
    }
}

/// Node payload: a tagged variant over the two node kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeData {
    /// File input step
    Input(InputNode),
    /// Algorithm step
    Algorithm(AlgorithmNode),
}

impl NodeData {
    /// Get the algorithm payload, if this is an algorithm node
    pub fn as_algorithm(&self) -> Option<&AlgorithmNode> {
        match self {
            NodeData::Algorithm(algo) => Some(algo),
            NodeData::Input(_) => None,
        }
    }

    /// Get the algorithm payload mutably, if this is an algorithm node
    pub fn as_algorithm_mut(&mut self) -> Option<&mut AlgorithmNode> {
        match self {
            NodeData::Algorithm(algo) => Some(algo),
            NodeData::Input(_) => None,
        }
    }

    /// Whether this node's parameters differ from its last committed run
    pub fn is_update(&self) -> bool {
        match self {
            NodeData::Algorithm(algo) => algo.is_update,
            NodeData::Input(_) => false,
        }
    }
}

/// A node instance in a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    /// Unique identifier for this node instance
    pub id: NodeId,
    /// Kind-specific payload
    pub data: NodeData,
    /// Position in the UI (x, y)
    pub position: (f64, f64),
}

/// A typed terminal on a node, used to form edges
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handle {
    /// Owning node
    pub node_id: NodeId,
    /// Handle identifier, unique within the node
    pub handle_id: HandleId,
    /// Declared data type
    pub data_type: DataType,
}

impl Handle {
    /// Create a handle
    pub fn new(
        node_id: impl Into<String>,
        handle_id: impl Into<String>,
        data_type: DataType,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            handle_id: handle_id.into(),
            data_type,
        }
    }
}

/// An edge connecting two handles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    /// Unique identifier for this edge
    pub id: EdgeId,
    /// Source node ID
    pub source: NodeId,
    /// Source handle ID
    pub source_handle: HandleId,
    /// Target node ID
    pub target: NodeId,
    /// Target handle ID
    pub target_handle: HandleId,
}
