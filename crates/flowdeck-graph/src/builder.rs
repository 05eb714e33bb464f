//! Fluent builder for pipeline graphs
//!
//! Provides a compact API for constructing graphs programmatically,
//! mainly in tests. Connections are validated when `build` runs, with
//! the same rules as interactive `connect`.

use crate::error::Result;
use crate::store::GraphStore;
use crate::types::{AlgorithmNode, DataType, FilePath, Handle, InputNode, NodeData, ParamTree};

/// Fluent builder for pipeline graphs
///
/// # Example
///
/// ```ignore
/// let store = GraphBuilder::new()
///     .add_input("img", DataType::Image, (0.0, 0.0))
///     .add_algorithm("roi", "suite2p.roi", "ROI Detection", (200.0, 0.0))
///     .connect("img", "out", "roi", "in", DataType::Image)
///     .build()?;
/// ```
#[derive(Default)]
pub struct GraphBuilder {
    nodes: Vec<(String, NodeData, (f64, f64))>,
    connections: Vec<(Handle, Handle)>,
}

impl GraphBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file-input node
    pub fn add_input(
        mut self,
        id: impl Into<String>,
        file_type: DataType,
        position: (f64, f64),
    ) -> Self {
        self.nodes.push((
            id.into(),
            NodeData::Input(InputNode {
                file_type,
                path: None,
                param: ParamTree::new(),
            }),
            position,
        ));
        self
    }

    /// Add an algorithm node
    pub fn add_algorithm(
        mut self,
        id: impl Into<String>,
        function_path: impl Into<String>,
        label: impl Into<String>,
        position: (f64, f64),
    ) -> Self {
        self.nodes.push((
            id.into(),
            NodeData::Algorithm(AlgorithmNode::new(function_path, label, ParamTree::new())),
            position,
        ));
        self
    }

    /// Set the file path on the most recently added node
    ///
    /// Must be called immediately after `add_input`.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        if let Some((_, NodeData::Input(input), _)) = self.nodes.last_mut() {
            input.path = Some(FilePath::Single(path.into()));
        }
        self
    }

    /// Set parameters on the most recently added node
    ///
    /// Must be called immediately after `add_algorithm`; the value
    /// must be a JSON object.
    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        if let Some((_, NodeData::Algorithm(algo), _)) = self.nodes.last_mut() {
            let tree = params.as_object().cloned().unwrap_or_default();
            algo.original_params = tree.clone();
            algo.params = tree;
        }
        self
    }

    /// Queue a connection between two handles of the same declared type
    pub fn connect(
        mut self,
        source: impl Into<String>,
        source_handle: impl Into<String>,
        target: impl Into<String>,
        target_handle: impl Into<String>,
        data_type: DataType,
    ) -> Self {
        self.connections.push((
            Handle::new(source, source_handle, data_type),
            Handle::new(target, target_handle, data_type),
        ));
        self
    }

    /// Build the graph, validating every queued connection
    pub fn build(self) -> Result<GraphStore> {
        let mut store = GraphStore::new();
        for (id, data, position) in self.nodes {
            store.add_node_with_id(id, data, position);
        }
        for (source, target) in &self.connections {
            store.connect(source, target)?;
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;

    #[test]
    fn test_builder_basic() {
        let store = GraphBuilder::new()
            .add_input("img", DataType::Image, (0.0, 0.0))
            .with_path("/data/rec.tiff")
            .add_algorithm("roi", "suite2p.roi", "ROI Detection", (200.0, 0.0))
            .with_params(serde_json::json!({"threshold": 0.5}))
            .connect("img", "out", "roi", "in", DataType::Image)
            .build()
            .unwrap();

        assert_eq!(store.nodes().len(), 2);
        assert_eq!(store.edges().len(), 1);
        let algo = store.find_node("roi").unwrap().data.as_algorithm().unwrap();
        assert_eq!(algo.params["threshold"], serde_json::json!(0.5));
        assert!(!algo.is_update);
    }

    #[test]
    fn test_builder_propagates_connection_errors() {
        let err = GraphBuilder::new()
            .add_algorithm("a", "pkg.a", "A", (0.0, 0.0))
            .add_algorithm("b", "pkg.b", "B", (100.0, 0.0))
            .connect("a", "out", "b", "in", DataType::Fluorescence)
            .connect("b", "out", "a", "in", DataType::Fluorescence)
            .build()
            .unwrap_err();
        assert!(matches!(err, GraphError::CycleDetected));
    }
}
