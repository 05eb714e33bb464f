//! Per-node parameter operations
//!
//! Parameter edits flow through the store so dirty flags are
//! recomputed on every write. A node is "dirty" (`is_update`) when its
//! current tree differs structurally from the tree used by its last
//! committed run; comparison is order-insensitive at the object level.

use crate::error::{GraphError, Result};
use crate::store::GraphStore;
use crate::types::{FilePath, FilterParam, NodeData, NodeId};

impl GraphStore {
    /// Write `value` at a dotted `path` inside an algorithm node's
    /// parameter tree and recompute its dirty flag
    ///
    /// Intermediate path segments must already exist as objects;
    /// the leaf key is created if absent.
    pub fn update_param(
        &mut self,
        node_id: &str,
        path: &str,
        value: serde_json::Value,
    ) -> Result<()> {
        let node = self
            .find_node_mut(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.to_string()))?;
        let algo = node
            .data
            .as_algorithm_mut()
            .ok_or_else(|| GraphError::NotAnAlgorithmNode(node_id.to_string()))?;

        let invalid = || GraphError::InvalidParamPath {
            node_id: node_id.to_string(),
            path: path.to_string(),
        };

        let mut segments = path.split('.').collect::<Vec<_>>();
        let leaf = segments.pop().ok_or_else(invalid)?;
        if leaf.is_empty() {
            return Err(invalid());
        }

        let mut tree = &mut algo.params;
        for segment in segments {
            tree = tree
                .get_mut(segment)
                .and_then(|v| v.as_object_mut())
                .ok_or_else(invalid)?;
        }
        tree.insert(leaf.to_string(), value);

        algo.recompute_update();
        log::debug!(
            "update_param: {}.{} -> is_update={}",
            node_id,
            path,
            algo.is_update
        );
        Ok(())
    }

    /// Read the value at a dotted `path` inside an algorithm node's tree
    pub fn get_param(&self, node_id: &str, path: &str) -> Option<&serde_json::Value> {
        let algo = self.find_node(node_id)?.data.as_algorithm()?;
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut value = algo.params.get(first)?;
        for segment in segments {
            value = value.as_object()?.get(segment)?;
        }
        Some(value)
    }

    /// Set the draft display filter on an algorithm node and recompute
    /// its filter dirty flag
    pub fn update_filter_param(
        &mut self,
        node_id: &str,
        filter: Option<FilterParam>,
    ) -> Result<()> {
        let node = self
            .find_node_mut(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.to_string()))?;
        let algo = node
            .data
            .as_algorithm_mut()
            .ok_or_else(|| GraphError::NotAnAlgorithmNode(node_id.to_string()))?;
        algo.draft_data_filter = filter;
        algo.recompute_filter_update();
        Ok(())
    }

    /// Commit the given nodes after a run reported success for them
    ///
    /// Sets each node's baseline to its current parameters and clears
    /// its dirty flag. Non-algorithm and unknown nodes are skipped;
    /// a poll result for a since-deleted node must not fail the merge.
    pub fn commit(&mut self, node_ids: &[NodeId]) {
        for id in node_ids {
            if let Some(node) = self.find_node_mut(id) {
                if let Some(algo) = node.data.as_algorithm_mut() {
                    algo.commit_params();
                    log::debug!("commit: {} baseline advanced", id);
                }
            }
        }
    }

    /// Commit an algorithm node's draft display filter
    pub fn commit_filter(&mut self, node_id: &str) -> Result<()> {
        let node = self
            .find_node_mut(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.to_string()))?;
        let algo = node
            .data
            .as_algorithm_mut()
            .ok_or_else(|| GraphError::NotAnAlgorithmNode(node_id.to_string()))?;
        algo.commit_filter();
        Ok(())
    }

    /// Set the selected file path(s) on an input node
    pub fn set_input_path(&mut self, node_id: &str, path: Option<FilePath>) -> Result<()> {
        let node = self
            .find_node_mut(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.to_string()))?;
        match &mut node.data {
            NodeData::Input(input) => {
                input.path = path;
                Ok(())
            }
            NodeData::Algorithm(_) => Err(GraphError::NotAnInputNode(node_id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlgorithmNode, DataType, FilterRange, InputNode, ParamTree};

    fn store_with_algo(id: &str, params: serde_json::Value) -> GraphStore {
        let mut store = GraphStore::new();
        let tree = params.as_object().cloned().unwrap_or_default();
        store.add_node_with_id(
            id,
            NodeData::Algorithm(AlgorithmNode::new("pkg.algo", "Algo", tree)),
            (0.0, 0.0),
        );
        store
    }

    #[test]
    fn test_update_param_marks_dirty() {
        let mut store = store_with_algo("n1", serde_json::json!({"threshold": 0.5}));
        store
            .update_param("n1", "threshold", serde_json::json!(0.8))
            .unwrap();
        assert!(store.find_node("n1").unwrap().data.is_update());
    }

    #[test]
    fn test_update_param_back_to_original_clears_dirty() {
        let mut store = store_with_algo("n1", serde_json::json!({"threshold": 0.5}));
        store
            .update_param("n1", "threshold", serde_json::json!(0.8))
            .unwrap();
        store
            .update_param("n1", "threshold", serde_json::json!(0.5))
            .unwrap();
        assert!(!store.find_node("n1").unwrap().data.is_update());
    }

    #[test]
    fn test_update_param_nested_path() {
        let mut store = store_with_algo(
            "n1",
            serde_json::json!({"detect": {"threshold": 0.5, "min_size": 3}}),
        );
        store
            .update_param("n1", "detect.threshold", serde_json::json!(0.9))
            .unwrap();
        assert_eq!(
            store.get_param("n1", "detect.threshold"),
            Some(&serde_json::json!(0.9))
        );
        assert_eq!(
            store.get_param("n1", "detect.min_size"),
            Some(&serde_json::json!(3))
        );
        assert!(store.find_node("n1").unwrap().data.is_update());
    }

    #[test]
    fn test_update_param_invalid_intermediate() {
        let mut store = store_with_algo("n1", serde_json::json!({"threshold": 0.5}));
        let err = store
            .update_param("n1", "missing.leaf", serde_json::json!(1))
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidParamPath { .. }));
    }

    #[test]
    fn test_update_param_rejects_input_node() {
        let mut store = GraphStore::new();
        store.add_node_with_id(
            "in1",
            NodeData::Input(InputNode {
                file_type: DataType::Image,
                path: None,
                param: ParamTree::new(),
            }),
            (0.0, 0.0),
        );
        let err = store
            .update_param("in1", "x", serde_json::json!(1))
            .unwrap_err();
        assert!(matches!(err, GraphError::NotAnAlgorithmNode(_)));
    }

    #[test]
    fn test_commit_clears_dirty() {
        let mut store = store_with_algo("n1", serde_json::json!({"threshold": 0.5}));
        store
            .update_param("n1", "threshold", serde_json::json!(0.8))
            .unwrap();
        store.commit(&["n1".to_string()]);
        assert!(!store.find_node("n1").unwrap().data.is_update());
        // Committing an unknown node is a no-op, not an error
        store.commit(&["ghost".to_string()]);
    }

    #[test]
    fn test_filter_draft_and_commit() {
        let mut store = store_with_algo("n1", serde_json::json!({}));
        let filter = FilterParam {
            roi: vec![FilterRange { start: 0, end: 10 }],
            ..Default::default()
        };
        store
            .update_filter_param("n1", Some(filter.clone()))
            .unwrap();
        let algo = store.find_node("n1").unwrap().data.as_algorithm().unwrap();
        assert!(algo.is_update_filter);
        assert_eq!(algo.data_filter, None);

        store.commit_filter("n1").unwrap();
        let algo = store.find_node("n1").unwrap().data.as_algorithm().unwrap();
        assert!(!algo.is_update_filter);
        assert_eq!(algo.data_filter, Some(filter));
    }

    #[test]
    fn test_set_input_path() {
        let mut store = GraphStore::new();
        store.add_node_with_id(
            "in1",
            NodeData::Input(InputNode {
                file_type: DataType::Image,
                path: None,
                param: ParamTree::new(),
            }),
            (0.0, 0.0),
        );
        store
            .set_input_path("in1", Some(FilePath::Single("/data/rec.tiff".into())))
            .unwrap();
        match &store.find_node("in1").unwrap().data {
            NodeData::Input(input) => {
                assert_eq!(input.path, Some(FilePath::Single("/data/rec.tiff".into())));
            }
            NodeData::Algorithm(_) => panic!("expected input node"),
        }
    }
}
