//! Staleness resolution
//!
//! A node is stale when its own parameters are dirty or any ancestor's
//! are. The closure is evaluated iteratively with a per-pass memo so
//! diamond-shaped graphs stay O(V+E) instead of exponential. A pass
//! borrows the store immutably, so the memo can never survive an edit.

use std::collections::{HashMap, HashSet};

use crate::store::GraphStore;
use crate::types::{NodeData, NodeId};

/// One memoized staleness evaluation over an unchanging graph
///
/// Construct a fresh pass after any parameter or edge mutation; the
/// borrow checker enforces that the memo cannot outlive one.
pub struct StalenessPass<'a> {
    store: &'a GraphStore,
    memo: HashMap<NodeId, bool>,
}

impl<'a> StalenessPass<'a> {
    /// Start a pass over the given store
    pub fn new(store: &'a GraphStore) -> Self {
        Self {
            store,
            memo: HashMap::new(),
        }
    }

    /// True if the node or any of its ancestors is dirty relative to
    /// the last committed run
    ///
    /// Unknown node IDs resolve to `false`.
    pub fn is_stale(&mut self, node_id: &str) -> bool {
        if let Some(&known) = self.memo.get(node_id) {
            return known;
        }

        // Two-phase iterative DFS: expand dependencies first, then
        // resolve from the memoized results.
        let mut stack: Vec<(NodeId, bool)> = vec![(node_id.to_string(), false)];
        while let Some((current, expanded)) = stack.pop() {
            if self.memo.contains_key(&current) {
                continue;
            }
            if !expanded {
                if self.is_dirty(&current) {
                    self.memo.insert(current, true);
                    continue;
                }
                stack.push((current.clone(), true));
                for dep in self.store.dependencies(&current) {
                    if !self.memo.contains_key(&dep) {
                        stack.push((dep, false));
                    }
                }
            } else {
                let stale = self
                    .store
                    .dependencies(&current)
                    .iter()
                    .any(|dep| self.memo.get(dep).copied().unwrap_or(false));
                self.memo.insert(current, stale);
            }
        }

        self.memo.get(node_id).copied().unwrap_or(false)
    }

    /// All stale algorithm nodes
    ///
    /// This is the set of nodes a submit expects results for: every
    /// forced node plus everything transitively downstream of one.
    pub fn stale_set(&mut self) -> HashSet<NodeId> {
        self.store
            .algorithm_node_ids()
            .into_iter()
            .filter(|id| self.is_stale(id))
            .collect()
    }

    fn is_dirty(&self, node_id: &str) -> bool {
        self.store
            .find_node(node_id)
            .map(|n| match &n.data {
                NodeData::Algorithm(algo) => algo.is_update,
                NodeData::Input(_) => false,
            })
            .unwrap_or(false)
    }
}
