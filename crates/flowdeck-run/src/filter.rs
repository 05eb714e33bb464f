//! Node-scoped display filters
//!
//! A display filter re-renders one finished node's outputs under a
//! dimension/ROI restriction without re-running the pipeline. The
//! filter round-trip touches only that node: its draft filter in the
//! graph, its result entry in the session, and nothing else. Pending
//! nodes and the session status are never affected.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use flowdeck_graph::{FilterParam, GraphStore, NodeId};

use crate::backend::RunBackend;
use crate::error::{Result, RunError};
use crate::events::{EventSink, RunEvent};
use crate::session::{NodeResult, RunSession};

/// Lifecycle of one filter request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStatus {
    /// The backend call is in flight
    Pending,
    /// Applied and committed
    Done,
    /// The backend rejected it; the draft filter is retained for retry
    Failed,
}

/// Applies and resets display filters against the active run
///
/// Shares the graph, backend, and session with the `RunCoordinator`
/// that created it.
pub struct FilterRunCoordinator {
    graph: Arc<RwLock<GraphStore>>,
    backend: Arc<dyn RunBackend>,
    events: Arc<dyn EventSink>,
    session: Arc<RwLock<Option<RunSession>>>,
    requests: RwLock<HashMap<NodeId, FilterStatus>>,
}

impl FilterRunCoordinator {
    pub(crate) fn new(
        graph: Arc<RwLock<GraphStore>>,
        backend: Arc<dyn RunBackend>,
        events: Arc<dyn EventSink>,
        session: Arc<RwLock<Option<RunSession>>>,
    ) -> Self {
        Self {
            graph,
            backend,
            events,
            session,
            requests: RwLock::new(HashMap::new()),
        }
    }

    /// Apply a display filter to one node's outputs
    pub async fn apply_filter(&self, node_id: &str, filter: FilterParam) -> Result<()> {
        self.execute(node_id, Some(filter)).await
    }

    /// Restore one node's unfiltered outputs
    pub async fn reset_filter(&self, node_id: &str) -> Result<()> {
        self.execute(node_id, None).await
    }

    /// The state of the last filter request for a node, if any
    pub async fn status(&self, node_id: &str) -> Option<FilterStatus> {
        self.requests.read().await.get(node_id).copied()
    }

    async fn execute(&self, node_id: &str, filter: Option<FilterParam>) -> Result<()> {
        let uid = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.uid.clone())
            .ok_or(RunError::NoActiveRun)?;

        // Stage the draft first so a failure leaves it in place for retry
        self.graph
            .write()
            .await
            .update_filter_param(node_id, filter.clone())?;
        self.requests
            .write()
            .await
            .insert(node_id.to_string(), FilterStatus::Pending);

        let response = match self.backend.filter(&uid, node_id, filter.as_ref()).await {
            Ok(response) => response,
            Err(err) => {
                self.requests
                    .write()
                    .await
                    .insert(node_id.to_string(), FilterStatus::Failed);
                log::warn!("filter request for node {node_id} failed: {err}");
                return Err(err);
            }
        };

        // Swap in the refreshed outputs for this node only
        {
            let mut guard = self.session.write().await;
            if let Some(session) = guard.as_mut() {
                let entry = session
                    .results
                    .entry(node_id.to_string())
                    .or_insert_with(|| NodeResult::success(Vec::new()));
                entry.output_refs = response.output_refs;
            }
        }
        self.graph.write().await.commit_filter(node_id)?;
        self.requests
            .write()
            .await
            .insert(node_id.to_string(), FilterStatus::Done);

        log::debug!("filter committed for node {node_id}");
        if let Err(err) = self.events.send(RunEvent::FilterApplied {
            uid,
            node_id: node_id.to_string(),
        }) {
            log::warn!("dropping run event: {err}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FilterResponse;
    use crate::events::VecEventSink;
    use crate::mock::MockBackend;
    use crate::session::{OutputRef, RunStatus};
    use flowdeck_graph::{DataType, FilterRange, GraphBuilder};

    fn roi_filter() -> FilterParam {
        FilterParam {
            roi: vec![FilterRange { start: 0, end: 10 }],
            ..Default::default()
        }
    }

    struct Fixture {
        filters: FilterRunCoordinator,
        backend: Arc<MockBackend>,
        events: Arc<VecEventSink>,
        graph: Arc<RwLock<GraphStore>>,
        session: Arc<RwLock<Option<RunSession>>>,
    }

    fn fixture(backend: MockBackend, session: Option<RunSession>) -> Fixture {
        let store = GraphBuilder::new()
            .add_input("img", DataType::Image, (0.0, 0.0))
            .add_algorithm("roi", "suite2p.roi", "ROI Detection", (100.0, 0.0))
            .connect("img", "out", "roi", "in", DataType::Image)
            .build()
            .unwrap();
        let graph = Arc::new(RwLock::new(store));
        let backend = Arc::new(backend);
        let events = Arc::new(VecEventSink::new());
        let session = Arc::new(RwLock::new(session));
        let filters = FilterRunCoordinator::new(
            Arc::clone(&graph),
            Arc::clone(&backend) as Arc<dyn RunBackend>,
            Arc::clone(&events) as Arc<dyn EventSink>,
            Arc::clone(&session),
        );
        Fixture {
            filters,
            backend,
            events,
            graph,
            session,
        }
    }

    fn finished_session() -> RunSession {
        let mut session = RunSession::new("run-001", 1, Default::default());
        session.status = RunStatus::Finished;
        session.results.insert(
            "roi".to_string(),
            NodeResult::success(vec![OutputRef {
                data_type: DataType::Fluorescence,
                path: "outputs/roi/full.npy".to_string(),
            }]),
        );
        session
    }

    #[tokio::test]
    async fn test_apply_filter_updates_one_node() {
        let backend = MockBackend::new();
        backend.push_filter(Ok(FilterResponse {
            output_refs: vec![OutputRef {
                data_type: DataType::Fluorescence,
                path: "outputs/roi/filtered.npy".to_string(),
            }],
        }));
        let fx = fixture(backend, Some(finished_session()));

        fx.filters.apply_filter("roi", roi_filter()).await.unwrap();

        let session = fx.session.read().await;
        let session = session.as_ref().unwrap();
        assert_eq!(session.status, RunStatus::Finished);
        assert_eq!(
            session.results["roi"].output_refs[0].path,
            "outputs/roi/filtered.npy"
        );
        drop(session);

        // The draft was committed on the node itself
        let graph = fx.graph.read().await;
        let algo = graph.find_node("roi").unwrap().data.as_algorithm().unwrap();
        assert_eq!(algo.data_filter, Some(roi_filter()));
        assert!(algo.draft_data_filter.is_none() || algo.draft_data_filter == algo.data_filter);
        assert!(!algo.is_update_filter);
        drop(graph);

        assert_eq!(fx.filters.status("roi").await, Some(FilterStatus::Done));
        assert_eq!(fx.backend.calls(), vec!["filter:run-001:roi:apply"]);
        assert!(fx
            .events
            .events()
            .iter()
            .any(|e| matches!(e, RunEvent::FilterApplied { node_id, .. } if node_id == "roi")));
    }

    #[tokio::test]
    async fn test_failed_filter_retains_draft() {
        let backend = MockBackend::new();
        backend.push_filter(Err(RunError::Filter("shape mismatch".to_string())));
        let fx = fixture(backend, Some(finished_session()));

        assert!(fx.filters.apply_filter("roi", roi_filter()).await.is_err());
        assert_eq!(fx.filters.status("roi").await, Some(FilterStatus::Failed));

        // The draft stays staged for a retry; nothing was committed
        let graph = fx.graph.read().await;
        let algo = graph.find_node("roi").unwrap().data.as_algorithm().unwrap();
        assert_eq!(algo.draft_data_filter, Some(roi_filter()));
        assert!(algo.data_filter.is_none());
        drop(graph);

        let session = fx.session.read().await;
        assert_eq!(
            session.as_ref().unwrap().results["roi"].output_refs[0].path,
            "outputs/roi/full.npy"
        );
        assert!(fx.events.events().is_empty());
    }

    #[tokio::test]
    async fn test_reset_filter_restores_unfiltered_output() {
        let backend = MockBackend::new();
        backend.push_filter(Ok(FilterResponse {
            output_refs: vec![OutputRef {
                data_type: DataType::Fluorescence,
                path: "outputs/roi/full.npy".to_string(),
            }],
        }));
        let fx = fixture(backend, Some(finished_session()));
        {
            let mut graph = fx.graph.write().await;
            graph.update_filter_param("roi", Some(roi_filter())).unwrap();
            graph.commit_filter("roi").unwrap();
        }

        fx.filters.reset_filter("roi").await.unwrap();

        let graph = fx.graph.read().await;
        let algo = graph.find_node("roi").unwrap().data.as_algorithm().unwrap();
        assert!(algo.data_filter.is_none());
        drop(graph);
        assert_eq!(fx.backend.calls(), vec!["filter:run-001:roi:reset"]);
    }

    #[tokio::test]
    async fn test_filter_requires_a_session() {
        let fx = fixture(MockBackend::new(), None);
        assert!(matches!(
            fx.filters.apply_filter("roi", roi_filter()).await,
            Err(RunError::NoActiveRun)
        ));
        assert!(fx.backend.calls().is_empty());
    }
}
