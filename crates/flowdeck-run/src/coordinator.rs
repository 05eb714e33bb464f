//! Run orchestration
//!
//! `RunCoordinator` owns the lifecycle of remote executions: it builds
//! the submit payload from the shared graph, tracks the active
//! `RunSession`, merges poll responses, and drives the background poll
//! loop. All backend traffic goes through the `RunBackend` trait.
//!
//! Concurrency model: the graph and the session live behind separate
//! `tokio::sync::RwLock`s and are never locked at the same time. A poll
//! snapshots the session, calls the backend without holding any lock,
//! then re-checks the session generation before merging, so a response
//! that raced with a newer submit is discarded rather than corrupting
//! the new session.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use flowdeck_graph::{GraphStore, NodeId, StalenessPass};

use crate::backend::{RunBackend, SubmitPayload};
use crate::error::{Result, RunError};
use crate::events::{EventSink, RunEvent};
use crate::filter::FilterRunCoordinator;
use crate::session::{NodeResultStatus, RunSession, RunStatus};

/// Tuning knobs for the background poll loop
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Base delay between polls
    pub interval: Duration,
    /// Consecutive poll failures before the session is aborted
    pub failure_threshold: u32,
    /// Ceiling for the doubling backoff after a failed poll
    pub max_backoff: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            failure_threshold: 5,
            max_backoff: Duration::from_secs(60),
        }
    }
}

/// What one poll tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Results were merged into the session
    Merged {
        status: RunStatus,
        /// Nodes still awaited after the merge
        remaining: usize,
    },
    /// The response belonged to a superseded or inactive session
    Skipped,
}

/// Orchestrates remote runs over a shared graph
pub struct RunCoordinator {
    graph: Arc<RwLock<GraphStore>>,
    backend: Arc<dyn RunBackend>,
    events: Arc<dyn EventSink>,
    session: Arc<RwLock<Option<RunSession>>>,
    /// Bumped on every acknowledged submit; the stale-response guard
    generation: AtomicU64,
    polling: AtomicBool,
    workspace_id: String,
    config: PollConfig,
}

impl RunCoordinator {
    pub fn new(
        graph: Arc<RwLock<GraphStore>>,
        backend: Arc<dyn RunBackend>,
        events: Arc<dyn EventSink>,
        workspace_id: impl Into<String>,
        config: PollConfig,
    ) -> Self {
        Self {
            graph,
            backend,
            events,
            session: Arc::new(RwLock::new(None)),
            generation: AtomicU64::new(0),
            polling: AtomicBool::new(false),
            workspace_id: workspace_id.into(),
            config,
        }
    }

    /// Submit the current graph for execution
    ///
    /// `name` present starts a fresh run under a new backend uid;
    /// `name` absent re-runs under the existing uid and fails with
    /// `NoActiveRun` when there has never been one. An acknowledged
    /// submit replaces the whole session; a still-active session is
    /// superseded and its late poll responses are discarded by the
    /// generation guard.
    pub async fn submit(&self, name: Option<&str>) -> Result<String> {
        let (payload, pending) = {
            let graph = self.graph.read().await;
            let payload = SubmitPayload::from_graph(&graph, &self.workspace_id, name)?;
            let pending = StalenessPass::new(&graph).stale_set();
            (payload, pending)
        };

        let mut session = self.session.write().await;
        let prev_uid = session.as_ref().map(|s| s.uid.clone());
        if name.is_none() && prev_uid.is_none() {
            return Err(RunError::NoActiveRun);
        }
        if let Some(active) = session.as_ref() {
            if active.status.is_active() {
                log::warn!("superseding active run {} with a new submit", active.uid);
            }
        }

        let prev_status = session.as_ref().map(|s| s.status);
        if let Some(s) = session.as_mut() {
            s.status = RunStatus::Submitting;
        }

        let ack = match name {
            Some(_) => self.backend.submit(&payload).await,
            // prev_uid is Some here, checked above
            None => match prev_uid {
                Some(uid) => self.backend.resubmit(&uid, &payload).await,
                None => Err(RunError::NoActiveRun),
            },
        };
        let ack = match ack {
            Ok(ack) => ack,
            Err(err) => {
                if let (Some(s), Some(status)) = (session.as_mut(), prev_status) {
                    s.status = status;
                }
                return Err(err);
            }
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *session = Some(RunSession::new(&ack.uid, generation, pending.clone()));
        drop(session);

        log::info!(
            "run {} started: generation={generation}, {} pending nodes",
            ack.uid,
            pending.len()
        );
        let mut pending: Vec<NodeId> = pending.into_iter().collect();
        pending.sort();
        self.emit(RunEvent::RunStarted {
            uid: ack.uid.clone(),
            pending,
        });
        Ok(ack.uid)
    }

    /// Fetch and merge one round of results
    ///
    /// Returns `Skipped` without touching anything when there is no
    /// active session, or when a newer submit replaced the session
    /// while the backend call was in flight.
    pub async fn poll_once(&self) -> Result<PollOutcome> {
        let snapshot = {
            let session = self.session.read().await;
            match session.as_ref() {
                Some(s) if s.status.is_active() => {
                    let mut pending: Vec<NodeId> = s.pending.iter().cloned().collect();
                    pending.sort();
                    Some((s.uid.clone(), s.generation, pending))
                }
                _ => None,
            }
        };
        let Some((uid, generation, pending)) = snapshot else {
            return Ok(PollOutcome::Skipped);
        };

        let response = self.backend.poll(&uid, &pending).await?;

        let mut guard = self.session.write().await;
        let Some(session) = guard.as_mut() else {
            return Ok(PollOutcome::Skipped);
        };
        if session.generation != generation || !session.status.is_active() {
            log::debug!("discarding poll response for superseded run {uid}");
            return Ok(PollOutcome::Skipped);
        }

        let mut finished: Vec<NodeId> = Vec::new();
        let mut failure: Option<(NodeId, String)> = None;
        for (node_id, result) in response.node_results {
            // Nodes this session never asked about are ignored
            if !session.pending.contains(&node_id) {
                continue;
            }
            if result.status.is_terminal() {
                session.pending.remove(&node_id);
            }
            match result.status {
                NodeResultStatus::Success => finished.push(node_id.clone()),
                NodeResultStatus::Error => {
                    let message = result
                        .message
                        .clone()
                        .unwrap_or_else(|| "node execution failed".to_string());
                    failure.get_or_insert((node_id.clone(), message));
                }
                NodeResultStatus::Running => {}
            }
            session.results.insert(node_id, result);
        }

        let status = if failure.is_some() {
            RunStatus::Aborted
        } else if session.pending.is_empty() {
            RunStatus::Finished
        } else {
            RunStatus::Running
        };
        session.status = status;
        let remaining = session.pending.len();
        drop(guard);

        // Successful nodes are now in sync with the backend, so their
        // parameter baselines advance.
        finished.sort();
        if !finished.is_empty() {
            self.graph.write().await.commit(&finished);
        }

        for node_id in &finished {
            self.emit(RunEvent::NodeFinished {
                uid: uid.clone(),
                node_id: node_id.clone(),
            });
        }
        if let Some((node_id, error)) = &failure {
            self.emit(RunEvent::NodeFailed {
                uid: uid.clone(),
                node_id: node_id.clone(),
                error: error.clone(),
            });
        }
        match status {
            RunStatus::Finished => self.emit(RunEvent::RunFinished { uid }),
            RunStatus::Aborted => {
                let error = failure.map(|(_, m)| m).unwrap_or_default();
                self.emit(RunEvent::RunAborted { uid, error });
            }
            _ => {}
        }

        Ok(PollOutcome::Merged { status, remaining })
    }

    /// Cancel the active run
    ///
    /// Only `StartSuccess` and `Running` sessions are cancellable; the
    /// session keeps its status if the backend call fails.
    pub async fn cancel(&self) -> Result<()> {
        let (uid, generation) = {
            let session = self.session.read().await;
            match session.as_ref() {
                None => return Err(RunError::NoActiveRun),
                Some(s) if !s.status.is_active() => return Err(RunError::NotCancellable),
                Some(s) => (s.uid.clone(), s.generation),
            }
        };

        self.backend.cancel(&uid).await?;

        let mut guard = self.session.write().await;
        match guard.as_mut() {
            Some(s) if s.generation == generation && s.status.is_active() => {
                s.status = RunStatus::Canceled;
            }
            // A newer submit won the race; its session stands.
            _ => return Ok(()),
        }
        drop(guard);

        self.stop_polling();
        log::info!("run {uid} canceled");
        self.emit(RunEvent::RunCanceled { uid });
        Ok(())
    }

    /// Start the background poll loop
    ///
    /// Idempotent: a second call while the loop is alive does nothing.
    /// The loop exits when the session reaches a terminal state, when
    /// `stop_polling` is called, or after `failure_threshold`
    /// consecutive poll failures (which aborts the session). Each
    /// failure doubles the delay up to `max_backoff`.
    pub fn start_polling(self: &Arc<Self>) {
        if self.polling.swap(true, Ordering::SeqCst) {
            return;
        }
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let mut delay = coordinator.config.interval;
            let mut consecutive_failures = 0u32;
            loop {
                tokio::time::sleep(delay).await;
                if !coordinator.polling.load(Ordering::SeqCst) {
                    break;
                }
                match coordinator.poll_once().await {
                    Ok(PollOutcome::Merged { status, remaining }) => {
                        consecutive_failures = 0;
                        delay = coordinator.config.interval;
                        log::debug!("poll merged: status={status:?}, {remaining} remaining");
                        if status.is_terminal() {
                            break;
                        }
                    }
                    Ok(PollOutcome::Skipped) => {
                        // A newer submit may own the session now; keep
                        // the loop alive and poll it next tick.
                        consecutive_failures = 0;
                        delay = coordinator.config.interval;
                    }
                    Err(err) => {
                        consecutive_failures += 1;
                        log::warn!(
                            "poll failed ({consecutive_failures}/{}): {err}",
                            coordinator.config.failure_threshold
                        );
                        if consecutive_failures >= coordinator.config.failure_threshold {
                            coordinator
                                .mark_aborted(format!("polling gave up: {err}"))
                                .await;
                            break;
                        }
                        delay = (delay * 2).min(coordinator.config.max_backoff);
                    }
                }
            }
            coordinator.polling.store(false, Ordering::SeqCst);
        });
    }

    /// Signal the background poll loop to exit
    pub fn stop_polling(&self) {
        self.polling.store(false, Ordering::SeqCst);
    }

    /// The current session status, `Idle` before the first submit
    pub async fn status(&self) -> RunStatus {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.status)
            .unwrap_or(RunStatus::Idle)
    }

    /// A snapshot of the current session
    pub async fn session(&self) -> Option<RunSession> {
        self.session.read().await.clone()
    }

    /// A filter coordinator sharing this coordinator's graph, backend,
    /// and session
    pub fn filter_coordinator(&self) -> FilterRunCoordinator {
        FilterRunCoordinator::new(
            Arc::clone(&self.graph),
            Arc::clone(&self.backend),
            Arc::clone(&self.events),
            Arc::clone(&self.session),
        )
    }

    /// Abort the active session, typically after exhausted polling
    async fn mark_aborted(&self, error: String) {
        let uid = {
            let mut guard = self.session.write().await;
            match guard.as_mut() {
                Some(s) if s.status.is_active() => {
                    s.status = RunStatus::Aborted;
                    Some(s.uid.clone())
                }
                _ => None,
            }
        };
        if let Some(uid) = uid {
            log::error!("run {uid} aborted: {error}");
            self.emit(RunEvent::RunAborted { uid, error });
        }
    }

    fn emit(&self, event: RunEvent) {
        if let Err(err) = self.events.send(event) {
            log::warn!("dropping run event: {err}");
        }
    }
}
