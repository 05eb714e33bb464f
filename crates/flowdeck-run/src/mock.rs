//! Scripted backend for orchestration tests
//!
//! Responses are queued per endpoint and popped in order; an empty
//! queue yields a benign default so tests only script what they assert
//! on. Every call is recorded for interaction checks, and `poll_delay`
//! lets a test hold a poll in flight long enough to race it against a
//! second submit.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use flowdeck_graph::{FilterParam, NodeId};

use crate::backend::{FilterResponse, PollResponse, RunBackend, SubmitAck, SubmitPayload};
use crate::error::Result;

pub(crate) struct MockBackend {
    submits: Mutex<VecDeque<Result<SubmitAck>>>,
    polls: Mutex<VecDeque<Result<PollResponse>>>,
    filters: Mutex<VecDeque<Result<FilterResponse>>>,
    cancels: Mutex<VecDeque<Result<()>>>,
    calls: Mutex<Vec<String>>,
    poll_delay: Mutex<Option<Duration>>,
    uid_counter: AtomicU64,
}

impl MockBackend {
    pub(crate) fn new() -> Self {
        Self {
            submits: Mutex::new(VecDeque::new()),
            polls: Mutex::new(VecDeque::new()),
            filters: Mutex::new(VecDeque::new()),
            cancels: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            poll_delay: Mutex::new(None),
            uid_counter: AtomicU64::new(0),
        }
    }

    pub(crate) fn push_submit(&self, result: Result<SubmitAck>) {
        self.submits.lock().unwrap().push_back(result);
    }

    pub(crate) fn push_poll(&self, result: Result<PollResponse>) {
        self.polls.lock().unwrap().push_back(result);
    }

    pub(crate) fn push_filter(&self, result: Result<FilterResponse>) {
        self.filters.lock().unwrap().push_back(result);
    }

    pub(crate) fn push_cancel(&self, result: Result<()>) {
        self.cancels.lock().unwrap().push_back(result);
    }

    pub(crate) fn set_poll_delay(&self, delay: Duration) {
        *self.poll_delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn next_uid(&self) -> String {
        let n = self.uid_counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("run-{n:03}")
    }
}

#[async_trait]
impl RunBackend for MockBackend {
    async fn submit(&self, _payload: &SubmitPayload) -> Result<SubmitAck> {
        self.record("submit");
        match self.submits.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(SubmitAck {
                uid: self.next_uid(),
            }),
        }
    }

    async fn resubmit(&self, uid: &str, _payload: &SubmitPayload) -> Result<SubmitAck> {
        self.record(format!("resubmit:{uid}"));
        match self.submits.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(SubmitAck {
                uid: uid.to_string(),
            }),
        }
    }

    async fn poll(&self, uid: &str, pending: &[NodeId]) -> Result<PollResponse> {
        self.record(format!("poll:{uid}:{}", pending.join(",")));
        let delay = *self.poll_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.polls.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(PollResponse::default()),
        }
    }

    async fn cancel(&self, uid: &str) -> Result<()> {
        self.record(format!("cancel:{uid}"));
        self.cancels.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn filter(
        &self,
        uid: &str,
        node_id: &str,
        filter: Option<&FilterParam>,
    ) -> Result<FilterResponse> {
        let kind = if filter.is_some() { "apply" } else { "reset" };
        self.record(format!("filter:{uid}:{node_id}:{kind}"));
        match self.filters.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(FilterResponse::default()),
        }
    }
}
