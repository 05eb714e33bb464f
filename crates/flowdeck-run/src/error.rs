//! Error types for run orchestration
//!
//! The taxonomy separates client-side validation (surfaced before any
//! network call, via `GraphError`) from the four network-facing
//! failure modes: submission, polling, cancellation, and filter
//! requests. Per-node execution failures are not errors at this level;
//! they arrive as `NodeResult` entries inside a poll response.

use thiserror::Error;

use flowdeck_graph::GraphError;

/// Result type alias using RunError
pub type Result<T> = std::result::Result<T, RunError>;

/// Errors that can occur while orchestrating a run
#[derive(Debug, Error)]
pub enum RunError {
    /// No run session exists yet (re-run by uid, cancel, filter)
    #[error("no active run session")]
    NoActiveRun,

    /// Cancel was requested outside StartSuccess/Running
    #[error("run is not in a cancellable state")]
    NotCancellable,

    /// The submit call failed; the session is unchanged
    #[error("submission failed: {0}")]
    Submission(String),

    /// A poll tick failed; transient, retried with backoff
    #[error("poll failed: {0}")]
    Poll(String),

    /// The cancel call failed; the session keeps its pre-cancel status
    #[error("cancel failed: {0}")]
    Cancellation(String),

    /// A node-scoped filter request failed; the draft filter is retained
    #[error("filter request failed: {0}")]
    Filter(String),

    /// Client-side graph validation error
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// HTTP transport error
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
