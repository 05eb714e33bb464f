//! Flowdeck Run - remote execution orchestration
//!
//! This crate drives pipeline graphs built with `flowdeck-graph`
//! against a remote compute backend:
//!
//! - `RunCoordinator` submits the graph, merges poll results, and
//!   commits finished nodes back into the graph
//! - `FilterRunCoordinator` applies node-scoped display filters
//! - `RunBackend` abstracts the transport; `HttpBackend` is the
//!   reqwest implementation
//! - `EventSink` streams lifecycle events to the hosting UI
//!
//! All state transitions are generation-guarded so responses from a
//! superseded run can never corrupt the session that replaced it.

pub mod backend;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod filter;
pub mod http;
pub mod session;

#[cfg(test)]
pub(crate) mod mock;

// Re-export key types
pub use backend::{FilterResponse, PollResponse, RunBackend, SubmitAck, SubmitPayload};
pub use coordinator::{PollConfig, PollOutcome, RunCoordinator};
pub use error::{Result, RunError};
pub use events::{EventError, EventSink, NullEventSink, RunEvent, VecEventSink};
pub use filter::{FilterRunCoordinator, FilterStatus};
pub use http::{BackendConfig, HttpBackend};
pub use session::{NodeResult, NodeResultStatus, OutputRef, RunSession, RunStatus};
