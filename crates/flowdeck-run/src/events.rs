//! Event types for streaming run progress
//!
//! Events are sent from the coordinator to the UI layer (or any
//! consumer) to report session lifecycle changes and per-node results.

use serde::{Deserialize, Serialize};

use flowdeck_graph::NodeId;

/// Trait for sending run events
///
/// This abstracts over the transport mechanism (channel, websocket
/// bridge, etc.) so the coordinator can be used in different hosts.
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be sent (e.g., channel closed)
    fn send(&self, event: RunEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone)]
pub struct EventError {
    pub message: String,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event error: {}", self.message)
    }
}

impl std::error::Error for EventError {}

/// Events emitted while a run session progresses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RunEvent {
    /// A submit was acknowledged by the backend
    #[serde(rename_all = "camelCase")]
    RunStarted { uid: String, pending: Vec<NodeId> },

    /// A node resolved successfully and was committed
    #[serde(rename_all = "camelCase")]
    NodeFinished { uid: String, node_id: NodeId },

    /// A node reported an execution failure
    #[serde(rename_all = "camelCase")]
    NodeFailed {
        uid: String,
        node_id: NodeId,
        error: String,
    },

    /// Every pending node resolved successfully
    #[serde(rename_all = "camelCase")]
    RunFinished { uid: String },

    /// The session ended on an execution failure or exhausted polling
    #[serde(rename_all = "camelCase")]
    RunAborted { uid: String, error: String },

    /// The user canceled the session
    #[serde(rename_all = "camelCase")]
    RunCanceled { uid: String },

    /// A node-scoped display filter was applied or reset
    #[serde(rename_all = "camelCase")]
    FilterApplied { uid: String, node_id: NodeId },
}

/// A no-op event sink that discards all events
///
/// Useful for testing or when events aren't needed.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: RunEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
pub struct VecEventSink {
    events: std::sync::Mutex<Vec<RunEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().expect("event sink poisoned").clone()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        self.events.lock().expect("event sink poisoned").clear();
    }
}

impl Default for VecEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: RunEvent) -> Result<(), EventError> {
        self.events.lock().expect("event sink poisoned").push(event);
        Ok(())
    }
}
