//! EventBus service for engine change notifications.
//!
//! Every state change of an execution is broadcast with a monotonically
//! increasing sequence number. Subscribers that fall behind lose the
//! oldest events; the latest state is always available from the
//! orchestrator's snapshot.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::execution_session::SessionStatus;
use crate::domain::models::{ExecutionMode, ExecutionStatus, MessageType};

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

/// Monotonically increasing sequence number assigned by EventBus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SequenceNumber(pub u64);

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineEvent {
    pub id: EventId,
    pub sequence: SequenceNumber,
    pub timestamp: DateTime<Utc>,
    pub workflow_id: String,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    ExecutionSubmitted {
        name: String,
        mode: ExecutionMode,
        agent_count: usize,
    },
    /// A message was applied; carries the headline figures.
    StateChanged {
        status: SessionStatus,
        completed_steps: usize,
        total_steps: usize,
        overall_progress: u8,
    },
    MessageRejected {
        message_type: MessageType,
        reason: String,
    },
    /// The source closed before `workflow_completed`.
    StreamEnded,
    /// A fallback source took over after the stream ended.
    SourceSwitched {
        mode: ExecutionMode,
    },
    ExecutionFinalized {
        status: ExecutionStatus,
        recorded: bool,
    },
    ExecutionCancelled {
        overall_progress: u8,
    },
}

#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Channel capacity for the broadcast channel.
    pub channel_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
    sequence: AtomicU64,
}

impl EventBus {
    pub fn new(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity);
        Self {
            sender,
            sequence: AtomicU64::new(0),
        }
    }

    /// Publish an event for a workflow and return its sequence number.
    pub fn publish(&self, workflow_id: &str, payload: EventPayload) -> SequenceNumber {
        let sequence = SequenceNumber(self.sequence.fetch_add(1, Ordering::SeqCst));
        let event = EngineEvent {
            id: EventId::new(),
            sequence,
            timestamp: Utc::now(),
            workflow_id: workflow_id.to_string(),
            payload,
        };
        // no subscribers is fine
        let _ = self.sender.send(event);
        sequence
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    pub fn current_sequence(&self) -> SequenceNumber {
        SequenceNumber(self.sequence.load(Ordering::SeqCst))
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EventBusConfig::default())
    }
}
