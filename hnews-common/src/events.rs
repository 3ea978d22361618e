//! Resource change events
//!
//! The store emits one event per successful write; the controller subscribes
//! and turns spec-affecting events into reconciliation cycles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::resource::ResourceKey;

/// Resource change event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResourceEvent {
    /// Resource created
    Created {
        key: ResourceKey,
        timestamp: DateTime<Utc>,
    },

    /// Desired state changed (user edit or defaulting write-back)
    SpecUpdated {
        key: ResourceKey,
        /// Generation after the write
        generation: i64,
        timestamp: DateTime<Utc>,
    },

    /// Observed state overwritten by a reconciliation cycle
    StatusUpdated {
        key: ResourceKey,
        links: usize,
        timestamp: DateTime<Utc>,
    },

    /// Resource deleted
    Deleted {
        key: ResourceKey,
        timestamp: DateTime<Utc>,
    },
}

impl ResourceEvent {
    pub fn key(&self) -> &ResourceKey {
        match self {
            ResourceEvent::Created { key, .. }
            | ResourceEvent::SpecUpdated { key, .. }
            | ResourceEvent::StatusUpdated { key, .. }
            | ResourceEvent::Deleted { key, .. } => key,
        }
    }

    /// Whether the event should start a reconciliation cycle
    ///
    /// Status writes are produced by the controller itself and never retrigger it.
    pub fn triggers_reconcile(&self) -> bool {
        matches!(
            self,
            ResourceEvent::Created { .. } | ResourceEvent::SpecUpdated { .. }
        )
    }
}

/// Broadcast bus for resource events
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ResourceEvent>,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    ///
    /// Slow subscribers that fall more than `capacity` events behind observe
    /// `RecvError::Lagged` and must resynchronize from the store.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ResourceEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::trace!(resource = %e.0.key(), "No subscribers for resource event");
        }
    }
}
