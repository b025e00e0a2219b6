//! Review triage events and the broadcast bus carrying them

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::review::RowId;

/// Events emitted by submission and enrichment
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum TriageEvent {
    /// A customer submitted a review
    ReviewSubmitted {
        row: RowId,
        rating: u8,
        timestamp: DateTime<Utc>,
    },

    /// A review received its three enrichment fields
    ReviewEnriched {
        row: RowId,
        /// At least one field came from canned fallback text
        used_fallback: bool,
        timestamp: DateTime<Utc>,
    },

    /// A batch started over a snapshot of `total` pending reviews
    BatchStarted { total: usize, timestamp: DateTime<Utc> },

    /// One row of the batch finished (successfully or not)
    BatchProgress {
        processed: usize,
        total: usize,
        row: RowId,
        timestamp: DateTime<Utc>,
    },

    /// The batch finished, was capped, or was cancelled
    BatchCompleted {
        enriched: usize,
        generated: usize,
        fallback: usize,
        skipped: usize,
        failed: usize,
        cancelled: bool,
        timestamp: DateTime<Utc>,
    },
}

impl TriageEvent {
    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            TriageEvent::ReviewSubmitted { .. } => "ReviewSubmitted",
            TriageEvent::ReviewEnriched { .. } => "ReviewEnriched",
            TriageEvent::BatchStarted { .. } => "BatchStarted",
            TriageEvent::BatchProgress { .. } => "BatchProgress",
            TriageEvent::BatchCompleted { .. } => "BatchCompleted",
        }
    }
}

/// Broadcast bus for [`TriageEvent`]s
///
/// Cloning shares the underlying channel. Slow subscribers lose the oldest
/// events once `capacity` is exceeded.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TriageEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use triage_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<TriageEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: TriageEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
