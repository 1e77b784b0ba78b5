//! Event-sourced domain model.
//!
//! Aggregates are consistency boundaries: every mutation goes through the
//! aggregate root, raises a [`DomainEvent`], and the event is folded into
//! state by `apply_event`. Live execution and replay run the exact same
//! fold, so rebuilding an aggregate from its event stream reproduces its
//! state.

mod engine;
pub mod memory_entry;
pub mod search_session;
mod service;

pub use engine::DomainMemoryEngine;
pub use memory_entry::{MemoryEntryAggregate, MemoryEntryView};
pub use search_session::{
    SearchSessionAggregate, SearchSessionView, SessionError, SessionStatus,
};
pub use service::MemoryApplicationService;

use serde::Serialize;

use crate::dst::Clock;
use crate::events::DomainEvent;

// =============================================================================
// Event Type Names
// =============================================================================

/// Raised once when a memory entry aggregate is created
pub const EVENT_MEMORY_ENTRY_CREATED: &str = "MemoryEntryCreated";
/// Raised when a memory entry's solution is replaced
pub const EVENT_MEMORY_ENTRY_UPDATED: &str = "MemoryEntryUpdated";
/// Raised when a conflict resolution is recorded on a memory entry
pub const EVENT_CONFLICT_DETECTED: &str = "ConflictDetected";
/// Raised when a memory entry's confidence score changes
pub const EVENT_CONFIDENCE_UPDATED: &str = "ConfidenceUpdated";
/// Raised once when a search session starts
pub const EVENT_SEARCH_SESSION_STARTED: &str = "SearchSessionStarted";
/// Raised when a retrieval layer joins a search session
pub const EVENT_LAYER_ADDED: &str = "LayerAdded";
/// Raised when a result is recorded on a search session
pub const EVENT_RESULT_ADDED: &str = "ResultAdded";
/// Terminal: raised when a search session completes
pub const EVENT_SEARCH_SESSION_COMPLETED: &str = "SearchSessionCompleted";
/// Terminal: raised when a search session fails
pub const EVENT_SEARCH_SESSION_FAILED: &str = "SearchSessionFailed";

// =============================================================================
// Aggregate Capability
// =============================================================================

/// Capability set every event-sourced aggregate satisfies. A generic commit
/// helper consumes anything implementing this; aggregates stay concrete
/// types with no shared base.
pub trait Aggregate {
    /// Aggregate id.
    fn id(&self) -> &str;

    /// Version after the most recently raised event (0 before creation).
    fn version(&self) -> u64;

    /// Drain the uncommitted event buffer. Subsequent calls return an empty
    /// vector until more events are raised.
    fn take_uncommitted_events(&mut self) -> Vec<DomainEvent>;

    /// Fold one event into aggregate state. Used on fresh raises and during
    /// replay; unknown event types are ignored.
    fn apply_event(&mut self, event: &DomainEvent);
}

// =============================================================================
// Event Log (shared by composition)
// =============================================================================

/// Per-aggregate event bookkeeping: id, version counter, and the
/// uncommitted event buffer. Aggregates embed one instead of inheriting a
/// base class.
#[derive(Debug, Clone)]
pub(crate) struct EventLog {
    id: String,
    version: u64,
    uncommitted: Vec<DomainEvent>,
    clock: Clock,
}

impl EventLog {
    pub(crate) fn new(id: String, clock: Clock) -> Self {
        Self {
            id,
            version: 0,
            uncommitted: Vec::new(),
            clock,
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Increment the version, build the event, and buffer it. The caller
    /// applies the returned event to its state.
    pub(crate) fn raise(&mut self, event_type: &str, event_data: String) -> DomainEvent {
        self.version += 1;
        let event = DomainEvent::new(
            self.id.clone(),
            event_type,
            event_data,
            self.version,
            self.clock.now_ms(),
        );
        self.uncommitted.push(event.clone());
        event
    }

    pub(crate) fn drain(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.uncommitted)
    }

    pub(crate) fn uncommitted(&self) -> &[DomainEvent] {
        &self.uncommitted
    }

    /// Adopt a replayed event's version without buffering anything.
    pub(crate) fn sync_version(&mut self, version: u64) {
        self.version = version;
    }
}

/// Encode a typed event payload to its JSON string form.
pub(crate) fn encode_payload<T: Serialize>(payload: &T) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        tracing::error!(%error, "failed to encode event payload");
        String::from("{}")
    })
}

// =============================================================================
// Tests
// =============================================================================
