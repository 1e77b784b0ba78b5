//! Domain event record.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{EVENT_ID_HEX_CHARS_COUNT, EVENT_ID_PREFIX};

/// An immutable record of something that happened inside an aggregate.
///
/// `version` is monotonic per aggregate, starting at 1; `event_data` is an
/// opaque JSON payload owned by the aggregate that raised the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Unique event id: `evt_` followed by 16 uppercase hex characters
    pub id: String,
    /// Id of the aggregate that raised the event
    pub aggregate_id: String,
    /// Event type name, e.g. `MemoryEntryCreated`
    pub event_type: String,
    /// JSON payload
    pub event_data: String,
    /// Wall-clock milliseconds since the Unix epoch at raise time
    pub timestamp_ms: u64,
    /// Position in the aggregate's event stream (1-based)
    pub version: u64,
}

impl DomainEvent {
    /// Build an event with a freshly generated id.
    #[must_use]
    pub fn new(
        aggregate_id: impl Into<String>,
        event_type: impl Into<String>,
        event_data: impl Into<String>,
        version: u64,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            id: generate_event_id(),
            aggregate_id: aggregate_id.into(),
            event_type: event_type.into(),
            event_data: event_data.into(),
            timestamp_ms,
            version,
        }
    }
}

/// Generate an event id: `evt_` plus 16 uppercase hex characters drawn
/// uniformly at random.
#[must_use]
pub fn generate_event_id() -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";

    let mut rng = rand::thread_rng();
    let mut id = String::with_capacity(EVENT_ID_PREFIX.len() + EVENT_ID_HEX_CHARS_COUNT);
    id.push_str(EVENT_ID_PREFIX);
    for _ in 0..EVENT_ID_HEX_CHARS_COUNT {
        id.push(HEX[rng.gen_range(0..HEX.len())] as char);
    }
    id
}

// =============================================================================
// Tests
// =============================================================================
