//! Search session aggregate.
//!
//! Sessions move `active → completed` or `active → failed`; both end states
//! are terminal. A session accepts exactly one terminal event and rejects
//! every mutation after it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::SEARCH_SESSION_ID_PREFIX;
use crate::domain::{
    encode_payload, Aggregate, EventLog, EVENT_LAYER_ADDED, EVENT_RESULT_ADDED,
    EVENT_SEARCH_SESSION_COMPLETED, EVENT_SEARCH_SESSION_FAILED, EVENT_SEARCH_SESSION_STARTED,
};
use crate::dst::Clock;
use crate::events::DomainEvent;

// =============================================================================
// Status & Errors
// =============================================================================

/// Lifecycle state of a search session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Accepting layers and results
    Active,
    /// Finished successfully (terminal)
    Completed,
    /// Finished unsuccessfully (terminal)
    Failed,
}

impl SessionStatus {
    /// String representation (`"active"` / `"completed"` / `"failed"`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether the status accepts no further events.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors from search session mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The session already received its terminal event
    #[error("search session {id} is already {status}; no further events accepted")]
    AlreadyTerminal {
        /// Session id
        id: String,
        /// Terminal status the session is in
        status: SessionStatus,
    },
}

// =============================================================================
// Event Payloads
// =============================================================================

/// Payload of `SearchSessionStarted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSessionStarted {
    /// Query the session searches for
    pub query: String,
    /// Start timestamp (milliseconds since epoch)
    pub started_at_ms: u64,
}

/// Payload of `LayerAdded`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerAdded {
    /// Retrieval layer name
    pub layer_type: String,
    /// 1-based position of the layer in the session
    pub layer_order: usize,
}

/// Payload of `ResultAdded`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultAdded {
    /// Id of the found result
    pub result_id: String,
    /// Confidence the layer assigned to it
    pub confidence: f64,
    /// Results recorded on the session after this one
    pub total_results: usize,
}

/// Payload of `SearchSessionCompleted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSessionCompleted {
    /// Final confidence for the session
    pub final_confidence: f64,
    /// Session duration in milliseconds
    pub duration_ms: u64,
    /// Number of layers used
    pub layers_used: usize,
    /// Number of results found
    pub results_found: usize,
}

/// Payload of `SearchSessionFailed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSessionFailed {
    /// Why the session failed
    pub reason: String,
    /// Session duration in milliseconds
    pub duration_ms: u64,
}

// =============================================================================
// Aggregate
// =============================================================================

/// Event-sourced search session.
#[derive(Debug, Clone)]
pub struct SearchSessionAggregate {
    log: EventLog,
    query: String,
    layers_used: Vec<String>,
    result_ids: Vec<String>,
    started_at_ms: u64,
    completed_at_ms: Option<u64>,
    final_confidence: f64,
    status: SessionStatus,
}

impl SearchSessionAggregate {
    /// Start a session with id `search_<ms-epoch>` and raise
    /// `SearchSessionStarted`.
    #[must_use]
    pub fn create(query: &str, clock: Clock) -> Self {
        let id = format!("{}_{}", SEARCH_SESSION_ID_PREFIX, clock.now_ms());
        let mut session = Self::blank(id, clock);

        let started_at_ms = session.log.now_ms();
        let data = encode_payload(&SearchSessionStarted {
            query: query.to_string(),
            started_at_ms,
        });
        let event = session.log.raise(EVENT_SEARCH_SESSION_STARTED, data);
        session.apply_event(&event);

        session
    }

    /// Rebuild a session by folding an event stream onto a blank aggregate.
    #[must_use]
    pub fn from_events(id: &str, events: &[DomainEvent], clock: Clock) -> Self {
        let mut session = Self::blank(id.to_string(), clock);
        for event in events {
            session.apply_event(event);
            session.log.sync_version(event.version);
        }
        session
    }

    fn blank(id: String, clock: Clock) -> Self {
        Self {
            log: EventLog::new(id, clock),
            query: String::new(),
            layers_used: Vec::new(),
            result_ids: Vec::new(),
            started_at_ms: 0,
            completed_at_ms: None,
            final_confidence: 0.0,
            status: SessionStatus::Active,
        }
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        if self.status.is_terminal() {
            return Err(SessionError::AlreadyTerminal {
                id: self.log.id().to_string(),
                status: self.status,
            });
        }
        Ok(())
    }

    /// Record a retrieval layer joining the session.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyTerminal`] after a terminal event.
    pub fn add_layer(&mut self, layer_type: &str) -> Result<(), SessionError> {
        self.ensure_active()?;

        let data = encode_payload(&LayerAdded {
            layer_type: layer_type.to_string(),
            layer_order: self.layers_used.len() + 1,
        });
        let event = self.log.raise(EVENT_LAYER_ADDED, data);
        self.apply_event(&event);
        Ok(())
    }

    /// Record a result found by the session.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyTerminal`] after a terminal event.
    pub fn add_result(&mut self, result_id: &str, confidence: f64) -> Result<(), SessionError> {
        self.ensure_active()?;

        let data = encode_payload(&ResultAdded {
            result_id: result_id.to_string(),
            confidence,
            total_results: self.result_ids.len() + 1,
        });
        let event = self.log.raise(EVENT_RESULT_ADDED, data);
        self.apply_event(&event);
        Ok(())
    }

    /// Complete the session (terminal).
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyTerminal`] after a terminal event.
    pub fn complete(&mut self, final_confidence: f64) -> Result<(), SessionError> {
        self.ensure_active()?;

        let now_ms = self.log.now_ms();
        let data = encode_payload(&SearchSessionCompleted {
            final_confidence,
            duration_ms: now_ms.saturating_sub(self.started_at_ms),
            layers_used: self.layers_used.len(),
            results_found: self.result_ids.len(),
        });
        let event = self.log.raise(EVENT_SEARCH_SESSION_COMPLETED, data);
        self.apply_event(&event);
        Ok(())
    }

    /// Fail the session (terminal).
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyTerminal`] after a terminal event.
    pub fn fail(&mut self, reason: &str) -> Result<(), SessionError> {
        self.ensure_active()?;

        let now_ms = self.log.now_ms();
        let data = encode_payload(&SearchSessionFailed {
            reason: reason.to_string(),
            duration_ms: now_ms.saturating_sub(self.started_at_ms),
        });
        let event = self.log.raise(EVENT_SEARCH_SESSION_FAILED, data);
        self.apply_event(&event);
        Ok(())
    }

    /// Query the session searches for.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Layers recorded on the session, in order.
    #[must_use]
    pub fn layers_used(&self) -> &[String] {
        &self.layers_used
    }

    /// Result ids recorded on the session (unique), in order.
    #[must_use]
    pub fn result_ids(&self) -> &[String] {
        &self.result_ids
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Final confidence (0 until completed).
    #[must_use]
    pub fn final_confidence(&self) -> f64 {
        self.final_confidence
    }

    /// Start timestamp (milliseconds since epoch).
    #[must_use]
    pub fn started_at_ms(&self) -> u64 {
        self.started_at_ms
    }

    /// Terminal timestamp, if the session has ended.
    #[must_use]
    pub fn completed_at_ms(&self) -> Option<u64> {
        self.completed_at_ms
    }

    /// Events raised but not yet committed.
    #[must_use]
    pub fn uncommitted_events(&self) -> &[DomainEvent] {
        self.log.uncommitted()
    }

    /// Cloneable snapshot for read surfaces.
    #[must_use]
    pub fn view(&self) -> SearchSessionView {
        SearchSessionView {
            id: self.log.id().to_string(),
            query: self.query.clone(),
            status: self.status,
            layers_used: self.layers_used.clone(),
            result_ids: self.result_ids.clone(),
            final_confidence: self.final_confidence,
        }
    }
}

impl Aggregate for SearchSessionAggregate {
    fn id(&self) -> &str {
        self.log.id()
    }

    fn version(&self) -> u64 {
        self.log.version()
    }

    fn take_uncommitted_events(&mut self) -> Vec<DomainEvent> {
        self.log.drain()
    }

    fn apply_event(&mut self, event: &DomainEvent) {
        match event.event_type.as_str() {
            EVENT_SEARCH_SESSION_STARTED => {
                if let Ok(data) = serde_json::from_str::<SearchSessionStarted>(&event.event_data) {
                    self.query = data.query;
                    self.started_at_ms = data.started_at_ms;
                    self.status = SessionStatus::Active;
                }
            }
            EVENT_LAYER_ADDED => {
                if let Ok(data) = serde_json::from_str::<LayerAdded>(&event.event_data) {
                    self.layers_used.push(data.layer_type);
                }
            }
            EVENT_RESULT_ADDED => {
                if let Ok(data) = serde_json::from_str::<ResultAdded>(&event.event_data) {
                    // De-dup by id: replaying a duplicate must not double-append.
                    if !self.result_ids.contains(&data.result_id) {
                        self.result_ids.push(data.result_id);
                    }
                }
            }
            EVENT_SEARCH_SESSION_COMPLETED => {
                if let Ok(data) =
                    serde_json::from_str::<SearchSessionCompleted>(&event.event_data)
                {
                    self.status = SessionStatus::Completed;
                    self.final_confidence = data.final_confidence;
                    self.completed_at_ms = Some(event.timestamp_ms);
                }
            }
            EVENT_SEARCH_SESSION_FAILED => {
                if serde_json::from_str::<SearchSessionFailed>(&event.event_data).is_ok() {
                    self.status = SessionStatus::Failed;
                    self.completed_at_ms = Some(event.timestamp_ms);
                }
            }
            _ => {}
        }
    }
}

/// Read-model snapshot of a search session.
#[derive(Debug, Clone, Serialize)]
pub struct SearchSessionView {
    /// Aggregate id
    pub id: String,
    /// Query
    pub query: String,
    /// Lifecycle status
    pub status: SessionStatus,
    /// Layers recorded, in order
    pub layers_used: Vec<String>,
    /// Result ids recorded, in order
    pub result_ids: Vec<String>,
    /// Final confidence (0 until completed)
    pub final_confidence: f64,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dst::SimClock;

    const NOW_MS: u64 = 1_700_000_000_000;

    fn clock() -> Clock {
        Clock::sim(SimClock::at_ms(NOW_MS))
    }

    #[test]
    fn test_create_starts_active() {
        let session = SearchSessionAggregate::create("who broke the build", clock());

        assert_eq!(session.id(), format!("search_{NOW_MS}"));
        assert_eq!(session.query(), "who broke the build");
        assert_eq!(session.status(), SessionStatus::Active);
        assert_eq!(session.started_at_ms(), NOW_MS);
        assert_eq!(session.version(), 1);
        assert_eq!(
            session.uncommitted_events()[0].event_type,
            EVENT_SEARCH_SESSION_STARTED
        );
    }

    #[test]
    fn test_layers_and_results_accumulate() {
        let mut session = SearchSessionAggregate::create("q", clock());
        session.add_layer("cache").unwrap();
        session.add_layer("ranked").unwrap();
        session.add_result("mem_1", 0.8).unwrap();

        assert_eq!(session.layers_used(), ["cache", "ranked"]);
        assert_eq!(session.result_ids(), ["mem_1"]);
        assert_eq!(session.version(), 4);
    }

    #[test]
    fn test_complete_is_terminal() {
        let sim = SimClock::at_ms(NOW_MS);
        let mut session = SearchSessionAggregate::create("q", Clock::sim(sim.clone()));
        sim.advance_ms(2500);

        session.complete(0.9).unwrap();

        assert_eq!(session.status(), SessionStatus::Completed);
        assert!((session.final_confidence() - 0.9).abs() < f64::EPSILON);
        assert_eq!(session.completed_at_ms(), Some(NOW_MS + 2500));

        let terminal = session.uncommitted_events().last().unwrap();
        let payload: SearchSessionCompleted =
            serde_json::from_str(&terminal.event_data).unwrap();
        assert_eq!(payload.duration_ms, 2500);
    }

    #[test]
    fn test_mutations_after_complete_rejected() {
        let mut session = SearchSessionAggregate::create("q", clock());
        session.complete(0.5).unwrap();

        let error = session.add_layer("late").unwrap_err();
        assert_eq!(
            error,
            SessionError::AlreadyTerminal {
                id: session.id().to_string(),
                status: SessionStatus::Completed,
            }
        );
        assert!(session.add_result("r", 0.1).is_err());
        assert!(session.complete(0.9).is_err());
        assert!(session.fail("too late").is_err());

        // Exactly one terminal event in the stream.
        let terminal_count = session
            .uncommitted_events()
            .iter()
            .filter(|e| {
                e.event_type == EVENT_SEARCH_SESSION_COMPLETED
                    || e.event_type == EVENT_SEARCH_SESSION_FAILED
            })
            .count();
        assert_eq!(terminal_count, 1);
    }

    #[test]
    fn test_fail_after_fail_rejected() {
        let mut session = SearchSessionAggregate::create("q", clock());
        session.fail("llm unavailable").unwrap();

        assert_eq!(session.status(), SessionStatus::Failed);
        assert!(session.fail("again").is_err());
        assert!(session.complete(1.0).is_err());
    }

    #[test]
    fn test_duplicate_results_deduplicate_by_id() {
        let mut session = SearchSessionAggregate::create("q", clock());
        session.add_result("r1", 0.5).unwrap();
        session.add_result("r1", 0.9).unwrap();
        session.add_result("r2", 0.4).unwrap();

        assert_eq!(session.result_ids(), ["r1", "r2"]);
    }

    #[test]
    fn test_replay_reproduces_state() {
        let mut original = SearchSessionAggregate::create("q", clock());
        original.add_layer("cache").unwrap();
        original.add_layer("cache").unwrap();
        original.add_result("r1", 0.5).unwrap();
        original.complete(0.8).unwrap();

        let stream = original.take_uncommitted_events();
        let replayed = SearchSessionAggregate::from_events(original.id(), &stream, clock());

        assert_eq!(replayed.query(), original.query());
        assert_eq!(replayed.layers_used(), original.layers_used());
        assert_eq!(replayed.result_ids(), original.result_ids());
        assert_eq!(replayed.status(), original.status());
        assert!(
            (replayed.final_confidence() - original.final_confidence()).abs() < f64::EPSILON
        );
        assert_eq!(replayed.started_at_ms(), original.started_at_ms());
        assert_eq!(replayed.version(), original.version());
    }

    #[test]
    fn test_view_snapshot() {
        let mut session = SearchSessionAggregate::create("q", clock());
        session.add_layer("cache").unwrap();

        let view = session.view();
        assert_eq!(view.id, session.id());
        assert_eq!(view.status, SessionStatus::Active);
        assert_eq!(view.layers_used, ["cache"]);
    }
}
