//! Memory entry aggregate.

use serde::{Deserialize, Serialize};

use crate::constants::MEMORY_ENTRY_ID_PREFIX;
use crate::domain::{
    encode_payload, Aggregate, EventLog, EVENT_CONFIDENCE_UPDATED, EVENT_CONFLICT_DETECTED,
    EVENT_MEMORY_ENTRY_CREATED, EVENT_MEMORY_ENTRY_UPDATED,
};
use crate::dst::Clock;
use crate::events::DomainEvent;

// =============================================================================
// Event Payloads
// =============================================================================

/// Payload of `MemoryEntryCreated`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntryCreated {
    /// Problem text the entry answers
    pub problem: String,
    /// Solution text
    pub solution: String,
    /// Category the entry belongs to
    pub category: String,
}

/// Payload of `MemoryEntryUpdated`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntryUpdated {
    /// Solution text before the update
    pub old_solution: String,
    /// Replacement solution text
    pub new_solution: String,
    /// Why the solution was replaced
    pub reason: String,
}

/// Payload of `ConflictDetected`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictDetected {
    /// Id of the recorded conflict
    pub conflict_id: String,
    /// Strategy that resolved it
    pub strategy: String,
    /// Conflicts recorded on the entry after this one
    pub total_conflicts: usize,
}

/// Payload of `ConfidenceUpdated`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceUpdated {
    /// Score before the update
    pub old_confidence: f64,
    /// Score after the update
    pub new_confidence: f64,
}

// =============================================================================
// Aggregate
// =============================================================================

/// Event-sourced problem→solution memory entry.
///
/// All state transitions happen in [`Aggregate::apply_event`]; mutators
/// compute the payload, raise the event, then apply it, so replaying the
/// event stream onto a blank aggregate reproduces the live state.
#[derive(Debug, Clone)]
pub struct MemoryEntryAggregate {
    log: EventLog,
    problem: String,
    solution: String,
    category: String,
    created_at_ms: u64,
    updated_at_ms: u64,
    confidence_score: f64,
    conflict_ids: Vec<String>,
}

impl MemoryEntryAggregate {
    /// Create a new entry with id `mem_<ms-epoch>` and raise
    /// `MemoryEntryCreated`.
    #[must_use]
    pub fn create(problem: &str, solution: &str, category: &str, clock: Clock) -> Self {
        let id = format!("{}_{}", MEMORY_ENTRY_ID_PREFIX, clock.now_ms());
        let mut aggregate = Self::blank(id, clock);

        let data = encode_payload(&MemoryEntryCreated {
            problem: problem.to_string(),
            solution: solution.to_string(),
            category: category.to_string(),
        });
        let event = aggregate.log.raise(EVENT_MEMORY_ENTRY_CREATED, data);
        aggregate.apply_event(&event);

        aggregate
    }

    /// Rebuild an entry by folding an event stream onto a blank aggregate.
    #[must_use]
    pub fn from_events(id: &str, events: &[DomainEvent], clock: Clock) -> Self {
        let mut aggregate = Self::blank(id.to_string(), clock);
        for event in events {
            aggregate.apply_event(event);
            aggregate.log.sync_version(event.version);
        }
        aggregate
    }

    fn blank(id: String, clock: Clock) -> Self {
        Self {
            log: EventLog::new(id, clock),
            problem: String::new(),
            solution: String::new(),
            category: String::new(),
            created_at_ms: 0,
            updated_at_ms: 0,
            confidence_score: 0.0,
            conflict_ids: Vec::new(),
        }
    }

    /// Replace the solution, recording why.
    pub fn update_solution(&mut self, new_solution: &str, reason: &str) {
        let data = encode_payload(&MemoryEntryUpdated {
            old_solution: self.solution.clone(),
            new_solution: new_solution.to_string(),
            reason: reason.to_string(),
        });
        let event = self.log.raise(EVENT_MEMORY_ENTRY_UPDATED, data);
        self.apply_event(&event);
    }

    /// Record a conflict resolution against this entry.
    pub fn add_conflict(&mut self, conflict_id: &str, strategy: &str) {
        let data = encode_payload(&ConflictDetected {
            conflict_id: conflict_id.to_string(),
            strategy: strategy.to_string(),
            total_conflicts: self.conflict_ids.len() + 1,
        });
        let event = self.log.raise(EVENT_CONFLICT_DETECTED, data);
        self.apply_event(&event);
    }

    /// Set the confidence score.
    ///
    /// # Panics
    /// Panics if `score` is outside `[0.0, 1.0]`.
    pub fn set_confidence(&mut self, score: f64) {
        // Precondition
        assert!(
            (0.0..=1.0).contains(&score),
            "confidence score {score} outside [0.0, 1.0]"
        );

        let data = encode_payload(&ConfidenceUpdated {
            old_confidence: self.confidence_score,
            new_confidence: score,
        });
        let event = self.log.raise(EVENT_CONFIDENCE_UPDATED, data);
        self.apply_event(&event);
    }

    /// Problem text.
    #[must_use]
    pub fn problem(&self) -> &str {
        &self.problem
    }

    /// Current solution text.
    #[must_use]
    pub fn solution(&self) -> &str {
        &self.solution
    }

    /// Category the entry belongs to.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Confidence score in `[0, 1]` (0 until set).
    #[must_use]
    pub fn confidence_score(&self) -> f64 {
        self.confidence_score
    }

    /// Whether any conflicts have been recorded.
    #[must_use]
    pub fn has_conflicts(&self) -> bool {
        !self.conflict_ids.is_empty()
    }

    /// Recorded conflict ids (unique).
    #[must_use]
    pub fn conflict_ids(&self) -> &[String] {
        &self.conflict_ids
    }

    /// Creation timestamp (milliseconds since epoch).
    #[must_use]
    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }

    /// Last-update timestamp (milliseconds since epoch).
    #[must_use]
    pub fn updated_at_ms(&self) -> u64 {
        self.updated_at_ms
    }

    /// Events raised but not yet committed.
    #[must_use]
    pub fn uncommitted_events(&self) -> &[DomainEvent] {
        self.log.uncommitted()
    }

    /// Cloneable snapshot for read surfaces.
    #[must_use]
    pub fn view(&self) -> MemoryEntryView {
        MemoryEntryView {
            id: self.log.id().to_string(),
            problem: self.problem.clone(),
            solution: self.solution.clone(),
            category: self.category.clone(),
            confidence: self.confidence_score,
            has_conflicts: self.has_conflicts(),
        }
    }
}

impl Aggregate for MemoryEntryAggregate {
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
            EVENT_MEMORY_ENTRY_CREATED => {
                if let Ok(data) = serde_json::from_str::<MemoryEntryCreated>(&event.event_data) {
                    self.problem = data.problem;
                    self.solution = data.solution;
                    self.category = data.category;
                    self.created_at_ms = event.timestamp_ms;
                    self.updated_at_ms = event.timestamp_ms;
                }
            }
            EVENT_MEMORY_ENTRY_UPDATED => {
                if let Ok(data) = serde_json::from_str::<MemoryEntryUpdated>(&event.event_data) {
                    self.solution = data.new_solution;
                    self.updated_at_ms = event.timestamp_ms;
                }
            }
            EVENT_CONFLICT_DETECTED => {
                if let Ok(data) = serde_json::from_str::<ConflictDetected>(&event.event_data) {
                    // De-dup by id: replaying a duplicate must not double-append.
                    if !self.conflict_ids.contains(&data.conflict_id) {
                        self.conflict_ids.push(data.conflict_id);
                    }
                }
            }
            EVENT_CONFIDENCE_UPDATED => {
                if let Ok(data) = serde_json::from_str::<ConfidenceUpdated>(&event.event_data) {
                    self.confidence_score = data.new_confidence;
                }
            }
            _ => {}
        }
    }
}

/// Read-model snapshot of a memory entry.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryEntryView {
    /// Aggregate id
    pub id: String,
    /// Problem text
    pub problem: String,
    /// Current solution text
    pub solution: String,
    /// Category
    pub category: String,
    /// Confidence score
    pub confidence: f64,
    /// Whether conflicts have been recorded
    pub has_conflicts: bool,
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
    fn test_create_sets_state_and_raises_event() {
        let entry = MemoryEntryAggregate::create("p", "s", "build", clock());

        assert_eq!(entry.id(), format!("mem_{NOW_MS}"));
        assert_eq!(entry.problem(), "p");
        assert_eq!(entry.solution(), "s");
        assert_eq!(entry.category(), "build");
        assert_eq!(entry.version(), 1);
        assert_eq!(entry.created_at_ms(), NOW_MS);
        assert!((entry.confidence_score() - 0.0).abs() < f64::EPSILON);

        let events = entry.uncommitted_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EVENT_MEMORY_ENTRY_CREATED);
        assert_eq!(events[0].version, 1);
    }

    #[test]
    fn test_update_solution() {
        let sim = SimClock::at_ms(NOW_MS);
        let mut entry = MemoryEntryAggregate::create("p", "old", "build", Clock::sim(sim.clone()));

        sim.advance_ms(5000);
        entry.update_solution("new", "better fix");

        assert_eq!(entry.solution(), "new");
        assert_eq!(entry.version(), 2);
        assert_eq!(entry.updated_at_ms(), NOW_MS + 5000);
        assert_eq!(entry.created_at_ms(), NOW_MS);
    }

    #[test]
    fn test_versions_strictly_increase_from_one() {
        let mut entry = MemoryEntryAggregate::create("p", "s", "build", clock());
        entry.update_solution("s2", "r");
        entry.add_conflict("c1", "newer_solution");
        entry.set_confidence(0.9);

        let versions: Vec<u64> = entry
            .uncommitted_events()
            .iter()
            .map(|e| e.version)
            .collect();
        assert_eq!(versions, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_take_uncommitted_drains() {
        let mut entry = MemoryEntryAggregate::create("p", "s", "build", clock());

        assert_eq!(entry.take_uncommitted_events().len(), 1);
        assert!(entry.take_uncommitted_events().is_empty());

        entry.update_solution("s2", "r");
        assert_eq!(entry.take_uncommitted_events().len(), 1);
    }

    #[test]
    fn test_conflicts_deduplicate_by_id() {
        let mut entry = MemoryEntryAggregate::create("p", "s", "build", clock());
        entry.add_conflict("c1", "newer_solution");
        entry.add_conflict("c1", "popularity_based");
        entry.add_conflict("c2", "newer_solution");

        assert_eq!(entry.conflict_ids(), ["c1", "c2"]);
        assert!(entry.has_conflicts());
        // Version still advanced for the duplicate raise.
        assert_eq!(entry.version(), 4);
    }

    #[test]
    #[should_panic(expected = "outside [0.0, 1.0]")]
    fn test_confidence_out_of_range_rejected() {
        let mut entry = MemoryEntryAggregate::create("p", "s", "build", clock());
        entry.set_confidence(1.5);
    }

    #[test]
    fn test_replay_reproduces_state() {
        let mut original = MemoryEntryAggregate::create("p", "s", "build", clock());
        original.update_solution("s2", "better");
        original.add_conflict("c1", "newer_solution");
        original.set_confidence(0.7);

        let stream = original.take_uncommitted_events();
        let replayed = MemoryEntryAggregate::from_events(original.id(), &stream, clock());

        assert_eq!(replayed.problem(), original.problem());
        assert_eq!(replayed.solution(), original.solution());
        assert_eq!(replayed.category(), original.category());
        assert_eq!(replayed.conflict_ids(), original.conflict_ids());
        assert!(
            (replayed.confidence_score() - original.confidence_score()).abs() < f64::EPSILON
        );
        assert_eq!(replayed.version(), original.version());
        assert_eq!(replayed.created_at_ms(), original.created_at_ms());
        assert!(replayed.uncommitted_events().is_empty());
    }

    #[test]
    fn test_replay_ignores_unknown_event_types() {
        let mut original = MemoryEntryAggregate::create("p", "s", "build", clock());
        let mut stream = original.take_uncommitted_events();
        stream.push(DomainEvent::new(
            original.id(),
            "SomethingUnknown",
            "{}",
            2,
            NOW_MS,
        ));

        let replayed = MemoryEntryAggregate::from_events(original.id(), &stream, clock());
        assert_eq!(replayed.solution(), "s");
        assert_eq!(replayed.version(), 2);
    }

    #[test]
    fn test_view_snapshot() {
        let mut entry = MemoryEntryAggregate::create("p", "s", "build", clock());
        entry.set_confidence(0.4);

        let view = entry.view();
        assert_eq!(view.id, entry.id());
        assert_eq!(view.problem, "p");
        assert_eq!(view.solution, "s");
        assert!((view.confidence - 0.4).abs() < f64::EPSILON);
        assert!(!view.has_conflicts);
    }
}
