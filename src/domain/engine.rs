//! Domain-driven memory engine.
//!
//! Composes the enhanced engine, the event bus, and the two id-keyed
//! aggregate stores. Write operations mutate an aggregate under the
//! exclusive store lock and commit its events to the bus; delivery to
//! subscribers happens asynchronously on the bus worker. There is no
//! atomicity between the inner cache write and event delivery: a reader may
//! observe the new cache state before the event fires, or vice versa.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::{json, Value};

use crate::domain::{
    Aggregate, MemoryEntryAggregate, MemoryEntryView, SearchSessionAggregate, SearchSessionView,
    EVENT_MEMORY_ENTRY_CREATED, EVENT_MEMORY_ENTRY_UPDATED, EVENT_SEARCH_SESSION_COMPLETED,
    EVENT_SEARCH_SESSION_STARTED,
};
use crate::dst::Clock;
use crate::engine::EnhancedMemoryEngine;
use crate::events::{DomainEvent, EventBus};

/// Event-sourced engine: aggregates + bus over the enhanced memory engine.
///
/// Aggregates are owned exclusively by the engine, keyed by id; aggregates
/// never reference each other. Events raised by one aggregate are enqueued
/// contiguously under the store lock, so any handler sees them in raise
/// order.
#[derive(Debug)]
pub struct DomainMemoryEngine {
    engine: EnhancedMemoryEngine,
    bus: EventBus,
    stores: RwLock<AggregateStores>,
    clock: Clock,
}

#[derive(Debug, Default)]
struct AggregateStores {
    memory_entries: HashMap<String, MemoryEntryAggregate>,
    search_sessions: HashMap<String, SearchSessionAggregate>,
}

impl DomainMemoryEngine {
    /// Create a domain engine on the system clock. The bus is not started
    /// until [`Self::initialize_domain`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Clock::default())
    }

    /// Create a domain engine on an injected clock.
    #[must_use]
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            engine: EnhancedMemoryEngine::with_clock(clock.clone()),
            bus: EventBus::new(),
            stores: RwLock::new(AggregateStores::default()),
            clock,
        }
    }

    /// Load categories, register the default observability handlers for the
    /// four primary event types, and start the bus. Returns `true` on
    /// success.
    pub fn initialize_domain(&self, categories: &HashMap<String, Vec<String>>) -> bool {
        if !self.engine.initialize(categories) {
            return false;
        }

        for event_type in [
            EVENT_MEMORY_ENTRY_CREATED,
            EVENT_MEMORY_ENTRY_UPDATED,
            EVENT_SEARCH_SESSION_STARTED,
            EVENT_SEARCH_SESSION_COMPLETED,
        ] {
            self.bus.subscribe(event_type, |event| {
                tracing::debug!(
                    event_type = %event.event_type,
                    aggregate_id = %event.aggregate_id,
                    version = event.version,
                    "domain event observed"
                );
            });
        }

        self.bus.start();
        true
    }

    /// Create a memory entry aggregate, commit its creation event, and
    /// mirror the pair into the inner cache (project scope) for query
    /// compatibility. Returns the new entry id.
    pub fn create_memory_entry(&self, problem: &str, solution: &str, category: &str) -> String {
        let mut aggregate =
            MemoryEntryAggregate::create(problem, solution, category, self.clock.clone());
        let entry_id = aggregate.id().to_string();

        {
            let mut stores = self.stores.write().unwrap();
            self.commit(&mut aggregate);
            stores.memory_entries.insert(entry_id.clone(), aggregate);
        }

        self.engine.store_solution(problem, category, solution, false);

        entry_id
    }

    /// Replace an entry's solution through its aggregate. Returns `false`
    /// when the id is unknown.
    pub fn update_memory_entry(&self, entry_id: &str, new_solution: &str, reason: &str) -> bool {
        let mut stores = self.stores.write().unwrap();
        let Some(aggregate) = stores.memory_entries.get_mut(entry_id) else {
            return false;
        };

        aggregate.update_solution(new_solution, reason);
        self.commit(aggregate);
        true
    }

    /// Start a search session aggregate and commit its start event.
    /// Returns the new session id.
    pub fn start_search_session(&self, query: &str) -> String {
        let mut aggregate = SearchSessionAggregate::create(query, self.clock.clone());
        let session_id = aggregate.id().to_string();

        let mut stores = self.stores.write().unwrap();
        self.commit(&mut aggregate);
        stores.search_sessions.insert(session_id.clone(), aggregate);

        session_id
    }

    /// Record a retrieval layer on a session. Returns `false` when the id
    /// is unknown or the session is already terminal.
    pub fn add_search_layer(&self, session_id: &str, layer_type: &str) -> bool {
        self.with_session(session_id, |session| session.add_layer(layer_type))
    }

    /// Record a result on a session. Returns `false` when the id is
    /// unknown or the session is already terminal.
    pub fn add_search_result(&self, session_id: &str, result_id: &str, confidence: f64) -> bool {
        self.with_session(session_id, |session| {
            session.add_result(result_id, confidence)
        })
    }

    /// Complete a session. Returns `false` when the id is unknown or the
    /// session is already terminal.
    pub fn complete_search_session(&self, session_id: &str, confidence: f64) -> bool {
        self.with_session(session_id, |session| session.complete(confidence))
    }

    /// Fail a session. Returns `false` when the id is unknown or the
    /// session is already terminal.
    pub fn fail_search_session(&self, session_id: &str, reason: &str) -> bool {
        self.with_session(session_id, |session| session.fail(reason))
    }

    fn with_session(
        &self,
        session_id: &str,
        mutate: impl FnOnce(&mut SearchSessionAggregate) -> Result<(), super::SessionError>,
    ) -> bool {
        let mut stores = self.stores.write().unwrap();
        let Some(session) = stores.search_sessions.get_mut(session_id) else {
            return false;
        };

        match mutate(session) {
            Ok(()) => {
                self.commit(session);
                true
            }
            Err(error) => {
                tracing::debug!(%error, "rejected search session mutation");
                false
            }
        }
    }

    /// Snapshot of a memory entry, or `None` when the id is unknown.
    #[must_use]
    pub fn get_memory_entry(&self, entry_id: &str) -> Option<MemoryEntryView> {
        let stores = self.stores.read().unwrap();
        stores
            .memory_entries
            .get(entry_id)
            .map(MemoryEntryAggregate::view)
    }

    /// Snapshot of a search session, or `None` when the id is unknown.
    #[must_use]
    pub fn get_search_session(&self, session_id: &str) -> Option<SearchSessionView> {
        let stores = self.stores.read().unwrap();
        stores
            .search_sessions
            .get(session_id)
            .map(SearchSessionAggregate::view)
    }

    /// Ranked suggestions JSON for a problem, delegating to the inner
    /// [`EnhancedMemoryEngine::get_suggestions`], which always emits the
    /// top 5. `_max` is accepted for surface compatibility and ignored.
    #[must_use]
    pub fn search_with_context(&self, problem: &str, context: &str, _max: usize) -> String {
        self.engine.get_suggestions(problem, context)
    }

    /// Domain statistics as a JSON string: aggregate counts plus the inner
    /// engine's stats (`engine_stats`) and the bus's stats (`event_stats`).
    #[must_use]
    pub fn domain_statistics(&self) -> String {
        let (memory_entries, search_sessions) = {
            let stores = self.stores.read().unwrap();
            (stores.memory_entries.len(), stores.search_sessions.len())
        };

        let engine_stats: Value =
            serde_json::from_str(&self.engine.statistics()).unwrap_or(Value::Null);
        let event_stats: Value =
            serde_json::from_str(&self.bus.statistics()).unwrap_or(Value::Null);

        json!({
            "memory_entries": memory_entries,
            "search_sessions": search_sessions,
            "engine_stats": engine_stats,
            "event_stats": event_stats,
        })
        .to_string()
    }

    /// Register an external handler for a domain event type.
    pub fn subscribe_to_events<F>(&self, event_type: &str, handler: F)
    where
        F: Fn(&DomainEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(event_type, handler);
    }

    /// Stop the event bus. Queued events are drained before the worker
    /// exits, so every committed event has been delivered once this
    /// returns. Dropping the engine has the same effect.
    pub fn shutdown(&self) {
        self.bus.stop();
    }

    /// The composed enhanced engine (lookup surface).
    #[must_use]
    pub fn engine(&self) -> &EnhancedMemoryEngine {
        &self.engine
    }

    /// Publish an aggregate's uncommitted events to the bus, in raise
    /// order. Generic over the aggregate capability set.
    fn commit<A: Aggregate>(&self, aggregate: &mut A) {
        for event in aggregate.take_uncommitted_events() {
            self.bus.publish(event);
        }
    }
}

impl Default for DomainMemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
