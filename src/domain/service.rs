//! Host-facing application service.
//!
//! Thin JSON wrapper over the domain engine: every read surface returns a
//! serialized string so a binding layer can hand results straight to the
//! host runtime.

use std::collections::HashMap;

use crate::domain::DomainMemoryEngine;
use crate::dst::Clock;
use crate::events::DomainEvent;

/// Application service for memory operations.
#[derive(Debug, Default)]
pub struct MemoryApplicationService {
    domain: DomainMemoryEngine,
}

impl MemoryApplicationService {
    /// Create a service on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Clock::default())
    }

    /// Create a service on an injected clock.
    #[must_use]
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            domain: DomainMemoryEngine::with_clock(clock),
        }
    }

    /// Initialize categories, default handlers, and the event bus.
    pub fn initialize(&self, categories: &HashMap<String, Vec<String>>) -> bool {
        self.domain.initialize_domain(categories)
    }

    /// Create a memory entry; returns its id.
    pub fn create_memory_entry(&self, problem: &str, solution: &str, category: &str) -> String {
        self.domain.create_memory_entry(problem, solution, category)
    }

    /// Update a memory entry's solution. Returns `false` on unknown id.
    pub fn update_memory_entry(&self, entry_id: &str, new_solution: &str, reason: &str) -> bool {
        self.domain.update_memory_entry(entry_id, new_solution, reason)
    }

    /// Ranked suggestions for a query as a JSON string. Always the top 5;
    /// `max` is accepted for surface compatibility and ignored.
    #[must_use]
    pub fn search_memories(&self, query: &str, context: &str, max: usize) -> String {
        self.domain.search_with_context(query, context, max)
    }

    /// A memory entry as a JSON object, or `"{}"` when the id is unknown.
    #[must_use]
    pub fn get_memory_entry(&self, entry_id: &str) -> String {
        match self.domain.get_memory_entry(entry_id) {
            Some(view) => serde_json::to_string(&view).unwrap_or_else(|_| String::from("{}")),
            None => String::from("{}"),
        }
    }

    /// Start a search session; returns its id.
    pub fn start_search_session(&self, query: &str) -> String {
        self.domain.start_search_session(query)
    }

    /// Record a retrieval layer on a session.
    pub fn add_search_layer(&self, session_id: &str, layer_type: &str) -> bool {
        self.domain.add_search_layer(session_id, layer_type)
    }

    /// Complete a search session.
    pub fn complete_search_session(&self, session_id: &str, confidence: f64) -> bool {
        self.domain.complete_search_session(session_id, confidence)
    }

    /// Domain statistics as a JSON string.
    #[must_use]
    pub fn get_statistics(&self) -> String {
        self.domain.domain_statistics()
    }

    /// Register an external handler for a domain event type.
    pub fn subscribe_to_events<F>(&self, event_type: &str, handler: F)
    where
        F: Fn(&DomainEvent) + Send + Sync + 'static,
    {
        self.domain.subscribe_to_events(event_type, handler);
    }

    /// The composed domain engine.
    #[must_use]
    pub fn domain(&self) -> &DomainMemoryEngine {
        &self.domain
    }

    /// Stop the event bus, draining queued deliveries.
    pub fn shutdown(&self) {
        self.domain.shutdown();
    }
}

// =============================================================================
// Tests
// =============================================================================
