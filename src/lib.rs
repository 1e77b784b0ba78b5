//! # Mnemo
//!
//! An in-process memory engine that remembers problem→solution pairs,
//! categorizes incoming problems with regex patterns, resolves conflicts
//! between a local `project` scope and a shared `global` scope, and ranks
//! candidate solutions with a heuristic quality score. A second layer lifts
//! the engine into an event-sourced domain model: every mutation to a memory
//! entry or search session emits a durable domain event onto an asynchronous
//! bus.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  MemoryApplicationService                               │
//! ├─────────────────────────────────────────────────────────┤
//! │  DomainMemoryEngine │ aggregates + EventBus (1 worker)  │
//! ├─────────────────────────────────────────────────────────┤
//! │  EnhancedMemoryEngine │ ranked retrieval + suggestions  │
//! │  MemoryEngine         │ category → SolutionCache index  │
//! ├─────────────────────────────────────────────────────────┤
//! │  SolutionCache │ ErrorCategorizer │ SolutionScorer      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::collections::HashMap;
//! use mnemo::MemoryEngine;
//!
//! let engine = MemoryEngine::new();
//! engine.initialize(&HashMap::from([(
//!     "auth".to_string(),
//!     vec!["auth.*fail".to_string()],
//! )]));
//!
//! engine.store_solution("auth failure: token expired", "", "Refresh the token", false);
//! let found = engine.find_solution("auth failure: token expired", "");
//! assert!(found.is_some());
//! ```
//!
//! ## Determinism
//!
//! Every time-dependent component takes a [`Clock`]. Production code uses
//! [`Clock::System`]; tests inject a [`SimClock`] so conflict resolution,
//! scoring, and aggregate ids are fully reproducible.
//!
//! The engine is thread-based: callers may use it from any thread, the only
//! background thread is the event bus consumer, and there is no async
//! runtime anywhere in the crate.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod categorize;
pub mod constants;
pub mod domain;
pub mod dst;
pub mod engine;
pub mod events;
pub mod scoring;
pub mod solution;

pub use categorize::ErrorCategorizer;
pub use domain::{
    Aggregate, DomainMemoryEngine, MemoryApplicationService, MemoryEntryAggregate,
    MemoryEntryView, SearchSessionAggregate, SearchSessionView, SessionError, SessionStatus,
};
pub use dst::{Clock, SimClock};
pub use engine::{EnhancedMemoryEngine, MemoryEngine, RankedSolution};
pub use events::{DomainEvent, EventBus};
pub use scoring::{QualityMetrics, SolutionScorer};
pub use solution::{ConflictResult, ConflictStrategy, Solution, SolutionCache, SolutionSource};
