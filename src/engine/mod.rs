//! Top-level memory engine facade.
//!
//! Owns the `category → SolutionCache` index and the categorizer, and keeps
//! lock-free performance counters. Locks are taken engine → cache, never the
//! reverse, and no thread ever holds two engine-level locks: the read path
//! clones the cache `Arc` out of the index, so cache pointers stay stable
//! for the engine's lifetime and `clear` is the only operation that needs
//! the exclusive index lock.

mod enhanced;

pub use enhanced::{EnhancedMemoryEngine, RankedSolution};

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use serde_json::json;

use crate::categorize::ErrorCategorizer;
use crate::dst::Clock;
use crate::solution::{ConflictResult, Solution, SolutionCache, SolutionSource};

/// Concurrent problem→solution memory engine.
///
/// Callers may use one engine from any number of threads. Counters are
/// read without locks, so a statistics snapshot may be mildly inconsistent
/// across the three counters.
#[derive(Debug)]
pub struct MemoryEngine {
    index: RwLock<HashMap<String, Arc<SolutionCache>>>,
    categorizer: ErrorCategorizer,
    clock: Clock,
    total_lookups: AtomicU64,
    cache_hits: AtomicU64,
    total_lookup_time_us: AtomicU64,
}

impl MemoryEngine {
    /// Create an engine on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Clock::default())
    }

    /// Create an engine on an injected clock (tests pin "now" this way).
    #[must_use]
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            index: RwLock::new(HashMap::new()),
            categorizer: ErrorCategorizer::new(),
            clock,
            total_lookups: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            total_lookup_time_us: AtomicU64::new(0),
        }
    }

    /// Load error categories into the categorizer. Returns `true` on
    /// success (invalid patterns are dropped, never reported).
    pub fn initialize(&self, categories: &HashMap<String, Vec<String>>) -> bool {
        self.categorizer.load_categories(categories);
        true
    }

    /// Store a solution. When `category` is empty the problem text is
    /// categorized first. The category's cache is created on demand.
    /// Returns `true`.
    pub fn store_solution(
        &self,
        problem: &str,
        category: &str,
        content: &str,
        is_global: bool,
    ) -> bool {
        let started = Instant::now();

        let category = self.resolve_category(problem, category);
        let solution = Solution::new(
            content,
            SolutionSource::from_is_global(is_global),
            &self.clock,
        );
        self.cache_for(&category).add_solution(problem, solution, is_global);

        self.total_lookup_time_us
            .fetch_add(started.elapsed().as_micros() as u64, Ordering::Relaxed);
        true
    }

    /// Resolve the best stored solution for a problem, or `None`.
    ///
    /// Counts the lookup, counts a hit iff a solution is returned, and
    /// accumulates the elapsed microseconds.
    #[must_use]
    pub fn find_solution(&self, problem: &str, category: &str) -> Option<ConflictResult> {
        let started = Instant::now();
        self.total_lookups.fetch_add(1, Ordering::Relaxed);

        let category = self.resolve_category(problem, category);
        let result = self
            .cache_if_exists(&category)
            .and_then(|cache| cache.find_solution(problem, self.clock.now_secs() as i64));

        if result.is_some() {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        }
        self.total_lookup_time_us
            .fetch_add(started.elapsed().as_micros() as u64, Ordering::Relaxed);

        result
    }

    /// Categorize an error message.
    #[must_use]
    pub fn categorize_error(&self, message: &str) -> String {
        self.categorizer.categorize(message)
    }

    /// Performance and size statistics as a JSON string:
    /// `total_lookups`, `cache_hits`, `hit_rate`, `avg_lookup_time_us`,
    /// `categories`, and a per-category `category_breakdown` object.
    #[must_use]
    pub fn statistics(&self) -> String {
        let index = self.index.read().unwrap();

        let total_lookups = self.total_lookups.load(Ordering::Relaxed);
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let total_time_us = self.total_lookup_time_us.load(Ordering::Relaxed);

        let hit_rate = if total_lookups > 0 {
            cache_hits as f64 / total_lookups as f64
        } else {
            0.0
        };
        let avg_lookup_time_us = if total_lookups > 0 {
            total_time_us / total_lookups
        } else {
            0
        };

        let category_breakdown: BTreeMap<&str, serde_json::Value> = index
            .iter()
            .map(|(category, cache)| {
                let (project, global) = cache.stats();
                (
                    category.as_str(),
                    json!({ "project": project, "global": global }),
                )
            })
            .collect();

        json!({
            "total_lookups": total_lookups,
            "cache_hits": cache_hits,
            "hit_rate": hit_rate,
            "avg_lookup_time_us": avg_lookup_time_us,
            "categories": index.len(),
            "category_breakdown": category_breakdown,
        })
        .to_string()
    }

    /// Drop every per-category cache and reset all counters atomically
    /// (holders of the exclusive index lock cannot observe a half-reset).
    pub fn clear(&self) {
        let mut index = self.index.write().unwrap();
        index.clear();
        self.total_lookups.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.total_lookup_time_us.store(0, Ordering::Relaxed);
    }

    /// Bulk-insert solutions into a category under the given scope. The
    /// scope tag on each stored solution is forced to match `is_global`.
    pub fn load_solutions(
        &self,
        category: &str,
        solutions: &HashMap<String, Solution>,
        is_global: bool,
    ) {
        let cache = self.cache_for(category);
        let source = SolutionSource::from_is_global(is_global);
        for (problem, solution) in solutions {
            let mut solution = solution.clone();
            solution.source = source;
            cache.add_solution(problem, solution, is_global);
        }
    }

    /// The clock this engine stamps and ages solutions with.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub(crate) fn resolve_category(&self, problem: &str, category: &str) -> String {
        if category.is_empty() {
            self.categorizer.categorize(problem)
        } else {
            category.to_string()
        }
    }

    pub(crate) fn cache_if_exists(&self, category: &str) -> Option<Arc<SolutionCache>> {
        self.index.read().unwrap().get(category).map(Arc::clone)
    }

    fn cache_for(&self, category: &str) -> Arc<SolutionCache> {
        if let Some(cache) = self.index.read().unwrap().get(category) {
            return Arc::clone(cache);
        }
        let mut index = self.index.write().unwrap();
        Arc::clone(index.entry(category.to_string()).or_default())
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
