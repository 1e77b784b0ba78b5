//! Ranked retrieval over the base engine.
//!
//! Reads every candidate from the resolved category, scores each with the
//! quality scorer, and returns them highest-score first. The conflict
//! strategy on ranked results is always `default_local_preference` with
//! reason `"AI-ranked result"`; ranking replaces resolution on this path.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::constants::{SUGGESTIONS_COUNT_DEFAULT, SUGGESTIONS_SCORE_DECIMALS};
use crate::dst::Clock;
use crate::engine::MemoryEngine;
use crate::scoring::SolutionScorer;
use crate::solution::{ConflictResult, ConflictStrategy, Solution};

/// One ranked retrieval hit.
#[derive(Debug, Clone)]
pub struct RankedSolution {
    /// The candidate, wrapped as a conflict result for surface
    /// compatibility with `find_solution`
    pub result: ConflictResult,
    /// Combined quality score in `[0, 1]`
    pub score: f64,
}

/// Memory engine with quality-scored ranked retrieval and a JSON
/// suggestions serializer.
#[derive(Debug, Default)]
pub struct EnhancedMemoryEngine {
    engine: MemoryEngine,
    scorer: SolutionScorer,
}

impl EnhancedMemoryEngine {
    /// Create an enhanced engine on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Clock::default())
    }

    /// Create an enhanced engine on an injected clock.
    #[must_use]
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            engine: MemoryEngine::with_clock(clock),
            scorer: SolutionScorer::new(),
        }
    }

    /// The wrapped base engine.
    #[must_use]
    pub fn engine(&self) -> &MemoryEngine {
        &self.engine
    }

    /// See [`MemoryEngine::initialize`].
    pub fn initialize(&self, categories: &HashMap<String, Vec<String>>) -> bool {
        self.engine.initialize(categories)
    }

    /// See [`MemoryEngine::store_solution`].
    pub fn store_solution(
        &self,
        problem: &str,
        category: &str,
        content: &str,
        is_global: bool,
    ) -> bool {
        self.engine.store_solution(problem, category, content, is_global)
    }

    /// See [`MemoryEngine::find_solution`].
    #[must_use]
    pub fn find_solution(&self, problem: &str, category: &str) -> Option<ConflictResult> {
        self.engine.find_solution(problem, category)
    }

    /// See [`MemoryEngine::categorize_error`].
    #[must_use]
    pub fn categorize_error(&self, message: &str) -> String {
        self.engine.categorize_error(message)
    }

    /// See [`MemoryEngine::statistics`].
    #[must_use]
    pub fn statistics(&self) -> String {
        self.engine.statistics()
    }

    /// See [`MemoryEngine::clear`].
    pub fn clear(&self) {
        self.engine.clear();
    }

    /// See [`MemoryEngine::load_solutions`].
    pub fn load_solutions(
        &self,
        category: &str,
        solutions: &HashMap<String, Solution>,
        is_global: bool,
    ) {
        self.engine.load_solutions(category, solutions, is_global);
    }

    /// Every candidate for `problem` in the resolved category, scored and
    /// sorted descending by score, truncated to `max`.
    ///
    /// The sort is stable: equal scores keep the candidate order
    /// (project scope before global, oldest first within a scope).
    #[must_use]
    pub fn find_ranked_solutions(
        &self,
        problem: &str,
        category: &str,
        max: usize,
    ) -> Vec<RankedSolution> {
        let category = self.engine.resolve_category(problem, category);
        let Some(cache) = self.engine.cache_if_exists(&category) else {
            return Vec::new();
        };

        let now_secs = self.engine.clock().now_secs() as i64;
        let mut ranked: Vec<RankedSolution> = cache
            .all_solutions(problem)
            .into_iter()
            .map(|solution| {
                let score = self.scorer.score(&solution, problem, now_secs);
                RankedSolution {
                    result: ConflictResult::new(
                        solution,
                        ConflictStrategy::DefaultLocalPreference,
                        "AI-ranked result",
                    ),
                    score,
                }
            })
            .collect();

        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        ranked.truncate(max);
        ranked
    }

    /// Top 5 suggestions for a problem as a compact JSON string:
    /// `{"suggestions": [...], "total_found": N, "context": "..."}`.
    ///
    /// `context` is echoed verbatim into the payload; scores are rounded to
    /// three decimals. All strings are JSON-escaped.
    #[must_use]
    pub fn get_suggestions(&self, problem: &str, context: &str) -> String {
        let ranked = self.find_ranked_solutions(problem, "", SUGGESTIONS_COUNT_DEFAULT);

        let suggestions: Vec<Suggestion<'_>> = ranked
            .iter()
            .map(|ranked| Suggestion {
                solution: &ranked.result.solution.content,
                score: round_score(ranked.score),
                source: ranked.result.solution.source.as_str(),
                use_count: ranked.result.solution.use_count,
                created_date: &ranked.result.solution.created_date,
            })
            .collect();

        let payload = SuggestionsPayload {
            total_found: suggestions.len(),
            suggestions,
            context,
        };
        serde_json::to_string(&payload).unwrap_or_else(|_| String::from("{}"))
    }
}

#[derive(Serialize)]
struct Suggestion<'a> {
    solution: &'a str,
    score: f64,
    source: &'a str,
    use_count: u32,
    created_date: &'a str,
}

#[derive(Serialize)]
struct SuggestionsPayload<'a> {
    suggestions: Vec<Suggestion<'a>>,
    total_found: usize,
    context: &'a str,
}

fn round_score(score: f64) -> f64 {
    let factor = 10_f64.powi(SUGGESTIONS_SCORE_DECIMALS as i32);
    (score * factor).round() / factor
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dst::SimClock;
    use crate::solution::SolutionSource;

    const NOW_MS: u64 = 1_700_000_000_000;

    fn engine() -> EnhancedMemoryEngine {
        EnhancedMemoryEngine::with_clock(Clock::sim(SimClock::at_ms(NOW_MS)))
    }

    #[test]
    fn test_ranked_prefers_richer_content() {
        // Three project solutions of increasing substance; the longest
        // scores highest on completeness and surfaces first.
        let engine = engine();
        engine.store_solution("build problem", "build", "fixit", false);
        engine.store_solution("build problem", "build", &"fix the build step ".repeat(3), false);
        engine.store_solution(
            "build problem",
            "build",
            &"fix the build step carefully ".repeat(8),
            false,
        );

        let ranked = engine.find_ranked_solutions("build problem", "build", 5);

        assert_eq!(ranked.len(), 3);
        assert!(ranked[0].result.solution.content.len() > 200);
        assert!(ranked[0].score >= ranked[1].score);
        assert!(ranked[1].score >= ranked[2].score);
        assert_eq!(
            ranked[0].result.strategy,
            ConflictStrategy::DefaultLocalPreference
        );
        assert_eq!(ranked[0].result.reason, "AI-ranked result");
    }

    #[test]
    fn test_ranked_truncates_to_max() {
        let engine = engine();
        for i in 0..4 {
            engine.store_solution("p", "build", &format!("solution number {i}"), false);
        }

        let ranked = engine.find_ranked_solutions("p", "build", 2);
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn test_ranked_ties_keep_candidate_order() {
        // Identical content scores identically; stable sort preserves
        // project-then-global, oldest-first.
        let engine = engine();
        engine.store_solution("p", "build", "the same fix", false);
        engine.store_solution("p", "build", "the same fix", true);

        let ranked = engine.find_ranked_solutions("p", "build", 5);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].result.solution.source, SolutionSource::Project);
        assert_eq!(ranked[1].result.solution.source, SolutionSource::Global);
    }

    #[test]
    fn test_ranked_unknown_category_is_empty() {
        let engine = engine();
        assert!(engine.find_ranked_solutions("p", "nowhere", 5).is_empty());
    }

    #[test]
    fn test_suggestions_schema() {
        let engine = engine();
        engine.store_solution("npm install fails", "", "Run npm cache clean", false);

        let raw = engine.get_suggestions("npm install fails", "npm build context");
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(parsed["total_found"], 1);
        assert_eq!(parsed["context"], "npm build context");
        let first = &parsed["suggestions"][0];
        assert_eq!(first["solution"], "Run npm cache clean");
        assert_eq!(first["source"], "project");
        assert_eq!(first["use_count"], 1);
        assert_eq!(first["created_date"], "1700000000");
        assert!(first["score"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn test_suggestions_escape_quotes_and_backslashes() {
        let engine = engine();
        let tricky = r#"Set "path" to C:\tools\node and retry"#;
        engine.store_solution("path broken", "", tricky, false);

        let raw = engine.get_suggestions("path broken", r#"windows "shell" context"#);
        let parsed: serde_json::Value =
            serde_json::from_str(&raw).expect("suggestions must be valid JSON");

        assert_eq!(parsed["suggestions"][0]["solution"], tricky);
        assert_eq!(parsed["context"], r#"windows "shell" context"#);
    }

    #[test]
    fn test_suggestions_empty_cache() {
        let engine = engine();
        let parsed: serde_json::Value =
            serde_json::from_str(&engine.get_suggestions("unknown", "")).unwrap();

        assert_eq!(parsed["total_found"], 0);
        assert_eq!(parsed["suggestions"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_scores_rounded_to_three_decimals() {
        let engine = engine();
        engine.store_solution("p", "", "some fix for the problem", false);

        let raw = engine.get_suggestions("p", "");
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let score = parsed["suggestions"][0]["score"].as_f64().unwrap();

        assert!(((score * 1000.0).round() / 1000.0 - score).abs() < f64::EPSILON);
    }

    #[test]
    fn test_base_surface_delegates() {
        let engine = engine();
        engine.store_solution("p", "build", "fix", false);

        assert!(engine.find_solution("p", "build").is_some());
        let stats: serde_json::Value = serde_json::from_str(&engine.statistics()).unwrap();
        assert_eq!(stats["total_lookups"], 1);

        engine.clear();
        assert!(engine.find_solution("p", "build").is_none());
    }
}
