//! Heuristic solution quality scoring.
//!
//! Five clamped sub-scores combined linearly into a `[0, 1]` quality score.
//! Everything here is a pure function of the solution, the problem context,
//! and "now": the scorer holds no state and takes the current time as a
//! parameter, so ranked retrieval is reproducible under a pinned clock.

use crate::constants::{
    RELIABILITY_AGE_DAYS_AGING, RELIABILITY_AGE_DAYS_FRESH, RELIABILITY_AGE_DAYS_RECENT,
    RELIABILITY_AGE_DAYS_STALE, SCORE_CONTENT_CHARS_DETAILED, SCORE_CONTENT_CHARS_SUBSTANTIAL,
    SCORE_CONTENT_CHARS_TERSE, SCORE_MAX, SCORE_MIN, SCORE_TERM_CHARS_MIN, SCORE_WEIGHT_CLARITY,
    SCORE_WEIGHT_COMPLETENESS, SCORE_WEIGHT_CONTEXT, SCORE_WEIGHT_RELIABILITY,
    SCORE_WEIGHT_SPECIFICITY,
};
use crate::solution::Solution;

/// Detailed quality sub-scores for one solution. Each is in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityMetrics {
    /// How complete the solution appears (length, code blocks, steps)
    pub completeness: f64,
    /// How clear and readable it is
    pub clarity: f64,
    /// How specific to the problem it is
    pub specificity: f64,
    /// Freshness and usage history
    pub reliability: f64,
    /// Technology-stack overlap with the problem context
    pub context_relevance: f64,
}

impl QualityMetrics {
    /// Weighted combination of the sub-scores.
    #[must_use]
    pub fn combined(&self) -> f64 {
        self.completeness * SCORE_WEIGHT_COMPLETENESS
            + self.clarity * SCORE_WEIGHT_CLARITY
            + self.specificity * SCORE_WEIGHT_SPECIFICITY
            + self.reliability * SCORE_WEIGHT_RELIABILITY
            + self.context_relevance * SCORE_WEIGHT_CONTEXT
    }
}

/// Stateless quality scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolutionScorer;

impl SolutionScorer {
    /// Create a scorer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Combined quality score in `[0, 1]`.
    #[must_use]
    pub fn score(&self, solution: &Solution, problem_context: &str, now_secs: i64) -> f64 {
        self.metrics(solution, problem_context, now_secs).combined()
    }

    /// All five sub-scores.
    #[must_use]
    pub fn metrics(
        &self,
        solution: &Solution,
        problem_context: &str,
        now_secs: i64,
    ) -> QualityMetrics {
        QualityMetrics {
            completeness: score_completeness(&solution.content),
            clarity: score_clarity(&solution.content),
            specificity: score_specificity(&solution.content, problem_context),
            reliability: score_reliability(solution, now_secs),
            context_relevance: score_context_relevance(&solution.content, problem_context),
        }
    }
}

fn clamp(score: f64) -> f64 {
    score.max(SCORE_MIN).min(SCORE_MAX)
}

/// Length, code snippets, package-manager commands, numbered steps.
fn score_completeness(content: &str) -> f64 {
    let mut score = 0.0;

    if content.len() > SCORE_CONTENT_CHARS_SUBSTANTIAL {
        score += 0.3;
    }
    if content.len() > SCORE_CONTENT_CHARS_DETAILED {
        score += 0.2;
    }

    if content.contains("```") {
        score += 0.2;
    }
    if content.contains("npm") || content.contains("yarn") {
        score += 0.1;
    }

    if content.contains("1.") || content.contains("2.") {
        score += 0.2;
    }

    clamp(score)
}

/// Formatting and language cues: lists and directives raise the score,
/// hedging lowers it.
fn score_clarity(content: &str) -> f64 {
    let mut score = 0.5;

    if content.len() < SCORE_CONTENT_CHARS_TERSE {
        score -= 0.3;
    }

    if content.contains('\n') {
        score += 0.1;
    }
    if content.contains("- ") {
        score += 0.1;
    }

    if content.contains("need to") || content.contains("should") || content.contains("try") {
        score += 0.2;
    }

    if content.contains("maybe") || content.contains("not sure") {
        score -= 0.2;
    }

    clamp(score)
}

/// Share of meaningful problem terms echoed in the solution, plus a bonus
/// for concrete configuration references.
fn score_specificity(content: &str, problem_context: &str) -> f64 {
    let mut score = 0.2;

    let content_lower = content.to_lowercase();
    let problem_lower = problem_context.to_lowercase();

    let mut matched_terms = 0usize;
    let mut total_terms = 0usize;
    for term in problem_lower.split_whitespace() {
        if term.len() > SCORE_TERM_CHARS_MIN {
            total_terms += 1;
            if content_lower.contains(term) {
                matched_terms += 1;
            }
        }
    }
    if total_terms > 0 {
        score += matched_terms as f64 / total_terms as f64 * 0.6;
    }

    if content.contains("config") || content.contains(".json") || content.contains("package.json")
    {
        score += 0.2;
    }

    clamp(score)
}

/// Freshness windows plus cumulative use-count credit.
fn score_reliability(solution: &Solution, now_secs: i64) -> f64 {
    let mut score = 0.5;

    let age_days = solution.age_days(now_secs);
    if age_days < RELIABILITY_AGE_DAYS_FRESH {
        score += 0.3;
    } else if age_days < RELIABILITY_AGE_DAYS_RECENT {
        score += 0.2;
    } else if age_days < RELIABILITY_AGE_DAYS_AGING {
        score += 0.1;
    } else if age_days > RELIABILITY_AGE_DAYS_STALE {
        score -= 0.2;
    }

    if solution.use_count > 1 {
        score += 0.1;
    }
    if solution.use_count > 3 {
        score += 0.1;
    }
    if solution.use_count > 5 {
        score += 0.1;
    }

    clamp(score)
}

/// Case-sensitive technology-stack overlap between context and content.
fn score_context_relevance(content: &str, problem_context: &str) -> f64 {
    let mut score = 0.3;

    let both_contain = |needle: &str| problem_context.contains(needle) && content.contains(needle);

    if both_contain("npm") || both_contain("node") {
        score += 0.3;
    }

    if both_contain("auth") || both_contain("OAuth") {
        score += 0.4;
    }

    clamp(score)
}

// =============================================================================
// Tests
// =============================================================================
