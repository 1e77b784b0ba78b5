//! Solutions, scopes, and deterministic conflict resolution.
//!
//! A [`Solution`] is an append-only record of remediation text stored under
//! one of two scopes: the local `project` scope or the shared `global`
//! scope. When both scopes hold a candidate for the same problem key,
//! [`resolve_conflict`] picks one winner through a fixed four-rule policy
//! and reports which rule fired.

mod cache;

pub use cache::SolutionCache;

use serde::{Deserialize, Serialize};

use crate::constants::{
    CONFLICT_GLOBAL_FRESH_DAYS_MAX, CONFLICT_NEWER_AGE_GAP_DAYS_MIN,
    CONFLICT_POPULARITY_RATIO_MIN, CONFLICT_PROJECT_PRIORITY_DAYS_MAX, TIME_SECS_PER_DAY,
};
use crate::dst::Clock;

// =============================================================================
// Solution
// =============================================================================

/// Scope a solution was stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolutionSource {
    /// Local project scope
    Project,
    /// Shared global scope
    Global,
}

impl SolutionSource {
    /// Scope tag for a boolean `is_global` flag.
    #[must_use]
    pub fn from_is_global(is_global: bool) -> Self {
        if is_global {
            Self::Global
        } else {
            Self::Project
        }
    }

    /// String representation (`"project"` / `"global"`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Global => "global",
        }
    }
}

impl std::fmt::Display for SolutionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored solution. Immutable once created: the cache layer never mutates
/// a solution in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    /// Remediation text
    pub content: String,
    /// Seconds since the Unix epoch as a decimal string. Accepted and
    /// re-emitted verbatim; an unparseable value ages as epoch zero.
    pub created_date: String,
    /// Times this solution has been applied (at least 1)
    pub use_count: u32,
    /// Scope the solution was stored under
    pub source: SolutionSource,
}

impl Solution {
    /// Create a solution stamped with the clock's current time and a
    /// use count of 1.
    #[must_use]
    pub fn new(content: impl Into<String>, source: SolutionSource, clock: &Clock) -> Self {
        Self {
            content: content.into(),
            created_date: clock.now_secs().to_string(),
            use_count: 1,
            source,
        }
    }

    /// Replace the creation timestamp (for bulk loads and tests).
    #[must_use]
    pub fn with_created_date(mut self, created_date: impl Into<String>) -> Self {
        self.created_date = created_date.into();
        self
    }

    /// Replace the use count.
    ///
    /// # Panics
    /// Panics if `use_count` is zero.
    #[must_use]
    pub fn with_use_count(mut self, use_count: u32) -> Self {
        assert!(use_count >= 1, "use_count must be at least 1");
        self.use_count = use_count;
        self
    }

    /// Creation time in seconds since the epoch; zero when unparseable.
    #[must_use]
    pub fn created_secs(&self) -> i64 {
        self.created_date.trim().parse().unwrap_or(0)
    }

    /// Whole days between `now_secs` and the creation time.
    #[must_use]
    pub fn age_days(&self, now_secs: i64) -> i64 {
        (now_secs - self.created_secs()) / TIME_SECS_PER_DAY
    }
}

// =============================================================================
// Conflict Resolution
// =============================================================================

/// Which rule selected the winning solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// Project solutions younger than the priority window always win
    RecentProjectPriority,
    /// The newer solution wins when the age gap is large enough
    NewerSolution,
    /// The more-used solution wins when the use-count ratio is large enough
    PopularityBased,
    /// Fallback: the project solution wins
    DefaultLocalPreference,
}

impl ConflictStrategy {
    /// String representation (`"recent_project_priority"` etc).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RecentProjectPriority => "recent_project_priority",
            Self::NewerSolution => "newer_solution",
            Self::PopularityBased => "popularity_based",
            Self::DefaultLocalPreference => "default_local_preference",
        }
    }
}

impl std::fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Winning solution plus how and why it was chosen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictResult {
    /// The chosen solution
    pub solution: Solution,
    /// The rule that selected it
    #[serde(rename = "conflict_resolution")]
    pub strategy: ConflictStrategy,
    /// Human-readable explanation
    pub reason: String,
}

impl ConflictResult {
    /// Bundle a winner with its strategy and reason.
    #[must_use]
    pub fn new(solution: Solution, strategy: ConflictStrategy, reason: impl Into<String>) -> Self {
        Self {
            solution,
            strategy,
            reason: reason.into(),
        }
    }
}

/// Resolve between the most recent project and global candidates for one
/// problem key. Pure: the same inputs and `now_secs` always produce the same
/// outcome, regardless of call order or thread.
///
/// Rules, evaluated in order, first match wins:
/// 1. Neither scope has a candidate: no result.
/// 2. Only the project scope has one: it wins.
/// 3. Only the global scope has one: it wins if younger than the freshness
///    window, otherwise no result.
/// 4. Both scopes have one:
///    a. project younger than the priority window: project wins;
///    b. age gap over the threshold: the newer one wins;
///    c. use-count ratio over the threshold: the more-used one wins;
///    d. otherwise the project candidate wins.
///
/// Ties in every comparison go to the project candidate.
#[must_use]
pub fn resolve_conflict(
    project: Option<&Solution>,
    global: Option<&Solution>,
    now_secs: i64,
) -> Option<ConflictResult> {
    match (project, global) {
        (None, None) => None,

        (Some(project), None) => Some(ConflictResult::new(
            project.clone(),
            ConflictStrategy::DefaultLocalPreference,
            "Only project solution available",
        )),

        (None, Some(global)) => {
            if now_secs - global.created_secs()
                < CONFLICT_GLOBAL_FRESH_DAYS_MAX * TIME_SECS_PER_DAY
            {
                Some(ConflictResult::new(
                    global.clone(),
                    ConflictStrategy::DefaultLocalPreference,
                    "Only recent global solution available",
                ))
            } else {
                None
            }
        }

        (Some(project), Some(global)) => {
            let project_secs = project.created_secs();
            let global_secs = global.created_secs();

            // Rule 1: recent project solutions always win.
            if now_secs - project_secs < CONFLICT_PROJECT_PRIORITY_DAYS_MAX * TIME_SECS_PER_DAY {
                return Some(ConflictResult::new(
                    project.clone(),
                    ConflictStrategy::RecentProjectPriority,
                    "Recent project solution takes priority",
                ));
            }

            // Rule 2: large age gap, the newer one wins.
            let age_gap_days = (project_secs - global_secs).abs() / TIME_SECS_PER_DAY;
            if age_gap_days > CONFLICT_NEWER_AGE_GAP_DAYS_MIN {
                let winner = if project_secs >= global_secs {
                    project
                } else {
                    global
                };
                return Some(ConflictResult::new(
                    winner.clone(),
                    ConflictStrategy::NewerSolution,
                    format!("Newer solution chosen (age difference: {age_gap_days} days)"),
                ));
            }

            // Rule 3: lopsided use counts, the popular one wins.
            let high = u32::max(project.use_count, global.use_count);
            let low = u32::min(project.use_count, global.use_count);
            let ratio = f64::from(high) / f64::from(low.max(1));
            if ratio > CONFLICT_POPULARITY_RATIO_MIN {
                let winner = if project.use_count >= global.use_count {
                    project
                } else {
                    global
                };
                return Some(ConflictResult::new(
                    winner.clone(),
                    ConflictStrategy::PopularityBased,
                    format!(
                        "Popular solution chosen (use counts: project={}, global={})",
                        project.use_count, global.use_count
                    ),
                ));
            }

            // Rule 4: default local preference.
            Some(ConflictResult::new(
                project.clone(),
                ConflictStrategy::DefaultLocalPreference,
                "Default local preference",
            ))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
