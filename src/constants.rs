//! Engine constants.
//!
//! All limits use big-endian naming with units in the name:
//! - `_COUNT_MAX` for quantity limits
//! - `_DAYS_MAX/MIN` for age windows
//! - `_MS`/`_SECS` for time values
//!
//! Every policy number in the crate lives here; the modules never embed a
//! bare threshold.

// =============================================================================
// Solution Cache Limits
// =============================================================================

/// Maximum solutions retained per problem key and scope (oldest evicted first)
pub const SOLUTIONS_PER_PROBLEM_COUNT_MAX: usize = 5;

// =============================================================================
// Conflict Resolution Policy
// =============================================================================

/// A lone global solution older than this is ignored
pub const CONFLICT_GLOBAL_FRESH_DAYS_MAX: i64 = 180;

/// A project solution younger than this always wins
pub const CONFLICT_PROJECT_PRIORITY_DAYS_MAX: i64 = 30;

/// Age gap beyond which the newer solution wins regardless of scope
pub const CONFLICT_NEWER_AGE_GAP_DAYS_MIN: i64 = 90;

/// Use-count ratio beyond which the more-used solution wins
pub const CONFLICT_POPULARITY_RATIO_MIN: f64 = 3.0;

// =============================================================================
// Categorization
// =============================================================================

/// Category returned when no pattern matches a message
pub const CATEGORY_UNCATEGORISED: &str = "errors_uncategorised";

// =============================================================================
// Quality Scoring
// =============================================================================

/// Minimum quality score
pub const SCORE_MIN: f64 = 0.0;

/// Maximum quality score
pub const SCORE_MAX: f64 = 1.0;

/// Weight of the completeness sub-score in the combined score
pub const SCORE_WEIGHT_COMPLETENESS: f64 = 0.25;

/// Weight of the clarity sub-score in the combined score
pub const SCORE_WEIGHT_CLARITY: f64 = 0.20;

/// Weight of the specificity sub-score in the combined score
pub const SCORE_WEIGHT_SPECIFICITY: f64 = 0.25;

/// Weight of the reliability sub-score in the combined score
pub const SCORE_WEIGHT_RELIABILITY: f64 = 0.15;

/// Weight of the context-relevance sub-score in the combined score
pub const SCORE_WEIGHT_CONTEXT: f64 = 0.15;

/// Content length below which clarity is penalized
pub const SCORE_CONTENT_CHARS_TERSE: usize = 10;

/// Content length above which completeness gains substance credit
pub const SCORE_CONTENT_CHARS_SUBSTANTIAL: usize = 20;

/// Content length above which completeness gains detail credit
pub const SCORE_CONTENT_CHARS_DETAILED: usize = 100;

/// Problem tokens must exceed this length to count toward specificity
pub const SCORE_TERM_CHARS_MIN: usize = 3;

/// Solution age below which reliability gains the fresh bonus
pub const RELIABILITY_AGE_DAYS_FRESH: i64 = 30;

/// Solution age below which reliability gains the recent bonus
pub const RELIABILITY_AGE_DAYS_RECENT: i64 = 90;

/// Solution age below which reliability gains the aging bonus
pub const RELIABILITY_AGE_DAYS_AGING: i64 = 180;

/// Solution age beyond which reliability is penalized
pub const RELIABILITY_AGE_DAYS_STALE: i64 = 365;

// =============================================================================
// Ranked Retrieval
// =============================================================================

/// Default number of suggestions emitted by the suggestions serializer
pub const SUGGESTIONS_COUNT_DEFAULT: usize = 5;

/// Decimal places kept on serialized suggestion scores
pub const SUGGESTIONS_SCORE_DECIMALS: u32 = 3;

// =============================================================================
// Domain Events
// =============================================================================

/// Prefix on every domain event id
pub const EVENT_ID_PREFIX: &str = "evt_";

/// Number of uppercase hex characters after the event id prefix
pub const EVENT_ID_HEX_CHARS_COUNT: usize = 16;

/// Prefix on memory entry aggregate ids (`mem_<ms-epoch>`)
pub const MEMORY_ENTRY_ID_PREFIX: &str = "mem";

/// Prefix on search session aggregate ids (`search_<ms-epoch>`)
pub const SEARCH_SESSION_ID_PREFIX: &str = "search";

// =============================================================================
// Time Constants
// =============================================================================

/// Milliseconds per second
pub const TIME_MS_PER_SEC: u64 = 1000;

/// Seconds per day
pub const TIME_SECS_PER_DAY: i64 = 86_400;

/// Milliseconds per day
pub const TIME_MS_PER_DAY: u64 = 86_400_000;

/// Maximum time advance per `SimClock::advance_ms` call (24 hours)
pub const DST_TIME_ADVANCE_MS_MAX: u64 = TIME_MS_PER_DAY;

// =============================================================================
// Tests
// =============================================================================
