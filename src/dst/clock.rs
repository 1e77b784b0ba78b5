//! SimClock - simulated time.
//!
//! Deterministic, controllable time for tests:
//! - Time only moves forward
//! - All time operations are explicit
//! - No reliance on system time

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

use crate::constants::{DST_TIME_ADVANCE_MS_MAX, TIME_MS_PER_SEC};

/// A simulated clock for deterministic testing.
///
/// Thread-safe via `Arc<AtomicU64>`: clones share the same underlying time,
/// so a test can hold one handle while the engine holds another.
#[derive(Debug, Clone)]
pub struct SimClock {
    /// Current time in milliseconds since epoch (shared across clones)
    current_ms: Arc<AtomicU64>,
}

impl SimClock {
    /// Create a new clock starting at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::at_ms(0)
    }

    /// Create a clock starting at the given millisecond timestamp.
    #[must_use]
    pub fn at_ms(start_ms: u64) -> Self {
        Self {
            current_ms: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Create a clock starting at the given `DateTime`.
    #[must_use]
    pub fn at_datetime(dt: DateTime<Utc>) -> Self {
        Self::at_ms(dt.timestamp_millis().max(0) as u64)
    }

    /// Get current time in milliseconds.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.current_ms.load(Ordering::SeqCst)
    }

    /// Get current time in seconds (truncated).
    #[must_use]
    pub fn now_secs(&self) -> u64 {
        self.now_ms() / TIME_MS_PER_SEC
    }

    /// Get current time as `DateTime<Utc>`.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.now_ms() as i64)
            .unwrap_or_else(|| DateTime::from_timestamp(0, 0).unwrap())
    }

    /// Advance time by the given milliseconds and return the new time.
    ///
    /// # Panics
    /// Panics if `ms` exceeds `DST_TIME_ADVANCE_MS_MAX`.
    pub fn advance_ms(&self, ms: u64) -> u64 {
        // Precondition
        assert!(
            ms <= DST_TIME_ADVANCE_MS_MAX,
            "advance_ms({}) exceeds max ({})",
            ms,
            DST_TIME_ADVANCE_MS_MAX
        );

        let old_time = self.current_ms.fetch_add(ms, Ordering::SeqCst);
        let new_time = old_time.saturating_add(ms);

        // Postcondition
        assert!(new_time >= old_time, "time must not go backwards");

        new_time
    }

    /// Advance time by the given seconds.
    pub fn advance_secs(&self, secs: u64) -> u64 {
        self.advance_ms(secs * TIME_MS_PER_SEC)
    }

    /// Set time to an absolute millisecond value.
    ///
    /// # Panics
    /// Panics if the new time is less than the current time.
    pub fn set_ms(&self, ms: u64) {
        let current = self.now_ms();
        // Precondition
        assert!(
            ms >= current,
            "cannot set time backwards: {} < {}",
            ms,
            current
        );

        self.current_ms.store(ms, Ordering::SeqCst);
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Time source injected into engine components.
///
/// Production code uses [`Clock::System`]; tests use [`Clock::Sim`] to pin
/// "now" and make conflict resolution, scoring, and aggregate ids
/// reproducible.
#[derive(Debug, Clone)]
pub enum Clock {
    /// Wall-clock time from the operating system
    System,
    /// Simulated time under test control
    Sim(SimClock),
}

impl Clock {
    /// Wall-clock time source.
    #[must_use]
    pub fn system() -> Self {
        Self::System
    }

    /// Simulated time source sharing state with `clock`.
    #[must_use]
    pub fn sim(clock: SimClock) -> Self {
        Self::Sim(clock)
    }

    /// Current time in milliseconds since the Unix epoch.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        match self {
            Self::System => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |elapsed| elapsed.as_millis() as u64),
            Self::Sim(clock) => clock.now_ms(),
        }
    }

    /// Current time in seconds since the Unix epoch (truncated).
    #[must_use]
    pub fn now_secs(&self) -> u64 {
        self.now_ms() / TIME_MS_PER_SEC
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::System
    }
}

impl From<SimClock> for Clock {
    fn from(clock: SimClock) -> Self {
        Self::Sim(clock)
    }
}
