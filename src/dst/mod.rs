//! Deterministic time sources.
//!
//! Every time-dependent component in the crate reads the current time
//! through a [`Clock`], so tests can pin "now" and replay the exact same
//! decisions the production engine makes under the system clock.

mod clock;

pub use clock::{Clock, SimClock};
