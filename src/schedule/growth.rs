//! Multiplicative growth schedules.
//!
//! - Remembered: interval grows by `INTERVAL_GROWTH_FACTOR`
//! - Forgotten: interval shrinks by the same factor
//! - Retry in progress: interval resets to the initial interval
//! - Never below the schedule's initial interval

use super::{AGGRESSIVE_START_SCHEDULE, DEFAULT_SCHEDULE, IntervalRequest, Schedule};
use crate::domain::RepetitionOutcome;

/// Five days.
pub const DEFAULT_INITIAL_INTERVAL_MILLIS: i64 = 5 * 24 * 60 * 60 * 1000;
/// Five minutes.
pub const AGGRESSIVE_START_INITIAL_INTERVAL_MILLIS: i64 = 5 * 60 * 1000;
/// Multiplier applied on success, divisor on failure.
pub const INTERVAL_GROWTH_FACTOR: f64 = 2.3;

#[derive(Debug, Clone, PartialEq)]
pub struct GrowthSchedule {
    name: String,
    initial_interval_millis: i64,
    growth_factor: f64,
}

impl GrowthSchedule {
    pub fn new(name: impl Into<String>, initial_interval_millis: i64, growth_factor: f64) -> Self {
        Self {
            name: name.into(),
            initial_interval_millis,
            growth_factor,
        }
    }

    /// The `default` schedule.
    pub fn standard() -> Self {
        Self::new(DEFAULT_SCHEDULE, DEFAULT_INITIAL_INTERVAL_MILLIS, INTERVAL_GROWTH_FACTOR)
    }

    /// The `aggressiveStart` schedule.
    pub fn aggressive_start() -> Self {
        Self::new(
            AGGRESSIVE_START_SCHEDULE,
            AGGRESSIVE_START_INITIAL_INTERVAL_MILLIS,
            INTERVAL_GROWTH_FACTOR,
        )
    }
}

impl Schedule for GrowthSchedule {
    fn name(&self) -> &str {
        &self.name
    }

    fn initial_interval(&self) -> i64 {
        self.initial_interval_millis
    }

    fn compute_interval(&self, request: &IntervalRequest) -> i64 {
        if request.supports_retry && request.currently_needs_retry {
            return self.initial_interval_millis;
        }

        let review = request.review_interval_millis as f64;
        // `as` saturates on overflow
        let scaled = match request.outcome {
            RepetitionOutcome::Remembered => (review * self.growth_factor).floor() as i64,
            RepetitionOutcome::Forgotten => (review / self.growth_factor).floor() as i64,
        };
        scaled.max(self.initial_interval_millis)
    }
}
