//! Named scheduling strategies.
//!
//! A schedule maps (previous review interval, outcome, retry capability,
//! retry flag) to the next interval. The reducer only depends on the
//! [`Schedule`] trait; concrete growth laws are looked up by name in a
//! [`ScheduleRegistry`], so adding a schedule never touches the reducer.
//!
//! Everything here is pure: no clock reads, no I/O.

mod growth;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::domain::RepetitionOutcome;

pub use growth::{AGGRESSIVE_START_INITIAL_INTERVAL_MILLIS, DEFAULT_INITIAL_INTERVAL_MILLIS, GrowthSchedule, INTERVAL_GROWTH_FACTOR};

/// Name of the schedule every registry must provide.
pub const DEFAULT_SCHEDULE: &str = "default";
/// Name of the schedule that starts with a very short first interval.
pub const AGGRESSIVE_START_SCHEDULE: &str = "aggressiveStart";

/// Delay before a forgotten retry-capable task comes back (10 minutes).
pub const DEFAULT_RETRY_DELAY_MILLIS: i64 = 10 * 60 * 1000;

/// Inputs to one interval computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalRequest {
    /// Time since the previous review (0 for a first review)
    pub review_interval_millis: i64,
    pub outcome: RepetitionOutcome,
    pub supports_retry: bool,
    pub currently_needs_retry: bool,
}

/// A pluggable interval growth law.
pub trait Schedule: Send + Sync + fmt::Debug {
    /// Registry name of this schedule.
    fn name(&self) -> &str;

    /// Interval assigned to a freshly ingested task.
    fn initial_interval(&self) -> i64;

    /// Next interval after a review.
    ///
    /// `request.currently_needs_retry` is only ever true when
    /// `request.supports_retry` is; see [`compute_interval`].
    fn compute_interval(&self, request: &IntervalRequest) -> i64;
}

/// Compute the next interval under `schedule`.
///
/// The retry flag is masked by the retry capability before the schedule sees
/// it, so no schedule can reach retry behavior for a task type that disables it.
pub fn compute_interval(
    schedule: &dyn Schedule,
    review_interval_millis: i64,
    outcome: RepetitionOutcome,
    supports_retry: bool,
    currently_needs_retry: bool,
) -> i64 {
    schedule.compute_interval(&IntervalRequest {
        review_interval_millis,
        outcome,
        supports_retry,
        currently_needs_retry: supports_retry && currently_needs_retry,
    })
}

/// Name-to-strategy lookup.
#[derive(Debug, Clone)]
pub struct ScheduleRegistry {
    schedules: BTreeMap<String, Arc<dyn Schedule>>,
}

impl ScheduleRegistry {
    /// Registry holding only the built-in schedules.
    pub fn new() -> Self {
        let mut registry = Self {
            schedules: BTreeMap::new(),
        };
        registry.register(Arc::new(GrowthSchedule::standard()));
        registry.register(Arc::new(GrowthSchedule::aggressive_start()));
        registry
    }

    /// Add or replace a schedule under its own name.
    pub fn register(&mut self, schedule: Arc<dyn Schedule>) {
        self.schedules.insert(schedule.name().to_string(), schedule);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Schedule>> {
        self.schedules.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schedules.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.schedules.keys().map(|k| k.as_str()).collect()
    }
}

impl Default for ScheduleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
