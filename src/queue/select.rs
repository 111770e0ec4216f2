//! Choosing which tasks are due.

use crate::domain::{PromptState, PromptTaskId};

/// Tasks due within this window after the reference time join the batch (16 hours).
pub const DEFAULT_FUZZY_WINDOW_MILLIS: i64 = 16 * 60 * 60 * 1000;
/// Maximum review queue length.
pub const DEFAULT_QUEUE_LIMIT: usize = 100;

/// Queue sizing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    pub limit: usize,
    pub fuzzy_window_millis: i64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_QUEUE_LIMIT,
            fuzzy_window_millis: DEFAULT_FUZZY_WINDOW_MILLIS,
        }
    }
}

/// Due threshold for a queue built at `reference_time_millis`. Never earlier
/// than the reference time.
pub fn fuzzy_due_threshold(reference_time_millis: i64, window_millis: i64) -> i64 {
    reference_time_millis.saturating_add(window_millis.max(0))
}

/// Task IDs due by the fuzzy threshold, ascending by due time then task ID,
/// at most `config.limit` of them.
pub fn select_due<'a, I>(states: I, reference_time_millis: i64, config: &QueueConfig) -> Vec<PromptTaskId>
where
    I: IntoIterator<Item = (&'a PromptTaskId, &'a PromptState)>,
{
    let threshold = fuzzy_due_threshold(reference_time_millis, config.fuzzy_window_millis);
    let mut due: Vec<(i64, &PromptTaskId)> = states
        .into_iter()
        .filter(|(_, state)| state.due_timestamp_millis <= threshold)
        .map(|(id, state)| (state.due_timestamp_millis, id))
        .collect();
    due.sort();
    due.into_iter().take(config.limit).map(|(_, id)| id.clone()).collect()
}
