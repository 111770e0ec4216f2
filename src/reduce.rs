//! Folding one action log into a prompt state.
//!
//! `apply_action_log` is pure: it never reads the clock or touches the store,
//! and it returns a fresh `PromptState` instead of mutating `base`.

use std::sync::Arc;

use crate::domain::{
    ActionLog, ActionLogId, IngestActionLog, PromptState, RepetitionActionLog, RepetitionOutcome,
    update_head_action_log_ids,
};
use crate::error::DecodeError;
use crate::schedule::{DEFAULT_RETRY_DELAY_MILLIS, GrowthSchedule, Schedule, compute_interval};

/// Scheduling parameters the reducer runs under.
#[derive(Debug, Clone)]
pub struct ReviewPolicy {
    pub schedule: Arc<dyn Schedule>,
    /// Delay before a forgotten retry-capable task is due again
    pub retry_delay_millis: i64,
}

impl ReviewPolicy {
    pub fn new(schedule: Arc<dyn Schedule>, retry_delay_millis: i64) -> Self {
        Self {
            schedule,
            retry_delay_millis,
        }
    }
}

impl Default for ReviewPolicy {
    fn default() -> Self {
        Self::new(Arc::new(GrowthSchedule::standard()), DEFAULT_RETRY_DELAY_MILLIS)
    }
}

/// Apply `log` on top of `base`, producing the next state.
///
/// Only task ID decoding can fail. Callers detect already-applied logs with
/// [`PromptState::has_head`] before calling; this function does not.
pub fn apply_action_log(
    log: &ActionLog,
    base: Option<&PromptState>,
    policy: &ReviewPolicy,
) -> Result<PromptState, DecodeError> {
    let task = log.task_id().decode()?;
    let id = log.id();

    match log {
        ActionLog::Ingest(ingest) => Ok(apply_ingest(ingest, base, &id, policy.schedule.as_ref())),
        ActionLog::Repetition(repetition) => {
            Ok(apply_repetition(repetition, base, &id, task.supports_retry(), policy))
        }
    }
}

fn apply_ingest(
    log: &IngestActionLog,
    base: Option<&PromptState>,
    id: &ActionLogId,
    schedule: &dyn Schedule,
) -> PromptState {
    match base {
        // A late ingest never resets progress
        Some(base) => PromptState {
            head_action_log_ids: update_head_action_log_ids(&base.head_action_log_ids, &log.parent_action_log_ids, id),
            ..base.clone()
        },
        None => {
            let interval_millis = schedule.initial_interval();
            PromptState {
                head_action_log_ids: vec![id.clone()],
                last_review_timestamp_millis: log.timestamp_millis,
                due_timestamp_millis: log.timestamp_millis.saturating_add(interval_millis),
                interval_millis,
                best_interval_millis: None,
                needs_retry: false,
                last_review_task_parameters: None,
            }
        }
    }
}

fn apply_repetition(
    log: &RepetitionActionLog,
    base: Option<&PromptState>,
    id: &ActionLogId,
    supports_retry: bool,
    policy: &ReviewPolicy,
) -> PromptState {
    let review_interval_millis = base
        .map(|b| log.timestamp_millis.saturating_sub(b.last_review_timestamp_millis))
        .unwrap_or(0);
    let current_best = base.and_then(|b| b.best_interval_millis);
    let currently_needs_retry = base.is_some_and(|b| b.needs_retry);

    let interval_millis = compute_interval(
        policy.schedule.as_ref(),
        review_interval_millis,
        log.outcome,
        supports_retry,
        currently_needs_retry,
    );

    let forgotten = log.outcome == RepetitionOutcome::Forgotten;
    let due_timestamp_millis = if supports_retry && forgotten {
        log.timestamp_millis.saturating_add(policy.retry_delay_millis)
    } else {
        log.timestamp_millis.saturating_add(interval_millis)
    };

    let best_interval_millis = match log.outcome {
        RepetitionOutcome::Remembered => Some(current_best.unwrap_or(0).max(review_interval_millis)),
        RepetitionOutcome::Forgotten => current_best,
    };

    let base_heads = base.map(|b| b.head_action_log_ids.as_slice()).unwrap_or(&[]);

    PromptState {
        head_action_log_ids: update_head_action_log_ids(base_heads, &log.parent_action_log_ids, id),
        last_review_timestamp_millis: log.timestamp_millis,
        due_timestamp_millis,
        interval_millis,
        best_interval_millis,
        needs_retry: supports_retry && forgotten,
        last_review_task_parameters: log.task_parameters.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PromptTaskId;
    use crate::schedule::DEFAULT_INITIAL_INTERVAL_MILLIS;

    fn basic() -> PromptTaskId {
        PromptTaskId::from("basicPrompt/abc")
    }

    fn application() -> PromptTaskId {
        PromptTaskId::from("applicationPrompt/xyz")
    }

    fn ingested(task: PromptTaskId, ts: i64) -> (ActionLog, PromptState) {
        let log = ActionLog::ingest(task, ts, vec![]);
        let state = apply_action_log(&log, None, &ReviewPolicy::default()).unwrap();
        (log, state)
    }

    #[test]
    fn test_ingest_creates_initial_state() {
        let (log, state) = ingested(basic(), 1000);
        assert_eq!(state.head_action_log_ids, vec![log.id()]);
        assert_eq!(state.last_review_timestamp_millis, 1000);
        assert_eq!(state.interval_millis, 432_000_000);
        assert_eq!(state.due_timestamp_millis, 432_001_000);
        assert!(!state.needs_retry);
        assert_eq!(state.best_interval_millis, None);
        assert_eq!(state.last_review_task_parameters, None);
    }

    #[test]
    fn test_forgotten_schedules_retry() {
        let policy = ReviewPolicy::default();
        let (ingest, base) = ingested(basic(), 1000);
        let rep = ActionLog::repetition(basic(), 432_001_000, vec![ingest.id()], RepetitionOutcome::Forgotten, None);

        let state = apply_action_log(&rep, Some(&base), &policy).unwrap();
        assert!(state.needs_retry);
        assert_eq!(state.due_timestamp_millis, 432_001_000 + policy.retry_delay_millis);
        assert_eq!(state.best_interval_millis, base.best_interval_millis);
        assert_eq!(state.head_action_log_ids, vec![rep.id()]);
    }

    #[test]
    fn test_fork_then_merge() {
        let policy = ReviewPolicy::default();
        let (ingest, base) = ingested(basic(), 1000);
        let h = ingest.id();
        let b = ActionLog::repetition(basic(), 2000, vec![h.clone()], RepetitionOutcome::Remembered, None);
        let c = ActionLog::repetition(basic(), 2500, vec![h.clone()], RepetitionOutcome::Forgotten, None);

        let bc = apply_action_log(&c, Some(&apply_action_log(&b, Some(&base), &policy).unwrap()), &policy).unwrap();
        let cb = apply_action_log(&b, Some(&apply_action_log(&c, Some(&base), &policy).unwrap()), &policy).unwrap();
        for state in [&bc, &cb] {
            assert_eq!(state.head_action_log_ids.len(), 2);
            assert!(state.has_head(&b.id()));
            assert!(state.has_head(&c.id()));
        }

        let merge = ActionLog::repetition(basic(), 3000, vec![b.id(), c.id()], RepetitionOutcome::Remembered, None);
        let merged = apply_action_log(&merge, Some(&bc), &policy).unwrap();
        assert_eq!(merged.head_action_log_ids, vec![merge.id()]);
    }

    #[test]
    fn test_late_ingest_keeps_progress() {
        let policy = ReviewPolicy::default();
        let (ingest, base) = ingested(basic(), 1000);
        let rep = ActionLog::repetition(basic(), 5000, vec![ingest.id()], RepetitionOutcome::Remembered, None);
        let reviewed = apply_action_log(&rep, Some(&base), &policy).unwrap();

        let other_ingest = ActionLog::ingest(basic(), 900, vec![]);
        let state = apply_action_log(&other_ingest, Some(&reviewed), &policy).unwrap();
        assert_eq!(state.due_timestamp_millis, reviewed.due_timestamp_millis);
        assert_eq!(state.interval_millis, reviewed.interval_millis);
        assert_eq!(state.head_action_log_ids, vec![rep.id(), other_ingest.id()]);
    }

    #[test]
    fn test_reapply_keeps_heads() {
        let policy = ReviewPolicy::default();
        let (ingest, base) = ingested(basic(), 1000);
        let rep = ActionLog::repetition(basic(), 9000, vec![ingest.id()], RepetitionOutcome::Remembered, None);
        let once = apply_action_log(&rep, Some(&base), &policy).unwrap();
        let twice = apply_action_log(&rep, Some(&once), &policy).unwrap();
        assert_eq!(once.head_action_log_ids, twice.head_action_log_ids);
    }

    #[test]
    fn test_best_interval_monotonic() {
        let policy = ReviewPolicy::default();
        let (ingest, mut state) = ingested(basic(), 0);
        let mut parent = ingest.id();
        let mut best = 0;
        // Gaps shrink after the second review; best must hold.
        for ts in [10_000_i64, 50_000, 51_000, 52_000, 200_000] {
            let rep = ActionLog::repetition(basic(), ts, vec![parent.clone()], RepetitionOutcome::Remembered, None);
            state = apply_action_log(&rep, Some(&state), &policy).unwrap();
            let current = state.best_interval_millis.unwrap();
            assert!(current >= best);
            best = current;
            parent = rep.id();
        }
        assert_eq!(best, 148_000);
    }

    #[test]
    fn test_forgotten_does_not_touch_best() {
        let policy = ReviewPolicy::default();
        let (ingest, base) = ingested(basic(), 0);
        let rep = ActionLog::repetition(basic(), 10_000, vec![ingest.id()], RepetitionOutcome::Remembered, None);
        let remembered = apply_action_log(&rep, Some(&base), &policy).unwrap();
        let fail = ActionLog::repetition(basic(), 900_000, vec![rep.id()], RepetitionOutcome::Forgotten, None);
        let forgotten = apply_action_log(&fail, Some(&remembered), &policy).unwrap();
        assert_eq!(forgotten.best_interval_millis, Some(10_000));
    }

    #[test]
    fn test_application_never_needs_retry() {
        let policy = ReviewPolicy::default();
        let (ingest, mut state) = ingested(application(), 0);
        let mut parent = ingest.id();
        for (i, outcome) in [
            RepetitionOutcome::Forgotten,
            RepetitionOutcome::Forgotten,
            RepetitionOutcome::Remembered,
            RepetitionOutcome::Forgotten,
        ]
        .into_iter()
        .enumerate()
        {
            let ts = (i as i64 + 1) * 1_000_000;
            let rep = ActionLog::repetition(application(), ts, vec![parent.clone()], outcome, None);
            state = apply_action_log(&rep, Some(&state), &policy).unwrap();
            assert!(!state.needs_retry);
            assert_eq!(state.due_timestamp_millis, ts + state.interval_millis);
            parent = rep.id();
        }
    }

    #[test]
    fn test_retry_review_resets_interval() {
        let policy = ReviewPolicy::default();
        let (ingest, base) = ingested(basic(), 0);
        let fail = ActionLog::repetition(basic(), 100, vec![ingest.id()], RepetitionOutcome::Forgotten, None);
        let retrying = apply_action_log(&fail, Some(&base), &policy).unwrap();
        let retry = ActionLog::repetition(basic(), 700_100, vec![fail.id()], RepetitionOutcome::Remembered, None);
        let state = apply_action_log(&retry, Some(&retrying), &policy).unwrap();
        assert!(!state.needs_retry);
        assert_eq!(state.interval_millis, DEFAULT_INITIAL_INTERVAL_MILLIS);
        assert_eq!(state.due_timestamp_millis, 700_100 + DEFAULT_INITIAL_INTERVAL_MILLIS);
    }

    #[test]
    fn test_repetition_without_base() {
        let rep = ActionLog::repetition(basic(), 5000, vec![], RepetitionOutcome::Remembered, Some(serde_json::json!({"v": 1})));
        let state = apply_action_log(&rep, None, &ReviewPolicy::default()).unwrap();
        assert_eq!(state.best_interval_millis, Some(0));
        assert_eq!(state.interval_millis, DEFAULT_INITIAL_INTERVAL_MILLIS);
        assert_eq!(state.last_review_task_parameters, Some(serde_json::json!({"v": 1})));
    }

    #[test]
    fn test_bad_task_id_is_decode_error() {
        let log = ActionLog::ingest(PromptTaskId::from("nonsense"), 0, vec![]);
        let err = apply_action_log(&log, None, &ReviewPolicy::default()).unwrap_err();
        assert_eq!(err.task_id, "nonsense");
    }

    #[test]
    fn test_custom_retry_delay() {
        let policy = ReviewPolicy::new(Arc::new(GrowthSchedule::standard()), 42);
        let rep = ActionLog::repetition(basic(), 1000, vec![ActionLogId::new("x")], RepetitionOutcome::Forgotten, None);
        let state = apply_action_log(&rep, None, &policy).unwrap();
        assert_eq!(state.due_timestamp_millis, 1042);
    }
}
