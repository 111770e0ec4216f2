//! Materialized scheduling state for one task.

use serde::{Deserialize, Serialize};

use crate::domain::action_log::ActionLogId;

/// The current derived scheduling state of a prompt task.
///
/// Never mutated in place by the reducer: every applied log yields a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptState {
    /// Frontier of the merged action log DAG
    #[serde(rename = "headActionLogIDs")]
    pub head_action_log_ids: Vec<ActionLogId>,
    pub last_review_timestamp_millis: i64,
    pub due_timestamp_millis: i64,
    pub interval_millis: i64,
    /// Largest interval sustained between two remembered reviews
    pub best_interval_millis: Option<i64>,
    pub needs_retry: bool,
    pub last_review_task_parameters: Option<serde_json::Value>,
}

impl PromptState {
    /// Whether `id` is already part of the head set, i.e. already folded in.
    pub fn has_head(&self, id: &ActionLogId) -> bool {
        self.head_action_log_ids.contains(id)
    }
}

/// Fold a new log into a head set.
///
/// Every base head listed among the new log's parents is subsumed by it and
/// dropped; the new ID is appended unless it is already present.
pub fn update_head_action_log_ids(
    base_heads: &[ActionLogId],
    new_parent_ids: &[ActionLogId],
    new_id: &ActionLogId,
) -> Vec<ActionLogId> {
    let mut output = Vec::with_capacity(base_heads.len() + 1);
    let mut already_included = false;
    for head in base_heads {
        if !new_parent_ids.contains(head) {
            output.push(head.clone());
        }
        if head == new_id {
            already_included = true;
        }
    }
    if !already_included {
        output.push(new_id.clone());
    }
    output
}
