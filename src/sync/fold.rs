//! Folding batches of action logs into the store.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::domain::{ActionLog, ActionLogId, PromptState, PromptTaskId};
use crate::error::Result;
use crate::reduce::{ReviewPolicy, apply_action_log};
use crate::store::{PromptStateStore, StoreCommit};

/// Counts from one fold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FoldReport {
    pub applied: usize,
    /// Logs already folded into the store
    pub skipped_duplicates: usize,
    /// Logs whose task ID could not be decoded
    pub decode_failures: usize,
}

impl FoldReport {
    pub fn merge(&mut self, other: FoldReport) {
        self.applied += other.applied;
        self.skipped_duplicates += other.skipped_duplicates;
        self.decode_failures += other.decode_failures;
    }

    /// Every log the fold looked at.
    pub fn total(&self) -> usize {
        self.applied + self.skipped_duplicates + self.decode_failures
    }
}

/// Order logs so every parent present in the batch precedes its children.
///
/// Kahn's algorithm over parent links. Among logs that are ready at the same
/// time, earlier timestamps go first, then lower IDs. Identical logs collapse
/// to one entry.
pub fn order_action_logs(logs: Vec<ActionLog>) -> Vec<ActionLog> {
    let mut nodes: Vec<(ActionLogId, ActionLog)> = Vec::with_capacity(logs.len());
    let mut index_of: HashMap<ActionLogId, usize> = HashMap::new();
    for log in logs {
        let id = log.id();
        if !index_of.contains_key(&id) {
            index_of.insert(id.clone(), nodes.len());
            nodes.push((id, log));
        }
    }

    let mut in_degree = vec![0usize; nodes.len()];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (child, (_, log)) in nodes.iter().enumerate() {
        let parents: HashSet<&ActionLogId> = log.parent_action_log_ids().iter().collect();
        for parent in parents {
            if let Some(&p) = index_of.get(parent) {
                in_degree[child] += 1;
                children[p].push(child);
            }
        }
    }

    let sort_key = |i: usize| Reverse((nodes[i].1.timestamp_millis(), nodes[i].0.clone(), i));
    let mut ready: BinaryHeap<_> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).map(sort_key).collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(Reverse((_, _, i))) = ready.pop() {
        order.push(i);
        for &child in &children[i] {
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                ready.push(sort_key(child));
            }
        }
    }

    // Content-derived IDs cannot form a cycle; anything left over is appended
    if order.len() != nodes.len() {
        let placed: HashSet<usize> = order.iter().copied().collect();
        let mut rest: Vec<usize> = (0..nodes.len()).filter(|i| !placed.contains(i)).collect();
        log::warn!("{} action logs in a parent cycle, appending by timestamp", rest.len());
        rest.sort_by_key(|&i| (nodes[i].1.timestamp_millis(), nodes[i].0.clone()));
        order.extend(rest);
    }

    let mut slots: Vec<Option<ActionLog>> = nodes.into_iter().map(|(_, log)| Some(log)).collect();
    order.into_iter().filter_map(|i| slots[i].take()).collect()
}

/// Fold `logs` into `store` under `policy` and commit the results at once.
///
/// Logs already folded into the store, by this batch or an earlier one, are
/// skipped. Logs with undecodable task IDs are logged and skipped without
/// failing the batch. The sync cursor advances to the latest timestamp in the
/// batch. Concurrent folds through clones of one store are serialized.
pub async fn fold_action_logs(
    store: &PromptStateStore,
    logs: Vec<ActionLog>,
    policy: &ReviewPolicy,
) -> Result<FoldReport> {
    let logs = order_action_logs(logs);
    let ids: Vec<ActionLogId> = logs.iter().map(|log| log.id()).collect();
    let latest_log_timestamp_millis = logs.iter().map(|log| log.timestamp_millis()).max();

    let _writer = store.lock_writer().await;
    let known = store.applied_log_ids(ids.clone()).await?;

    let mut stored: HashMap<PromptTaskId, PromptState> = HashMap::new();
    let task_ids: HashSet<&PromptTaskId> = logs.iter().map(|log| log.task_id()).collect();
    for task_id in task_ids {
        if let Some(state) = store.get(task_id).await? {
            stored.insert(task_id.clone(), state);
        }
    }

    let mut report = FoldReport::default();
    let mut updated: HashMap<PromptTaskId, PromptState> = HashMap::new();
    let mut touched: Vec<PromptTaskId> = Vec::new();
    let mut applied: Vec<ActionLogId> = Vec::new();

    for (action_log, id) in logs.iter().zip(ids) {
        let task_id = action_log.task_id();
        let base = updated.get(task_id).or_else(|| stored.get(task_id));

        if known.contains(&id) || base.is_some_and(|b| b.has_head(&id)) {
            log::debug!("Action log {id} already applied to {task_id}");
            report.skipped_duplicates += 1;
            continue;
        }

        match apply_action_log(action_log, base, policy) {
            Ok(next) => {
                if !updated.contains_key(task_id) {
                    touched.push(task_id.clone());
                }
                updated.insert(task_id.clone(), next);
                applied.push(id);
                report.applied += 1;
            }
            Err(e) => {
                log::warn!("Skipping action log {id}: {e}");
                report.decode_failures += 1;
            }
        }
    }

    let entries: Vec<_> = touched
        .into_iter()
        .filter_map(|task_id| updated.remove(&task_id).map(|state| (task_id, state)))
        .collect();
    let commit = StoreCommit {
        entries,
        applied_log_ids: applied,
        latest_log_timestamp_millis,
    };
    if !commit.is_empty() {
        store.commit(commit).await?;
    }

    log::info!(
        "Folded {} action logs ({} duplicates, {} undecodable)",
        report.applied,
        report.skipped_duplicates,
        report.decode_failures
    );
    Ok(report)
}
