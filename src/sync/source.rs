//! Sources of action logs not yet folded locally.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::ActionLog;
use crate::error::{Result, SpacedRepError};
use crate::reduce::ReviewPolicy;
use crate::store::PromptStateStore;
use crate::sync::fold::{FoldReport, fold_action_logs};

/// Supplies action logs the local store has not seen.
///
/// `since` is the store's sync cursor: the latest log timestamp folded so far,
/// or `None` before the first sync. An empty batch means the source is drained
/// for now.
#[async_trait]
pub trait ActionLogSource: Send + Sync {
    async fn fetch_new_logs(&self, since: Option<i64>) -> Result<Vec<ActionLog>>;
}

/// Drain `source`, folding each batch into `store`.
///
/// The cursor is re-read before every fetch, so each batch is requested from
/// where the previous fold left off.
pub async fn sync_from_source(
    store: &PromptStateStore,
    source: &dyn ActionLogSource,
    policy: &ReviewPolicy,
) -> Result<FoldReport> {
    let mut report = FoldReport::default();
    loop {
        let since = store.latest_log_timestamp().await?;
        let batch = source.fetch_new_logs(since).await?;
        if batch.is_empty() {
            break;
        }
        log::debug!("Fetched {} action logs since {since:?}", batch.len());
        report.merge(fold_action_logs(store, batch, policy).await?);
    }
    log::debug!("Sync looked at {} action logs", report.total());
    Ok(report)
}

pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Newline-delimited `ActionLog` JSON read from a file, served in batches.
///
/// The file is read on the first fetch. Logs at or before the cursor passed
/// to that fetch are left out unless the source replays the whole file.
pub struct JsonlLogSource {
    path: PathBuf,
    batch_size: usize,
    full_replay: bool,
    pending: Mutex<Option<VecDeque<ActionLog>>>,
}

impl JsonlLogSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            batch_size: DEFAULT_BATCH_SIZE,
            full_replay: false,
            pending: Mutex::new(None),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Serve every log in the file, ignoring the cursor. Already folded logs
    /// are still skipped by the fold.
    pub fn with_full_replay(mut self) -> Self {
        self.full_replay = true;
        self
    }

    async fn load(&self, since: Option<i64>) -> Result<VecDeque<ActionLog>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SpacedRepError::Source(format!("Failed to read {}: {e}", self.path.display())))?;
        let mut logs = parse_jsonl(&content).map_err(|(line, e)| {
            SpacedRepError::Source(format!("{}:{line}: invalid action log: {e}", self.path.display()))
        })?;

        if let Some(since) = since.filter(|_| !self.full_replay) {
            let total = logs.len();
            logs.retain(|log| log.timestamp_millis() > since);
            log::debug!(
                "{}: {} of {total} action logs are newer than {since}",
                self.path.display(),
                logs.len()
            );
        }
        Ok(logs)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<VecDeque<ActionLog>>>> {
        self.pending.lock().map_err(|e| SpacedRepError::Source(e.to_string()))
    }
}

/// Parse JSONL, reporting the 1-based line number of the first bad line.
fn parse_jsonl(content: &str) -> std::result::Result<VecDeque<ActionLog>, (usize, serde_json::Error)> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| serde_json::from_str(line).map_err(|e| (i + 1, e)))
        .collect()
}

#[async_trait]
impl ActionLogSource for JsonlLogSource {
    async fn fetch_new_logs(&self, since: Option<i64>) -> Result<Vec<ActionLog>> {
        let needs_load = self.lock()?.is_none();
        if needs_load {
            let loaded = self.load(since).await?;
            self.lock()?.get_or_insert(loaded);
        }

        let mut pending = self.lock()?;
        let queue = pending.get_or_insert_with(VecDeque::new);
        let take = self.batch_size.min(queue.len());
        Ok(queue.drain(..take).collect())
    }
}
