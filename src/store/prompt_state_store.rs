//! Durable prompt state store with a due-timestamp index.
//!
//! Every operation is queued on one FIFO channel and executed by a dedicated
//! worker thread that owns the byte engine, so operations never interleave and
//! no reader observes half of an upsert batch. Callers get awaitable handles.
//!
//! Besides states, the store keeps the IDs of every action log folded into
//! them and the sync cursor, both committed in the same batch as the states.

use std::collections::{HashMap, HashSet};
use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use tokio::sync::{Mutex, MutexGuard, mpsc, oneshot};

use crate::domain::{ActionLogId, PromptState, PromptTaskId};
use crate::error::{Result, SpacedRepError};
use crate::store::engine::{BatchOp, ByteStore, ScanControl};
use crate::store::keys;
use crate::store::sqlite::SqliteByteStore;

/// A task ID paired with its state.
pub type StateEntry = (PromptTaskId, PromptState);

/// Everything written by one atomic batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreCommit {
    pub entries: Vec<StateEntry>,
    /// Action logs now reflected in `entries`
    pub applied_log_ids: Vec<ActionLogId>,
    /// Advances the sync cursor; a value below the stored one is ignored
    pub latest_log_timestamp_millis: Option<i64>,
}

impl StoreCommit {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.applied_log_ids.is_empty() && self.latest_log_timestamp_millis.is_none()
    }
}

enum StoreOp {
    Commit {
        commit: StoreCommit,
        reply: oneshot::Sender<Result<()>>,
    },
    Get {
        task_id: PromptTaskId,
        reply: oneshot::Sender<Result<Option<PromptState>>>,
    },
    AppliedLogIds {
        ids: Vec<ActionLogId>,
        reply: oneshot::Sender<Result<HashSet<ActionLogId>>>,
    },
    LatestLogTimestamp {
        reply: oneshot::Sender<Result<Option<i64>>>,
    },
    QueryDueBefore {
        threshold_millis: i64,
        limit: Option<usize>,
        reply: oneshot::Sender<Result<Vec<StateEntry>>>,
    },
    Clear {
        reply: oneshot::Sender<Result<()>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

impl StoreOp {
    fn name(&self) -> &'static str {
        match self {
            StoreOp::Commit { .. } => "commit",
            StoreOp::Get { .. } => "get",
            StoreOp::AppliedLogIds { .. } => "applied_log_ids",
            StoreOp::LatestLogTimestamp { .. } => "latest_log_timestamp",
            StoreOp::QueryDueBefore { .. } => "query_due_before",
            StoreOp::Clear { .. } => "clear",
            StoreOp::Close { .. } => "close",
        }
    }
}

/// Handle to a running store worker. Clones share the same queue and the
/// same writer lock.
#[derive(Clone)]
pub struct PromptStateStore {
    sender: mpsc::UnboundedSender<StoreOp>,
    writer: Arc<Mutex<()>>,
}

impl PromptStateStore {
    /// Open a SQLite-backed store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let engine = SqliteByteStore::open(path)?;
        tracing::info!(path = %path.display(), "Opened prompt state store");
        Self::with_engine(Box::new(engine))
    }

    /// Start a store over any byte engine. The store takes exclusive ownership.
    pub fn with_engine(engine: Box<dyn ByteStore>) -> Result<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        thread::Builder::new()
            .name("prompt-state-store".to_string())
            .spawn(move || run_worker(engine, receiver))?;
        Ok(Self {
            sender,
            writer: Arc::new(Mutex::new(())),
        })
    }

    async fn submit<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> StoreOp) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.sender.send(build(reply)).map_err(|_| SpacedRepError::StoreClosed)?;
        response.await.map_err(|_| SpacedRepError::StoreClosed)
    }

    /// Exclusive access for a read-modify-write sequence across several
    /// operations. Single operations are atomic without it.
    pub async fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().await
    }

    /// Write states and their index entries as one atomic batch.
    pub async fn upsert(&self, entries: Vec<StateEntry>) -> Result<()> {
        self.commit(StoreCommit {
            entries,
            ..StoreCommit::default()
        })
        .await
    }

    /// Write states, applied log IDs and the sync cursor as one atomic batch.
    pub async fn commit(&self, commit: StoreCommit) -> Result<()> {
        self.submit(|reply| StoreOp::Commit { commit, reply }).await?
    }

    pub async fn get(&self, task_id: &PromptTaskId) -> Result<Option<PromptState>> {
        let task_id = task_id.clone();
        self.submit(|reply| StoreOp::Get { task_id, reply }).await?
    }

    /// The subset of `ids` already folded into stored states.
    pub async fn applied_log_ids(&self, ids: Vec<ActionLogId>) -> Result<HashSet<ActionLogId>> {
        self.submit(|reply| StoreOp::AppliedLogIds { ids, reply }).await?
    }

    /// Latest action log timestamp seen by a sync, if any sync has run.
    pub async fn latest_log_timestamp(&self) -> Result<Option<i64>> {
        self.submit(|reply| StoreOp::LatestLogTimestamp { reply }).await?
    }

    pub async fn set_latest_log_timestamp(&self, timestamp_millis: i64) -> Result<()> {
        self.commit(StoreCommit {
            latest_log_timestamp_millis: Some(timestamp_millis),
            ..StoreCommit::default()
        })
        .await
    }

    /// States with `due <= threshold_millis`, ascending by due then task ID.
    pub async fn query_due_before(&self, threshold_millis: i64, limit: usize) -> Result<Vec<StateEntry>> {
        self.submit(|reply| StoreOp::QueryDueBefore {
            threshold_millis,
            limit: Some(limit),
            reply,
        })
        .await?
    }

    /// Every stored state, in index order.
    pub async fn all(&self) -> Result<Vec<StateEntry>> {
        self.submit(|reply| StoreOp::QueryDueBefore {
            threshold_millis: i64::MAX,
            limit: None,
            reply,
        })
        .await?
    }

    /// Remove states, applied log IDs and the sync cursor.
    pub async fn clear(&self) -> Result<()> {
        self.submit(|reply| StoreOp::Clear { reply }).await?
    }

    /// Stop the worker and release the engine. Operations queued behind the
    /// close, and any issued later, fail with `StoreClosed`.
    pub async fn close(&self) -> Result<()> {
        self.submit(|reply| StoreOp::Close { reply }).await
    }
}

fn run_worker(mut engine: Box<dyn ByteStore>, mut receiver: mpsc::UnboundedReceiver<StoreOp>) {
    while let Some(op) = receiver.blocking_recv() {
        let name = op.name();
        tracing::trace!(op = name, "Store operation started");
        match op {
            StoreOp::Commit { commit, reply } => {
                let count = commit.entries.len();
                let logs = commit.applied_log_ids.len();
                let result = write_commit(engine.as_mut(), commit);
                log_outcome(name, &result);
                if result.is_ok() {
                    tracing::debug!(entries = count, applied_logs = logs, "Committed prompt states");
                }
                let _ = reply.send(result);
            }
            StoreOp::Get { task_id, reply } => {
                let result = read_state(engine.as_ref(), &task_id);
                log_outcome(name, &result);
                let _ = reply.send(result);
            }
            StoreOp::AppliedLogIds { ids, reply } => {
                let result = applied_log_ids(engine.as_ref(), ids);
                log_outcome(name, &result);
                let _ = reply.send(result);
            }
            StoreOp::LatestLogTimestamp { reply } => {
                let result = read_cursor(engine.as_ref());
                log_outcome(name, &result);
                let _ = reply.send(result);
            }
            StoreOp::QueryDueBefore {
                threshold_millis,
                limit,
                reply,
            } => {
                let result = query_due_before(engine.as_ref(), threshold_millis, limit);
                log_outcome(name, &result);
                let _ = reply.send(result);
            }
            StoreOp::Clear { reply } => {
                let result = engine.clear();
                log_outcome(name, &result);
                let _ = reply.send(result);
            }
            StoreOp::Close { reply } => {
                drop(engine);
                tracing::info!("Prompt state store closed");
                let _ = reply.send(());
                return;
            }
        }
    }
}

fn log_outcome<T>(op: &str, result: &Result<T>) {
    match result {
        Ok(_) => {}
        Err(SpacedRepError::StoreCorruption { task_id }) => {
            tracing::error!(op, task_id = %task_id, "Due index references a missing prompt state");
        }
        Err(e) => tracing::warn!(op, error = %e, "Store operation failed"),
    }
}

fn read_state(engine: &dyn ByteStore, task_id: &PromptTaskId) -> Result<Option<PromptState>> {
    match engine.get(&keys::state_key(task_id))? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

fn read_cursor(engine: &dyn ByteStore) -> Result<Option<i64>> {
    let Some(bytes) = engine.get(&keys::sync_cursor_key())? else {
        return Ok(None);
    };
    let encoded = String::from_utf8_lossy(&bytes);
    keys::decode_timestamp(&encoded)
        .map(Some)
        .ok_or_else(|| SpacedRepError::Transport(format!("Malformed sync cursor: {encoded}")))
}

fn applied_log_ids(engine: &dyn ByteStore, ids: Vec<ActionLogId>) -> Result<HashSet<ActionLogId>> {
    let mut applied = HashSet::new();
    for id in ids {
        if engine.get(&keys::applied_log_key(&id))?.is_some() {
            applied.insert(id);
        }
    }
    Ok(applied)
}

fn write_commit(engine: &mut dyn ByteStore, commit: StoreCommit) -> Result<()> {
    let mut ops = Vec::with_capacity(commit.entries.len() * 3 + commit.applied_log_ids.len() + 1);
    // Due timestamps already written earlier in this batch
    let mut written: HashMap<PromptTaskId, i64> = HashMap::new();

    for (task_id, state) in commit.entries {
        let previous_due = match written.get(&task_id) {
            Some(due) => Some(*due),
            None => read_state(engine, &task_id)?.map(|s| s.due_timestamp_millis),
        };
        let due = state.due_timestamp_millis;

        if let Some(previous) = previous_due.filter(|p| *p != due) {
            ops.push(BatchOp::delete(keys::index_key(previous, &task_id)));
        }
        ops.push(BatchOp::put(keys::state_key(&task_id), serde_json::to_vec(&state)?));
        ops.push(BatchOp::put(keys::index_key(due, &task_id), task_id.as_str().as_bytes().to_vec()));
        written.insert(task_id, due);
    }

    for id in &commit.applied_log_ids {
        ops.push(BatchOp::put(keys::applied_log_key(id), Vec::new()));
    }

    if let Some(timestamp) = commit.latest_log_timestamp_millis {
        let current = read_cursor(engine)?;
        if current.is_none_or(|c| timestamp > c) {
            ops.push(BatchOp::put(keys::sync_cursor_key(), keys::encode_timestamp(timestamp).into_bytes()));
        }
    }

    if ops.is_empty() {
        return Ok(());
    }
    engine.write_batch(ops)
}

fn query_due_before(engine: &dyn ByteStore, threshold_millis: i64, limit: Option<usize>) -> Result<Vec<StateEntry>> {
    let start = keys::index_start();
    let end = keys::index_end_inclusive_of(threshold_millis);
    let mut results = Vec::new();

    engine.scan(
        Bound::Included(start.as_slice()),
        Bound::Excluded(end.as_slice()),
        limit,
        &mut |key: &[u8], _value: &[u8]| {
            let (_, task_id) = keys::parse_index_key(key).ok_or_else(|| SpacedRepError::StoreCorruption {
                task_id: String::from_utf8_lossy(key).into_owned(),
            })?;
            let state = read_state(engine, &task_id)?.ok_or_else(|| SpacedRepError::StoreCorruption {
                task_id: task_id.to_string(),
            })?;
            results.push((task_id, state));
            Ok(ScanControl::Continue)
        },
    )?;

    Ok(results)
}
