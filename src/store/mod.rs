//! Durable storage for prompt states.
//!
//! Two logical tables share one ordered byte namespace:
//! - **Primary**: task ID → JSON-serialized `PromptState`
//! - **Due index**: encoded due timestamp + task ID → task ID
//!
//! Sync bookkeeping lives in the same namespace: the set of folded action
//! log IDs and the latest log timestamp a sync has seen.
//!
//! # Example
//!
//! ```ignore
//! use spacedrep::store::PromptStateStore;
//!
//! let store = PromptStateStore::open(Path::new("/tmp/prompt-states.db"))?;
//! store.upsert(vec![(task_id, state)]).await?;
//! let due = store.query_due_before(now_ms(), 50).await?;
//! ```

mod engine;
pub mod keys;
mod prompt_state_store;
mod sqlite;

pub use engine::{BatchOp, ByteStore, MemoryByteStore, ScanControl};
pub use prompt_state_store::{PromptStateStore, StateEntry, StoreCommit};
pub use sqlite::SqliteByteStore;
