//! Bringing action logs into the local store.
//!
//! Logs arrive from an [`ActionLogSource`] in arbitrary order. Each batch is
//! ordered along its parent links, folded through the reducer, and written
//! in one commit together with the folded log IDs and the advanced cursor.

mod fold;
mod source;

pub use fold::{FoldReport, fold_action_logs, order_action_logs};
pub use source::{ActionLogSource, DEFAULT_BATCH_SIZE, JsonlLogSource, sync_from_source};
