//! spacedrep - a spaced-repetition scheduling engine
//!
//! Folds an append-only, DAG-structured log of review events into per-task
//! scheduling state, persists that state with a due-timestamp index, and
//! builds review queues from it.

pub mod domain;
pub mod error;
pub mod id;
pub mod queue;
pub mod reduce;
pub mod schedule;
pub mod store;
pub mod sync;

pub use error::{DecodeError, Result, SpacedRepError};
