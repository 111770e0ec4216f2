//! Domain types for spacedrep
//!
//! - ActionLog: immutable ingest/repetition events forming a per-task DAG
//! - PromptTask: decoded identity and type of a schedulable task
//! - PromptState: the materialized scheduling snapshot for one task

pub mod action_log;
pub mod state;
pub mod task;

pub use action_log::{
    ActionLog, ActionLogId, IngestActionLog, RepetitionActionLog, RepetitionOutcome, action_log_types,
};
pub use state::{PromptState, update_head_action_log_ids};
pub use task::{PromptId, PromptParameters, PromptTask, PromptTaskId, PromptType};
