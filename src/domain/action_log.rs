//! Action logs: immutable events in a task's review history.
//!
//! Logs form a DAG through `parentActionLogIDs`. Their identity is derived
//! from their content, so the same log authored twice (or replicated from
//! another device) always carries the same `ActionLogId`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::task::PromptTaskId;
use crate::id::content_hash;

/// Action log type constants, as they appear in the `actionLogType` tag.
pub mod action_log_types {
    pub const INGEST: &str = "ingest";
    pub const REPETITION: &str = "repetition";
}

/// Content-derived identifier of an action log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionLogId(String);

impl ActionLogId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionLogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a review went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepetitionOutcome {
    Remembered,
    Forgotten,
}

/// A task entered the user's collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestActionLog {
    #[serde(rename = "taskID")]
    pub task_id: PromptTaskId,
    pub timestamp_millis: i64,
    #[serde(rename = "parentActionLogIDs", default)]
    pub parent_action_log_ids: Vec<ActionLogId>,
}

/// The user reviewed a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepetitionActionLog {
    #[serde(rename = "taskID")]
    pub task_id: PromptTaskId,
    pub timestamp_millis: i64,
    #[serde(rename = "parentActionLogIDs", default)]
    pub parent_action_log_ids: Vec<ActionLogId>,
    pub outcome: RepetitionOutcome,
    /// Describes the specific review instance (e.g. which variant was shown)
    #[serde(default)]
    pub task_parameters: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "actionLogType")]
pub enum ActionLog {
    #[serde(rename = "ingest")]
    Ingest(IngestActionLog),
    #[serde(rename = "repetition")]
    Repetition(RepetitionActionLog),
}

impl ActionLog {
    pub fn ingest(task_id: PromptTaskId, timestamp_millis: i64, parent_action_log_ids: Vec<ActionLogId>) -> Self {
        ActionLog::Ingest(IngestActionLog {
            task_id,
            timestamp_millis,
            parent_action_log_ids,
        })
    }

    pub fn repetition(
        task_id: PromptTaskId,
        timestamp_millis: i64,
        parent_action_log_ids: Vec<ActionLogId>,
        outcome: RepetitionOutcome,
        task_parameters: Option<serde_json::Value>,
    ) -> Self {
        ActionLog::Repetition(RepetitionActionLog {
            task_id,
            timestamp_millis,
            parent_action_log_ids,
            outcome,
            task_parameters,
        })
    }

    pub fn action_log_type(&self) -> &'static str {
        match self {
            ActionLog::Ingest(_) => action_log_types::INGEST,
            ActionLog::Repetition(_) => action_log_types::REPETITION,
        }
    }

    pub fn task_id(&self) -> &PromptTaskId {
        match self {
            ActionLog::Ingest(log) => &log.task_id,
            ActionLog::Repetition(log) => &log.task_id,
        }
    }

    pub fn timestamp_millis(&self) -> i64 {
        match self {
            ActionLog::Ingest(log) => log.timestamp_millis,
            ActionLog::Repetition(log) => log.timestamp_millis,
        }
    }

    pub fn parent_action_log_ids(&self) -> &[ActionLogId] {
        match self {
            ActionLog::Ingest(log) => &log.parent_action_log_ids,
            ActionLog::Repetition(log) => &log.parent_action_log_ids,
        }
    }

    /// The serialized form as a JSON value, built field by field.
    ///
    /// Matches `serde_json::to_value(self)`; object keys come out sorted.
    pub fn to_json_value(&self) -> Value {
        let mut fields = Map::new();
        fields.insert("actionLogType".to_string(), Value::from(self.action_log_type()));
        fields.insert("taskID".to_string(), Value::from(self.task_id().as_str()));
        fields.insert("timestampMillis".to_string(), Value::from(self.timestamp_millis()));
        fields.insert(
            "parentActionLogIDs".to_string(),
            Value::Array(self.parent_action_log_ids().iter().map(|id| Value::from(id.as_str())).collect()),
        );
        if let ActionLog::Repetition(log) = self {
            let outcome = match log.outcome {
                RepetitionOutcome::Remembered => "remembered",
                RepetitionOutcome::Forgotten => "forgotten",
            };
            fields.insert("outcome".to_string(), Value::from(outcome));
            fields.insert(
                "taskParameters".to_string(),
                log.task_parameters.clone().unwrap_or(Value::Null),
            );
        }
        Value::Object(fields)
    }

    /// Content-derived identity: SHA-256 over the canonical JSON form.
    pub fn id(&self) -> ActionLogId {
        ActionLogId(content_hash(&self.to_json_value()))
    }
}
