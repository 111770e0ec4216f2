//! Prompt task identifiers and their decoded form.
//!
//! A task ID has the shape `<promptType>/<promptID>[/<parameters>]`. The
//! prompt type is resolved once, at decode time, into a closed enum that
//! carries the retry capability.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

const SEPARATOR: char = '/';

/// Opaque identifier of a schedulable learning task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptTaskId(String);

impl PromptTaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode into a `PromptTask`.
    pub fn decode(&self) -> Result<PromptTask, DecodeError> {
        PromptTask::decode(self)
    }
}

impl fmt::Display for PromptTaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PromptTaskId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identifier of prompt content, shared by every task derived from that prompt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptId(String);

impl PromptId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of prompt a task reviews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PromptType {
    #[serde(rename = "basicPrompt")]
    Basic,
    #[serde(rename = "applicationPrompt")]
    Application,
    #[serde(rename = "clozePrompt")]
    Cloze,
}

impl PromptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptType::Basic => "basicPrompt",
            PromptType::Application => "applicationPrompt",
            PromptType::Cloze => "clozePrompt",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "basicPrompt" => Some(PromptType::Basic),
            "applicationPrompt" => Some(PromptType::Application),
            "clozePrompt" => Some(PromptType::Cloze),
            _ => None,
        }
    }

    /// Whether a forgotten review schedules a short-term retry.
    ///
    /// Application prompts vary their question on every review, so retrying
    /// the same instance minutes later is meaningless.
    pub fn supports_retry(&self) -> bool {
        !matches!(self, PromptType::Application)
    }
}

/// Type-specific parameters selecting one task out of a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PromptParameters {
    None,
    Cloze { cloze_index: u32 },
}

/// Decoded view of a `PromptTaskId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptTask {
    #[serde(rename = "promptID")]
    pub prompt_id: PromptId,
    pub prompt_type: PromptType,
    pub prompt_parameters: PromptParameters,
}

impl PromptTask {
    pub fn new(prompt_type: PromptType, prompt_id: PromptId, prompt_parameters: PromptParameters) -> Self {
        Self {
            prompt_id,
            prompt_type,
            prompt_parameters,
        }
    }

    pub fn basic(prompt_id: impl Into<String>) -> Self {
        Self::new(PromptType::Basic, PromptId::new(prompt_id), PromptParameters::None)
    }

    pub fn application(prompt_id: impl Into<String>) -> Self {
        Self::new(PromptType::Application, PromptId::new(prompt_id), PromptParameters::None)
    }

    pub fn cloze(prompt_id: impl Into<String>, cloze_index: u32) -> Self {
        Self::new(
            PromptType::Cloze,
            PromptId::new(prompt_id),
            PromptParameters::Cloze { cloze_index },
        )
    }

    pub fn supports_retry(&self) -> bool {
        self.prompt_type.supports_retry()
    }

    /// Encode back into the identifier form.
    pub fn id(&self) -> PromptTaskId {
        let base = format!("{}{}{}", self.prompt_type.as_str(), SEPARATOR, self.prompt_id);
        match self.prompt_parameters {
            PromptParameters::None => PromptTaskId::new(base),
            PromptParameters::Cloze { cloze_index } => PromptTaskId::new(format!("{base}{SEPARATOR}{cloze_index}")),
        }
    }

    pub fn decode(task_id: &PromptTaskId) -> Result<Self, DecodeError> {
        let raw = task_id.as_str();
        let fail = |message: &str| DecodeError::new(raw, message);

        if raw.is_empty() {
            return Err(fail("task ID is empty"));
        }

        let parts: Vec<&str> = raw.split(SEPARATOR).collect();
        if parts.len() < 2 {
            return Err(fail("missing prompt ID"));
        }
        if parts.len() > 3 {
            return Err(fail("too many components"));
        }

        let prompt_type =
            PromptType::parse(parts[0]).ok_or_else(|| fail(&format!("unknown prompt type '{}'", parts[0])))?;
        if parts[1].is_empty() {
            return Err(fail("missing prompt ID"));
        }
        let prompt_id = PromptId::new(parts[1]);

        let prompt_parameters = match (prompt_type, parts.get(2)) {
            (PromptType::Cloze, Some(index)) => {
                let cloze_index = index
                    .parse::<u32>()
                    .map_err(|_| fail(&format!("invalid cloze index '{index}'")))?;
                PromptParameters::Cloze { cloze_index }
            }
            (PromptType::Cloze, None) => return Err(fail("cloze task is missing its cloze index")),
            (_, Some(_)) => {
                return Err(fail(&format!("{} tasks take no parameters", prompt_type.as_str())));
            }
            (_, None) => PromptParameters::None,
        };

        Ok(Self {
            prompt_id,
            prompt_type,
            prompt_parameters,
        })
    }
}
