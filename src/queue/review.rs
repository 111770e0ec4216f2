//! Turning due prompt states into renderable review items.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{PromptId, PromptParameters, PromptState, PromptTask, PromptTaskId};
use crate::error::Result;
use crate::queue::select::{QueueConfig, fuzzy_due_threshold, select_due};
use crate::store::PromptStateStore;

/// Identifier of a media attachment referenced by a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttachmentId(String);

impl AttachmentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Prompt content as supplied by the content resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    /// Type-specific body (question/answer, cloze text, ...)
    pub content: serde_json::Value,
    #[serde(rename = "attachmentIDs", default)]
    pub attachment_ids: Vec<AttachmentId>,
}

/// Where an attachment can be loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentLocator {
    pub url: String,
    pub mime_type: String,
}

/// Fetches prompt content and attachment locations.
///
/// Identifiers missing from a returned map are treated as unresolvable.
#[async_trait]
pub trait ContentResolver: Send + Sync {
    async fn resolve_prompts(&self, ids: &[PromptId]) -> Result<HashMap<PromptId, Prompt>>;

    async fn resolve_attachments(&self, ids: &[AttachmentId]) -> Result<HashMap<AttachmentId, AttachmentLocator>>;
}

/// One entry of the review queue.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewItem {
    pub task_id: PromptTaskId,
    pub task: PromptTask,
    pub prompt: Prompt,
    pub state: PromptState,
    pub prompt_parameters: PromptParameters,
    /// Resolved attachments this prompt references
    pub attachments: BTreeMap<AttachmentId, AttachmentLocator>,
}

/// Build the review queue as of `now_millis`.
///
/// Items whose task ID cannot be decoded or whose prompt does not resolve are
/// dropped; the rest keep queue order.
pub async fn fetch_review_queue(
    store: &PromptStateStore,
    resolver: &dyn ContentResolver,
    now_millis: i64,
    config: &QueueConfig,
) -> Result<Vec<ReviewItem>> {
    let threshold = fuzzy_due_threshold(now_millis, config.fuzzy_window_millis);
    let entries = store.query_due_before(threshold, config.limit).await?;
    log::debug!("Review queue: {} prompt states due by {threshold}", entries.len());

    let mut tasks: HashMap<PromptTaskId, (PromptTask, PromptState)> = HashMap::new();
    for (task_id, state) in entries {
        match task_id.decode() {
            Ok(task) => {
                tasks.insert(task_id, (task, state));
            }
            Err(e) => log::warn!("Review queue: {e}"),
        }
    }

    let ordered = select_due(tasks.iter().map(|(id, (_, state))| (id, state)), now_millis, config);

    let prompt_ids: Vec<PromptId> = ordered
        .iter()
        .filter_map(|id| tasks.get(id))
        .map(|(task, _)| task.prompt_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let prompts = if prompt_ids.is_empty() {
        HashMap::new()
    } else {
        resolver.resolve_prompts(&prompt_ids).await?
    };

    let attachment_ids: Vec<AttachmentId> = prompts
        .values()
        .flat_map(|p| p.attachment_ids.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let attachments = if attachment_ids.is_empty() {
        HashMap::new()
    } else {
        resolver.resolve_attachments(&attachment_ids).await?
    };

    let mut items = Vec::with_capacity(ordered.len());
    for task_id in ordered {
        let Some((task, state)) = tasks.remove(&task_id) else {
            continue;
        };
        let Some(prompt) = prompts.get(&task.prompt_id) else {
            log::warn!("Review queue: prompt {} for {task_id} did not resolve", task.prompt_id);
            continue;
        };

        let mut resolved = BTreeMap::new();
        for id in &prompt.attachment_ids {
            match attachments.get(id) {
                Some(locator) => {
                    resolved.insert(id.clone(), locator.clone());
                }
                None => log::debug!("Review queue: attachment {id} for {task_id} did not resolve"),
            }
        }

        items.push(ReviewItem {
            prompt_parameters: task.prompt_parameters,
            task_id,
            prompt: prompt.clone(),
            task,
            state,
            attachments: resolved,
        });
    }

    log::info!("Review queue: built {} items", items.len());
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ActionLogId;
    use crate::error::SpacedRepError;
    use crate::store::MemoryByteStore;
    use std::sync::Mutex;

    const HOUR: i64 = 60 * 60 * 1000;

    #[derive(Default)]
    struct MockResolver {
        prompts: HashMap<PromptId, Prompt>,
        attachments: HashMap<AttachmentId, AttachmentLocator>,
        fail: bool,
        prompt_requests: Mutex<Vec<Vec<PromptId>>>,
    }

    impl MockResolver {
        fn with_prompt(mut self, id: &str, attachments: &[&str]) -> Self {
            self.prompts.insert(
                PromptId::new(id),
                Prompt {
                    content: serde_json::json!({ "question": id }),
                    attachment_ids: attachments.iter().map(|a| AttachmentId::new(*a)).collect(),
                },
            );
            self
        }

        fn with_attachment(mut self, id: &str) -> Self {
            self.attachments.insert(
                AttachmentId::new(id),
                AttachmentLocator {
                    url: format!("file:///attachments/{id}.png"),
                    mime_type: "image/png".to_string(),
                },
            );
            self
        }
    }

    #[async_trait]
    impl ContentResolver for MockResolver {
        async fn resolve_prompts(&self, ids: &[PromptId]) -> Result<HashMap<PromptId, Prompt>> {
            if self.fail {
                return Err(SpacedRepError::Resolver("offline".to_string()));
            }
            self.prompt_requests.lock().unwrap().push(ids.to_vec());
            Ok(ids
                .iter()
                .filter_map(|id| self.prompts.get(id).map(|p| (id.clone(), p.clone())))
                .collect())
        }

        async fn resolve_attachments(&self, ids: &[AttachmentId]) -> Result<HashMap<AttachmentId, AttachmentLocator>> {
            Ok(ids
                .iter()
                .filter_map(|id| self.attachments.get(id).map(|a| (id.clone(), a.clone())))
                .collect())
        }
    }

    fn state(due: i64) -> PromptState {
        PromptState {
            head_action_log_ids: vec![ActionLogId::new("h")],
            last_review_timestamp_millis: 0,
            due_timestamp_millis: due,
            interval_millis: due,
            best_interval_millis: None,
            needs_retry: false,
            last_review_task_parameters: None,
        }
    }

    async fn store_with(entries: &[(&str, i64)]) -> PromptStateStore {
        let store = PromptStateStore::with_engine(Box::new(MemoryByteStore::new())).unwrap();
        store
            .upsert(entries.iter().map(|(id, due)| (PromptTaskId::from(*id), state(*due))).collect())
            .await
            .unwrap();
        store
    }

    fn task_ids(items: &[ReviewItem]) -> Vec<&str> {
        items.iter().map(|i| i.task_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_queue_in_due_order_with_fuzzy_window() {
        let now = 1000 * HOUR;
        let store = store_with(&[
            ("basicPrompt/p2", now + HOUR),
            ("basicPrompt/p1", now - HOUR),
            ("basicPrompt/later", now + 48 * HOUR),
        ])
        .await;
        let resolver = MockResolver::default()
            .with_prompt("p1", &[])
            .with_prompt("p2", &[])
            .with_prompt("later", &[]);

        let items = fetch_review_queue(&store, &resolver, now, &QueueConfig::default())
            .await
            .unwrap();
        assert_eq!(task_ids(&items), vec!["basicPrompt/p1", "basicPrompt/p2"]);
    }

    #[tokio::test]
    async fn test_unresolved_prompt_is_dropped() {
        let store = store_with(&[("basicPrompt/known", 1), ("basicPrompt/unknown", 2)]).await;
        let resolver = MockResolver::default().with_prompt("known", &[]);

        let items = fetch_review_queue(&store, &resolver, 10, &QueueConfig::default())
            .await
            .unwrap();
        assert_eq!(task_ids(&items), vec!["basicPrompt/known"]);
    }

    #[tokio::test]
    async fn test_cloze_siblings_share_one_prompt_request() {
        let store = store_with(&[("clozePrompt/c/0", 1), ("clozePrompt/c/1", 2)]).await;
        let resolver = MockResolver::default().with_prompt("c", &[]);

        let items = fetch_review_queue(&store, &resolver, 10, &QueueConfig::default())
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].prompt_parameters, PromptParameters::Cloze { cloze_index: 1 });
        assert_eq!(*resolver.prompt_requests.lock().unwrap(), vec![vec![PromptId::new("c")]]);
    }

    #[tokio::test]
    async fn test_attachments_attached_per_prompt() {
        let store = store_with(&[("basicPrompt/a", 1), ("basicPrompt/b", 2)]).await;
        let resolver = MockResolver::default()
            .with_prompt("a", &["img1", "missing"])
            .with_prompt("b", &[])
            .with_attachment("img1");

        let items = fetch_review_queue(&store, &resolver, 10, &QueueConfig::default())
            .await
            .unwrap();
        let first: Vec<&str> = items[0].attachments.keys().map(|k| k.as_str()).collect();
        assert_eq!(first, vec!["img1"]);
        assert!(items[1].attachments.is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_task_is_dropped() {
        let store = store_with(&[("bogus", 1), ("basicPrompt/ok", 2)]).await;
        let resolver = MockResolver::default().with_prompt("ok", &[]);

        let items = fetch_review_queue(&store, &resolver, 10, &QueueConfig::default())
            .await
            .unwrap();
        assert_eq!(task_ids(&items), vec!["basicPrompt/ok"]);
    }

    #[tokio::test]
    async fn test_limit_applies() {
        let store = store_with(&[("basicPrompt/a", 1), ("basicPrompt/b", 2), ("basicPrompt/c", 3)]).await;
        let resolver = MockResolver::default()
            .with_prompt("a", &[])
            .with_prompt("b", &[])
            .with_prompt("c", &[]);
        let config = QueueConfig {
            limit: 2,
            ..QueueConfig::default()
        };

        let items = fetch_review_queue(&store, &resolver, 10, &config).await.unwrap();
        assert_eq!(task_ids(&items), vec!["basicPrompt/a", "basicPrompt/b"]);
    }

    #[tokio::test]
    async fn test_resolver_failure_propagates() {
        let store = store_with(&[("basicPrompt/a", 1)]).await;
        let resolver = MockResolver {
            fail: true,
            ..MockResolver::default()
        };

        let err = fetch_review_queue(&store, &resolver, 10, &QueueConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SpacedRepError::Resolver(_)));
    }

    #[tokio::test]
    async fn test_empty_store_skips_resolver() {
        let store = store_with(&[]).await;
        let resolver = MockResolver {
            fail: true,
            ..MockResolver::default()
        };
        let items = fetch_review_queue(&store, &resolver, 10, &QueueConfig::default())
            .await
            .unwrap();
        assert!(items.is_empty());
    }
}
