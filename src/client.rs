//! Gmail-backed message store with retry logic and label-name resolution

use async_trait::async_trait;
use google_gmail1::api::{BatchModifyMessagesRequest, Label};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::auth::{GmailHub, MODIFY_SCOPE};
use crate::error::{Result, TriageError};
use crate::store::{MessageStore, MAX_SEARCH_LIMIT};

/// Label ids Gmail defines itself; their id equals their name
const SYSTEM_LABELS: &[&str] = &[
    "INBOX", "UNREAD", "TRASH", "SPAM", "STARRED", "IMPORTANT", "SENT", "DRAFT", "CHAT",
];

/// Whether `name` refers to a Gmail system label
pub fn is_system_label(name: &str) -> bool {
    SYSTEM_LABELS.contains(&name) || name.starts_with("CATEGORY_")
}

/// Production message store over the Gmail API
pub struct GmailStore {
    hub: GmailHub,
    max_retries: u32,
    /// Lowercased label name -> label id, loaded on first mutation
    label_cache: Mutex<Option<HashMap<String, String>>>,
}

impl GmailStore {
    pub fn new(hub: GmailHub) -> Self {
        Self {
            hub,
            max_retries: 3,
            label_cache: Mutex::new(None),
        }
    }

    /// Check if an error is retryable
    fn should_retry(error: &TriageError) -> bool {
        error.is_transient()
    }

    /// Execute an async operation with exponential backoff retry
    async fn with_retry<T, F, Fut>(operation_name: &str, max_retries: u32, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut delay = Duration::from_secs(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if Self::should_retry(&e) && attempts <= max_retries => {
                    let wait = match &e {
                        TriageError::RateLimitExceeded { retry_after } => {
                            Duration::from_secs(*retry_after).max(delay)
                        }
                        _ => delay,
                    };
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                        operation_name,
                        attempts,
                        max_retries + 1,
                        e,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                    delay = std::cmp::min(delay * 2, Duration::from_secs(30));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Map label names to Gmail label ids.
    ///
    /// Missing labels are created when `create_missing` is set and dropped
    /// otherwise.
    async fn resolve_label_ids(&self, names: &[String], create_missing: bool) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(names.len());
        let mut cache = self.label_cache.lock().await;

        for name in names {
            if is_system_label(name) {
                ids.push(name.clone());
                continue;
            }

            if cache.is_none() {
                *cache = Some(self.list_labels().await?);
            }
            let labels = cache.get_or_insert_with(HashMap::new);

            match labels.get(&name.to_lowercase()) {
                Some(id) => ids.push(id.clone()),
                None if create_missing => {
                    let id = self.create_label(name).await?;
                    debug!("Created label '{}' ({})", name, id);
                    labels.insert(name.to_lowercase(), id.clone());
                    ids.push(id);
                }
                None => warn!("Label '{}' does not exist, nothing to remove", name),
            }
        }

        Ok(ids)
    }

    async fn list_labels(&self) -> Result<HashMap<String, String>> {
        Self::with_retry("list_labels", self.max_retries, || async {
            let (_, response) = self
                .hub
                .users()
                .labels_list("me")
                .add_scope(MODIFY_SCOPE)
                .doit()
                .await?;

            let labels: HashMap<String, String> = response
                .labels
                .unwrap_or_default()
                .into_iter()
                .filter_map(|label| match (label.id, label.name) {
                    (Some(id), Some(name)) => Some((name.to_lowercase(), id)),
                    _ => None,
                })
                .collect();

            debug!("Loaded {} labels", labels.len());
            Ok(labels)
        })
        .await
    }

    async fn create_label(&self, name: &str) -> Result<String> {
        Self::with_retry("create_label", self.max_retries, || async {
            let label = Label {
                name: Some(name.to_string()),
                message_list_visibility: Some("show".to_string()),
                label_list_visibility: Some("labelShow".to_string()),
                ..Default::default()
            };

            let (_, created) = self
                .hub
                .users()
                .labels_create(label, "me")
                .add_scope(MODIFY_SCOPE)
                .doit()
                .await?;

            created
                .id
                .ok_or_else(|| TriageError::LabelError(format!("Created label '{}' has no ID", name)))
        })
        .await
    }
}

#[async_trait]
impl MessageStore for GmailStore {
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<String>> {
        let limit = limit.min(MAX_SEARCH_LIMIT) as usize;
        let mut ids = Vec::with_capacity(limit);
        let mut page_token: Option<String> = None;

        while ids.len() < limit {
            let remaining = (limit - ids.len()) as u32;
            let token = page_token.clone();
            let (_, response) = Self::with_retry("messages_list", self.max_retries, || {
                let token = token.clone();
                async move {
                    let mut call = self
                        .hub
                        .users()
                        .messages_list("me")
                        .q(query)
                        .max_results(remaining);
                    if let Some(token) = token.as_ref() {
                        call = call.page_token(token);
                    }
                    Ok(call.add_scope(MODIFY_SCOPE).doit().await?)
                }
            })
            .await?;

            ids.extend(
                response
                    .messages
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|m| m.id)
                    .take(remaining as usize),
            );

            page_token = response.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(ids)
    }

    async fn fetch_snippet(&self, id: &str) -> Result<String> {
        Self::with_retry("messages_get", self.max_retries, || async {
            let (_, message) = self
                .hub
                .users()
                .messages_get("me", id)
                .format("minimal")
                .add_scope(MODIFY_SCOPE)
                .doit()
                .await?;
            Ok(message.snippet.unwrap_or_default())
        })
        .await
    }

    async fn batch_mutate(&self, ids: &[String], add: &[String], remove: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let add_ids = self.resolve_label_ids(add, true).await?;
        let remove_ids = self.resolve_label_ids(remove, false).await?;
        if add_ids.is_empty() && remove_ids.is_empty() {
            return Err(TriageError::LabelError(format!(
                "none of the labels to remove exist: {:?}",
                remove
            )));
        }

        Self::with_retry("batch_modify", self.max_retries, || async {
            let request = BatchModifyMessagesRequest {
                ids: Some(ids.to_vec()),
                add_label_ids: (!add_ids.is_empty()).then(|| add_ids.clone()),
                remove_label_ids: (!remove_ids.is_empty()).then(|| remove_ids.clone()),
            };

            self.hub
                .users()
                .messages_batch_modify(request, "me")
                .add_scope(MODIFY_SCOPE)
                .doit()
                .await?;

            Ok(ids.len())
        })
        .await
    }
}
