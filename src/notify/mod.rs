//! Audience resolution and notification dispatch.
//!
//! Every notification-eligible entry fans out into its topics; topics
//! resolve to registered tokens; the deduplicated token union is handed to
//! the dispatch collaborator together with a payload. Tokens the
//! collaborator rejects as invalid are deleted in bulk — transport
//! trouble is logged and never fails the pipeline.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{NotificationPayload, SubstituteEntry, Topic};
use crate::repository::NotificationRepository;

/// Errors from the dispatch transport.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatch request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("dispatch endpoint returned HTTP {0}")]
    Status(reqwest::StatusCode),
}

/// External collaborator delivering notifications.
///
/// Implementations take a token set plus payload and return the subset of
/// tokens they rejected as invalid. They must not interpret the tokens.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        tokens: &[String],
        payload: &NotificationPayload,
    ) -> Result<Vec<String>, DispatchError>;
}

#[derive(Serialize)]
struct DispatchRequest<'a> {
    tokens: &'a [String],
    payload: &'a NotificationPayload,
}

#[derive(Deserialize)]
struct DispatchResponse {
    #[serde(default)]
    invalid_tokens: Vec<String>,
}

/// HTTP dispatch collaborator: POSTs the token set and payload as JSON and
/// reads the rejected tokens back from the response.
pub struct HttpDispatcher {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpDispatcher {
    pub fn new(
        endpoint: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl NotificationDispatcher for HttpDispatcher {
    async fn dispatch(
        &self,
        tokens: &[String],
        payload: &NotificationPayload,
    ) -> Result<Vec<String>, DispatchError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&DispatchRequest { tokens, payload });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Status(status));
        }
        let body: DispatchResponse = response.json().await?;
        Ok(body.invalid_tokens)
    }
}

/// Fallback collaborator used when no dispatch endpoint is configured:
/// logs the resolved audience and rejects nothing.
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn dispatch(
        &self,
        tokens: &[String],
        payload: &NotificationPayload,
    ) -> Result<Vec<String>, DispatchError> {
        info!(
            tokens = tokens.len(),
            changes = payload.changes,
            "no dispatch endpoint configured; audience resolved but not delivered"
        );
        Ok(Vec::new())
    }
}

/// What one notification pass resolved and delivered.
#[derive(Debug, Default)]
pub struct NotifySummary {
    /// Distinct topics generated from the changed entries.
    pub topics: usize,
    /// Distinct tokens notified.
    pub tokens: usize,
    /// Tokens rejected by the dispatcher and deleted.
    pub invalid: usize,
}

/// Resolve the audience for a batch of changed entries and dispatch.
pub async fn notify_changes(
    repo: &NotificationRepository,
    dispatcher: &dyn NotificationDispatcher,
    changed: &[SubstituteEntry],
) -> crate::repository::Result<NotifySummary> {
    if changed.is_empty() {
        return Ok(NotifySummary::default());
    }

    // Distinct encoded topics across the whole batch.
    let topics: BTreeSet<String> = changed
        .iter()
        .flat_map(|entry| Topic::for_entry(entry))
        .map(|topic| topic.encode())
        .collect();

    // Token union, deduplicated: a client subscribed to both the teacher
    // and the class topic of the same entry is notified exactly once.
    let mut tokens: BTreeSet<String> = BTreeSet::new();
    for topic in &topics {
        tokens.extend(repo.tokens_for_topic(topic)?);
    }

    let mut summary = NotifySummary {
        topics: topics.len(),
        tokens: tokens.len(),
        invalid: 0,
    };
    if tokens.is_empty() {
        debug!("no registered audience for {} topics", topics.len());
        return Ok(summary);
    }

    let tokens: Vec<String> = tokens.into_iter().collect();
    let payload = NotificationPayload::for_changes(changed);
    match dispatcher.dispatch(&tokens, &payload).await {
        Ok(invalid) => {
            if !invalid.is_empty() {
                summary.invalid = repo.delete_tokens(&invalid)?;
                info!(removed = summary.invalid, "pruned invalid tokens");
            }
        }
        Err(err) => {
            // Non-fatal: the next cycle retries naturally.
            warn!("notification dispatch failed: {err}");
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tokio::sync::Mutex;

    /// Dispatcher double recording every call and rejecting a fixed set.
    struct FakeDispatcher {
        calls: Mutex<Vec<Vec<String>>>,
        invalid: Vec<String>,
    }

    impl FakeDispatcher {
        fn new(invalid: Vec<String>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                invalid,
            }
        }
    }

    #[async_trait]
    impl NotificationDispatcher for FakeDispatcher {
        async fn dispatch(
            &self,
            tokens: &[String],
            _payload: &NotificationPayload,
        ) -> Result<Vec<String>, DispatchError> {
            self.calls.lock().await.push(tokens.to_vec());
            Ok(self.invalid.clone())
        }
    }

    fn repo() -> (tempfile::TempDir, NotificationRepository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = NotificationRepository::new(&dir.path().join("test.db")).unwrap();
        (dir, repo)
    }

    fn monday_entry() -> SubstituteEntry {
        SubstituteEntry {
            id: Some(1),
            date: NaiveDate::from_ymd_opt(2023, 9, 11).unwrap(),
            class_name: "9a".to_string(),
            lesson: 2,
            subject: None,
            substitute_teacher: None,
            teacher: Some("ABC".to_string()),
            kind: "Vertretung".to_string(),
            substitute_of: None,
            room: None,
            text: None,
        }
    }

    #[tokio::test]
    async fn doubly_subscribed_token_is_notified_once() {
        let (_dir, repo) = repo();
        repo.register(
            "tok-1",
            &[
                "substitute.timetable.1.2.ABC".to_string(),
                "substitute.timetable.1.2.9a".to_string(),
            ],
        )
        .unwrap();
        let dispatcher = FakeDispatcher::new(Vec::new());

        let summary = notify_changes(&repo, &dispatcher, &[monday_entry()])
            .await
            .unwrap();
        assert_eq!(summary.topics, 2);
        assert_eq!(summary.tokens, 1);

        let calls = dispatcher.calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], vec!["tok-1"]);
    }

    #[tokio::test]
    async fn invalid_tokens_are_pruned() {
        let (_dir, repo) = repo();
        repo.register("tok-1", &["substitute.timetable.1.2.9a".to_string()])
            .unwrap();
        repo.register("tok-2", &["substitute.timetable.1.2.ABC".to_string()])
            .unwrap();
        let dispatcher = FakeDispatcher::new(vec!["tok-2".to_string()]);

        let summary = notify_changes(&repo, &dispatcher, &[monday_entry()])
            .await
            .unwrap();
        assert_eq!(summary.tokens, 2);
        assert_eq!(summary.invalid, 1);
        assert!(repo
            .tokens_for_topic("substitute.timetable.1.2.ABC")
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn no_changes_means_no_dispatch() {
        let (_dir, repo) = repo();
        repo.register("tok-1", &["substitute.timetable.1.2.9a".to_string()])
            .unwrap();
        let dispatcher = FakeDispatcher::new(Vec::new());

        let summary = notify_changes(&repo, &dispatcher, &[]).await.unwrap();
        assert_eq!(summary.tokens, 0);
        assert!(dispatcher.calls.lock().await.is_empty());
    }
}
