//! Gmail API client used by the delete operation and the agent tools

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use google_gmail1::api::{Message, MessagePart};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::GmailHub;
use crate::error::{Result, TriageError};
use crate::models::MessageDetail;

const MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

/// Gmail caps `maxResults` on `users.messages.list` at 500
const MAX_PAGE_SIZE: usize = 500;

/// The three mailbox operations the assistant needs
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// Message ids matching a Gmail search query, in provider order, at most `limit`
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>>;

    /// Full details of one message
    async fn get_message(&self, id: &str) -> Result<MessageDetail>;

    /// Permanently delete one message (bypasses Trash)
    async fn delete_message(&self, id: &str) -> Result<()>;
}

#[async_trait]
impl<T> MailProvider for Arc<T>
where
    T: MailProvider + ?Sized,
{
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        self.as_ref().search(query, limit).await
    }

    async fn get_message(&self, id: &str) -> Result<MessageDetail> {
        self.as_ref().get_message(id).await
    }

    async fn delete_message(&self, id: &str) -> Result<()> {
        self.as_ref().delete_message(id).await
    }
}

/// Gmail client backed by the generated `google-gmail1` hub
pub struct ProductionGmailClient {
    hub: GmailHub,
    timeout: Duration,
}

impl ProductionGmailClient {
    pub fn new(hub: GmailHub) -> Self {
        Self::with_timeout(hub, Duration::from_secs(30))
    }

    /// Create a client whose individual API calls give up after `timeout`
    pub fn with_timeout(hub: GmailHub, timeout: Duration) -> Self {
        Self { hub, timeout }
    }

    async fn timed<T, F>(&self, operation_name: &str, call: F) -> Result<T>
    where
        F: std::future::Future<Output = std::result::Result<T, google_gmail1::Error>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(TriageError::from),
            Err(_) => {
                warn!("Gmail API {} call timed out after {:?}", operation_name, self.timeout);
                Err(TriageError::NetworkError(format!(
                    "API call timed out after {:?}",
                    self.timeout
                )))
            }
        }
    }
}

#[async_trait]
impl MailProvider for ProductionGmailClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        while ids.len() < limit {
            let page_size = (limit - ids.len()).min(MAX_PAGE_SIZE) as u32;
            let mut call = self
                .hub
                .users()
                .messages_list("me")
                .q(query)
                .max_results(page_size);

            if let Some(token) = page_token.as_ref() {
                call = call.page_token(token);
            }

            let (_, response) = self
                .timed("messages.list", call.add_scope(MODIFY_SCOPE).doit())
                .await?;

            ids.extend(
                response
                    .messages
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|m| m.id),
            );

            page_token = response.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        ids.truncate(limit);
        debug!("Query {:?} matched {} messages", query, ids.len());
        Ok(ids)
    }

    async fn get_message(&self, id: &str) -> Result<MessageDetail> {
        let call = self
            .hub
            .users()
            .messages_get("me", id)
            .format("full")
            .add_scope(MODIFY_SCOPE)
            .doit();

        let (_, message) = self.timed("messages.get", call).await?;
        parse_message_detail(message)
    }

    async fn delete_message(&self, id: &str) -> Result<()> {
        let call = self
            .hub
            .users()
            .messages_delete("me", id)
            .add_scope(MODIFY_SCOPE)
            .doit();

        self.timed("messages.delete", call).await?;
        debug!("Deleted message {}", id);
        Ok(())
    }
}

/// Parse a Gmail API Message into a MessageDetail
pub(crate) fn parse_message_detail(msg: Message) -> Result<MessageDetail> {
    let id = msg
        .id
        .ok_or_else(|| TriageError::InvalidMessageFormat("Missing message ID".to_string()))?;

    let mut detail = MessageDetail {
        id,
        thread_id: msg.thread_id.unwrap_or_default(),
        subject: String::new(),
        from: String::new(),
        to: Vec::new(),
        date: None,
        snippet: msg.snippet.unwrap_or_default(),
        labels: msg.label_ids.unwrap_or_default(),
        body: None,
    };

    let Some(payload) = msg.payload else {
        detail.date = msg.internal_date.and_then(DateTime::<Utc>::from_timestamp_millis);
        return Ok(detail);
    };

    for header in payload.headers.iter().flatten() {
        if let (Some(name), Some(value)) = (&header.name, &header.value) {
            match name.to_lowercase().as_str() {
                "from" => detail.from = value.clone(),
                "subject" => detail.subject = value.clone(),
                "to" | "cc" => detail.to.push(value.clone()),
                "date" => detail.date = parse_date(value).ok(),
                _ => {}
            }
        }
    }

    if detail.date.is_none() {
        detail.date = msg.internal_date.and_then(DateTime::<Utc>::from_timestamp_millis);
    }
    detail.body = find_plain_text(&payload);

    Ok(detail)
}

/// Depth-first search for the first text/plain part with data
fn find_plain_text(part: &MessagePart) -> Option<String> {
    if part.mime_type.as_deref() == Some("text/plain") {
        if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_ref()) {
            return Some(String::from_utf8_lossy(data).into_owned());
        }
    }

    part.parts.iter().flatten().find_map(find_plain_text)
}

/// Parse RFC 2822 date string
fn parse_date(date_str: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(date_str)
        .or_else(|_| DateTime::parse_from_rfc3339(date_str))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TriageError::InvalidMessageFormat(format!("Invalid date format: {}", e)))
}
