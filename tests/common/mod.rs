//! Common test utilities and fixtures
#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use gmail_triage::client::MailProvider;
use gmail_triage::delete::DeleteConfig;
use gmail_triage::error::{Result, TriageError};
use gmail_triage::models::MessageDetail;
use mockall::mock;
use std::time::Duration;

/// Create a test message with default values
pub fn create_test_message(id: &str, from: &str, subject: &str) -> MessageDetail {
    MessageDetail {
        id: id.to_string(),
        thread_id: format!("thread_{}", id),
        subject: subject.to_string(),
        from: from.to_string(),
        to: vec!["me@example.com".to_string()],
        date: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).single(),
        snippet: format!("{} ...", subject),
        labels: vec!["INBOX".to_string()],
        body: None,
    }
}

/// Create a promotional message
pub fn create_promo_message(id: &str) -> MessageDetail {
    let mut message = create_test_message(id, "Deals <deals@shop.example>", "Flash sale: 70% off");
    message.labels.push("CATEGORY_PROMOTIONS".to_string());
    message
}

/// Delete settings without the inter-call pause
pub fn unthrottled(dry_run: bool) -> DeleteConfig {
    DeleteConfig {
        dry_run,
        throttle: Duration::ZERO,
    }
}

/// The error Gmail returns for an id that does not exist
pub fn not_found(id: &str) -> TriageError {
    TriageError::MessageNotFound(format!("Requested entity was not found: {}", id))
}

pub fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

// Mock implementation of MailProvider for testing
mock! {
    pub MailProvider {}

    #[async_trait::async_trait]
    impl MailProvider for MailProvider {
        async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>>;
        async fn get_message(&self, id: &str) -> Result<MessageDetail>;
        async fn delete_message(&self, id: &str) -> Result<()>;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_message() {
        let msg = create_test_message("msg1", "test@example.com", "Test Subject");
        assert_eq!(msg.id, "msg1");
        assert_eq!(msg.thread_id, "thread_msg1");
        assert_eq!(msg.subject, "Test Subject");
        assert!(msg.date.is_some());
    }

    #[test]
    fn test_create_promo_message() {
        let msg = create_promo_message("p1");
        assert!(msg.labels.contains(&"CATEGORY_PROMOTIONS".to_string()));
    }
}
