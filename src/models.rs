use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message details as returned by `users.messages.get`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageDetail {
    pub id: String,
    pub thread_id: String,
    pub subject: String,
    pub from: String,
    pub to: Vec<String>,
    pub date: Option<DateTime<Utc>>,
    pub snippet: String,
    pub labels: Vec<String>,
    /// Plain-text body, when one was fetched and decodable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// A request to delete messages, either by explicit id or by search query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteRequest {
    pub message_ids: Vec<String>,
    pub query: Option<String>,
    pub simulate: bool,
    /// Upper bound on how many messages a query may resolve to
    pub limit: usize,
}

/// What a [`DeleteRequest`] actually targets once validated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteTarget<'a> {
    Ids(&'a [String]),
    Query(&'a str),
}

impl DeleteRequest {
    pub const DEFAULT_LIMIT: usize = 20;

    pub fn by_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            message_ids: ids.into_iter().map(Into::into).collect(),
            limit: Self::DEFAULT_LIMIT,
            ..Default::default()
        }
    }

    pub fn by_query(query: impl Into<String>, limit: usize) -> Self {
        Self {
            query: Some(query.into()),
            limit,
            ..Default::default()
        }
    }

    pub fn simulated(mut self, simulate: bool) -> Self {
        self.simulate = simulate;
        self
    }

    /// The id list wins over the query; a blank query counts as absent.
    pub fn target(&self) -> Option<DeleteTarget<'_>> {
        if !self.message_ids.is_empty() {
            return Some(DeleteTarget::Ids(&self.message_ids));
        }
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(DeleteTarget::Query)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Deleted,
    Simulated,
    Error,
}

/// Result of attempting to delete one message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageOutcome {
    pub id: String,
    pub status: OutcomeStatus,
    #[serde(rename = "error", default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl MessageOutcome {
    pub fn deleted(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: OutcomeStatus::Deleted,
            error_detail: None,
        }
    }

    pub fn simulated(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: OutcomeStatus::Simulated,
            error_detail: None,
        }
    }

    pub fn failed(id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: OutcomeStatus::Error,
            error_detail: Some(detail.into()),
        }
    }
}

/// Aggregate result of one delete run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteReport {
    pub dry_run: bool,
    pub total_attempted: usize,
    pub deleted_count: usize,
    pub simulated_count: usize,
    pub errors: Vec<MessageOutcome>,
    #[serde(rename = "results")]
    pub outcomes: Vec<MessageOutcome>,
}

impl DeleteReport {
    pub fn from_outcomes(outcomes: Vec<MessageOutcome>, dry_run: bool) -> Self {
        let mut report = Self {
            dry_run,
            total_attempted: outcomes.len(),
            ..Default::default()
        };

        for outcome in &outcomes {
            match outcome.status {
                OutcomeStatus::Deleted => report.deleted_count += 1,
                OutcomeStatus::Simulated => report.simulated_count += 1,
                OutcomeStatus::Error => report.errors.push(outcome.clone()),
            }
        }

        report.outcomes = outcomes;
        report
    }

    /// True when nothing was resolved, which is a successful no-op
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

/// Structured reply produced by the agent at the end of every turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentResponse {
    /// Cleaned natural language response
    pub message: String,
    /// Subject lines of the emails that were deleted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_subjects: Option<Vec<String>>,
    /// Name of the tool used, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Type of error, e.g. "HttpError"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Detailed error message or diagnostic string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default = "default_success")]
    pub success: bool,
}

fn default_success() -> bool {
    true
}

impl AgentResponse {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            deleted_subjects: None,
            tool_name: None,
            error_type: None,
            error_message: None,
            success: true,
        }
    }

    pub fn failure(
        message: impl Into<String>,
        error_type: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            error_type: Some(error_type.into()),
            error_message: Some(error_message.into()),
            ..Self::text(message)
        }
    }
}
