use std::path::PathBuf;
use std::time::SystemTime;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TriageError>;

/// Everything that can go wrong talking to Gmail, the model, or the disk
#[derive(Error, Debug)]
pub enum TriageError {
    /// Gmail answered with a status we have no dedicated variant for
    #[error("Gmail request failed: {0}")]
    ApiError(String),

    /// OAuth flow failed or the token was rejected (401)
    #[error("Gmail authorization failed: {0}")]
    AuthError(String),

    #[error("Missing client secrets JSON at {0:?}")]
    MissingClientSecrets(PathBuf),

    /// 429; `retry_after` comes from the Retry-After header
    #[error("Gmail quota hit, retry in {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    /// Connection reset, DNS failure, timeout
    #[error("Connection problem: {0}")]
    NetworkError(String),

    #[error("Gmail backend failure (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// 404 for a message id
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Gmail rejected the request: {0}")]
    BadRequest(String),

    /// 403, usually a token without the modify scope
    #[error("Permission denied: {0}")]
    Forbidden(String),

    /// Message payload could not be read into a [`MessageDetail`](crate::models::MessageDetail)
    #[error("Unreadable message: {0}")]
    InvalidMessageFormat(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    /// Unknown tool or arguments a tool could not use
    #[error("Tool error: {0}")]
    ToolError(String),

    #[error("File access failed: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl TriageError {
    /// Quota, backend and connection failures; worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TriageError::RateLimitExceeded { .. }
                | TriageError::ServerError { .. }
                | TriageError::NetworkError(_)
        )
    }

    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Short name of the error kind, shown to the user next to the detail
    pub fn kind(&self) -> &'static str {
        match self {
            TriageError::ApiError(_) => "ApiError",
            TriageError::AuthError(_) => "AuthError",
            TriageError::MissingClientSecrets(_) => "MissingClientSecrets",
            TriageError::RateLimitExceeded { .. } => "RateLimitExceeded",
            TriageError::NetworkError(_) => "NetworkError",
            TriageError::ServerError { .. } => "ServerError",
            TriageError::MessageNotFound(_) => "MessageNotFound",
            TriageError::BadRequest(_) => "BadRequest",
            TriageError::Forbidden(_) => "Forbidden",
            TriageError::InvalidMessageFormat(_) => "InvalidMessageFormat",
            TriageError::LlmError(_) => "LlmError",
            TriageError::ToolError(_) => "ToolError",
            TriageError::IoError(_) => "IoError",
            TriageError::SerializationError(_) => "SerializationError",
            TriageError::ConfigError(_) => "ConfigError",
        }
    }
}

/// Operation-level failures of a delete request.
///
/// Per-message failures never appear here; they are recorded in the
/// [`DeleteReport`](crate::models::DeleteReport).
#[derive(Error, Debug)]
pub enum DeleteError {
    /// The request is malformed (no target, or a query with a zero limit)
    #[error("Invalid delete request: {0}")]
    Validation(String),

    /// The search that resolves a query into message ids failed
    #[error("Failed to resolve messages for query: {0}")]
    Resolution(#[source] TriageError),
}

impl DeleteError {
    pub fn kind(&self) -> &'static str {
        match self {
            DeleteError::Validation(_) => "ValidationError",
            DeleteError::Resolution(_) => "ResolutionError",
        }
    }
}

const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Seconds to wait according to a Retry-After header value.
///
/// Accepts either delay-seconds ("120") or an HTTP-date. A missing or
/// unparseable header, or a date already in the past, falls back to
/// [`DEFAULT_RETRY_AFTER_SECS`].
fn retry_after_secs(value: Option<&str>, now: SystemTime) -> u64 {
    let Some(value) = value.map(str::trim) else {
        return DEFAULT_RETRY_AFTER_SECS;
    };

    value
        .parse::<u64>()
        .ok()
        .or_else(|| {
            httpdate::parse_http_date(value)
                .ok()
                .and_then(|at| at.duration_since(now).ok())
                .map(|wait| wait.as_secs())
        })
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

fn from_status<B>(response: &hyper::Response<B>) -> TriageError {
    let status = response.status();
    let code = status.as_u16();
    let message = format!(
        "HTTP {} {}",
        code,
        status.canonical_reason().unwrap_or("")
    )
    .trim_end()
    .to_string();

    match code {
        400 => TriageError::BadRequest(message),
        401 => TriageError::AuthError(message),
        403 => TriageError::Forbidden(message),
        404 => TriageError::MessageNotFound(message),
        429 => {
            let header = response
                .headers()
                .get(hyper::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok());
            TriageError::RateLimitExceeded {
                retry_after: retry_after_secs(header, SystemTime::now()),
            }
        }
        500..=599 => TriageError::ServerError {
            status: code,
            message,
        },
        _ => TriageError::ApiError(message),
    }
}

impl From<google_gmail1::Error> for TriageError {
    fn from(error: google_gmail1::Error) -> Self {
        use google_gmail1::Error as Gmail;

        match error {
            Gmail::Failure(ref response) => from_status(response),
            Gmail::BadRequest(ref body) => TriageError::BadRequest(body.to_string()),
            Gmail::HttpError(ref err) => TriageError::NetworkError(err.to_string()),
            Gmail::Io(err) => TriageError::NetworkError(err.to_string()),
            other => TriageError::ApiError(other.to_string()),
        }
    }
}

impl From<async_openai::error::OpenAIError> for TriageError {
    fn from(error: async_openai::error::OpenAIError) -> Self {
        TriageError::LlmError(error.to_string())
    }
}
