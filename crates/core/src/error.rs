//! Error types for the scoutloop domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator of the loop has its own error enum.

use thiserror::Error;

/// Failures reported by the model collaborator.
///
/// The loop treats every variant as fatal for the current run; the
/// classification only decides which diagnostic the caller sees.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Quota exhausted: {0}")]
    QuotaExceeded(String),

    #[error("Context length exceeded: {0}")]
    ContextLengthExceeded(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Whether this failure means the prompt no longer fits the model's
    /// context window.
    ///
    /// Some backends report this as a plain 400, so generic API errors are
    /// inspected for the usual phrasings as well.
    pub fn is_context_length(&self) -> bool {
        match self {
            Self::ContextLengthExceeded(_) => true,
            Self::ApiError { message, .. } => mentions_context_length(message),
            _ => false,
        }
    }
}

/// Heuristic match for context-window errors in free-form provider messages.
pub fn mentions_context_length(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("context_length_exceeded")
        || lower.contains("maximum context length")
        || lower.contains("context length")
        || lower.contains("context window")
        || (lower.contains("too many tokens") && lower.contains("prompt"))
}

/// Failures raised by an action's own logic.
///
/// The dispatcher never lets these reach the loop driver: they are turned
/// into error observations the model can read and correct.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Action not found: {0}")]
    NotFound(String),

    #[error("Action execution failed: {action}: {reason}")]
    ExecutionFailed { action: String, reason: String },

    #[error("Invalid action input: {0}")]
    InvalidInput(String),
}
