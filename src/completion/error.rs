//! Completion service failure taxonomy.

use thiserror::Error;

/// Errors from the completion client.
///
/// Transport failures, 5xx and 429 are retryable; any other 4xx is
/// permanent and fails the attempt immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    #[error("API key not configured (set OPENROUTER_API_KEY)")]
    MissingApiKey,

    #[error("request failed: {0}")]
    Transport(String),

    #[error("completion service returned {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("retry budget exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<CompletionError>,
    },

    #[error(
        "chat completion failed with all attempted models ({models}); last error: {last}",
        models = .attempted.join(", ")
    )]
    AllModelsFailed {
        attempted: Vec<String>,
        last: Box<CompletionError>,
    },

    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
}

impl CompletionError {
    /// Whether another attempt at the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }
}
