//! Resilient completion client: rate limiting, retry with backoff, and
//! per-request model fallback.
//!
//! # Request flow
//!
//! ```text
//! complete(request)
//!   └─ for model in [primary, fallback…]
//!        └─ retry loop (rate limit → POST → classify)
//!             ├─ success → Completion { content, actual_model, … }
//!             ├─ 4xx (not 429) → fail model immediately
//!             └─ transport/5xx/429 → backoff, retry until budget spent
//! ```

pub mod client;
pub mod error;
pub mod fallback;
pub mod retry;
pub mod wire;

pub use client::{ClientConfig, CompletionClient, RateLimiter};
pub use error::CompletionError;
pub use fallback::{run_fallback_chain, FallbackOutcome};
pub use retry::{execute_with_retry, RetryPolicy};
pub use wire::{ChatMessage, ChatRole, ModelInfo};

use async_trait::async_trait;

/// A completion request as the orchestrator issues it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Primary model identifier.
    pub model: String,
    /// Ordered conversational context.
    pub messages: Vec<ChatMessage>,
    /// Optional response length cap.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Whether configured fallback models may answer.
    pub use_fallback: bool,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            temperature: 0.7,
            use_fallback: true,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn without_fallback(mut self) -> Self {
        self.use_fallback = false;
        self
    }
}

/// A completed utterance plus metadata about which model produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    /// Model named in the request.
    pub requested_model: String,
    /// Model that actually answered.
    pub actual_model: String,
    /// Whether a fallback substituted for the primary.
    pub used_fallback: bool,
}

/// Seam between the orchestrator and the completion service.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, CompletionError>;
}
