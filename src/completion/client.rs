//! HTTP client for the OpenRouter-style completion service.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::error::CompletionError;
use super::fallback::run_fallback_chain;
use super::retry::{execute_with_retry, RetryPolicy};
use super::wire::{ChatCompletionBody, ChatCompletionReply, ModelCatalog, ModelInfo};
use super::{Completion, CompletionBackend, CompletionRequest};

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const REFERER: &str = "https://ai-boardroom.local";
const APP_TITLE: &str = "AI Boardroom";

/// Pause between fallback model switches.
const FALLBACK_PAUSE: Duration = Duration::from_millis(500);

/// Client configuration, injected at construction.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bearer credential for the completion service.
    pub api_key: String,
    /// Service base URL.
    pub base_url: String,
    /// Minimum gap between any two outbound requests.
    pub min_request_interval: Duration,
    /// Per-attempt timeout.
    pub request_timeout: Duration,
    /// Retry budget applied to every model independently.
    pub retry: RetryPolicy,
    /// Substitution chains keyed by primary model id.
    pub fallbacks: HashMap<String, Vec<String>>,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            min_request_interval: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            fallbacks: Self::default_fallbacks(),
        }
    }

    /// Read the credential (and optional base URL override) from the
    /// environment. An absent or empty key is a configuration error.
    pub fn from_env() -> Result<Self, CompletionError> {
        let api_key = std::env::var("OPENROUTER_API_KEY").unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(CompletionError::MissingApiKey);
        }
        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("OPENROUTER_BASE_URL") {
            if !base_url.trim().is_empty() {
                config.base_url = base_url;
            }
        }
        Ok(config)
    }

    /// Default substitution chains per primary model.
    pub fn default_fallbacks() -> HashMap<String, Vec<String>> {
        HashMap::from([
            (
                "openai/gpt-4".to_string(),
                vec![
                    "openai/gpt-4-turbo".to_string(),
                    "openai/gpt-3.5-turbo".to_string(),
                ],
            ),
            (
                "anthropic/claude-3-sonnet".to_string(),
                vec![
                    "anthropic/claude-3-haiku".to_string(),
                    "openai/gpt-3.5-turbo".to_string(),
                ],
            ),
            (
                "google/gemini-pro".to_string(),
                vec![
                    "openai/gpt-3.5-turbo".to_string(),
                    "anthropic/claude-3-haiku".to_string(),
                ],
            ),
        ])
    }
}

/// Serializes the effective request rate to a minimum interval.
///
/// The last-request instant is one piece of shared state; every model and
/// discussion funneled through a client queues on it, so concurrent callers
/// are throttled to the same global cadence.
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Wait out the remainder of the minimum interval, then claim the slot.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limit: delaying request");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Client for the completion service, owning rate limiting, retries, and
/// model fallback.
pub struct CompletionClient {
    config: ClientConfig,
    http: reqwest::Client,
    limiter: RateLimiter,
}

impl CompletionClient {
    /// Build a client from explicit configuration.
    pub fn new(config: ClientConfig) -> Result<Self, CompletionError> {
        if config.api_key.trim().is_empty() {
            return Err(CompletionError::MissingApiKey);
        }
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CompletionError::Transport(e.to_string()))?;
        let limiter = RateLimiter::new(config.min_request_interval);
        Ok(Self {
            config,
            http,
            limiter,
        })
    }

    /// Build a client from the environment.
    pub fn from_env() -> Result<Self, CompletionError> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Fetch the model catalog. Same retry policy as completions, no
    /// fallback.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, CompletionError> {
        let url = format!("{}/models", self.config.base_url);
        let catalog: ModelCatalog =
            execute_with_retry(&self.config.retry, |_| self.get_json(url.clone())).await?;
        tracing::info!(models = catalog.data.len(), "fetched model catalog");
        Ok(catalog.data)
    }

    /// Request a chat completion, retrying and falling back as configured.
    pub async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<Completion, CompletionError> {
        let models = self.fallback_order(&request);

        let outcome = run_fallback_chain(&models, FALLBACK_PAUSE, |model| {
            let body = ChatCompletionBody {
                model,
                messages: request.messages.clone(),
                temperature: request.temperature,
                max_tokens: request.max_tokens,
            };
            async move {
                let reply: ChatCompletionReply =
                    execute_with_retry(&self.config.retry, |_| self.post_completion(&body)).await?;
                reply
                    .choices
                    .into_iter()
                    .next()
                    .map(|choice| choice.message.content)
                    .ok_or_else(|| {
                        CompletionError::MalformedResponse("response carried no choices".to_string())
                    })
            }
        })
        .await?;

        if outcome.used_fallback() {
            tracing::warn!(
                requested = %request.model,
                actual = %outcome.model,
                "completed with fallback model"
            );
        } else {
            tracing::info!(model = %outcome.model, "chat completion succeeded");
        }

        let used_fallback = outcome.used_fallback();
        Ok(Completion {
            content: outcome.value,
            requested_model: request.model,
            actual_model: outcome.model,
            used_fallback,
        })
    }

    /// The models to try for a request: the primary, then its chain.
    fn fallback_order(&self, request: &CompletionRequest) -> Vec<String> {
        let mut models = vec![request.model.clone()];
        if request.use_fallback {
            if let Some(chain) = self.config.fallbacks.get(&request.model) {
                models.extend(chain.iter().cloned());
            }
        }
        models
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, CompletionError> {
        self.limiter.acquire().await;
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .header("HTTP-Referer", REFERER)
            .header("X-Title", APP_TITLE)
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;
        Self::decode(response).await
    }

    async fn post_completion(
        &self,
        body: &ChatCompletionBody,
    ) -> Result<ChatCompletionReply, CompletionError> {
        self.limiter.acquire().await;
        let url = format!("{}/chat/completions", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header("HTTP-Referer", REFERER)
            .header("X-Title", APP_TITLE)
            .json(body)
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, CompletionError> {
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                detail,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| CompletionError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl CompletionBackend for CompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, CompletionError> {
        CompletionClient::complete(self, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::ChatMessage;

    fn test_client() -> CompletionClient {
        CompletionClient::new(ClientConfig::new("test-key")).unwrap()
    }

    #[test]
    fn test_empty_key_rejected_at_construction() {
        let err = CompletionClient::new(ClientConfig::new("")).unwrap_err();
        assert_eq!(err, CompletionError::MissingApiKey);

        let err = CompletionClient::new(ClientConfig::new("   ")).unwrap_err();
        assert_eq!(err, CompletionError::MissingApiKey);
    }

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::new("k");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.min_request_interval, Duration::from_secs(1));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_default_fallback_chains() {
        let chains = ClientConfig::default_fallbacks();
        assert_eq!(
            chains["openai/gpt-4"],
            vec!["openai/gpt-4-turbo", "openai/gpt-3.5-turbo"]
        );
        assert_eq!(chains.len(), 3);
    }

    #[test]
    fn test_fallback_order_respects_configuration() {
        let client = test_client();
        let request = CompletionRequest::new("openai/gpt-4", vec![ChatMessage::user("hi")]);
        assert_eq!(
            client.fallback_order(&request),
            vec!["openai/gpt-4", "openai/gpt-4-turbo", "openai/gpt-3.5-turbo"]
        );
    }

    #[test]
    fn test_fallback_order_disabled() {
        let client = test_client();
        let request =
            CompletionRequest::new("openai/gpt-4", vec![ChatMessage::user("hi")]).without_fallback();
        assert_eq!(client.fallback_order(&request), vec!["openai/gpt-4"]);
    }

    #[test]
    fn test_fallback_order_unknown_model() {
        let client = test_client();
        let request = CompletionRequest::new("mystery/model", vec![]);
        assert_eq!(client.fallback_order(&request), vec!["mystery/model"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_spaces_requests() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        let start = Instant::now();

        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_skips_wait_after_idle_gap() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        limiter.acquire().await;

        tokio::time::sleep(Duration::from_secs(5)).await;
        let before = Instant::now();
        limiter.acquire().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }
}
