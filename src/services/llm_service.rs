use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::env_parse;
use crate::errors::LlmError;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Backoff schedule for transient provider failures.
///
/// The delay before retry `n` (0-based) is `base_delay * multiplier^n` plus a
/// jitter below half of the growth step, so consecutive delays always grow.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn delay_for<R: Rng>(&self, retry: u32, rng: &mut R) -> Duration {
        let multiplier = self.multiplier.max(1.0);
        let exponential = self.base_delay.as_secs_f64() * multiplier.powi(retry as i32);
        let jitter = rng.random::<f64>() * exponential * (multiplier - 1.0) / 2.0;
        Duration::from_secs_f64(exponential + jitter)
    }
}

/// Configuration for LLM service
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: String,
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(20),
            retry: RetryPolicy::default(),
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let model = std::env::var("OPENAI_MODEL")
            .ok()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(defaults.model);
        let base_url = std::env::var("OPENAI_BASE_URL")
            .ok()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(defaults.base_url);

        Self {
            provider: defaults.provider,
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            model,
            base_url,
            request_timeout: Duration::from_secs(env_parse("LLM_TIMEOUT_SECS", 20u64).max(1)),
            retry: RetryPolicy {
                max_attempts: env_parse("LLM_MAX_ATTEMPTS", defaults.retry.max_attempts).max(1),
                ..defaults.retry
            },
        }
    }
}

/// One chat-completion call: a system instruction, a user instruction and sampling limits.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: usize,
    /// Ask the provider for a single JSON object instead of free text.
    pub json_output: bool,
}

/// Trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn model(&self) -> &str;

    /// Run a single completion attempt; retries are the caller's concern.
    async fn chat_completion(&self, request: &ChatRequest) -> Result<String, LlmError>;
}

/// OpenAI API request/response structures
#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OpenAiResponseFormat>,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OpenAiResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorEnvelope {
    error: OpenAiErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// Maps a non-success HTTP reply onto the provider error taxonomy.
///
/// Quota exhaustion is read from the structured `error.code` (or `error.type`)
/// field; a plain 429 is a temporary rate limit.
fn classify_failure(status: StatusCode, body: &str) -> LlmError {
    let parsed = serde_json::from_str::<OpenAiErrorEnvelope>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|e| e.error.message.clone())
        .unwrap_or_else(|| body.chars().take(200).collect());
    let quota_exhausted = parsed.as_ref().is_some_and(|e| {
        e.error.code.as_deref() == Some("insufficient_quota")
            || e.error.kind.as_deref() == Some("insufficient_quota")
    });

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS if quota_exhausted => LlmError::QuotaExhausted,
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited,
        s if s.is_server_error() => LlmError::ServerError {
            status: s.as_u16(),
            message,
        },
        s => LlmError::ApiError(format!("HTTP {}: {}", s, message)),
    }
}

/// Pulls the first choice's text out of a completion, rejecting blank content.
fn extract_content(response: OpenAiResponse) -> Result<String, LlmError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

    let text = choice.message.content.unwrap_or_default();
    let text = text.trim();
    if text.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(text.to_string())
}

/// OpenAI provider implementation
pub struct OpenAiProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(
        api_key: String,
        model: String,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn chat_completion(&self, request: &ChatRequest) -> Result<String, LlmError> {
        info!(
            "Generating LLM completion (model: {}, max_tokens: {})",
            self.model, request.max_tokens
        );

        let body = OpenAiRequest {
            model: &self.model,
            messages: vec![
                OpenAiMessage { role: "system", content: &request.system },
                OpenAiMessage { role: "user", content: &request.user },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: request
                .json_output
                .then_some(OpenAiResponseFormat { kind: "json_object" }),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(classify_failure(status, &error_text));
        }

        let completion = response
            .json::<OpenAiResponse>()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        if let Some(usage) = &completion.usage {
            info!(
                "LLM completion generated. Tokens: {} prompt + {} completion = {} total",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            );
        }

        extract_content(completion)
    }
}

/// Chat-completion client with credential gating, per-attempt timeouts and
/// bounded retries for transient failures.
pub struct LlmService {
    config: LlmConfig,
    provider: Option<Arc<dyn LlmProvider>>,
}

impl LlmService {
    pub fn new(config: LlmConfig) -> Self {
        let provider = match config.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => match config.provider.as_str() {
                "openai" => match OpenAiProvider::new(
                    key.to_string(),
                    config.model.clone(),
                    config.base_url.clone(),
                    config.request_timeout,
                ) {
                    Ok(provider) => {
                        info!("Initializing LLM service with provider: openai ({})", config.model);
                        Some(Arc::new(provider) as Arc<dyn LlmProvider>)
                    }
                    Err(e) => {
                        error!("Failed to initialize OpenAI provider: {}. LLM features disabled.", e);
                        None
                    }
                },
                other => {
                    warn!("Unknown LLM provider: {}. LLM features disabled.", other);
                    None
                }
            },
            Some(_) => {
                warn!("LLM API key is empty. Coach replies will use mock templates.");
                None
            }
            None => {
                info!("OPENAI_API_KEY not set. Coach replies will use mock templates.");
                None
            }
        };

        Self { config, provider }
    }

    /// Build a service around an explicit provider.
    pub fn with_provider(config: LlmConfig, provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            config,
            provider: Some(provider),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    pub fn model(&self) -> Option<&str> {
        self.provider.as_ref().map(|p| p.model())
    }

    /// Generate a completion, retrying rate limits and server errors with backoff.
    ///
    /// Returns the trimmed, non-empty text or the error that ended the attempts.
    pub async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let provider = self.provider.as_ref().ok_or(LlmError::Disabled)?;
        let policy = &self.config.retry;
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let outcome = match tokio::time::timeout(
                self.config.request_timeout,
                provider.chat_completion(request),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout),
            };

            match outcome {
                Ok(text) => {
                    let text = text.trim();
                    if text.is_empty() {
                        return Err(LlmError::EmptyResponse);
                    }
                    return Ok(text.to_string());
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = policy.delay_for(attempt - 1, &mut rand::rng());
                    warn!(
                        "LLM call failed (attempt {}/{}, kind: {}): {}. Retrying in {:?}",
                        attempt,
                        max_attempts,
                        e.kind(),
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        error!("LLM call failed after {} attempts: {}", attempt, e);
                    } else {
                        warn!("LLM call failed (attempt {}, kind: {}), not retrying: {}", attempt, e.kind(), e);
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Provider that replays a fixed script of outcomes and records call times.
    pub(crate) struct ScriptedProvider {
        script: Mutex<VecDeque<Result<String, LlmError>>>,
        calls: Mutex<Vec<tokio::time::Instant>>,
        requests: Mutex<Vec<ChatRequest>>,
        hang: bool,
    }

    impl ScriptedProvider {
        pub(crate) fn new(script: Vec<Result<String, LlmError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
                requests: Mutex::new(Vec::new()),
                hang: false,
            }
        }

        pub(crate) fn always(outcome: fn() -> Result<String, LlmError>, times: usize) -> Self {
            Self::new((0..times).map(|_| outcome()).collect())
        }

        pub(crate) fn hanging() -> Self {
            Self {
                hang: true,
                ..Self::new(Vec::new())
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub(crate) fn call_times(&self) -> Vec<tokio::time::Instant> {
            self.calls.lock().unwrap().clone()
        }

        pub(crate) fn last_request(&self) -> Option<ChatRequest> {
            self.requests.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn chat_completion(&self, request: &ChatRequest) -> Result<String, LlmError> {
            self.calls.lock().unwrap().push(tokio::time::Instant::now());
            self.requests.lock().unwrap().push(request.clone());
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or(Err(LlmError::ApiError("script exhausted".to_string())))
        }
    }
}
