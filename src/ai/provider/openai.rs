//! OpenAI-Compatible Completion Provider
//!
//! Chat-completions client for any endpoint speaking the OpenAI API shape
//! (api.openai.com, Groq, local gateways) selected via `api_base`. Returns
//! the generated text plus token usage; HTTP failures are classified into
//! the retry taxonomy by status code, with body sniffing only where a status
//! is ambiguous.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{CompletionProvider, CompletionRequest, ProviderResponse, TokenUsage};
use crate::config::LlmConfig;
use crate::constants::network;
use crate::types::{DocloomError, ProviderError, Result};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const PROVIDER_NAME: &str = "openai-compatible";

/// OpenAI-compatible chat-completions provider with secure API key handling.
pub struct OpenAiCompatProvider {
    /// API key stored securely, never exposed in logs or debug output
    api_key: SecretString,
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiCompatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatProvider")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiCompatProvider {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                DocloomError::Config(
                    "API key not found. Set OPENAI_API_KEY or llm.api_key in the config"
                        .to_string(),
                )
            })?;

        let api_base = config
            .api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let api_base = api_base.trim_end_matches('/').to_string();

        let model = config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(network::CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| DocloomError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: SecretString::from(api_key),
            api_base,
            model,
            client,
        })
    }

    fn build_request(&self, request: &CompletionRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
            temperature: request.temperature,
            max_tokens: Some(request.max_output_tokens),
            top_p: 1.0,
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatProvider {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        debug!(
            model = %self.model,
            prompt_tokens = request.prompt_tokens,
            "sending completion request"
        );

        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.build_request(request))
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            let mut err = ProviderError::from_http_status(status.as_u16(), &body, PROVIDER_NAME);
            if let Some(wait) = retry_after {
                err = err.retry_after(wait);
            }
            return Err(err);
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            ProviderError::transient(PROVIDER_NAME, format!("failed to parse response: {e}"))
        })?;

        let usage = parsed
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::transient(PROVIDER_NAME, "no content in response"))?;

        Ok(ProviderResponse {
            text: text.trim().to_string(),
            usage,
            model: self.model.clone(),
        })
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.api_base);
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                info!("completion service is available");
                Ok(true)
            }
            Ok(resp) => {
                warn!("completion service check failed: {}", resp.status());
                Ok(false)
            }
            Err(e) => {
                warn!("completion service check failed: {e}");
                Ok(false)
            }
        }
    }
}

/// Transport-level failures (DNS, connect, timeout) are all retryable.
fn classify_transport(err: &reqwest::Error) -> ProviderError {
    ProviderError::transient(PROVIDER_NAME, format!("request failed: {err}"))
}

/// Honor an explicit Retry-After header when the service sends one.
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let secs: u64 = headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()?;
    // Cap runaway values; the quota window is only a minute long
    Some(Duration::from_secs(secs.min(300)))
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    top_p: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};

    #[test]
    fn test_parse_retry_after_header() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("42"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(42)));
    }

    #[test]
    fn test_parse_retry_after_caps_large_values() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("86400"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_parse_retry_after_absent_or_malformed() {
        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{
            "choices": [{"message": {"content": "An answer."}}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 30}
        }"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("An answer."));
        assert_eq!(parsed.usage.unwrap().prompt_tokens, 120);
    }
}
