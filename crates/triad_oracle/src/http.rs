//! Oracle backed by an OpenAI-compatible chat completions endpoint.

use crate::error::OracleError;
use crate::oracle::{Oracle, OracleRequest};
use crate::prompt::{decode_judgment, render_system, render_user};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};
use triad_core::Judgment;

/// Default request timeout for API calls
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Connection settings for [`OpenAiCompatibleOracle`]
#[derive(Clone)]
pub struct HttpOracleConfig {
    /// Base URL, without the `/v1/...` path
    pub endpoint: String,
    /// Model name
    pub model: String,
    /// Bearer token, if the endpoint requires one
    pub api_key: Option<SecretString>,
    /// Transport-level request timeout
    pub timeout: Duration,
    /// Sampling temperature
    pub temperature: f32,
    /// Completion token cap
    pub max_tokens: Option<u32>,
}

impl HttpOracleConfig {
    /// Settings with a 60s timeout and temperature 0
    #[must_use]
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            temperature: 0.0,
            max_tokens: None,
        }
    }

    /// Set the API key
    #[must_use]
    pub fn with_api_key(mut self, key: SecretString) -> Self {
        self.api_key = Some(key);
        self
    }

    /// Set the request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the sampling temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Cap completion tokens per call
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

impl fmt::Debug for HttpOracleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpOracleConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Judgment oracle calling `{endpoint}/v1/chat/completions`
///
/// Requests JSON-object output and decodes the reply into the record shape
/// of the requested stage. Safe to share across tasks behind an `Arc`.
pub struct OpenAiCompatibleOracle {
    config: HttpOracleConfig,
    http_client: Client,
}

impl OpenAiCompatibleOracle {
    /// Create an oracle with a pooled HTTP client
    ///
    /// # Errors
    ///
    /// Returns `OracleError::Transport` if the HTTP client cannot be built
    pub fn new(config: HttpOracleConfig) -> Result<Self, OracleError> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| OracleError::Transport {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// Model name
    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn build_request(&self, request: &OracleRequest) -> Result<ChatRequest, OracleError> {
        Ok(ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: render_system(&request.instruction, request.expected_stage()),
                },
                Message {
                    role: "user".to_string(),
                    content: render_user(request)?,
                },
            ],
            temperature: Some(self.config.temperature),
            max_tokens: self.config.max_tokens,
            response_format: Some(ResponseFormat {
                kind: "json_object".to_string(),
            }),
            stream: Some(false),
        })
    }

    async fn complete(&self, body: &ChatRequest) -> Result<String, OracleError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        );

        let mut builder = self.http_client.post(&url).json(body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let start = Instant::now();
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                warn!("Oracle request timed out after {:?}", self.config.timeout);
                OracleError::Timeout {
                    after_ms: u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX),
                }
            } else if e.is_connect() {
                warn!("Cannot connect to oracle at {}", self.config.endpoint);
                OracleError::Transport {
                    message: format!("Connection failed: {}", e),
                }
            } else {
                error!("Oracle request error: {}", e);
                OracleError::Transport {
                    message: format!("Request failed: {}", e),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, retry_after, body));
        }

        let reply: ChatResponse = response.json().await.map_err(|e| OracleError::InvalidOutput {
            message: format!("Response parse error: {}", e),
        })?;

        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            prompt_tokens = reply.usage.as_ref().map_or(0, |u| u.prompt_tokens),
            completion_tokens = reply.usage.as_ref().map_or(0, |u| u.completion_tokens),
            "Oracle completion received"
        );

        reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .map(|message| message.content)
            .ok_or_else(|| OracleError::InvalidOutput {
                message: "No content in oracle response".to_string(),
            })
    }
}

/// Map a non-success HTTP status to an oracle error
fn map_status(status: StatusCode, retry_after_secs: Option<u64>, body: String) -> OracleError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        warn!("Oracle rate limited");
        return OracleError::RateLimited { retry_after_secs };
    }
    error!("Oracle returned error status {}: {}", status, body);
    OracleError::Api {
        status: status.as_u16(),
        message: body,
    }
}

#[async_trait]
impl Oracle for OpenAiCompatibleOracle {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn judge(&self, request: &OracleRequest) -> Result<Judgment, OracleError> {
        let body = self.build_request(request)?;
        debug!(
            key = %request.key,
            instruction = %request.instruction.id,
            "Sending oracle request"
        );
        let content = self.complete(&body).await?;
        decode_judgment(request.expected_stage(), &content)
    }
}

impl fmt::Debug for OpenAiCompatibleOracle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiCompatibleOracle")
            .field("config", &self.config)
            .finish()
    }
}

/// Message in a chat completion request or response
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

/// Chat completions request body
#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

/// Chat completions response body
#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::InstructionCatalog;
    use crate::oracle::OracleContext;
    use triad_core::{SuperCategory, TranslationTriple};

    fn oracle() -> OpenAiCompatibleOracle {
        let config = HttpOracleConfig::new("http://localhost:8000/", "gpt-4.1-mini")
            .with_api_key(SecretString::from("sk-test".to_string()))
            .with_timeout(Duration::from_secs(5));
        OpenAiCompatibleOracle::new(config).unwrap()
    }

    #[test]
    fn test_oracle_creation() {
        let oracle = oracle();
        assert_eq!(oracle.name(), "openai-compatible");
        assert_eq!(oracle.model(), "gpt-4.1-mini");
    }

    #[test]
    fn test_debug_redacts_key() {
        let text = format!("{:?}", oracle());
        assert!(!text.contains("sk-test"));
        assert!(text.contains("REDACTED"));
    }

    #[test]
    fn test_request_serialization() {
        let key = SuperCategory::Accuracy.stage1_key();
        let request = OracleRequest {
            key,
            instruction: InstructionCatalog::standard().get(key).unwrap().clone(),
            triple: TranslationTriple::new("Bonjour", "Hello", "Hello"),
            context: OracleContext::Initial,
        };
        let body = oracle().build_request(&request).unwrap();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-4.1-mini");
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "system");
        assert!(
            json["messages"][1]["content"]
                .as_str()
                .unwrap()
                .contains("SOURCE SENTENCE: Bonjour")
        );
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_max_tokens_sent_when_set() {
        let config = HttpOracleConfig::new("http://localhost:8000", "gpt-4.1-mini").with_max_tokens(512);
        let oracle = OpenAiCompatibleOracle::new(config).unwrap();
        let key = SuperCategory::Style.stage1_key();
        let request = OracleRequest {
            key,
            instruction: InstructionCatalog::standard().get(key).unwrap().clone(),
            triple: TranslationTriple::new("Bonjour", "Hello", "Hello"),
            context: OracleContext::Initial,
        };
        let json = serde_json::to_value(oracle.build_request(&request).unwrap()).unwrap();
        assert_eq!(json["max_tokens"], 512);
    }

    #[test]
    fn test_response_parsing() {
        let response_json = r#"{
            "id": "x",
            "choices": [{
                "index": 0,
                "finish_reason": "stop",
                "message": {"role": "assistant", "content": "{\"probability\": 0.1}"}
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;
        let response: ChatResponse = serde_json::from_str(response_json).unwrap();
        assert_eq!(response.choices.len(), 1);
        assert_eq!(response.usage.map(|u| u.prompt_tokens), Some(10));
    }

    #[test]
    fn test_status_mapping() {
        let err = map_status(StatusCode::TOO_MANY_REQUESTS, Some(3), String::new());
        assert_eq!(err, OracleError::RateLimited { retry_after_secs: Some(3) });
        assert!(err.is_transient());

        let err = map_status(StatusCode::UNAUTHORIZED, None, "bad key".to_string());
        assert_eq!(
            err,
            OracleError::Api {
                status: 401,
                message: "bad key".to_string()
            }
        );
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails() {
        let config = HttpOracleConfig::new("http://127.0.0.1:9", "m")
            .with_timeout(Duration::from_secs(2));
        let oracle = OpenAiCompatibleOracle::new(config).unwrap();
        let key = SuperCategory::Style.stage1_key();
        let request = OracleRequest {
            key,
            instruction: InstructionCatalog::standard().get(key).unwrap().clone(),
            triple: TranslationTriple::new("a", "b", "c"),
            context: OracleContext::Initial,
        };
        assert!(oracle.judge(&request).await.is_err());
    }
}
