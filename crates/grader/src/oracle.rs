//! Probabilistic scoring oracle.
//!
//! The engine only needs `complete(prompt) -> text`. The production
//! implementation talks to any OpenAI-compatible `/chat/completions`
//! endpoint; tests plug in in-process mocks.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OracleConfig;
use crate::errors::OracleError;

/// A text-completion service that scores rendered rubric prompts.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str {
        "oracle"
    }

    /// Send one prompt and return the raw completion text.
    async fn complete(&self, prompt: &str) -> Result<String, OracleError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completion client.
#[derive(Debug, Clone)]
pub struct OpenAiOracle {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f64,
}

impl OpenAiOracle {
    pub fn from_config(config: &OracleConfig) -> Result<Self, OracleError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| OracleError::Configuration("no API key configured".into()))?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| OracleError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl Oracle for OpenAiOracle {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(OracleError::RateLimit(format!("HTTP {status}")));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(OracleError::Configuration(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(OracleError::Transport(format!(
                "HTTP {status}: {}",
                text.chars().take(200).collect::<String>()
            )));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| OracleError::Malformed(format!("completion body: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| OracleError::Malformed("completion has no choices".into()))?;

        debug!(model = %self.model, chars = content.len(), "oracle completion received");
        Ok(content)
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> OracleError {
    if e.is_timeout() {
        OracleError::Timeout(e.to_string())
    } else if e.is_builder() {
        OracleError::Configuration(e.to_string())
    } else {
        OracleError::Transport(e.to_string())
    }
}

/// Check if an oracle endpoint is reachable (GET `{base_url}/models`).
pub async fn check_endpoint(base_url: &str, api_key: Option<&str>) -> bool {
    let models_url = format!("{}/models", base_url.trim_end_matches('/'));
    let mut req = reqwest::Client::new()
        .get(&models_url)
        .timeout(Duration::from_secs(5));
    if let Some(key) = api_key {
        req = req.bearer_auth(key);
    }
    match req.send().await {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}
