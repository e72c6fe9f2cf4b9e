//! Anthropic Messages API backend.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use intake_core::{Error, GenerationBackend, GenerationOptions, Result};

use super::types::*;
use crate::error::{transport_error, ProviderErrorCode};

pub const DEFAULT_ANTHROPIC_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-5";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Used when the caller sets no `max_tokens`; the API requires one.
pub const FALLBACK_MAX_TOKENS: u32 = 1024;

const PROVIDER: &str = "anthropic";

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_seconds: u64,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ANTHROPIC_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_ANTHROPIC_MODEL.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl AnthropicConfig {
    /// Read `ANTHROPIC_API_KEY` (required), `ANTHROPIC_BASE_URL`,
    /// `ANTHROPIC_MODEL` and `ANTHROPIC_TIMEOUT`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("ANTHROPIC_API_KEY is not set".to_string()))?;
        Ok(Self {
            base_url: std::env::var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_ANTHROPIC_URL.to_string()),
            api_key,
            model: std::env::var("ANTHROPIC_MODEL")
                .unwrap_or_else(|_| DEFAULT_ANTHROPIC_MODEL.to_string()),
            timeout_seconds: std::env::var("ANTHROPIC_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        })
    }
}

pub struct AnthropicBackend {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicBackend {
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "anthropic",
            url = %config.base_url,
            model = %config.model,
            "Initializing Anthropic backend"
        );

        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(AnthropicConfig::from_env()?)
    }

    fn build_request(&self) -> reqwest::RequestBuilder {
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        self.client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
    }
}

#[async_trait]
impl GenerationBackend for AnthropicBackend {
    async fn generate_with_system(
        &self,
        system: &str,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<String> {
        let start = Instant::now();
        let request = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: options.max_tokens.unwrap_or(FALLBACK_MAX_TOKENS),
            system: (!system.is_empty()).then(|| system.to_string()),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: options.temperature,
        };

        let response = self
            .build_request()
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            let body: AnthropicErrorResponse = serde_json::from_str(&text)
                .unwrap_or_else(|_| AnthropicErrorResponse::unknown(&text));
            let code = ProviderErrorCode::from_response(status, &body.error.error_type);
            return Err(code.into_error(PROVIDER, &body.error.message));
        }

        let result: MessagesResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let content = result
            .text()
            .ok_or_else(|| Error::Inference("Response contained no text block".to_string()))?;

        debug!(
            subsystem = "inference",
            component = "anthropic",
            op = "generate",
            model = %self.config.model,
            stop_reason = result.stop_reason.as_deref().unwrap_or(""),
            prompt_len = prompt.len(),
            response_len = content.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Generation complete"
        );
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
