//! Provider selection.
//!
//! `LLM_PROVIDER` picks the hosted model behind the analysis client:
//!
//! ```text
//! LLM_PROVIDER=anthropic   (default) Anthropic Messages API
//! LLM_PROVIDER=openai      OpenAI or any /v1/chat/completions server
//! ```

use std::str::FromStr;
use std::sync::Arc;

use tracing::info;

use intake_core::{Error, GenerationBackend, Result};

use crate::anthropic::AnthropicBackend;
use crate::openai::OpenAIBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    Anthropic,
    OpenAI,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAI => "openai",
        }
    }

    /// Read `LLM_PROVIDER`, falling back to the default when unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var("LLM_PROVIDER") {
            Ok(v) if !v.trim().is_empty() => v.parse().map_err(Error::Config),
            _ => Ok(Self::default()),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAI),
            other => Err(format!("Unknown LLM_PROVIDER: {}", other)),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Build the configured backend from environment variables.
pub fn backend_from_env() -> Result<Arc<dyn GenerationBackend>> {
    let kind = ProviderKind::from_env()?;
    let backend: Arc<dyn GenerationBackend> = match kind {
        ProviderKind::Anthropic => Arc::new(AnthropicBackend::from_env()?),
        ProviderKind::OpenAI => Arc::new(OpenAIBackend::from_env()?),
    };
    info!(
        subsystem = "inference",
        component = "provider",
        provider = kind.as_str(),
        model = backend.model_name(),
        "Generation backend selected"
    );
    Ok(backend)
}
