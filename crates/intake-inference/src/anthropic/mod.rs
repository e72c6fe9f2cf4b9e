//! Anthropic Messages API backend, the default provider.

mod backend;
mod types;

pub use backend::{
    AnthropicBackend, AnthropicConfig, ANTHROPIC_VERSION, DEFAULT_ANTHROPIC_MODEL,
    DEFAULT_ANTHROPIC_URL, DEFAULT_TIMEOUT_SECS, FALLBACK_MAX_TOKENS,
};
pub use types::*;
