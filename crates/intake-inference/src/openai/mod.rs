//! OpenAI-compatible generation backend.
//!
//! Works with the OpenAI cloud API and any server that speaks the
//! `/v1/chat/completions` protocol (vLLM, LocalAI, Ollama in compatibility mode).
//!
//! ```rust,no_run
//! use intake_inference::openai::{OpenAIBackend, OpenAIConfig};
//!
//! let backend = OpenAIBackend::new(OpenAIConfig {
//!     base_url: "http://localhost:11434/v1".to_string(),
//!     ..Default::default()
//! })
//! .unwrap();
//! ```

mod backend;
mod types;

pub use backend::{
    OpenAIBackend, OpenAIConfig, DEFAULT_GEN_MODEL, DEFAULT_OPENAI_URL, DEFAULT_TIMEOUT_SECS,
};
pub use types::*;
