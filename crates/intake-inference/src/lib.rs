//! # intake-inference
//!
//! Language-model access for the client intake portal.
//!
//! This crate provides:
//! - Anthropic Messages API backend (default)
//! - OpenAI-compatible chat completion backend
//! - Provider selection from `LLM_PROVIDER`
//! - The two-call [`AnalysisClient`] and its prompts
//! - Summary normalisation ([`clean_summary`])
//!
//! # Feature Flags
//!
//! - `mock`: scripted [`mock::MockGenerationBackend`] for tests
//!
//! # Example
//!
//! ```rust,no_run
//! use intake_inference::{backend_from_env, AnalysisClient};
//!
//! # async fn run() -> intake_core::Result<()> {
//! let client = AnalysisClient::new(backend_from_env()?);
//! let outcome = client.analyse("Q: What do you sell?\nA: Boots").await?;
//! println!("{} blocks", outcome.structured_result.len());
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod anthropic;
pub mod error;
pub mod openai;
pub mod prompts;
pub mod provider;
pub mod summary;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use analysis::{parse_structured_result, AnalysisClient, AnalysisConfig};
pub use anthropic::{AnthropicBackend, AnthropicConfig};
pub use error::ProviderErrorCode;
pub use openai::{OpenAIBackend, OpenAIConfig};
pub use provider::{backend_from_env, ProviderKind};
pub use summary::{clean_summary, first_paragraph, paragraphs, strip_code_fence};
