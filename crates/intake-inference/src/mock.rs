//! Scripted generation backend for deterministic testing.
//!
//! Responses are keyed by system prompt, so the structuring and summary
//! calls of an analysis can be scripted independently.
//!
//! ```rust,ignore
//! use intake_inference::mock::MockGenerationBackend;
//! use intake_inference::prompts::{STRUCTURE_SYSTEM_PROMPT, SUMMARY_SYSTEM_PROMPT};
//!
//! let backend = MockGenerationBackend::new()
//!     .with_response_mapping(STRUCTURE_SYSTEM_PROMPT, "[]")
//!     .with_response_mapping(SUMMARY_SYSTEM_PROMPT, "One.\n\nTwo.");
//! assert_eq!(backend.generate_call_count(), 0);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use intake_core::{Error, GenerationBackend, GenerationOptions, Result};

use crate::prompts::{STRUCTURE_SYSTEM_PROMPT, SUMMARY_SYSTEM_PROMPT};

pub const MOCK_MODEL: &str = "mock-model";

#[derive(Clone)]
pub struct MockGenerationBackend {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

#[derive(Debug, Clone)]
enum Scripted {
    Respond(String),
    Unavailable(String),
}

#[derive(Debug, Clone)]
struct MockConfig {
    by_system: HashMap<String, Scripted>,
    default_response: String,
    latency_ms: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            by_system: HashMap::new(),
            default_response: "Mock response".to_string(),
            latency_ms: 0,
        }
    }
}

/// One recorded call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub system: String,
    pub prompt: String,
    pub options: GenerationOptions,
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Backend scripted for a successful analysis.
    pub fn for_analysis(structure_json: impl Into<String>, summary: impl Into<String>) -> Self {
        Self::new()
            .with_response_mapping(STRUCTURE_SYSTEM_PROMPT, structure_json)
            .with_response_mapping(SUMMARY_SYSTEM_PROMPT, summary)
    }

    /// Response for any system prompt without a mapping.
    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_response = response.into();
        self
    }

    pub fn with_response_mapping(
        mut self,
        system: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .by_system
            .insert(system.into(), Scripted::Respond(output.into()));
        self
    }

    /// Calls with this system prompt fail with `ModelUnavailable`.
    pub fn with_unavailable(mut self, system: impl Into<String>, message: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config)
            .by_system
            .insert(system.into(), Scripted::Unavailable(message.into()));
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    pub fn get_calls(&self) -> Vec<MockCall> {
        self.call_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn generate_call_count(&self) -> usize {
        self.call_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of calls made with the given system prompt.
    pub fn calls_with_system(&self, system: &str) -> usize {
        self.call_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.system == system)
            .count()
    }
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate_with_system(
        &self,
        system: &str,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<String> {
        self.call_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(MockCall {
                system: system.to_string(),
                prompt: prompt.to_string(),
                options,
            });

        if self.config.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.config.latency_ms)).await;
        }

        match self.config.by_system.get(system) {
            Some(Scripted::Respond(output)) => Ok(output.clone()),
            Some(Scripted::Unavailable(message)) => Err(Error::ModelUnavailable(message.clone())),
            None => Ok(self.config.default_response.clone()),
        }
    }

    fn model_name(&self) -> &str {
        MOCK_MODEL
    }
}
