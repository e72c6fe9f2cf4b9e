//! Two-call document analysis: structure the Q&A, then summarise it.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use intake_core::defaults::{
    STRUCTURE_MAX_TOKENS, STRUCTURE_TEMPERATURE, SUMMARY_MAX_TOKENS, SUMMARY_TEMPERATURE,
};
use intake_core::{AnalysisOutcome, Error, GenerationBackend, GenerationOptions, QaBlock, Result};

use crate::prompts::{structure_prompt, summary_prompt, STRUCTURE_SYSTEM_PROMPT, SUMMARY_SYSTEM_PROMPT};
use crate::summary::strip_code_fence;

/// Sampling settings for the two calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisConfig {
    pub structure: GenerationOptions,
    pub summary: GenerationOptions,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            structure: GenerationOptions::new(STRUCTURE_TEMPERATURE, STRUCTURE_MAX_TOKENS),
            summary: GenerationOptions::new(SUMMARY_TEMPERATURE, SUMMARY_MAX_TOKENS),
        }
    }
}

/// Parse the structuring call's output into QA blocks.
///
/// Tolerates a surrounding code fence. Anything that is not a JSON array of
/// blocks with non-blank `question`, `original_response` and
/// `improved_response` is `MalformedModelOutput`.
pub fn parse_structured_result(raw: &str) -> Result<Vec<QaBlock>> {
    let json = strip_code_fence(raw);
    let blocks: Vec<QaBlock> = serde_json::from_str(json).map_err(|e| {
        Error::MalformedModelOutput(format!("expected a JSON array of QA blocks: {}", e))
    })?;

    for (idx, block) in blocks.iter().enumerate() {
        if let Some(field) = block.first_blank_field() {
            return Err(Error::MalformedModelOutput(format!(
                "block {} has an empty {}",
                idx, field
            )));
        }
    }
    Ok(blocks)
}

/// Produces an [`AnalysisOutcome`] from extracted document text.
///
/// The summary in the outcome is the raw model text; callers normalise it
/// with [`crate::clean_summary`] before persisting or displaying it.
#[derive(Clone)]
pub struct AnalysisClient {
    backend: Arc<dyn GenerationBackend>,
    config: AnalysisConfig,
}

impl AnalysisClient {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self::with_config(backend, AnalysisConfig::default())
    }

    pub fn with_config(backend: Arc<dyn GenerationBackend>, config: AnalysisConfig) -> Self {
        Self { backend, config }
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    /// Run both calls. The summary call is only made once structuring succeeded.
    pub async fn analyse(&self, text: &str) -> Result<AnalysisOutcome> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput(
                "cannot analyse an empty document".to_string(),
            ));
        }

        let start = Instant::now();
        let structured_result = self.structure(text).await?;
        let summary = self.summarise(&structured_result).await?;

        info!(
            subsystem = "inference",
            component = "analysis",
            op = "analyse",
            model = self.model_name(),
            text_len = text.len(),
            block_count = structured_result.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Analysis complete"
        );

        Ok(AnalysisOutcome {
            structured_result,
            summary,
        })
    }

    /// First call: extract and enrich the question/answer pairs.
    pub async fn structure(&self, text: &str) -> Result<Vec<QaBlock>> {
        let start = Instant::now();
        let raw = self
            .backend
            .generate_with_system(
                STRUCTURE_SYSTEM_PROMPT,
                &structure_prompt(text),
                self.config.structure,
            )
            .await?;

        let blocks = parse_structured_result(&raw).map_err(|e| {
            warn!(
                subsystem = "inference",
                component = "analysis",
                op = "structure",
                response_len = raw.len(),
                error = %e,
                "Model returned unusable structure"
            );
            e
        })?;

        if blocks.is_empty() {
            warn!(
                subsystem = "inference",
                component = "analysis",
                op = "structure",
                "Model found no question/answer pairs"
            );
        }

        debug!(
            subsystem = "inference",
            component = "analysis",
            op = "structure",
            block_count = blocks.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Structuring call complete"
        );
        Ok(blocks)
    }

    /// Second call: executive summary over the pretty-printed blocks.
    pub async fn summarise(&self, blocks: &[QaBlock]) -> Result<String> {
        let start = Instant::now();
        let analysis_json = serde_json::to_string_pretty(blocks)?;
        let summary = self
            .backend
            .generate_with_system(
                SUMMARY_SYSTEM_PROMPT,
                &summary_prompt(&analysis_json),
                self.config.summary,
            )
            .await?;

        debug!(
            subsystem = "inference",
            component = "analysis",
            op = "summarise",
            response_len = summary.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Summary call complete"
        );
        Ok(summary)
    }
}
