//! Text extraction: raw bytes plus declared type in, trimmed plain text out.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use intake_core::{Error, FileType};

use crate::adapters::{DocxTextAdapter, PdfTextAdapter};

/// Why a file produced no usable text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// No adapter for this type. Images are not text-extracted.
    #[error("{0} files are not supported for text extraction; upload a pdf or docx")]
    Unsupported(FileType),

    /// The bytes could not be parsed as the declared type.
    #[error("could not parse {file_type} file: {reason}")]
    Corrupt { file_type: FileType, reason: String },

    /// Parsing succeeded but yielded only whitespace.
    #[error("no text could be extracted from the {0} file")]
    EmptyContent(FileType),
}

impl From<ExtractionError> for Error {
    fn from(e: ExtractionError) -> Self {
        Error::Extraction(e.to_string())
    }
}

/// A format-specific text extractor. Implementations must not have side effects.
pub trait TextAdapter: Send + Sync {
    fn file_type(&self) -> FileType;

    /// Untrimmed text, or a parse failure reason.
    fn extract_raw(&self, data: &[u8]) -> std::result::Result<String, String>;
}

/// Registry mapping declared file types to their adapters.
pub struct TextExtractor {
    adapters: HashMap<FileType, Arc<dyn TextAdapter>>,
}

impl TextExtractor {
    /// An extractor with no adapters; every type is unsupported.
    pub fn empty() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Replaces any adapter already registered for the same type.
    pub fn register(&mut self, adapter: Arc<dyn TextAdapter>) {
        self.adapters.insert(adapter.file_type(), adapter);
    }

    pub fn supports(&self, file_type: FileType) -> bool {
        self.adapters.contains_key(&file_type)
    }

    /// Extract and trim. Deterministic for identical bytes.
    pub fn extract(
        &self,
        data: &[u8],
        file_type: FileType,
    ) -> std::result::Result<String, ExtractionError> {
        let adapter = self
            .adapters
            .get(&file_type)
            .ok_or(ExtractionError::Unsupported(file_type))?;

        let raw = adapter
            .extract_raw(data)
            .map_err(|reason| ExtractionError::Corrupt { file_type, reason })?;

        let text = raw.trim();
        if text.is_empty() {
            return Err(ExtractionError::EmptyContent(file_type));
        }
        Ok(text.to_string())
    }
}

impl Default for TextExtractor {
    /// PDF and DOCX adapters registered.
    fn default() -> Self {
        let mut extractor = Self::empty();
        extractor.register(Arc::new(PdfTextAdapter));
        extractor.register(Arc::new(DocxTextAdapter));
        extractor
    }
}
