//! PdfText adapter: page text in document order via `pdf-extract`.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::warn;

use intake_core::FileType;

use crate::extraction::TextAdapter;

/// Extracts the text layer of a PDF. Scanned PDFs without one come back empty.
pub struct PdfTextAdapter;

impl TextAdapter for PdfTextAdapter {
    fn file_type(&self) -> FileType {
        FileType::Pdf
    }

    fn extract_raw(&self, data: &[u8]) -> Result<String, String> {
        // pdf-extract can panic on malformed fonts and glyph tables.
        match catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(data))) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => {
                warn!(
                    subsystem = "jobs",
                    component = "pdf_text",
                    byte_len = data.len(),
                    "PDF parser panicked"
                );
                Err("PDF parser panicked on malformed content".to_string())
            }
        }
    }
}
