//! Per-format text adapters registered with the [`crate::TextExtractor`].

mod docx_text;
mod pdf_text;

pub use docx_text::DocxTextAdapter;
pub use pdf_text::PdfTextAdapter;
