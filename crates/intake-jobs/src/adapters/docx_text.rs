//! DocxText adapter: paragraph and table text via `docx-rs`.

use docx_rs::{
    DocumentChild, Paragraph, ParagraphChild, RunChild, TableCellContent, TableChild,
    TableRowChild,
};

use intake_core::FileType;

use crate::extraction::TextAdapter;

/// Extracts body text from a DOCX package, one line per paragraph.
///
/// Table rows become one line each with cells separated by ` | `, which keeps
/// question/answer forms laid out as tables readable.
pub struct DocxTextAdapter;

fn push_paragraph(para: &Paragraph, out: &mut String) {
    for child in &para.children {
        match child {
            ParagraphChild::Run(run) => push_runs(&run.children, out),
            ParagraphChild::Hyperlink(link) => {
                for inner in &link.children {
                    if let ParagraphChild::Run(run) = inner {
                        push_runs(&run.children, out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn push_runs(children: &[RunChild], out: &mut String) {
    for child in children {
        match child {
            RunChild::Text(t) => out.push_str(&t.text),
            RunChild::Tab(_) => out.push('\t'),
            RunChild::Break(_) => out.push('\n'),
            _ => {}
        }
    }
}

impl TextAdapter for DocxTextAdapter {
    fn file_type(&self) -> FileType {
        FileType::Docx
    }

    fn extract_raw(&self, data: &[u8]) -> Result<String, String> {
        let docx = docx_rs::read_docx(data).map_err(|e| e.to_string())?;
        let mut out = String::new();

        for child in &docx.document.children {
            match child {
                DocumentChild::Paragraph(para) => {
                    push_paragraph(para, &mut out);
                    out.push('\n');
                }
                DocumentChild::Table(table) => {
                    for row in &table.rows {
                        let TableChild::TableRow(tr) = row;
                        let mut cells = Vec::with_capacity(tr.cells.len());
                        for cell in &tr.cells {
                            let TableRowChild::TableCell(tc) = cell;
                            let mut text = String::new();
                            for content in &tc.children {
                                if let TableCellContent::Paragraph(para) = content {
                                    if !text.is_empty() {
                                        text.push(' ');
                                    }
                                    push_paragraph(para, &mut text);
                                }
                            }
                            cells.push(text.trim().to_string());
                        }
                        out.push_str(&cells.join(" | "));
                        out.push('\n');
                    }
                }
                _ => {}
            }
        }
        Ok(out)
    }
}
