//! Document parsing and text extraction.

use docqa_core::{AppError, AppResult};
use std::fs;
use std::path::Path;

/// Document format, detected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    PlainText,
    Markdown,
    /// Recognized but not extractable (PDF, Word)
    Unsupported,
    Unknown,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("txt") => Self::PlainText,
            Some("md") | Some("markdown") => Self::Markdown,
            Some("pdf") | Some("docx") | Some("doc") => Self::Unsupported,
            _ => Self::Unknown,
        }
    }

    /// Whether files of this kind are picked up during ingestion.
    pub fn is_ingestible(&self) -> bool {
        matches!(self, Self::PlainText | Self::Markdown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlainText => "text",
            Self::Markdown => "markdown",
            Self::Unsupported => "unsupported",
            Self::Unknown => "unknown",
        }
    }
}

/// Read a document and return its text.
pub fn parse_file(path: &Path) -> AppResult<String> {
    let kind = DocumentKind::from_path(path);

    if !kind.is_ingestible() {
        return Err(AppError::Knowledge(format!(
            "Unsupported file type: {:?} (supported: .txt, .md)",
            path
        )));
    }

    let bytes = fs::read(path)
        .map_err(|e| AppError::Knowledge(format!("Failed to read {:?}: {}", path, e)))?;

    if bytes.contains(&0) {
        tracing::warn!("Skipping likely binary file: {:?}", path);
        return Err(AppError::Knowledge(format!(
            "Binary content not supported: {:?}",
            path
        )));
    }

    let raw = String::from_utf8(bytes)
        .map_err(|_| AppError::Knowledge(format!("File is not valid UTF-8: {:?}", path)))?;

    Ok(match kind {
        DocumentKind::Markdown => clean_markdown(&raw),
        _ => raw.trim().to_string(),
    })
}

/// Strip header markers, rules and code fences, and drop blank lines.
fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim_start_matches('#').trim();

        if trimmed.starts_with("---") || trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            continue;
        }

        if !trimmed.is_empty() {
            result.push_str(trimmed);
            result.push('\n');
        }
    }

    result.trim().to_string()
}
