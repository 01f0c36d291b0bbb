//! Format-specific file readers sharing one output shape.
//!
//! The extension registry maps each supported extension to its reader;
//! anything else is a typed `UnsupportedFormat`, never a crash. All
//! readers apply the same truncation discipline: content capped at the
//! file ceiling with a visible in-band marker when cut.

mod excel;
mod image;
mod pdf;
mod text;

use std::path::Path;

use crate::config::Limits;
use crate::sources::SourceOrigin;

pub const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "csv"];
pub const PDF_EXTENSIONS: &[&str] = &["pdf"];
pub const EXCEL_EXTENSIONS: &[&str] = &["xlsx"];
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported format: .{0}")]
    UnsupportedFormat(String),

    #[error("unreadable file: {0}")]
    Io(#[from] std::io::Error),

    #[error("no text encoding could decode the file")]
    Undecodable,

    #[error("pdf extraction failed: {0}")]
    Pdf(String),

    #[error("spreadsheet extraction failed: {0}")]
    Excel(String),
}

/// Extracted content of one file, ready to become a `SourceRecord`.
#[derive(Debug)]
pub struct ExtractedFile {
    pub origin: SourceOrigin,
    pub filename: String,
    pub content: String,
    pub char_count: usize,
    /// Pages for a PDF, sheets for a spreadsheet, otherwise 0.
    pub unit_count: usize,
}

impl ExtractedFile {
    fn new(origin: SourceOrigin, path: &Path, content: String, unit_count: usize) -> Self {
        Self {
            origin,
            filename: filename_of(path),
            char_count: content.chars().count(),
            content,
            unit_count,
        }
    }
}

/// Read one file through the reader registered for its extension.
pub fn extract_file(path: &Path, limits: &Limits) -> Result<ExtractedFile, ExtractError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    if TEXT_EXTENSIONS.contains(&ext.as_str()) {
        text::read_text(path, limits)
    } else if PDF_EXTENSIONS.contains(&ext.as_str()) {
        pdf::read_pdf(path, limits)
    } else if EXCEL_EXTENSIONS.contains(&ext.as_str()) {
        excel::read_xlsx(path, limits)
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        image::read_image(path)
    } else {
        Err(ExtractError::UnsupportedFormat(ext))
    }
}

/// Whether any reader is registered for this path's extension.
pub fn is_supported(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    [
        TEXT_EXTENSIONS,
        PDF_EXTENSIONS,
        EXCEL_EXTENSIONS,
        IMAGE_EXTENSIONS,
    ]
    .iter()
    .any(|group| group.contains(&ext.as_str()))
}

fn filename_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
