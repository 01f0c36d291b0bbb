//! Tabular-document reader (PDF): whole-document text, rendered as
//! per-page blocks when the extractor emits form-feed page breaks.
//! Columnar lines are re-joined pipe-delimited so table rows survive
//! the linearization.

use std::path::Path;

use tracing::debug;

use super::{ExtractError, ExtractedFile};
use crate::config::Limits;
use crate::sources::SourceOrigin;
use crate::text::truncate_chars;

pub(super) fn read_pdf(path: &Path, limits: &Limits) -> Result<ExtractedFile, ExtractError> {
    let raw = pdf_extract::extract_text(path).map_err(|e| ExtractError::Pdf(e.to_string()))?;

    let pages: Vec<String> = raw
        .split('\u{c}')
        .map(render_page)
        .filter(|p| !p.is_empty())
        .collect();

    let unit_count = pages.len().max(1);
    let content = if pages.len() > 1 {
        pages
            .iter()
            .enumerate()
            .map(|(i, page)| format!("[page {}]\n{page}", i + 1))
            .collect::<Vec<_>>()
            .join("\n\n")
    } else {
        pages.into_iter().next().unwrap_or_default()
    };

    debug!(path = %path.display(), pages = unit_count, "pdf extracted");
    Ok(ExtractedFile::new(
        SourceOrigin::Pdf,
        path,
        truncate_chars(&content, limits.file_content_chars),
        unit_count,
    ))
}

/// Extracted PDF text keeps table cells on one line separated by wide
/// gaps. A line with two or more gap-separated segments is treated as a
/// table row and re-joined with pipes; prose lines pass through.
fn render_page(text: &str) -> String {
    let lines: Vec<String> = text
        .lines()
        .map(|line| {
            let cells: Vec<&str> = line
                .split("  ")
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .collect();
            if cells.len() >= 2 {
                cells.join(" | ")
            } else {
                line.trim_end().to_string()
            }
        })
        .collect();
    lines.join("\n").trim().to_string()
}
