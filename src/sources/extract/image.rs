//! Image reader: records metadata only. Image bytes never enter the
//! merged corpus, so the content is a short placeholder line.

use std::fs;
use std::path::Path;

use super::{ExtractError, ExtractedFile};
use crate::sources::SourceOrigin;

pub(super) fn read_image(path: &Path) -> Result<ExtractedFile, ExtractError> {
    let meta = fs::metadata(path)?;
    let size_kb = meta.len() / 1024;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let content = format!("[image] {filename} ({size_kb}KB)");
    Ok(ExtractedFile::new(SourceOrigin::Image, path, content, 0))
}
