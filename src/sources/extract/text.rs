//! Plain-text reader: a fixed encoding ladder tried in order.

use std::fs;
use std::path::Path;

use encoding_rs::{EUC_JP, Encoding, SHIFT_JIS, UTF_8};
use tracing::debug;

use super::{ExtractError, ExtractedFile};
use crate::config::Limits;
use crate::sources::SourceOrigin;
use crate::text::truncate_chars;

/// Tried in order; the first clean decode wins. UTF-8 handles a BOM
/// (the utf-8-sig case) via encoding_rs BOM sniffing.
const ENCODINGS: &[&Encoding] = &[UTF_8, SHIFT_JIS, EUC_JP];

pub(super) fn read_text(path: &Path, limits: &Limits) -> Result<ExtractedFile, ExtractError> {
    let bytes = fs::read(path)?;

    for encoding in ENCODINGS {
        let (decoded, used, had_errors) = encoding.decode(&bytes);
        if had_errors || decoded.is_empty() {
            continue;
        }
        debug!(path = %path.display(), encoding = used.name(), "text file decoded");
        let content = truncate_chars(&decoded, limits.file_content_chars);
        return Ok(ExtractedFile::new(SourceOrigin::Text, path, content, 0));
    }

    Err(ExtractError::Undecodable)
}
