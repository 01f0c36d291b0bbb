//! Shared text shaping: bounded truncation and newline normalization.
//!
//! Every component that stores or merges source text applies the same
//! discipline: content is capped at a stated ceiling and a visible in-band
//! marker is appended when cut. Truncation is a normal outcome of the
//! bounded-size design, never an error.

/// Appended whenever content is cut at a ceiling.
pub const TRUNCATION_MARKER: &str = "\n...(truncated)";

/// Cap `text` at `max_chars` characters, appending [`TRUNCATION_MARKER`]
/// when cut. Input at or under the limit is returned unchanged.
///
/// Counts characters rather than bytes so the cut never lands inside a
/// multi-byte sequence.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            let mut out = text[..byte_idx].to_string();
            out.push_str(TRUNCATION_MARKER);
            out
        }
        None => text.to_string(),
    }
}

/// Cut `text` to at most `max_chars` characters with no marker. Used for
/// excerpting where the surrounding format already signals continuation.
pub fn clip_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Collapse runs of 3+ newlines to exactly 2, keeping paragraph breaks
/// while discarding the vertical whitespace left behind by stripped markup.
pub fn collapse_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = 0usize;
    for ch in text.chars() {
        if ch == '\n' {
            run += 1;
            if run <= 2 {
                out.push(ch);
            }
        } else {
            run = 0;
            out.push(ch);
        }
    }
    out
}
