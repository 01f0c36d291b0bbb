//! Persisted grounding sources: records, format readers, and the two
//! storage backends (local filesystem / remote row store).

pub mod extract;
pub mod store;

use serde::{Deserialize, Serialize};

/// Where a record's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceOrigin {
    Text,
    Pdf,
    Excel,
    Image,
    Caption,
    Web,
}

impl SourceOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceOrigin::Text => "text",
            SourceOrigin::Pdf => "pdf",
            SourceOrigin::Excel => "excel",
            SourceOrigin::Image => "image",
            SourceOrigin::Caption => "caption",
            SourceOrigin::Web => "web",
        }
    }
}

/// One unit of grounding information, regardless of origin.
///
/// Records are created once and never mutated afterwards, except for id
/// renumbering when a deletion compacts the sequence. Unknown fields in
/// persisted JSON are ignored; missing optional fields default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    #[serde(default)]
    pub id: u64,
    pub origin: SourceOrigin,
    /// Display name: filename, account handle, or page title.
    pub label: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub char_count: usize,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub created_at: String,
}

impl SourceRecord {
    pub fn new(origin: SourceOrigin, label: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: 0,
            origin,
            label: label.into(),
            char_count: content.chars().count(),
            content,
            tags: String::new(),
            url: String::new(),
            created_at: now_stamp(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }
}

pub(crate) fn now_stamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Per-origin record counts, as reported by `summary`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub text: usize,
    pub pdf: usize,
    pub excel: usize,
    pub image: usize,
    pub caption: usize,
    pub web: usize,
}

impl SourceSummary {
    pub fn count(&mut self, origin: SourceOrigin) {
        match origin {
            SourceOrigin::Text => self.text += 1,
            SourceOrigin::Pdf => self.pdf += 1,
            SourceOrigin::Excel => self.excel += 1,
            SourceOrigin::Image => self.image += 1,
            SourceOrigin::Caption => self.caption += 1,
            SourceOrigin::Web => self.web += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.text + self.pdf + self.excel + self.image + self.caption + self.web
    }
}
