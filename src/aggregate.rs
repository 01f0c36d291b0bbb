//! Source aggregation façade: one call that merges every stored source
//! kind, plus an optional live research corpus, into a single bounded
//! text for article grounding.
//!
//! The remote row store is probed once per operation and preferred when
//! available; otherwise everything degrades to the local store. Web-page
//! snapshots are always local. A store that fails mid-assembly costs its
//! section, never the whole text.

use std::path::Path;

use reqwest::Client;
use tracing::{info, warn};

use crate::config::Limits;
use crate::fetch::{self, FetchError};
use crate::research::ResearchResult;
use crate::sources::store::{Backend, Connectivity, LocalStore, SheetStore, StoreError};
use crate::sources::{SourceOrigin, SourceRecord, SourceSummary};
use crate::text::{clip_chars, truncate_chars};

const SECTION_RULE: &str = "========================================";

#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct Aggregator {
    local: LocalStore,
    remote: Option<SheetStore>,
    limits: Limits,
}

impl Aggregator {
    pub fn new(local: LocalStore, remote: Option<SheetStore>, limits: Limits) -> Self {
        Self {
            local,
            remote,
            limits,
        }
    }

    /// Resolve the backend for one operation. The remote store wins only
    /// when configured and answering.
    async fn backend(&self) -> Backend<'_> {
        if let Some(remote) = &self.remote {
            match remote.probe().await {
                Connectivity::Available => return Backend::Remote(remote),
                Connectivity::Unavailable => {
                    warn!("row store unreachable, using local store");
                }
                Connectivity::Error(detail) => {
                    warn!(detail, "row store unusable, using local store");
                }
            }
        }
        Backend::Local(&self.local)
    }

    /// Everything known about `keyword` as one bounded text: stored
    /// files, captions, web-page snapshots, and (when provided) the live
    /// research corpus.
    pub async fn all_sources_text(
        &self,
        keyword: &str,
        research: Option<&ResearchResult>,
    ) -> String {
        let backend = self.backend().await;
        let mut sections = Vec::new();

        match backend.file_sources().await {
            Ok(records) => {
                if let Some(section) = file_section(&records, backend.name()) {
                    sections.push(section);
                }
            }
            Err(e) => warn!(error = %e, "file sources skipped"),
        }

        match backend.captions().await {
            Ok(records) => {
                if let Some(section) = caption_section(&records, keyword, backend.name()) {
                    sections.push(section);
                }
            }
            Err(e) => warn!(error = %e, "caption sources skipped"),
        }

        match self.local.web_pages() {
            Ok(records) => {
                if let Some(section) = web_section(&records, keyword, &self.limits) {
                    sections.push(section);
                }
            }
            Err(e) => warn!(error = %e, "web page sources skipped"),
        }

        if let Some(result) = research {
            if !result.combined_content.is_empty() {
                sections.push(format!("## Web research\n\n{}", result.combined_content));
            }
        }

        let merged = sections.join(&format!("\n\n{SECTION_RULE}\n\n"));
        let text = truncate_chars(&merged, self.limits.aggregate_chars);
        info!(
            keyword,
            backend = backend.name(),
            sections = sections.len(),
            chars = text.chars().count(),
            "sources aggregated"
        );
        text
    }

    /// Per-origin record counts across the active backend plus local
    /// snapshots.
    pub async fn summary(&self) -> SourceSummary {
        let backend = self.backend().await;
        let mut summary = SourceSummary::default();
        match backend.file_sources().await {
            Ok(records) => records.iter().for_each(|r| summary.count(r.origin)),
            Err(e) => warn!(error = %e, "file sources missing from summary"),
        }
        match backend.captions().await {
            Ok(records) => records.iter().for_each(|r| summary.count(r.origin)),
            Err(e) => warn!(error = %e, "captions missing from summary"),
        }
        match self.local.web_pages() {
            Ok(records) => records.iter().for_each(|r| summary.count(r.origin)),
            Err(e) => warn!(error = %e, "web pages missing from summary"),
        }
        summary
    }

    pub async fn files(&self) -> Result<Vec<SourceRecord>, StoreError> {
        self.backend().await.file_sources().await
    }

    pub async fn captions(&self) -> Result<Vec<SourceRecord>, StoreError> {
        self.backend().await.captions().await
    }

    pub fn pages(&self) -> Result<Vec<SourceRecord>, StoreError> {
        self.local.web_pages()
    }

    /// Store an upload. The local copy is the durable one; the remote
    /// row is a best-effort mirror.
    pub async fn add_file(&self, path: &Path) -> Result<SourceRecord, StoreError> {
        let record = self.local.add_file(path)?;
        if let Backend::Remote(remote) = self.backend().await {
            if let Err(e) = remote.add_source(record.clone()).await {
                warn!(error = %e, "remote mirror of upload failed");
            }
        }
        Ok(record)
    }

    /// Delete by the id the active backend reported from `files()`. The
    /// two backends number independently (remote rows by append order,
    /// local files by sorted listing), so the delete must go to the one
    /// backend whose listing the caller saw.
    pub async fn delete_file(&self, id: u64) -> Result<bool, StoreError> {
        self.backend().await.delete_file(id).await
    }

    pub async fn add_caption(
        &self,
        account: &str,
        caption: &str,
        url: &str,
        tags: &str,
    ) -> Result<(), StoreError> {
        let record = SourceRecord::new(SourceOrigin::Caption, account, caption)
            .with_url(url)
            .with_tags(tags);
        self.backend().await.add_caption(record).await
    }

    pub async fn delete_caption(&self, id: u64) -> Result<bool, StoreError> {
        self.backend().await.delete_caption(id).await
    }

    /// Fetch a page and persist its snapshot locally.
    pub async fn save_page(&self, http: &Client, url: &str) -> Result<SourceRecord, AggregateError> {
        let (title, text) = fetch::fetch_snapshot(http, url, &self.limits).await?;
        let record = SourceRecord::new(SourceOrigin::Web, title, text).with_url(url);
        Ok(self.local.add_web_page(record)?)
    }

    pub fn delete_page(&self, id: u64) -> Result<bool, StoreError> {
        self.local.delete_web_page(id)
    }

    /// Store a generated article on the remote backend when available.
    pub async fn save_article(
        &self,
        keyword: &str,
        title: &str,
        content: &str,
    ) -> Result<bool, StoreError> {
        match self.backend().await {
            Backend::Remote(remote) => {
                remote.save_article(keyword, title, content).await?;
                Ok(true)
            }
            Backend::Local(_) => Ok(false),
        }
    }
}

fn file_section(records: &[SourceRecord], backend: &str) -> Option<String> {
    let blocks: Vec<String> = records
        .iter()
        .filter(|r| r.origin != SourceOrigin::Image && !r.content.is_empty())
        .map(|r| format!("### {}\n{}", r.label, r.content))
        .collect();
    if blocks.is_empty() {
        return None;
    }
    Some(format!(
        "## File sources ({backend})\n\n{}",
        blocks.join("\n\n")
    ))
}

fn caption_section(records: &[SourceRecord], keyword: &str, backend: &str) -> Option<String> {
    let kept = filter_by_keyword(records, keyword);
    let blocks: Vec<String> = kept
        .iter()
        .filter(|r| !r.content.is_empty())
        .map(|r| {
            let mut block = format!("### {}\n{}", r.label, r.content);
            if !r.tags.is_empty() {
                block.push_str(&format!("\nTags: {}", r.tags));
            }
            block
        })
        .collect();
    if blocks.is_empty() {
        return None;
    }
    Some(format!(
        "## Caption sources ({backend})\n\n{}",
        blocks.join("\n\n")
    ))
}

fn web_section(records: &[SourceRecord], keyword: &str, limits: &Limits) -> Option<String> {
    let kept = filter_by_keyword(records, keyword);
    let blocks: Vec<String> = kept
        .iter()
        .filter(|r| !r.content.is_empty())
        .map(|r| {
            format!(
                "### Web page: {}\nURL: {}\n{}",
                r.label,
                r.url,
                clip_chars(&r.content, limits.snapshot_excerpt_chars)
            )
        })
        .collect();
    if blocks.is_empty() {
        return None;
    }
    Some(format!("## Web page sources\n\n{}", blocks.join("\n\n")))
}

/// Keep records mentioning any keyword token; when nothing matches, keep
/// everything. Volume beats precision here: a thin corpus hurts the
/// generated article more than loosely related sources do.
fn filter_by_keyword<'a>(records: &'a [SourceRecord], keyword: &str) -> Vec<&'a SourceRecord> {
    let tokens: Vec<String> = keyword
        .split_whitespace()
        .map(str::to_lowercase)
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        return records.iter().collect();
    }

    let matched: Vec<&SourceRecord> = records
        .iter()
        .filter(|r| {
            let haystack =
                format!("{} {} {}", r.label, r.content, r.tags).to_lowercase();
            tokens.iter().any(|t| haystack.contains(t))
        })
        .collect();
    if matched.is_empty() {
        records.iter().collect()
    } else {
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Paths;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn local_aggregator(dir: &tempfile::TempDir, limits: Limits) -> Aggregator {
        let paths = Paths {
            data_dir: dir.path().to_path_buf(),
        };
        Aggregator::new(LocalStore::new(paths, limits.clone()), None, limits)
    }

    fn caption(label: &str, content: &str, tags: &str) -> SourceRecord {
        SourceRecord::new(SourceOrigin::Caption, label, content).with_tags(tags)
    }

    #[tokio::test]
    async fn local_mode_labels_sections() {
        let dir = tempfile::tempdir().unwrap();
        let agg = local_aggregator(&dir, Limits::default());

        let upload = dir.path().join("notes.txt");
        std::fs::write(&upload, "kumquat trees prefer full sun and light pruning").unwrap();
        agg.add_file(&upload).await.unwrap();
        agg.add_caption("@grower", "kumquat harvest today", "", "#citrus")
            .await
            .unwrap();

        let text = agg.all_sources_text("kumquat", None).await;
        assert!(text.contains("## File sources (local)"));
        assert!(text.contains("### notes.txt"));
        assert!(text.contains("## Caption sources (local)"));
        assert!(text.contains("kumquat harvest today"));
        assert!(text.contains(SECTION_RULE));
        assert!(!text.contains("## Web research"));
    }

    #[tokio::test]
    async fn image_records_never_enter_the_text() {
        let dir = tempfile::tempdir().unwrap();
        let agg = local_aggregator(&dir, Limits::default());

        let upload = dir.path().join("tree.png");
        std::fs::write(&upload, vec![0u8; 2048]).unwrap();
        agg.add_file(&upload).await.unwrap();

        let text = agg.all_sources_text("tree", None).await;
        assert!(!text.contains("tree.png"));
        assert!(!text.contains("## File sources"));
    }

    #[tokio::test]
    async fn research_section_appended_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let agg = local_aggregator(&dir, Limits::default());

        let research = ResearchResult {
            keyword: "kumquat".into(),
            sources: vec![],
            combined_headings: vec![],
            combined_content: "[source: Guide]\nlive research body".into(),
            source_count: 1,
        };
        let text = agg.all_sources_text("kumquat", Some(&research)).await;
        assert!(text.contains("## Web research"));
        assert!(text.contains("live research body"));
    }

    #[tokio::test]
    async fn no_sources_yields_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        let agg = local_aggregator(&dir, Limits::default());
        assert_eq!(agg.all_sources_text("anything", None).await, "");
    }

    #[tokio::test]
    async fn aggregate_text_capped_with_marker() {
        let dir = tempfile::tempdir().unwrap();
        let limits = Limits {
            aggregate_chars: 120,
            ..Limits::default()
        };
        let agg = local_aggregator(&dir, limits);
        agg.add_caption("@a", &"long caption text ".repeat(50), "", "")
            .await
            .unwrap();

        let text = agg.all_sources_text("kumquat", None).await;
        assert!(text.ends_with(crate::text::TRUNCATION_MARKER));
        assert_eq!(
            text.chars().count(),
            120 + crate::text::TRUNCATION_MARKER.chars().count()
        );
    }

    #[tokio::test]
    async fn summary_counts_every_store() {
        let dir = tempfile::tempdir().unwrap();
        let agg = local_aggregator(&dir, Limits::default());

        let upload = dir.path().join("memo.txt");
        std::fs::write(&upload, "a full page of cultivation notes").unwrap();
        agg.add_file(&upload).await.unwrap();
        agg.add_caption("@a", "caption", "", "").await.unwrap();

        let summary = agg.summary().await;
        assert_eq!(summary.text, 1);
        assert_eq!(summary.caption, 1);
        assert_eq!(summary.total(), 2);
    }

    #[tokio::test]
    async fn summary_is_idempotent_without_writes() {
        let dir = tempfile::tempdir().unwrap();
        let agg = local_aggregator(&dir, Limits::default());
        agg.add_caption("@a", "caption body", "", "").await.unwrap();

        let first = agg.summary().await;
        let second = agg.summary().await;
        assert_eq!(first, second);
    }

    #[test]
    fn keyword_filter_falls_back_to_all() {
        let records = vec![
            caption("@a", "citrus pruning tips", "#garden"),
            caption("@b", "unrelated topic", ""),
        ];

        let hits = filter_by_keyword(&records, "citrus");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].label, "@a");

        // Nothing mentions the keyword: keep everything.
        let all = filter_by_keyword(&records, "hydrangea");
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn keyword_filter_matches_tags() {
        let records = vec![
            caption("@a", "no keyword here", "#citrus"),
            caption("@b", "nor here", ""),
        ];
        let hits = filter_by_keyword(&records, "citrus care");
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn remote_backend_used_when_probe_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tables"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        for table in ["sources", "captions"] {
            Mock::given(method("GET"))
                .and(path(format!("/tables/{table}")))
                .respond_with(ResponseTemplate::new(200))
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/tables/sources/rows"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"origin": "text", "label": "remote.txt", "content": "remote file body"},
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tables/captions/rows"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let limits = Limits::default();
        let remote = SheetStore::new(
            reqwest::Client::new(),
            &crate::config::RemoteConfig {
                base_url: server.uri(),
                token: "t".into(),
            },
            limits.clone(),
        );
        let agg = Aggregator::new(
            LocalStore::new(
                Paths {
                    data_dir: dir.path().to_path_buf(),
                },
                limits.clone(),
            ),
            Some(remote),
            limits,
        );

        let text = agg.all_sources_text("anything", None).await;
        assert!(text.contains("## File sources (remote)"));
        assert!(text.contains("remote file body"));
    }

    #[tokio::test]
    async fn delete_file_goes_to_the_active_backend_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tables"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/tables/sources/rows/0"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        // Local listing sorts alphabetically; the remote table keeps
        // append order. With z.txt appended before a.txt the two
        // numberings disagree, so id 1 must resolve remotely.
        let dir = tempfile::tempdir().unwrap();
        let sources = dir.path().join("sources");
        std::fs::create_dir_all(&sources).unwrap();
        std::fs::write(sources.join("z.txt"), "stored first").unwrap();
        std::fs::write(sources.join("a.txt"), "stored second").unwrap();

        let limits = Limits::default();
        let remote = SheetStore::new(
            reqwest::Client::new(),
            &crate::config::RemoteConfig {
                base_url: server.uri(),
                token: "t".into(),
            },
            limits.clone(),
        );
        let agg = Aggregator::new(
            LocalStore::new(
                Paths {
                    data_dir: dir.path().to_path_buf(),
                },
                limits.clone(),
            ),
            Some(remote),
            limits,
        );

        assert!(agg.delete_file(1).await.unwrap());
        assert!(sources.join("z.txt").exists());
        assert!(sources.join("a.txt").exists());
    }

    #[tokio::test]
    async fn unreachable_remote_falls_back_to_local() {
        let dir = tempfile::tempdir().unwrap();
        let limits = Limits::default();
        let remote = SheetStore::new(
            reqwest::Client::new(),
            &crate::config::RemoteConfig {
                base_url: "http://127.0.0.1:1".into(),
                token: "t".into(),
            },
            limits.clone(),
        );
        let agg = Aggregator::new(
            LocalStore::new(
                Paths {
                    data_dir: dir.path().to_path_buf(),
                },
                limits.clone(),
            ),
            Some(remote),
            limits,
        );
        agg.add_caption("@a", "fallback caption body", "", "")
            .await
            .unwrap();

        let text = agg.all_sources_text("fallback", None).await;
        assert!(text.contains("## Caption sources (local)"));
    }
}
