//! Research orchestration: keyword → bounded, deduplicated web corpus.
//!
//! Candidate URLs are over-fetched to absorb expected page failures, then
//! fetched sequentially with a randomized pacing delay between requests.
//! Individual page failures are swallowed; only total search unavailability
//! collapses the result to empty — and that is a valid result, not an error.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::Limits;
use crate::fetch::{self, PageExtract};
use crate::search::{self, SearchProvider};
use crate::text::{clip_chars, truncate_chars};

/// Extra candidates requested beyond `max_sources`, compensating for
/// pages that fail to fetch or fall below the usefulness threshold.
const OVERFETCH: usize = 3;
/// Separator between per-page excerpts in the merged corpus.
const PAGE_SEPARATOR: &str = "\n\n---\n\n";
/// Max characters of a page title carried into its excerpt label.
const LABEL_TITLE_CHARS: usize = 60;

#[derive(Debug)]
pub struct ResearchResult {
    pub keyword: String,
    /// Accepted pages in fetch order. Every entry satisfies the
    /// minimum-usefulness filter.
    pub sources: Vec<PageExtract>,
    /// Deduplicated union of all accepted pages' headings.
    pub combined_headings: Vec<String>,
    /// Deterministic fetch-order join of per-page excerpts, bounded.
    pub combined_content: String,
    pub source_count: usize,
}

impl ResearchResult {
    fn empty(keyword: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            sources: Vec::new(),
            combined_headings: Vec::new(),
            combined_content: String::new(),
            source_count: 0,
        }
    }
}

/// Collect up to `max_sources` usable pages for `keyword`.
pub async fn research(
    primary: &impl SearchProvider,
    fallback: &impl SearchProvider,
    http: &Client,
    keyword: &str,
    max_sources: usize,
    limits: &Limits,
) -> ResearchResult {
    info!(keyword, max_sources, "research start");

    let candidates = search::candidates(primary, fallback, keyword, max_sources + OVERFETCH).await;
    if candidates.is_empty() {
        warn!(keyword, "no search candidates, returning empty result");
        return ResearchResult::empty(keyword);
    }

    let mut sources: Vec<PageExtract> = Vec::new();
    for (i, url) in candidates.iter().enumerate() {
        if sources.len() >= max_sources {
            break;
        }

        debug!(n = i + 1, total = candidates.len(), url = %url, "fetching candidate");
        match fetch::fetch_extract(http, url, limits).await {
            Ok(page) if page.content.chars().count() >= limits.min_useful_chars => {
                sources.push(page);
            }
            Ok(_) => debug!(url = %url, "page below usefulness threshold, skipped"),
            Err(e) => warn!(url = %url, error = %e, "page fetch failed, skipped"),
        }

        if i + 1 < candidates.len() && sources.len() < max_sources {
            pace(limits).await;
        }
    }

    let result = merge(keyword, sources, limits);
    info!(
        keyword,
        sources = result.source_count,
        headings = result.combined_headings.len(),
        chars = result.combined_content.chars().count(),
        "research complete"
    );
    result
}

/// Randomized inter-fetch delay. Deliberate pacing, not an optimization:
/// fetching back-to-back measurably raises block rates on scraped sites.
async fn pace(limits: &Limits) {
    let ms = if limits.pace_max_ms > limits.pace_min_ms {
        limits.pace_min_ms + fastrand::u64(..=limits.pace_max_ms - limits.pace_min_ms)
    } else {
        limits.pace_min_ms
    };
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

fn merge(keyword: &str, sources: Vec<PageExtract>, limits: &Limits) -> ResearchResult {
    let mut seen = HashSet::new();
    let mut combined_headings = Vec::new();
    for page in &sources {
        for heading in &page.headings {
            if seen.insert(heading.clone()) {
                combined_headings.push(heading.clone());
            }
        }
    }

    let excerpts: Vec<String> = sources
        .iter()
        .map(|page| {
            format!(
                "[source: {}]\n{}",
                clip_chars(&page.title, LABEL_TITLE_CHARS),
                clip_chars(&page.content, limits.merge_excerpt_chars)
            )
        })
        .collect();
    let combined_content = truncate_chars(
        &excerpts.join(PAGE_SEPARATOR),
        limits.research_combined_chars,
    );

    ResearchResult {
        keyword: keyword.to_string(),
        source_count: sources.len(),
        sources,
        combined_headings,
        combined_content,
    }
}

/// Human-readable research report for CLI output.
pub fn format_report(result: &ResearchResult) -> String {
    let mut out = format!(
        "# Research: {}\n\nSources: {}\n",
        result.keyword, result.source_count
    );

    if !result.sources.is_empty() {
        out.push_str("\n## Pages\n\n");
        for page in &result.sources {
            out.push_str(&format!(
                "- {} ({} chars)\n  {}\n",
                page.title,
                page.content.chars().count(),
                page.url
            ));
        }
    }

    if !result.combined_headings.is_empty() {
        out.push_str("\n## Headings\n\n");
        for heading in &result.combined_headings {
            out.push_str(&format!("- {heading}\n"));
        }
    }

    if !result.combined_content.is_empty() {
        out.push_str("\n## Combined content\n\n");
        out.push_str(&result.combined_content);
        out.push('\n');
    }

    out
}
