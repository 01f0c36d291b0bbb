//! Runtime configuration: size ceilings, pacing, data locations, and
//! remote-service credentials.
//!
//! The ceilings are empirically chosen for a specific upstream model's
//! context window and a specific anti-scraping tolerance. They are carried
//! as configuration so callers can tune them, but the defaults preserve
//! the production values.

use std::env;
use std::path::PathBuf;

/// Every size ceiling and pacing parameter in the pipeline.
#[derive(Debug, Clone)]
pub struct Limits {
    /// Max characters kept from one fetched page.
    pub page_content_chars: usize,
    /// Max characters of one page carried into the merged research corpus.
    pub merge_excerpt_chars: usize,
    /// Max characters of the merged research corpus.
    pub research_combined_chars: usize,
    /// Minimum page content length to count as a usable source.
    pub min_useful_chars: usize,
    /// Minimum length for a paragraph element to contribute body text.
    pub min_paragraph_chars: usize,
    /// Max headings kept per page.
    pub max_headings: usize,
    /// Max characters extracted from one uploaded file.
    pub file_content_chars: usize,
    /// Max characters stored in one remote row cell.
    pub remote_cell_chars: usize,
    /// Max characters kept from a saved web-page snapshot.
    pub snapshot_chars: usize,
    /// Max characters of one snapshot carried into the aggregate text.
    pub snapshot_excerpt_chars: usize,
    /// Global ceiling on the fully merged source text.
    pub aggregate_chars: usize,
    /// Inter-fetch pacing interval, milliseconds. Deliberate: dropping it
    /// measurably increases block rates on fetched sites.
    pub pace_min_ms: u64,
    pub pace_max_ms: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            page_content_chars: 5_000,
            merge_excerpt_chars: 3_000,
            research_combined_chars: 30_000,
            min_useful_chars: 100,
            min_paragraph_chars: 15,
            max_headings: 20,
            file_content_chars: 50_000,
            remote_cell_chars: 45_000,
            snapshot_chars: 30_000,
            snapshot_excerpt_chars: 5_000,
            aggregate_chars: 80_000,
            pace_min_ms: 1_000,
            pace_max_ms: 2_500,
        }
    }
}

/// Where local state lives: uploaded raw files and the flat JSON arrays
/// for captions and web-page snapshots.
#[derive(Debug, Clone)]
pub struct Paths {
    pub data_dir: PathBuf,
}

impl Paths {
    /// Resolve the data directory from `GLEANER_DATA_DIR`, defaulting to
    /// `./gleaner_data` next to the working directory.
    pub fn from_env() -> Self {
        let data_dir = env::var("GLEANER_DATA_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("gleaner_data"));
        Self { data_dir }
    }

    pub fn sources_dir(&self) -> PathBuf {
        self.data_dir.join("sources")
    }

    pub fn captions_file(&self) -> PathBuf {
        self.data_dir.join("captions.json")
    }

    pub fn web_sources_file(&self) -> PathBuf {
        self.data_dir.join("web_sources.json")
    }
}

/// Credentials for the remote row-store service. Absent credentials mean
/// the aggregator runs in local mode without probing.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub token: String,
}

impl RemoteConfig {
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("SHEET_SERVICE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())?;
        let token = env::var("SHEET_SERVICE_TOKEN")
            .ok()
            .filter(|v| !v.trim().is_empty())?;
        Some(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }
}
