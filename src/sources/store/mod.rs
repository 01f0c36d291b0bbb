//! Storage backends for source records.
//!
//! Two backends exist: the remote row store (a spreadsheet service
//! behind a small REST surface) and the local filesystem. The remote
//! store is preferred when reachable; callers resolve a `Backend` per
//! operation after probing, so a flaky service degrades one call at a
//! time instead of wedging the process.

mod local;
mod remote;

pub use local::LocalStore;
pub use remote::SheetStore;

use crate::sources::SourceRecord;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("row-store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("row store rejected the request ({code}): {message}")]
    Service { code: u16, message: String },

    #[error("file cannot be stored: {0}")]
    Extract(#[from] crate::sources::extract::ExtractError),
}

/// Outcome of a remote connectivity probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connectivity {
    Available,
    /// The service could not be reached at all (connect/timeout).
    Unavailable,
    /// The service answered, but not usably.
    Error(String),
}

/// The storage backend resolved for one aggregation call.
pub enum Backend<'a> {
    Remote(&'a SheetStore),
    Local(&'a LocalStore),
}

impl Backend<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Remote(_) => "remote",
            Backend::Local(_) => "local",
        }
    }

    pub async fn file_sources(&self) -> Result<Vec<SourceRecord>, StoreError> {
        match self {
            Backend::Remote(store) => store.file_sources().await,
            Backend::Local(store) => store.file_sources(),
        }
    }

    pub async fn captions(&self) -> Result<Vec<SourceRecord>, StoreError> {
        match self {
            Backend::Remote(store) => store.captions().await,
            Backend::Local(store) => store.captions(),
        }
    }

    pub async fn delete_file(&self, id: u64) -> Result<bool, StoreError> {
        match self {
            Backend::Remote(store) => store.delete_source(id).await,
            Backend::Local(store) => store.delete_file(id),
        }
    }

    pub async fn add_caption(&self, record: SourceRecord) -> Result<(), StoreError> {
        match self {
            Backend::Remote(store) => store.add_caption(record).await,
            Backend::Local(store) => store.add_caption(record),
        }
    }

    pub async fn delete_caption(&self, id: u64) -> Result<bool, StoreError> {
        match self {
            Backend::Remote(store) => store.delete_caption(id).await,
            Backend::Local(store) => store.delete_caption(id),
        }
    }
}
