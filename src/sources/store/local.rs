//! Filesystem backend: uploaded files under `sources/`, captions and
//! web-page snapshots as flat JSON arrays.
//!
//! Ids are positional. File records number the sorted directory listing;
//! JSON records are renumbered on load and after every deletion so the
//! sequence stays contiguous.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::StoreError;
use crate::config::{Limits, Paths};
use crate::sources::extract::{self, ExtractedFile};
use crate::sources::SourceRecord;

pub struct LocalStore {
    paths: Paths,
    limits: Limits,
}

impl LocalStore {
    pub fn new(paths: Paths, limits: Limits) -> Self {
        Self { paths, limits }
    }

    /// Sorted listing of stored uploads with a registered reader.
    fn listing(&self) -> Result<Vec<PathBuf>, StoreError> {
        let dir = self.paths.sources_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && extract::is_supported(p))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Extract every stored upload. A file that fails extraction keeps
    /// its slot (and id) with empty content so deletion stays positional.
    pub fn file_sources(&self) -> Result<Vec<SourceRecord>, StoreError> {
        let mut records = Vec::new();
        for (i, path) in self.listing()?.iter().enumerate() {
            let mut record = match extract::extract_file(path, &self.limits) {
                Ok(file) => record_from(file),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "stored file failed extraction");
                    SourceRecord::new(
                        crate::sources::SourceOrigin::Text,
                        path.file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                        "",
                    )
                }
            };
            record.id = i as u64 + 1;
            records.push(record);
        }
        Ok(records)
    }

    /// Validate and copy an upload into the store. Returns the record
    /// with its assigned id.
    pub fn add_file(&self, source: &Path) -> Result<SourceRecord, StoreError> {
        let extracted = extract::extract_file(source, &self.limits)?;
        let dir = self.paths.sources_dir();
        fs::create_dir_all(&dir)?;
        let dest = dir.join(&extracted.filename);
        fs::copy(source, &dest)?;
        debug!(file = %extracted.filename, "upload stored");

        let mut record = record_from(extracted);
        record.id = self
            .listing()?
            .iter()
            .position(|p| *p == dest)
            .map(|i| i as u64 + 1)
            .unwrap_or(0);
        Ok(record)
    }

    pub fn delete_file(&self, id: u64) -> Result<bool, StoreError> {
        let files = self.listing()?;
        let Some(path) = id.checked_sub(1).and_then(|i| files.get(i as usize)) else {
            return Ok(false);
        };
        fs::remove_file(path)?;
        Ok(true)
    }

    pub fn captions(&self) -> Result<Vec<SourceRecord>, StoreError> {
        Ok(self.load(&self.paths.captions_file()))
    }

    pub fn add_caption(&self, mut record: SourceRecord) -> Result<(), StoreError> {
        let path = self.paths.captions_file();
        let mut records = self.load(&path);
        record.id = records.len() as u64 + 1;
        records.push(record);
        self.save(&path, &records)
    }

    pub fn delete_caption(&self, id: u64) -> Result<bool, StoreError> {
        self.delete_from(&self.paths.captions_file(), id)
    }

    pub fn web_pages(&self) -> Result<Vec<SourceRecord>, StoreError> {
        Ok(self.load(&self.paths.web_sources_file()))
    }

    pub fn add_web_page(&self, mut record: SourceRecord) -> Result<SourceRecord, StoreError> {
        let path = self.paths.web_sources_file();
        let mut records = self.load(&path);
        record.id = records.len() as u64 + 1;
        records.push(record.clone());
        self.save(&path, &records)?;
        Ok(record)
    }

    pub fn delete_web_page(&self, id: u64) -> Result<bool, StoreError> {
        self.delete_from(&self.paths.web_sources_file(), id)
    }

    /// Load a JSON array of records, tolerating a missing or corrupt
    /// file. Ids are renumbered to match position.
    fn load(&self, path: &Path) -> Vec<SourceRecord> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };
        let mut records: Vec<SourceRecord> = match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "state file unreadable, treating as empty");
                return Vec::new();
            }
        };
        for (i, record) in records.iter_mut().enumerate() {
            record.id = i as u64 + 1;
        }
        records
    }

    fn save(&self, path: &Path, records: &[SourceRecord]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.paths.data_dir)?;
        fs::write(path, serde_json::to_string_pretty(records)?)?;
        Ok(())
    }

    fn delete_from(&self, path: &Path, id: u64) -> Result<bool, StoreError> {
        let mut records = self.load(path);
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Ok(false);
        }
        for (i, record) in records.iter_mut().enumerate() {
            record.id = i as u64 + 1;
        }
        self.save(path, &records)?;
        Ok(true)
    }
}

fn record_from(file: ExtractedFile) -> SourceRecord {
    SourceRecord::new(file.origin, file.filename, file.content)
}
