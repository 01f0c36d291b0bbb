//! REST client for the spreadsheet row-store service.
//!
//! Tables are created on first use with their header row. Row ids are
//! positional: the service addresses rows by zero-based index, records
//! carry the one-based id assigned on read.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, info};

use super::{Connectivity, StoreError};
use crate::config::{Limits, RemoteConfig};
use crate::sources::{SourceRecord, now_stamp};
use crate::text::truncate_chars;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub const SOURCES_TABLE: &str = "sources";
pub const CAPTIONS_TABLE: &str = "captions";
pub const ARTICLES_TABLE: &str = "articles";

const RECORD_HEADERS: &[&str] = &[
    "id",
    "origin",
    "label",
    "content",
    "char_count",
    "tags",
    "url",
    "created_at",
];
const ARTICLE_HEADERS: &[&str] = &["keyword", "title", "content", "created_at"];

#[derive(Serialize)]
struct CreateTable<'a> {
    name: &'a str,
    headers: &'a [&'a str],
}

#[derive(Serialize)]
struct ArticleRow<'a> {
    keyword: &'a str,
    title: &'a str,
    content: &'a str,
    created_at: String,
}

pub struct SheetStore {
    http: reqwest::Client,
    base_url: String,
    token: String,
    limits: Limits,
}

impl SheetStore {
    pub fn new(http: reqwest::Client, config: &RemoteConfig, limits: Limits) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            token: config.token.clone(),
            limits,
        }
    }

    /// One cheap request to decide whether the service is usable.
    pub async fn probe(&self) -> Connectivity {
        let result = self
            .http
            .get(format!("{}/tables", self.base_url))
            .bearer_auth(&self.token)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => Connectivity::Available,
            Ok(resp) => Connectivity::Error(format!("service answered {}", resp.status())),
            Err(e) if e.is_timeout() || e.is_connect() => Connectivity::Unavailable,
            Err(e) => Connectivity::Error(e.to_string()),
        }
    }

    pub async fn file_sources(&self) -> Result<Vec<SourceRecord>, StoreError> {
        self.rows(SOURCES_TABLE).await
    }

    pub async fn captions(&self) -> Result<Vec<SourceRecord>, StoreError> {
        self.rows(CAPTIONS_TABLE).await
    }

    pub async fn add_source(&self, record: SourceRecord) -> Result<(), StoreError> {
        self.append(SOURCES_TABLE, record).await
    }

    pub async fn add_caption(&self, record: SourceRecord) -> Result<(), StoreError> {
        self.append(CAPTIONS_TABLE, record).await
    }

    pub async fn delete_source(&self, id: u64) -> Result<bool, StoreError> {
        self.delete_row(SOURCES_TABLE, id).await
    }

    pub async fn delete_caption(&self, id: u64) -> Result<bool, StoreError> {
        self.delete_row(CAPTIONS_TABLE, id).await
    }

    /// Store a generated article alongside its keyword.
    pub async fn save_article(
        &self,
        keyword: &str,
        title: &str,
        content: &str,
    ) -> Result<(), StoreError> {
        self.ensure_table(ARTICLES_TABLE, ARTICLE_HEADERS).await?;
        let body = truncate_chars(content, self.limits.remote_cell_chars);
        let row = ArticleRow {
            keyword,
            title,
            content: &body,
            created_at: now_stamp(),
        };
        let resp = self
            .http
            .post(self.rows_url(ARTICLES_TABLE))
            .bearer_auth(&self.token)
            .timeout(REQUEST_TIMEOUT)
            .json(&row)
            .send()
            .await?;
        check(resp).await?;
        info!(keyword, title, "article stored");
        Ok(())
    }

    async fn rows(&self, table: &str) -> Result<Vec<SourceRecord>, StoreError> {
        self.ensure_table(table, RECORD_HEADERS).await?;
        let resp = self
            .http
            .get(self.rows_url(table))
            .bearer_auth(&self.token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        let mut records: Vec<SourceRecord> = check(resp).await?.json().await?;
        for (i, record) in records.iter_mut().enumerate() {
            record.id = i as u64 + 1;
        }
        debug!(table, count = records.len(), "rows read");
        Ok(records)
    }

    async fn append(&self, table: &str, mut record: SourceRecord) -> Result<(), StoreError> {
        self.ensure_table(table, RECORD_HEADERS).await?;
        record.content = truncate_chars(&record.content, self.limits.remote_cell_chars);
        record.char_count = record.content.chars().count();
        let resp = self
            .http
            .post(self.rows_url(table))
            .bearer_auth(&self.token)
            .timeout(REQUEST_TIMEOUT)
            .json(&record)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    /// Delete by one-based record id. An id the service does not know
    /// reports `false` rather than an error.
    async fn delete_row(&self, table: &str, id: u64) -> Result<bool, StoreError> {
        let Some(index) = id.checked_sub(1) else {
            return Ok(false);
        };
        let resp = self
            .http
            .delete(format!("{}/{index}", self.rows_url(table)))
            .bearer_auth(&self.token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check(resp).await?;
        Ok(true)
    }

    async fn ensure_table(&self, table: &str, headers: &[&str]) -> Result<(), StoreError> {
        let resp = self
            .http
            .get(format!("{}/tables/{table}", self.base_url))
            .bearer_auth(&self.token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        if resp.status().is_success() {
            return Ok(());
        }
        if resp.status() != StatusCode::NOT_FOUND {
            check(resp).await?;
            return Ok(());
        }

        info!(table, "creating missing table");
        let create = self
            .http
            .post(format!("{}/tables", self.base_url))
            .bearer_auth(&self.token)
            .timeout(REQUEST_TIMEOUT)
            .json(&CreateTable {
                name: table,
                headers,
            })
            .send()
            .await?;
        check(create).await?;
        Ok(())
    }

    fn rows_url(&self, table: &str) -> String {
        format!("{}/tables/{table}/rows", self.base_url)
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(StoreError::Service {
        code: status.as_u16(),
        message,
    })
}
