//! Remote store client.
//!
//! Speaks the hosted-Postgres REST dialect: `POST /rest/v1/{table}` for
//! inserts and `GET /rest/v1/{table}?select=*` for read-back, authenticated
//! with the access key as both `apikey` header and bearer token.
//!
//! The remote can fail at two layers: the transport, and an application
//! error encoded in the response body even when the HTTP exchange itself
//! worked. [`StoreClient`] checks both and maps them into [`StoreError`]
//! with the Postgres error code preserved, so the loader can recognize a
//! uniqueness violation as "already loaded".
//!
//! The client is constructed once per run and passed by reference into the
//! loader and validator; tests substitute any other [`StoreTarget`].

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};

/// Read-back page size; the remote caps responses, so select pages.
const SELECT_PAGE_SIZE: usize = 1000;

/// How much of an unparseable error body to keep in the error message.
const BODY_SNIPPET_LEN: usize = 300;

/// A table-oriented insert/select target.
///
/// The production implementation is [`StoreClient`]; tests use scripted
/// substitutes to exercise the loader's retry accounting.
#[async_trait]
pub trait StoreTarget: Send + Sync {
    /// Insert records into a table as one operation.
    async fn insert(&self, table: &str, records: &[Value]) -> StoreResult<()>;

    /// Read back every row of a table.
    async fn select_all(&self, table: &str) -> StoreResult<Vec<Value>>;
}

/// HTTP client for the remote store.
pub struct StoreClient {
    http: reqwest::Client,
    base_url: String,
    key: String,
}

/// Application error payload the remote embeds in response bodies.
#[derive(Debug, Deserialize)]
struct RemoteErrorBody {
    code: String,
    message: String,
}

impl StoreClient {
    /// Create a client from connection settings.
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            key: config.key.clone(),
        })
    }

    /// Create a client with an explicit endpoint and key (default timeout).
    pub fn with_endpoint(url: &str, key: &str) -> StoreResult<Self> {
        Self::new(&StoreConfig {
            url: url.to_string(),
            key: key.to_string(),
            http_timeout: Duration::from_secs(crate::config::DEFAULT_HTTP_TIMEOUT_SECS),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl StoreTarget for StoreClient {
    async fn insert(&self, table: &str, records: &[Value]) -> StoreResult<()> {
        let response = self
            .http
            .post(self.table_url(table))
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header("Prefer", "return=minimal")
            .json(&records)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        // The body is checked before the status: a semantic failure can
        // ride on any status, and carries the Postgres code we need.
        if let Some(error) = parse_remote_error(&body) {
            return Err(error);
        }
        if !status.is_success() {
            return Err(StoreError::Remote {
                code: status.as_u16().to_string(),
                message: snippet(&body),
            });
        }
        Ok(())
    }

    async fn select_all(&self, table: &str) -> StoreResult<Vec<Value>> {
        let mut rows = Vec::new();
        let mut start = 0usize;

        loop {
            let response = self
                .http
                .get(self.table_url(table))
                .query(&[("select", "*")])
                .header("apikey", &self.key)
                .bearer_auth(&self.key)
                .header("Range-Unit", "items")
                .header("Range", format!("{}-{}", start, start + SELECT_PAGE_SIZE - 1))
                .send()
                .await
                .map_err(|e| StoreError::Transport(e.to_string()))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| StoreError::Transport(e.to_string()))?;

            if let Some(error) = parse_remote_error(&body) {
                return Err(error);
            }
            if !status.is_success() {
                return Err(StoreError::Remote {
                    code: status.as_u16().to_string(),
                    message: snippet(&body),
                });
            }

            let page: Vec<Value> = serde_json::from_str(&body)
                .map_err(|e| StoreError::InvalidBody(e.to_string()))?;
            let fetched = page.len();
            rows.extend(page);

            if fetched < SELECT_PAGE_SIZE {
                return Ok(rows);
            }
            start += SELECT_PAGE_SIZE;
        }
    }
}

/// Detect an application error payload embedded in a response body.
fn parse_remote_error(body: &str) -> Option<StoreError> {
    let parsed: RemoteErrorBody = serde_json::from_str(body).ok()?;
    Some(StoreError::Remote {
        code: parsed.code,
        message: parsed.message,
    })
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    let mut end = BODY_SNIPPET_LEN.min(trimmed.len());
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}
