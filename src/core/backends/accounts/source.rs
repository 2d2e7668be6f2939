//! Where account records come from.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::query::AccountTable;
use super::record::AccountRecord;
use crate::core::backends::base::{BackendError, BackendResult};

/// Supplies the account table.
#[async_trait]
pub trait AccountSource: Send + Sync {
    async fn table(&self) -> BackendResult<Arc<AccountTable>>;
}

/// Either a bare array of records or `{"accounts": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecordDocument {
    Bare(Vec<AccountRecord>),
    Wrapped { accounts: Vec<AccountRecord> },
}

impl RecordDocument {
    fn into_table(self) -> AccountTable {
        match self {
            RecordDocument::Bare(records) | RecordDocument::Wrapped { accounts: records } => {
                AccountTable::new(records)
            }
        }
    }
}

/// Fixed records held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryAccountSource {
    table: Arc<AccountTable>,
}

impl InMemoryAccountSource {
    pub fn new(records: Vec<AccountRecord>) -> Self {
        Self {
            table: Arc::new(AccountTable::new(records)),
        }
    }
}

#[async_trait]
impl AccountSource for InMemoryAccountSource {
    async fn table(&self) -> BackendResult<Arc<AccountTable>> {
        Ok(self.table.clone())
    }
}

/// JSON file read on first use and kept for the life of the process.
/// A failed read is retried on the next lookup.
pub struct JsonFileAccountSource {
    path: PathBuf,
    table: OnceCell<Arc<AccountTable>>,
}

impl JsonFileAccountSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            table: OnceCell::new(),
        }
    }

    async fn load(&self) -> BackendResult<Arc<AccountTable>> {
        let location = self.path.display().to_string();
        let raw = tokio::fs::read(&self.path)
            .await
            .map_err(|e| BackendError::Request {
                url: location.clone(),
                message: e.to_string(),
            })?;
        let document: RecordDocument =
            serde_json::from_slice(&raw).map_err(|e| BackendError::Decode {
                url: location.clone(),
                message: e.to_string(),
            })?;
        let table = document.into_table();
        info!(path = %location, accounts = table.len(), "Account table loaded");
        Ok(Arc::new(table))
    }
}

#[async_trait]
impl AccountSource for JsonFileAccountSource {
    async fn table(&self) -> BackendResult<Arc<AccountTable>> {
        self.table.get_or_try_init(|| self.load()).await.cloned()
    }
}

/// Account table served by an HTTP endpoint, fetched on every lookup.
pub struct HttpAccountSource {
    url: String,
    api_key: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpAccountSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            timeout: Duration::from_secs(30),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl AccountSource for HttpAccountSource {
    async fn table(&self) -> BackendResult<Arc<AccountTable>> {
        debug!(url = %self.url, "Fetching account table");

        let mut http = self.client.get(&self.url).timeout(self.timeout);
        if let Some(api_key) = &self.api_key {
            http = http.bearer_auth(api_key);
        }

        let response = http.send().await.map_err(|e| BackendError::Request {
            url: self.url.clone(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let document: RecordDocument =
            response.json().await.map_err(|e| BackendError::Decode {
                url: self.url.clone(),
                message: e.to_string(),
            })?;
        Ok(Arc::new(document.into_table()))
    }
}
