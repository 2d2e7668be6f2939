//! HTTP knowledge-base retrieval backend.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::coordinator::tools::MAX_RESULTS_LIMIT;

use super::base::{
    BackendError, BackendKind, BackendResult, LookupBackend, LookupHit, LookupRequest,
    LookupResponse,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveRequest<'a> {
    knowledge_base_id: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveResponse {
    #[serde(default)]
    generated_answer: Option<String>,
    #[serde(default)]
    results: Vec<LookupHit>,
}

/// Knowledge-base backend speaking a small JSON retrieve API.
pub struct KnowledgeBaseBackend {
    url: String,
    knowledge_base_id: String,
    api_key: Option<String>,
    timeout: Duration,
    max_results: usize,
    client: reqwest::Client,
}

impl KnowledgeBaseBackend {
    pub fn new(url: impl Into<String>, knowledge_base_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            knowledge_base_id: knowledge_base_id.into(),
            api_key: None,
            timeout: Duration::from_secs(30),
            max_results: MAX_RESULTS_LIMIT,
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

    /// Upper bound on hits requested per lookup.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.clamp(1, MAX_RESULTS_LIMIT);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl LookupBackend for KnowledgeBaseBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::KnowledgeBase
    }

    async fn lookup(&self, request: &LookupRequest) -> BackendResult<LookupResponse> {
        let max_results = request.max_results.clamp(1, self.max_results);
        debug!(
            url = %self.url,
            knowledge_base_id = %self.knowledge_base_id,
            max_results,
            "Knowledge base retrieve"
        );

        let body = RetrieveRequest {
            knowledge_base_id: &self.knowledge_base_id,
            query: &request.query,
            max_results,
        };

        let mut http = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .header("X-Session-ID", &request.session_id)
            .json(&body);

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

        let parsed: RetrieveResponse = response.json().await.map_err(|e| BackendError::Decode {
            url: self.url.clone(),
            message: e.to_string(),
        })?;

        let mut hits = parsed.results;
        hits.truncate(max_results);

        Ok(LookupResponse {
            generated_answer: parsed.generated_answer,
            hits,
        })
    }
}
