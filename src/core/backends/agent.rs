//! HTTP agent-query backend.
//!
//! Each call names the agent and alias to invoke. The session id is carried
//! so follow-up questions continue the same agent conversation.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::base::{
    BackendError, BackendKind, BackendResult, LookupBackend, LookupHit, LookupRequest,
    LookupResponse,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvokeRequest<'a> {
    agent_id: &'a str,
    agent_alias_id: &'a str,
    session_id: &'a str,
    input_text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvokeResponse {
    #[serde(default)]
    completion: String,
    #[serde(default)]
    citations: Vec<LookupHit>,
}

pub struct AgentBackend {
    url: String,
    api_key: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl AgentBackend {
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
impl LookupBackend for AgentBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Agent
    }

    async fn lookup(&self, request: &LookupRequest) -> BackendResult<LookupResponse> {
        let target = request
            .target
            .as_ref()
            .ok_or(BackendError::NotConfigured(BackendKind::Agent))?;

        debug!(
            url = %self.url,
            agent_id = %target.agent_id,
            agent_alias_id = %target.agent_alias_id,
            session_id = %request.session_id,
            "Agent invoke"
        );

        let body = InvokeRequest {
            agent_id: &target.agent_id,
            agent_alias_id: &target.agent_alias_id,
            session_id: &request.session_id,
            input_text: &request.query,
            region: target.region.as_deref(),
        };

        let mut http = self.client.post(&self.url).timeout(self.timeout).json(&body);
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

        let parsed: InvokeResponse = response.json().await.map_err(|e| BackendError::Decode {
            url: self.url.clone(),
            message: e.to_string(),
        })?;

        Ok(LookupResponse {
            generated_answer: Some(parsed.completion),
            hits: parsed.citations,
        })
    }
}
