//! Lookup backend abstraction.
//!
//! A backend answers one query with generated text and/or raw matches.
//! Backends never see tool names; the coordinator translates tool
//! invocations into a [`LookupRequest`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::accounts::AccountQuery;
use crate::core::session::RoutingTarget;

/// Kinds of lookup backend the gateway can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Retrieval over the document knowledge base (the default).
    KnowledgeBase,
    /// Agent-style question answering.
    Agent,
    /// Tabular account records. Reached only by the account tools.
    Accounts,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::KnowledgeBase => "knowledge_base",
            BackendKind::Agent => "agent",
            BackendKind::Accounts => "accounts",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{0} backend is not configured")]
    NotConfigured(BackendKind),

    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

pub type BackendResult<T> = Result<T, BackendError>;

/// One lookup against a backend.
#[derive(Debug, Clone)]
pub struct LookupRequest {
    /// Query text sent to the backend.
    pub query: String,
    pub max_results: usize,
    /// Agent target for this call, from the session or the server defaults.
    pub target: Option<Arc<RoutingTarget>>,
    /// Stable per-connection id so agent conversations continue.
    pub session_id: String,
    /// Structured question for the account backend.
    pub account: Option<AccountQuery>,
}

/// A single retrieved match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupHit {
    pub content: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Backend answer before outcome classification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupResponse {
    /// Synthesized answer text, if the backend produced one.
    pub generated_answer: Option<String>,
    pub hits: Vec<LookupHit>,
}

impl LookupResponse {
    /// Generated answer with surrounding whitespace removed, if non-empty.
    pub fn answer(&self) -> Option<&str> {
        self.generated_answer
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }
}

#[async_trait]
pub trait LookupBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn lookup(&self, request: &LookupRequest) -> BackendResult<LookupResponse>;
}

/// Backends available to every session, keyed by kind.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<BackendKind, Arc<dyn LookupBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend, replacing any previous one of the same kind.
    pub fn register(&mut self, backend: Arc<dyn LookupBackend>) {
        self.backends.insert(backend.kind(), backend);
    }

    pub fn with(mut self, backend: Arc<dyn LookupBackend>) -> Self {
        self.register(backend);
        self
    }

    pub fn get(&self, kind: BackendKind) -> Option<Arc<dyn LookupBackend>> {
        self.backends.get(&kind).cloned()
    }

    pub fn contains(&self, kind: BackendKind) -> bool {
        self.backends.contains_key(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("kinds", &self.backends.keys().collect::<Vec<_>>())
            .finish()
    }
}
