//! Lookup backend doubles.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use voicebridge_gateway::core::backends::{
    BackendError, BackendKind, BackendResult, LookupBackend, LookupHit, LookupRequest, LookupResponse,
};

/// Answers after `delay` and records every request it saw.
pub struct ScriptedBackend {
    kind: BackendKind,
    delay: Duration,
    response: LookupResponse,
    requests: Mutex<Vec<LookupRequest>>,
}

impl ScriptedBackend {
    pub fn new(kind: BackendKind, delay: Duration, answer: &str) -> Arc<Self> {
        Arc::new(Self {
            kind,
            delay,
            response: LookupResponse {
                generated_answer: Some(answer.to_string()),
                hits: vec![LookupHit {
                    content: answer.to_string(),
                    source: Some("s3://docs/runbook.md".to_string()),
                    ..Default::default()
                }],
            },
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<LookupRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl LookupBackend for ScriptedBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn lookup(&self, request: &LookupRequest) -> BackendResult<LookupResponse> {
        self.requests.lock().push(request.clone());
        tokio::time::sleep(self.delay).await;
        Ok(self.response.clone())
    }
}

/// Never answers.
#[derive(Default)]
pub struct StalledBackend {
    pub calls: AtomicUsize,
}

impl StalledBackend {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LookupBackend for StalledBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::KnowledgeBase
    }

    async fn lookup(&self, _request: &LookupRequest) -> BackendResult<LookupResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

/// Always fails with an upstream status error.
pub struct FailingBackend;

#[async_trait]
impl LookupBackend for FailingBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::KnowledgeBase
    }

    async fn lookup(&self, _request: &LookupRequest) -> BackendResult<LookupResponse> {
        Err(BackendError::Status {
            url: "http://kb.test/retrieve".to_string(),
            status: 502,
            body: "bad gateway".to_string(),
        })
    }
}
