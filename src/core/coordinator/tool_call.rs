use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use super::format::DisplayPayload;
use super::keepalive::KeepAliveHandle;
use super::tools::ToolRequest;
use crate::core::backends::{BackendKind, LookupResponse};

/// Terminal outcome of a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolOutcome {
    /// Backend produced a generated answer.
    Success,
    /// Raw matches without a synthesized answer.
    Partial,
    /// Nothing matched.
    Empty,
    Error,
    Timeout,
}

impl ToolOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolOutcome::Success => "success",
            ToolOutcome::Partial => "partial",
            ToolOutcome::Empty => "empty",
            ToolOutcome::Error => "error",
            ToolOutcome::Timeout => "timeout",
        }
    }

    /// Classify a successful backend response.
    pub fn classify(response: &LookupResponse) -> Self {
        if response.answer().is_some() {
            ToolOutcome::Success
        } else if !response.hits.is_empty() {
            ToolOutcome::Partial
        } else {
            ToolOutcome::Empty
        }
    }
}

impl fmt::Display for ToolOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coordinator progress for the call currently holding the session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ToolPhase {
    #[default]
    Idle,
    Classifying {
        tool: String,
    },
    Routed {
        tool: String,
        backend: BackendKind,
    },
    Executing {
        tool: String,
        backend: BackendKind,
    },
}

impl ToolPhase {
    pub fn is_busy(&self) -> bool {
        !matches!(self, ToolPhase::Idle)
    }
}

/// One in-flight invocation. Owns its keep-alive task.
#[derive(Debug)]
pub struct ToolCall {
    pub id: String,
    pub request: ToolRequest,
    pub backend: BackendKind,
    pub started_at: Instant,
    keepalive: Option<KeepAliveHandle>,
}

impl ToolCall {
    pub fn new(id: String, request: ToolRequest, backend: BackendKind) -> Self {
        Self {
            id,
            request,
            backend,
            started_at: Instant::now(),
            keepalive: None,
        }
    }

    pub fn attach_keepalive(&mut self, handle: KeepAliveHandle) {
        if let Some(previous) = self.keepalive.replace(handle) {
            previous.abort();
        }
    }

    pub fn has_keepalive(&self) -> bool {
        self.keepalive.is_some()
    }

    /// Cancel the keep-alive task and wait for it to exit.
    pub async fn stop_keepalive(&mut self) {
        if let Some(handle) = self.keepalive.take() {
            handle.stop().await;
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Drop for ToolCall {
    fn drop(&mut self) {
        if let Some(handle) = self.keepalive.take() {
            handle.abort();
        }
    }
}

/// Normalized result of `execute`.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub call_id: String,
    pub tool: String,
    pub outcome: ToolOutcome,
    pub backend: Option<BackendKind>,
    /// Text for the runtime to speak.
    pub summary: String,
    /// What was pushed on the display channel.
    pub display: DisplayPayload,
    /// Raw backend answer, kept for audit logging.
    pub response: Option<LookupResponse>,
    pub elapsed: Duration,
}
