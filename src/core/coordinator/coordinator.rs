//! Per-session tool-call coordinator.
//!
//! Calls are served one at a time in arrival order. Each call classifies
//! its query, announces itself on the display channel, runs the backend
//! under a hard timeout with keep-alive audio flowing, and always resolves
//! to a [`ToolResult`]. Backend failures never escape this type.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::classify::ClassificationTable;
use super::format::{
    AgentContext, DisplayPayload, LOOKUP_FAILED_MESSAGE, TIMEOUT_MESSAGE, display_payload,
    error_summary, processing_event, summarize,
};
use super::keepalive::{ActiveTasks, KeepAliveFrames, spawn_keepalive};
use super::tool_call::{ToolCall, ToolOutcome, ToolPhase, ToolResult};
use super::tools::ToolRequest;
use crate::core::backends::{
    BackendError, BackendKind, BackendRegistry, LookupRequest, LookupResponse,
};
use crate::core::session::{OutboundSink, RoutingTarget, SessionRoute, SessionRouting};

/// Default hard limit on one backend call.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

enum CallEnd {
    Completed(LookupResponse),
    Failed(BackendError),
    TimedOut,
    Cancelled,
}

/// Resets the phase to idle however `execute` exits.
struct PhaseReset<'a>(&'a Mutex<ToolPhase>);

impl Drop for PhaseReset<'_> {
    fn drop(&mut self) {
        *self.0.lock() = ToolPhase::Idle;
    }
}

pub struct ToolCoordinator {
    session_id: String,
    backends: BackendRegistry,
    table: Arc<ClassificationTable>,
    routing: SessionRouting,
    default_agent_target: Option<Arc<RoutingTarget>>,
    sink: OutboundSink,
    tool_timeout: Duration,
    keepalive_frames: Option<Arc<KeepAliveFrames>>,
    keepalive_tasks: ActiveTasks,
    cancel: CancellationToken,
    turn: tokio::sync::Mutex<()>,
    phase: Mutex<ToolPhase>,
}

impl ToolCoordinator {
    pub fn new(
        session_id: impl Into<String>,
        backends: BackendRegistry,
        routing: SessionRouting,
        sink: OutboundSink,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            backends,
            table: Arc::new(ClassificationTable::default()),
            routing,
            default_agent_target: None,
            sink,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            keepalive_frames: None,
            keepalive_tasks: ActiveTasks::new(),
            cancel: CancellationToken::new(),
            turn: tokio::sync::Mutex::new(()),
            phase: Mutex::new(ToolPhase::Idle),
        }
    }

    pub fn with_classification(mut self, table: Arc<ClassificationTable>) -> Self {
        self.table = table;
        self
    }

    /// Agent target used while the session has not configured one.
    pub fn with_default_agent_target(mut self, target: Option<Arc<RoutingTarget>>) -> Self {
        self.default_agent_target = target;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Enable keep-alive injection with these prepared frames.
    pub fn with_keepalive(mut self, frames: Option<Arc<KeepAliveFrames>>) -> Self {
        self.keepalive_frames = frames.filter(|f| !f.is_empty());
        self
    }

    /// Tie the coordinator to the session's cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// True while a call is between classification and completion.
    pub fn is_busy(&self) -> bool {
        self.phase.lock().is_busy()
    }

    pub fn phase(&self) -> ToolPhase {
        self.phase.lock().clone()
    }

    pub fn keepalive_tasks(&self) -> &ActiveTasks {
        &self.keepalive_tasks
    }

    /// Stop keep-alive emission and make any in-flight call return.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    fn set_phase(&self, phase: ToolPhase) {
        *self.phase.lock() = phase;
    }

    fn agent_target(&self) -> Option<Arc<RoutingTarget>> {
        self.routing
            .current()
            .or_else(|| self.default_agent_target.clone())
    }

    /// Backends that can serve a call right now.
    fn available_backends(&self, has_agent_target: bool) -> Vec<BackendKind> {
        let mut kinds = Vec::with_capacity(2);
        if self.backends.contains(BackendKind::KnowledgeBase) {
            kinds.push(BackendKind::KnowledgeBase);
        }
        if has_agent_target && self.backends.contains(BackendKind::Agent) {
            kinds.push(BackendKind::Agent);
        }
        kinds
    }

    /// Run one tool call to completion.
    ///
    /// Concurrent callers queue on the session's turn lock, so keep-alive
    /// tasks and display pushes of two calls never interleave.
    pub async fn execute(&self, name: &str, arguments: &str) -> ToolResult {
        let _turn = self.turn.lock().await;
        let _reset = PhaseReset(&self.phase);

        let call_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        self.set_phase(ToolPhase::Classifying {
            tool: name.to_string(),
        });

        let request = match ToolRequest::parse(name, arguments) {
            Ok(request) => request,
            Err(e) => {
                warn!(
                    session_id = %self.session_id,
                    tool = name,
                    error = %e,
                    "Rejected tool call"
                );
                let message = e.to_string();
                return self
                    .finish_without_backend(call_id, name, &message, started)
                    .await;
            }
        };

        self.notify_processing(&request);

        let agent_target = self.agent_target();
        let selected = match request.tool.fixed_backend() {
            Some(kind) => Some(kind),
            None => {
                let available = self.available_backends(agent_target.is_some());
                self.table.classify(&request.subject, &available)
            }
        }
        .and_then(|kind| self.backends.get(kind).map(|backend| (kind, backend)));

        let Some((kind, backend)) = selected else {
            error!(session_id = %self.session_id, tool = name, "No lookup backend available");
            return self
                .finish_without_backend(call_id, name, "No lookup backend is configured", started)
                .await;
        };

        self.set_phase(ToolPhase::Routed {
            tool: name.to_string(),
            backend: kind,
        });
        debug!(
            session_id = %self.session_id,
            call_id = %call_id,
            tool = name,
            backend = %kind,
            "Tool call routed"
        );

        let mut call = ToolCall::new(call_id, request, kind);
        if let Some(frames) = &self.keepalive_frames {
            call.attach_keepalive(spawn_keepalive(
                frames.clone(),
                self.sink.clone(),
                self.cancel.child_token(),
                &self.keepalive_tasks,
                call.id.clone(),
            ));
        }

        self.set_phase(ToolPhase::Executing {
            tool: name.to_string(),
            backend: kind,
        });

        let target = match kind {
            BackendKind::Agent => agent_target.clone(),
            BackendKind::KnowledgeBase | BackendKind::Accounts => None,
        };
        let lookup = LookupRequest {
            query: call.request.backend_query.clone(),
            max_results: call.request.max_results,
            target,
            session_id: self.session_id.clone(),
            account: call.request.account.clone(),
        };

        let end = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => CallEnd::Cancelled,
            result = tokio::time::timeout(self.tool_timeout, backend.lookup(&lookup)) => match result {
                Ok(Ok(response)) => CallEnd::Completed(response),
                Ok(Err(e)) => CallEnd::Failed(e),
                Err(_) => CallEnd::TimedOut,
            },
        };

        call.stop_keepalive().await;

        let (outcome, summary, display, response) = match end {
            CallEnd::Completed(response) => {
                let outcome = ToolOutcome::classify(&response);
                let display = display_payload(
                    &call.request,
                    kind,
                    &response,
                    AgentContext {
                        target: agent_target.as_deref(),
                        session_id: &self.session_id,
                    },
                );
                let summary = summarize(outcome, &call.request, &response);
                (outcome, summary, display, Some(response))
            }
            CallEnd::Failed(e) => {
                error!(
                    session_id = %self.session_id,
                    call_id = %call.id,
                    backend = %kind,
                    error = %e,
                    "Backend lookup failed"
                );
                (
                    ToolOutcome::Error,
                    error_summary("the lookup service reported an error"),
                    DisplayPayload::error(LOOKUP_FAILED_MESSAGE),
                    None,
                )
            }
            CallEnd::TimedOut => {
                warn!(
                    session_id = %self.session_id,
                    call_id = %call.id,
                    backend = %kind,
                    timeout_secs = self.tool_timeout.as_secs_f64(),
                    "Backend lookup timed out"
                );
                (
                    ToolOutcome::Timeout,
                    TIMEOUT_MESSAGE.to_string(),
                    DisplayPayload::error(TIMEOUT_MESSAGE),
                    None,
                )
            }
            CallEnd::Cancelled => {
                debug!(session_id = %self.session_id, call_id = %call.id, "Tool call cancelled");
                (
                    ToolOutcome::Error,
                    error_summary("the session ended"),
                    DisplayPayload::error("Session closed"),
                    None,
                )
            }
        };

        if !self.cancel.is_cancelled() {
            self.push_display(&display).await;
        }

        let elapsed = call.elapsed();
        info!(
            session_id = %self.session_id,
            call_id = %call.id,
            tool = name,
            backend = %kind,
            outcome = %outcome,
            elapsed_ms = elapsed.as_millis() as u64,
            "Tool call finished"
        );

        ToolResult {
            call_id: call.id.clone(),
            tool: name.to_string(),
            outcome,
            backend: Some(kind),
            summary,
            display,
            response,
            elapsed,
        }
    }

    async fn finish_without_backend(
        &self,
        call_id: String,
        name: &str,
        message: &str,
        started: Instant,
    ) -> ToolResult {
        let display = DisplayPayload::error(message);
        if !self.cancel.is_cancelled() {
            self.push_display(&display).await;
        }
        ToolResult {
            call_id,
            tool: name.to_string(),
            outcome: ToolOutcome::Error,
            backend: None,
            summary: error_summary(message),
            display,
            response: None,
            elapsed: started.elapsed(),
        }
    }

    /// Non-blocking; a full or closed queue only costs the notice.
    fn notify_processing(&self, request: &ToolRequest) {
        match processing_event(request) {
            Ok(event) => {
                if let Err(e) = self.sink.try_push(SessionRoute::Event(event)) {
                    warn!(session_id = %self.session_id, error = %e, "Failed to queue processing notice");
                }
            }
            Err(e) => error!(error = %e, "Failed to serialize processing notice"),
        }
    }

    async fn push_display(&self, display: &DisplayPayload) {
        match display.to_event() {
            Ok(event) => {
                if let Err(e) = self.sink.push_event(event).await {
                    warn!(session_id = %self.session_id, error = %e, "Failed to push display payload");
                }
            }
            Err(e) => error!(error = %e, "Failed to serialize display payload"),
        }
    }
}
