//! Tool-call coordination
//!
//! Wraps slow external lookups invoked by the conversational runtime with
//! backend routing, a hard timeout, keep-alive audio, and result
//! normalization.

pub mod classify;
#[allow(clippy::module_inception)]
pub mod coordinator;
pub mod format;
pub mod keepalive;
pub mod tool_call;
pub mod tools;

pub use classify::{ClassificationTable, DEFAULT_AGENT_VOCABULARY, Route};
pub use coordinator::{DEFAULT_TOOL_TIMEOUT, ToolCoordinator};
pub use format::{
    ACCOUNTS_EMPTY_MESSAGE, DisplayPayload, EMPTY_MESSAGE, LOOKUP_FAILED_MESSAGE, TIMEOUT_MESSAGE,
};
pub use keepalive::{
    ActiveTasks, DEFAULT_KEEPALIVE_SCHEDULE, KeepAliveFrames, KeepAliveSchedule, KeepAliveStep,
    ScheduleError,
};
pub use tool_call::{ToolOutcome, ToolPhase, ToolResult};
pub use tools::{ToolArgumentError, ToolName, ToolRequest, ToolSchema, tool_schemas};
