//! Conversational runtime interface.
//!
//! The runtime consumes decoded user audio at its native sample rate, emits
//! synthesized audio, signals barge-in, and invokes named tools. Results of
//! tool calls are handed back through [`ConversationRuntime::submit_tool_result`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::codec::AudioFrame;
use crate::core::coordinator::ToolSchema;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Not connected")]
    NotConnected,
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

// =============================================================================
// Configuration
// =============================================================================

/// Settings shared by every session's runtime connection.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub api_key: String,
    pub model: String,
    pub voice: Option<String>,
    /// System instructions for the assistant.
    pub instructions: Option<String>,
    /// Tools published at session setup.
    pub tools: Vec<ToolSchema>,
}

// =============================================================================
// Events
// =============================================================================

/// A tool invocation requested by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub call_id: String,
    pub name: String,
    /// Raw JSON argument string.
    pub arguments: String,
}

/// Callback type for synthesized audio.
pub type AudioCallback =
    Arc<dyn Fn(AudioFrame) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for tool invocations.
pub type ToolCallCallback =
    Arc<dyn Fn(ToolCallRequest) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for barge-in.
pub type InterruptionCallback =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for runtime errors.
pub type RuntimeErrorCallback =
    Arc<dyn Fn(RuntimeError) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

// =============================================================================
// Trait
// =============================================================================

/// One conversational runtime connection, owned by one session.
///
/// Methods take `&self` so the session loop and tool tasks can share the
/// connection behind an `Arc`.
#[async_trait]
pub trait ConversationRuntime: Send + Sync {
    async fn connect(&self) -> RuntimeResult<()>;

    async fn disconnect(&self) -> RuntimeResult<()>;

    fn is_ready(&self) -> bool;

    /// Sample rate of audio sent to and received from the runtime.
    fn native_sample_rate(&self) -> u32;

    /// Forward user audio. The frame must be at the native sample rate.
    async fn send_audio(&self, frame: &AudioFrame) -> RuntimeResult<()>;

    /// Return a tool result and let the runtime continue its response.
    async fn submit_tool_result(&self, call_id: &str, output: &str) -> RuntimeResult<()>;

    fn on_audio(&self, callback: AudioCallback);

    fn on_tool_call(&self, callback: ToolCallCallback);

    fn on_interruption(&self, callback: InterruptionCallback);

    fn on_error(&self, callback: RuntimeErrorCallback);
}

/// Creates a fresh runtime connection for each session.
pub trait RuntimeFactory: Send + Sync {
    fn create(&self) -> RuntimeResult<Arc<dyn ConversationRuntime>>;

    fn provider_name(&self) -> &'static str;
}
