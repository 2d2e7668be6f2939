//! Conversational runtime adapters.

pub mod base;
pub mod openai;

pub use base::{
    AudioCallback, ConversationRuntime, InterruptionCallback, RuntimeConfig, RuntimeError,
    RuntimeErrorCallback, RuntimeFactory, RuntimeResult, ToolCallCallback, ToolCallRequest,
};
pub use openai::{OpenAIRuntime, OpenAIRuntimeFactory};
