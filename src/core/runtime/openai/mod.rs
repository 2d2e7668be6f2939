//! OpenAI Realtime API runtime.

mod client;
pub mod config;
pub mod messages;

pub use client::{OpenAIRuntime, OpenAIRuntimeFactory};
pub use config::{OPENAI_REALTIME_SAMPLE_RATE, OPENAI_REALTIME_URL, OpenAIRealtimeModel, OpenAIRealtimeVoice};
