//! Scripted conversational runtime.
//!
//! On the first inbound frame it answers with one audio frame at its native
//! rate and one tool call, then records whatever the session sends back.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use voicebridge_gateway::core::codec::AudioFrame;
use voicebridge_gateway::core::runtime::{
    AudioCallback, ConversationRuntime, InterruptionCallback, RuntimeError, RuntimeErrorCallback,
    RuntimeFactory, RuntimeResult, ToolCallCallback, ToolCallRequest,
};

use super::audio_fixtures::sine;

pub const MOCK_NATIVE_RATE: u32 = 24000;
pub const MOCK_CALL_ID: &str = "call-1";

/// Everything the scripted runtimes observed, shared with the test.
#[derive(Default)]
pub struct RuntimeLog {
    pub created: AtomicUsize,
    pub frames: Mutex<Vec<AudioFrame>>,
    pub results: Mutex<Vec<(String, String)>>,
    pub disconnects: AtomicUsize,
}

pub struct ScriptedRuntime {
    log: Arc<RuntimeLog>,
    tool_arguments: String,
    connected: AtomicBool,
    on_audio: Mutex<Option<AudioCallback>>,
    on_tool_call: Mutex<Option<ToolCallCallback>>,
    on_interruption: Mutex<Option<InterruptionCallback>>,
    on_error: Mutex<Option<RuntimeErrorCallback>>,
}

#[async_trait]
impl ConversationRuntime for ScriptedRuntime {
    async fn connect(&self) -> RuntimeResult<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> RuntimeResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.log.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn native_sample_rate(&self) -> u32 {
        MOCK_NATIVE_RATE
    }

    async fn send_audio(&self, frame: &AudioFrame) -> RuntimeResult<()> {
        if !self.is_ready() {
            return Err(RuntimeError::NotConnected);
        }
        let first = {
            let mut frames = self.log.frames.lock();
            frames.push(frame.clone());
            frames.len() == 1
        };
        if !first {
            return Ok(());
        }

        let audio = self.on_audio.lock().clone();
        if let Some(callback) = audio {
            let reply = AudioFrame::from_samples(
                &sine(40, MOCK_NATIVE_RATE, 330.0, 0.4),
                MOCK_NATIVE_RATE,
            );
            callback(reply).await;
        }

        let tool_call = self.on_tool_call.lock().clone();
        if let Some(callback) = tool_call {
            callback(ToolCallRequest {
                call_id: MOCK_CALL_ID.to_string(),
                name: "query_knowledge_base".to_string(),
                arguments: self.tool_arguments.clone(),
            })
            .await;
        }
        Ok(())
    }

    async fn submit_tool_result(&self, call_id: &str, output: &str) -> RuntimeResult<()> {
        self.log
            .results
            .lock()
            .push((call_id.to_string(), output.to_string()));
        Ok(())
    }

    fn on_audio(&self, callback: AudioCallback) {
        *self.on_audio.lock() = Some(callback);
    }

    fn on_tool_call(&self, callback: ToolCallCallback) {
        *self.on_tool_call.lock() = Some(callback);
    }

    fn on_interruption(&self, callback: InterruptionCallback) {
        *self.on_interruption.lock() = Some(callback);
    }

    fn on_error(&self, callback: RuntimeErrorCallback) {
        *self.on_error.lock() = Some(callback);
    }
}

pub struct ScriptedRuntimeFactory {
    pub log: Arc<RuntimeLog>,
    pub tool_arguments: String,
}

impl ScriptedRuntimeFactory {
    pub fn new(tool_arguments: &str) -> Arc<Self> {
        Arc::new(Self {
            log: Arc::new(RuntimeLog::default()),
            tool_arguments: tool_arguments.to_string(),
        })
    }
}

impl RuntimeFactory for ScriptedRuntimeFactory {
    fn create(&self) -> RuntimeResult<Arc<dyn ConversationRuntime>> {
        self.log.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScriptedRuntime {
            log: self.log.clone(),
            tool_arguments: self.tool_arguments.clone(),
            connected: AtomicBool::new(false),
            on_audio: Mutex::new(None),
            on_tool_call: Mutex::new(None),
            on_interruption: Mutex::new(None),
            on_error: Mutex::new(None),
        }))
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}
