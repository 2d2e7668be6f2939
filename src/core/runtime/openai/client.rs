//! OpenAI Realtime runtime.
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Audio: PCM 16-bit, 24kHz, mono, little-endian, base64 encoded
//!
//! Server VAD drives barge-in: `input_audio_buffer.speech_started` is
//! surfaced as an interruption. Function calls are surfaced once their
//! arguments are complete.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use base64::prelude::*;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, error, info, warn};

use super::config::{
    OPENAI_AUDIO_FORMAT, OPENAI_REALTIME_SAMPLE_RATE, OPENAI_REALTIME_URL, OpenAIRealtimeModel,
    OpenAIRealtimeVoice,
};
use super::messages::{
    ClientEvent, ConversationItem, ServerEvent, SessionConfig, ToolDef, TurnDetection,
};
use crate::core::codec::AudioFrame;
use crate::core::runtime::base::{
    AudioCallback, ConversationRuntime, InterruptionCallback, RuntimeConfig, RuntimeError,
    RuntimeErrorCallback, RuntimeFactory, RuntimeResult, ToolCallCallback, ToolCallRequest,
};

/// Channel capacity for WebSocket message sending.
const WS_CHANNEL_CAPACITY: usize = 256;

#[derive(Default)]
struct Callbacks {
    audio: Mutex<Option<AudioCallback>>,
    tool_call: Mutex<Option<ToolCallCallback>>,
    interruption: Mutex<Option<InterruptionCallback>>,
    error: Mutex<Option<RuntimeErrorCallback>>,
}

/// One OpenAI Realtime connection.
///
/// The `connected` flag is shared with the spawned socket task so a server
/// close is visible to [`ConversationRuntime::is_ready`].
pub struct OpenAIRuntime {
    config: RuntimeConfig,
    model: OpenAIRealtimeModel,
    voice: OpenAIRealtimeVoice,
    endpoint: String,
    connected: Arc<AtomicBool>,
    ws_sender: Arc<Mutex<Option<mpsc::Sender<ClientEvent>>>>,
    callbacks: Arc<Callbacks>,
    /// call_id -> function name, filled from `response.output_item.added`.
    pending_calls: Arc<Mutex<HashMap<String, String>>>,
    connection_handle: Mutex<Option<JoinHandle<()>>>,
}

impl OpenAIRuntime {
    pub fn new(config: RuntimeConfig) -> RuntimeResult<Self> {
        if config.api_key.is_empty() {
            return Err(RuntimeError::AuthenticationFailed(
                "OpenAI API key is required".to_string(),
            ));
        }

        let model = OpenAIRealtimeModel::from_str_or_default(&config.model);
        let voice = config
            .voice
            .as_deref()
            .map(OpenAIRealtimeVoice::from_str_or_default)
            .unwrap_or_default();

        Ok(Self {
            config,
            model,
            voice,
            endpoint: OPENAI_REALTIME_URL.to_string(),
            connected: Arc::new(AtomicBool::new(false)),
            ws_sender: Arc::new(Mutex::new(None)),
            callbacks: Arc::new(Callbacks::default()),
            pending_calls: Arc::new(Mutex::new(HashMap::new())),
            connection_handle: Mutex::new(None),
        })
    }

    /// Override the WebSocket endpoint (without the model query).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn model(&self) -> OpenAIRealtimeModel {
        self.model
    }

    pub fn voice(&self) -> OpenAIRealtimeVoice {
        self.voice
    }

    fn build_ws_url(&self) -> String {
        format!("{}?model={}", self.endpoint, self.model.as_str())
    }

    fn build_session_config(&self) -> SessionConfig {
        SessionConfig {
            modalities: Some(vec!["text".to_string(), "audio".to_string()]),
            instructions: self.config.instructions.clone(),
            voice: Some(self.voice.as_str().to_string()),
            input_audio_format: Some(OPENAI_AUDIO_FORMAT.to_string()),
            output_audio_format: Some(OPENAI_AUDIO_FORMAT.to_string()),
            turn_detection: Some(TurnDetection::default()),
            tools: self.config.tools.iter().map(ToolDef::from).collect(),
            tool_choice: (!self.config.tools.is_empty()).then(|| "auto".to_string()),
        }
    }

    async fn send_event(&self, event: ClientEvent) -> RuntimeResult<()> {
        let sender = self.ws_sender.lock().clone();
        match sender {
            Some(sender) => sender
                .send(event)
                .await
                .map_err(|e| RuntimeError::WebSocketError(e.to_string())),
            None => Err(RuntimeError::NotConnected),
        }
    }

    async fn handle_server_event(
        event: ServerEvent,
        callbacks: &Callbacks,
        pending_calls: &Mutex<HashMap<String, String>>,
    ) {
        match event {
            ServerEvent::SessionCreated { session } => {
                info!(runtime_session = %session.id, "OpenAI Realtime session created");
            }

            ServerEvent::Error { error } => {
                error!(
                    error_type = %error.error_type,
                    code = ?error.code,
                    "OpenAI Realtime error: {}",
                    error.message
                );
                let cb = callbacks.error.lock().clone();
                if let Some(cb) = cb {
                    cb(RuntimeError::ProviderError(format!(
                        "{}: {}",
                        error.error_type, error.message
                    )))
                    .await;
                }
            }

            ServerEvent::SpeechStarted { audio_start_ms, .. } => {
                debug!("Speech started at {}ms", audio_start_ms);
                let cb = callbacks.interruption.lock().clone();
                if let Some(cb) = cb {
                    cb().await;
                }
            }

            ServerEvent::OutputItemAdded { item } => {
                if item.item_type == "function_call"
                    && let (Some(call_id), Some(name)) = (item.call_id, item.name)
                {
                    debug!(call_id = %call_id, tool = %name, "Function call started");
                    pending_calls.lock().insert(call_id, name);
                }
            }

            ServerEvent::FunctionCallArgumentsDone {
                call_id,
                arguments,
                name,
            } => {
                let tracked = pending_calls.lock().remove(&call_id);
                let Some(name) = name.or(tracked) else {
                    warn!(call_id = %call_id, "Function call without a known name");
                    return;
                };
                let cb = callbacks.tool_call.lock().clone();
                if let Some(cb) = cb {
                    cb(ToolCallRequest {
                        call_id,
                        name,
                        arguments,
                    })
                    .await;
                }
            }

            ServerEvent::AudioDelta { delta, .. } => match BASE64_STANDARD.decode(&delta) {
                Ok(pcm) => {
                    let cb = callbacks.audio.lock().clone();
                    if let Some(cb) = cb {
                        cb(AudioFrame::new(pcm, OPENAI_REALTIME_SAMPLE_RATE)).await;
                    }
                }
                Err(e) => warn!("Failed to decode audio delta: {}", e),
            },

            ServerEvent::ResponseDone { response } => {
                debug!(
                    response_id = ?response.map(|r| r.id),
                    "OpenAI Realtime response done"
                );
            }

            ServerEvent::Other => {}
        }
    }
}

#[async_trait]
impl ConversationRuntime for OpenAIRuntime {
    async fn connect(&self) -> RuntimeResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        let url = self.build_ws_url();
        let host = url::Url::parse(&url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .ok_or_else(|| RuntimeError::InvalidConfiguration(format!("invalid url {url}")))?;

        let request = http::Request::builder()
            .uri(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("OpenAI-Beta", "realtime=v1")
            .header("Sec-WebSocket-Protocol", "realtime")
            .header(
                "Sec-WebSocket-Key",
                tungstenite::handshake::client::generate_key(),
            )
            .header("Sec-WebSocket-Version", "13")
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Host", host)
            .body(())
            .map_err(|e| RuntimeError::ConnectionFailed(e.to_string()))?;

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| RuntimeError::ConnectionFailed(e.to_string()))?;

        info!(model = %self.model, "Connected to OpenAI Realtime API");

        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let (tx, mut rx) = mpsc::channel::<ClientEvent>(WS_CHANNEL_CAPACITY);
        *self.ws_sender.lock() = Some(tx);

        let callbacks = self.callbacks.clone();
        let pending_calls = self.pending_calls.clone();
        let connected = self.connected.clone();
        let ws_sender = self.ws_sender.clone();

        self.connected.store(true, Ordering::SeqCst);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(event) = rx.recv() => {
                        let json = match serde_json::to_string(&event) {
                            Ok(j) => j,
                            Err(e) => {
                                error!("Failed to serialize event: {}", e);
                                continue;
                            }
                        };
                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            error!("Failed to send WebSocket message: {}", e);
                            break;
                        }
                    }

                    Some(msg) = ws_stream.next() => {
                        match msg {
                            Ok(Message::Text(text)) => {
                                match serde_json::from_str::<ServerEvent>(&text) {
                                    Ok(event) => {
                                        Self::handle_server_event(event, &callbacks, &pending_calls).await;
                                    }
                                    Err(e) => warn!("Failed to parse server event: {}", e),
                                }
                            }
                            Ok(Message::Close(_)) => {
                                info!("OpenAI Realtime closed by server");
                                break;
                            }
                            Ok(Message::Ping(data)) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    error!("Failed to send pong: {}", e);
                                }
                            }
                            Err(e) => {
                                error!("WebSocket error: {}", e);
                                break;
                            }
                            _ => {}
                        }
                    }

                    else => break,
                }
            }

            // Only reached when the server side ends; disconnect() aborts this task.
            connected.store(false, Ordering::SeqCst);
            *ws_sender.lock() = None;
            let cb = callbacks.error.lock().clone();
            if let Some(cb) = cb {
                cb(RuntimeError::ConnectionFailed("connection lost".to_string())).await;
            }
        });

        *self.connection_handle.lock() = Some(handle);

        self.send_event(ClientEvent::SessionUpdate {
            session: self.build_session_config(),
        })
        .await
    }

    async fn disconnect(&self) -> RuntimeResult<()> {
        *self.ws_sender.lock() = None;
        if let Some(handle) = self.connection_handle.lock().take() {
            handle.abort();
        }
        self.connected.store(false, Ordering::SeqCst);
        self.pending_calls.lock().clear();
        info!("Disconnected from OpenAI Realtime API");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn native_sample_rate(&self) -> u32 {
        OPENAI_REALTIME_SAMPLE_RATE
    }

    async fn send_audio(&self, frame: &AudioFrame) -> RuntimeResult<()> {
        // pcm16 input is always read as 24kHz; anything else would play at the wrong speed.
        if frame.sample_rate() != OPENAI_REALTIME_SAMPLE_RATE {
            return Err(RuntimeError::InvalidConfiguration(format!(
                "audio at {}Hz, expected {}Hz",
                frame.sample_rate(),
                OPENAI_REALTIME_SAMPLE_RATE
            )));
        }
        if !self.is_ready() {
            return Err(RuntimeError::NotConnected);
        }
        self.send_event(ClientEvent::audio_append(frame.data())).await
    }

    async fn submit_tool_result(&self, call_id: &str, output: &str) -> RuntimeResult<()> {
        if !self.is_ready() {
            return Err(RuntimeError::NotConnected);
        }
        self.send_event(ClientEvent::ConversationItemCreate {
            item: ConversationItem::function_call_output(call_id, output),
        })
        .await?;
        self.send_event(ClientEvent::ResponseCreate).await
    }

    fn on_audio(&self, callback: AudioCallback) {
        *self.callbacks.audio.lock() = Some(callback);
    }

    fn on_tool_call(&self, callback: ToolCallCallback) {
        *self.callbacks.tool_call.lock() = Some(callback);
    }

    fn on_interruption(&self, callback: InterruptionCallback) {
        *self.callbacks.interruption.lock() = Some(callback);
    }

    fn on_error(&self, callback: RuntimeErrorCallback) {
        *self.callbacks.error.lock() = Some(callback);
    }
}

impl Drop for OpenAIRuntime {
    fn drop(&mut self) {
        if let Some(handle) = self.connection_handle.get_mut().take() {
            handle.abort();
        }
    }
}

/// Builds one [`OpenAIRuntime`] per session from shared settings.
#[derive(Debug, Clone)]
pub struct OpenAIRuntimeFactory {
    config: RuntimeConfig,
}

impl OpenAIRuntimeFactory {
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }
}

impl RuntimeFactory for OpenAIRuntimeFactory {
    fn create(&self) -> RuntimeResult<Arc<dyn ConversationRuntime>> {
        Ok(Arc::new(OpenAIRuntime::new(self.config.clone())?))
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}
