//! Voice session WebSocket handler
//!
//! Bridges one client socket to one conversational runtime connection. Audio
//! flows through the session's [`FrameCodec`]; tool calls from the runtime
//! go through the session's [`ToolCoordinator`].

use axum::{
    Extension,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::{Arc, Weak};
use tokio::time::{Duration, Instant};
use tokio::{select, time::timeout};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::SUPPORTED_SAMPLE_RATES;
use crate::core::codec::{AudioFrame, CodecConfig, CodecResult, FrameCodec, OutboundFrame};
use crate::core::coordinator::ToolCoordinator;
use crate::core::runtime::{ConversationRuntime, RuntimeError, ToolCallRequest};
use crate::core::session::{OutboundSink, SessionRoute, SessionRouting};
use crate::middleware::Auth;
use crate::state::AppState;

/// Channel buffer between session producers and the socket writer
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// How often the idle check runs
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Close connections without inbound traffic for this long
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Bound on waiting for tool tasks and the writer during teardown
const TEARDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Default, Deserialize)]
pub struct SessionParams {
    /// Sample rate the client expects the runtime to consume. Must match the
    /// runtime's native rate.
    pub sample_rate: Option<u32>,
}

/// Voice session WebSocket handler
///
/// Refuses the upgrade with 503 when no runtime is configured or the
/// configured native rate disagrees with the runtime, and with 400 when
/// `sample_rate` is unsupported or differs from the runtime's native rate.
pub async fn session_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<SessionParams>,
    auth: Option<Extension<Auth>>,
) -> Response {
    let Some(factory) = state.runtime_factory.clone() else {
        warn!("Session refused: no conversational runtime configured");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "conversational runtime not configured",
        )
            .into_response();
    };

    if let Some(rate) = params.sample_rate
        && !SUPPORTED_SAMPLE_RATES.contains(&rate)
    {
        return (
            StatusCode::BAD_REQUEST,
            format!("unsupported sample_rate {rate}"),
        )
            .into_response();
    }

    let runtime = match factory.create() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create conversational runtime");
            return (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response();
        }
    };

    let native = runtime.native_sample_rate();
    if let Some(rate) = state.config.native_sample_rate
        && rate != native
    {
        error!(
            configured = rate,
            runtime = native,
            "Configured native sample rate does not match the runtime"
        );
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("runtime consumes {native}Hz, configured for {rate}Hz"),
        )
            .into_response();
    }
    if let Some(rate) = params.sample_rate
        && rate != native
    {
        return (
            StatusCode::BAD_REQUEST,
            format!("sample_rate {rate} not supported by runtime ({native}Hz)"),
        )
            .into_response();
    }

    let mut ws = ws
        .max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE);
    if let Some(Extension(Auth {
        subprotocol: Some(protocol),
        ..
    })) = auth
    {
        ws = ws.protocols([protocol]);
    }

    ws.on_upgrade(move |socket| handle_session(socket, state, runtime))
}

/// Run one voice session until the client leaves, the runtime drops, or the
/// connection goes idle.
pub async fn handle_session(
    socket: WebSocket,
    app_state: Arc<AppState>,
    runtime: Arc<dyn ConversationRuntime>,
) {
    let session_id = format!("session-{}", Uuid::new_v4());
    let config = &app_state.config;
    info!(session_id = %session_id, "Voice session established");

    let (mut sender, mut receiver) = socket.split();
    let (sink, mut route_rx) = OutboundSink::channel(CHANNEL_BUFFER_SIZE, config.send_timeout);

    // Single writer for the socket
    let writer_session = session_id.clone();
    let mut sender_task = tokio::spawn(async move {
        while let Some(route) = route_rx.recv().await {
            let result = match route {
                SessionRoute::Event(event) => match event.to_json() {
                    Ok(json) => sender.send(Message::Text(json.into())).await,
                    Err(e) => {
                        error!("Failed to serialize outgoing event: {}", e);
                        continue;
                    }
                },
                SessionRoute::Prepared(text) => {
                    sender.send(Message::Text(text.to_string().into())).await
                }
                SessionRoute::Close => {
                    debug!(session_id = %writer_session, "Closing voice session socket");
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };

            if let Err(e) = result {
                error!(session_id = %writer_session, "Failed to send WebSocket message: {}", e);
                break;
            }
        }
    });

    let cancel = CancellationToken::new();
    let routing = SessionRouting::new();
    let native_sample_rate = runtime.native_sample_rate();
    let codec = Arc::new(Mutex::new(
        FrameCodec::new(CodecConfig {
            target_sample_rate: config.target_sample_rate,
            native_sample_rate,
        })
        .with_routing(routing.clone()),
    ));

    let coordinator = Arc::new(
        ToolCoordinator::new(
            session_id.clone(),
            app_state.backends.clone(),
            routing,
            sink.clone(),
        )
        .with_classification(app_state.classification.clone())
        .with_default_agent_target(app_state.default_agent_target.clone())
        .with_timeout(config.tool_timeout)
        .with_keepalive(app_state.keepalive_frames.clone())
        .with_cancellation(cancel.child_token()),
    );
    let tool_tasks = TaskTracker::new();

    register_callbacks(
        &runtime,
        &session_id,
        &codec,
        &sink,
        &coordinator,
        &tool_tasks,
        &cancel,
    );

    match runtime.connect().await {
        Ok(()) => {
            info!(
                session_id = %session_id,
                native_sample_rate,
                target_sample_rate = config.target_sample_rate,
                "Conversational runtime connected"
            );
            pump_client(&mut receiver, &codec, &runtime, &cancel, &session_id).await;
        }
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Failed to connect conversational runtime");
        }
    }

    // Teardown: stop keep-alive and in-flight calls, then the runtime, then the writer.
    cancel.cancel();
    tool_tasks.close();
    if timeout(TEARDOWN_GRACE, tool_tasks.wait()).await.is_err() {
        warn!(session_id = %session_id, "Tool tasks still running at teardown");
    }

    if let Err(e) = runtime.disconnect().await {
        warn!(session_id = %session_id, error = %e, "Failed to disconnect conversational runtime");
    }

    let _ = sink.try_push(SessionRoute::Close);
    drop(sink);
    drop(coordinator);
    if timeout(TEARDOWN_GRACE, &mut sender_task).await.is_err() {
        sender_task.abort();
    }

    info!(session_id = %session_id, "Voice session terminated");
}

/// Forward client traffic to the runtime until the session ends.
async fn pump_client(
    receiver: &mut SplitStream<WebSocket>,
    codec: &Mutex<FrameCodec>,
    runtime: &Arc<dyn ConversationRuntime>,
    cancel: &CancellationToken,
    session_id: &str,
) {
    let mut last_activity = Instant::now();

    loop {
        select! {
            biased;

            _ = cancel.cancelled() => {
                info!(session_id = %session_id, "Voice session cancelled");
                break;
            }

            msg = receiver.next() => {
                last_activity = Instant::now();
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let decoded = codec.lock().decode(text.as_str());
                        forward_audio(runtime, session_id, decoded).await;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        let decoded = codec.lock().decode_pcm(&data);
                        forward_audio(runtime, session_id, decoded).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(session_id = %session_id, "Voice session closed by client");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(session_id = %session_id, "Voice session WebSocket error: {}", e);
                        break;
                    }
                }
            }

            _ = tokio::time::sleep(IDLE_CHECK_INTERVAL) => {
                if last_activity.elapsed() > IDLE_TIMEOUT {
                    warn!(
                        session_id = %session_id,
                        "Voice session idle for {}s, closing stale connection",
                        last_activity.elapsed().as_secs()
                    );
                    break;
                }
                debug!(session_id = %session_id, "Voice session idle check - still active");
            }
        }
    }
}

async fn forward_audio(
    runtime: &Arc<dyn ConversationRuntime>,
    session_id: &str,
    decoded: CodecResult<Option<AudioFrame>>,
) {
    match decoded {
        Ok(Some(frame)) => {
            if let Err(e) = runtime.send_audio(&frame).await {
                debug!(session_id = %session_id, error = %e, "Dropping inbound audio");
            }
        }
        Ok(None) => {}
        Err(e) => warn!(session_id = %session_id, error = %e, "Failed to decode inbound audio"),
    }
}

/// Wire runtime events into the session.
///
/// Callbacks hold a weak runtime reference; the runtime owns the callbacks.
fn register_callbacks(
    runtime: &Arc<dyn ConversationRuntime>,
    session_id: &str,
    codec: &Arc<Mutex<FrameCodec>>,
    sink: &OutboundSink,
    coordinator: &Arc<ToolCoordinator>,
    tool_tasks: &TaskTracker,
    cancel: &CancellationToken,
) {
    let audio_codec = codec.clone();
    let audio_sink = sink.clone();
    runtime.on_audio(Arc::new(move |frame| {
        let event = audio_codec.lock().encode(OutboundFrame::Audio(frame));
        let sink = audio_sink.clone();
        Box::pin(async move {
            if let Some(event) = event
                && let Err(e) = sink.push_event(event).await
            {
                debug!(error = %e, "Dropping outbound audio");
            }
        })
    }));

    let stop_codec = codec.clone();
    let stop_sink = sink.clone();
    runtime.on_interruption(Arc::new(move || {
        let event = stop_codec.lock().encode(OutboundFrame::Interruption);
        let sink = stop_sink.clone();
        Box::pin(async move {
            if let Some(event) = event
                && let Err(e) = sink.push_event(event).await
            {
                warn!(error = %e, "Failed to forward interruption");
            }
        })
    }));

    let weak_runtime: Weak<dyn ConversationRuntime> = Arc::downgrade(runtime);
    let coordinator = coordinator.clone();
    let tracker = tool_tasks.clone();
    let tool_session = session_id.to_string();
    runtime.on_tool_call(Arc::new(move |request: ToolCallRequest| {
        let coordinator = coordinator.clone();
        let weak_runtime = weak_runtime.clone();
        let session_id = tool_session.clone();
        // Runs outside the runtime's read loop so audio keeps flowing.
        tracker.spawn(async move {
            info!(
                session_id = %session_id,
                call_id = %request.call_id,
                tool = %request.name,
                "Tool call received"
            );
            let result = coordinator.execute(&request.name, &request.arguments).await;
            let Some(runtime) = weak_runtime.upgrade() else {
                return;
            };
            if let Err(e) = runtime
                .submit_tool_result(&request.call_id, &result.summary)
                .await
            {
                warn!(
                    session_id = %session_id,
                    call_id = %request.call_id,
                    error = %e,
                    "Failed to return tool result"
                );
            }
        });
        Box::pin(async {})
    }));

    let weak_runtime: Weak<dyn ConversationRuntime> = Arc::downgrade(runtime);
    let error_cancel = cancel.clone();
    let error_session = session_id.to_string();
    runtime.on_error(Arc::new(move |err: RuntimeError| {
        let weak_runtime = weak_runtime.clone();
        let cancel = error_cancel.clone();
        let session_id = error_session.clone();
        Box::pin(async move {
            warn!(session_id = %session_id, error = %err, "Conversational runtime error");
            let lost = weak_runtime
                .upgrade()
                .map(|runtime| !runtime.is_ready())
                .unwrap_or(true);
            if lost {
                cancel.cancel();
            }
        })
    }));
}
