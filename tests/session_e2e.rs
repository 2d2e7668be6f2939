//! End-to-end voice sessions over a real socket with a scripted runtime.

mod fixtures;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use base64::{Engine, prelude::BASE64_STANDARD};
use fixtures::*;
use futures::{SinkExt, StreamExt};
use http::HeaderValue;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{self, Message, client::IntoClientRequest};
use voicebridge_gateway::{
    ServerConfig,
    core::backends::{BackendKind, BackendRegistry},
    core::codec::frame::{bytes_to_samples, samples_to_bytes},
    core::runtime::RuntimeFactory,
    routes,
    state::AppState,
};

async fn serve(state: Arc<AppState>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = routes::create_app(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn config(auth_token: Option<&str>) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.keepalive_enabled = false;
    config.auth_token = auth_token.map(str::to_string);
    config
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

fn refusal_status(err: tungstenite::Error) -> u16 {
    match err {
        tungstenite::Error::Http(response) => response.status().as_u16(),
        other => panic!("expected HTTP refusal, got {other:?}"),
    }
}

#[tokio::test]
async fn session_bridges_audio_and_tool_calls() {
    let factory = ScriptedRuntimeFactory::new(r#"{"query":"when do backups run"}"#);
    let backend = ScriptedBackend::new(
        BackendKind::KnowledgeBase,
        Duration::ZERO,
        "Backups run nightly.",
    );
    let state = AppState::with_parts(
        config(None),
        BackendRegistry::new().with(backend.clone()),
        Some(factory.clone() as Arc<dyn RuntimeFactory>),
    )
    .unwrap();
    let addr = serve(state).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();

    let pcm = samples_to_bytes(&sine(20, 16000, 440.0, 0.3));
    let media = serde_json::json!({"event": "media", "data": BASE64_STANDARD.encode(&pcm)});
    ws.send(Message::text(media.to_string())).await.unwrap();
    ws.send(Message::binary(pcm.clone())).await.unwrap();

    let mut reply_samples = None;
    let mut display = None;
    let mut saw_notice = false;
    timeout(Duration::from_secs(5), async {
        while reply_samples.is_none() || display.is_none() {
            let Some(Ok(Message::Text(text))) = ws.next().await else {
                continue;
            };
            let event: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
            match event["event"].as_str() {
                Some("media") => {
                    let data = event["data"].as_str().unwrap();
                    reply_samples = Some(bytes_to_samples(&BASE64_STANDARD.decode(data).unwrap()));
                }
                Some("kb_processing") => saw_notice = true,
                Some("knowledge_base") => {
                    display = Some(event["data"].as_str().unwrap().to_string());
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
    })
    .await
    .expect("session replies");

    // 40ms of runtime audio at 24kHz arrives at the 16kHz wire rate.
    let reply = reply_samples.unwrap();
    assert!(reply.len().abs_diff(samples_for(40, 16000)) <= 4);
    assert!(saw_notice);
    assert!(display.unwrap().contains("Backups run nightly."));

    let log = factory.log.clone();
    wait_for(|| !log.results.lock().is_empty()).await;
    {
        let results = log.results.lock();
        assert_eq!(results[0].0, MOCK_CALL_ID);
        assert!(results[0].1.starts_with("Backups run nightly."));
    }
    assert_eq!(backend.requests()[0].query, "when do backups run");

    // Both inbound frames reached the runtime resampled to its native rate.
    wait_for(|| log.frames.lock().len() == 2).await;
    for frame in log.frames.lock().iter() {
        assert_eq!(frame.sample_rate(), MOCK_NATIVE_RATE);
        assert!(frame.num_samples().abs_diff(samples_for(20, MOCK_NATIVE_RATE)) <= 4);
    }

    ws.close(None).await.unwrap();
    wait_for(|| log.disconnects.load(Ordering::SeqCst) == 1).await;
}

#[tokio::test]
async fn config_message_routes_the_session_to_the_agent() {
    let factory = ScriptedRuntimeFactory::new(r#"{"query":"read me the SOP for failover"}"#);
    let kb = ScriptedBackend::new(BackendKind::KnowledgeBase, Duration::ZERO, "kb");
    let agent = ScriptedBackend::new(BackendKind::Agent, Duration::ZERO, "Promote the replica.");
    let state = AppState::with_parts(
        config(None),
        BackendRegistry::new().with(kb.clone()).with(agent.clone()),
        Some(factory.clone() as Arc<dyn RuntimeFactory>),
    )
    .unwrap();
    let addr = serve(state).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();

    let config = r#"{"type":"config","agentId":"AG7","agentAliasId":"AL7"}"#;
    ws.send(Message::text(config)).await.unwrap();
    let pcm = samples_to_bytes(&sine(20, 16000, 440.0, 0.3));
    ws.send(Message::binary(pcm)).await.unwrap();

    let log = factory.log.clone();
    wait_for(|| !log.results.lock().is_empty()).await;

    let requests = agent.requests();
    assert_eq!(requests.len(), 1);
    let target = requests[0].target.as_ref().unwrap();
    assert_eq!(target.agent_id, "AG7");
    assert_eq!(target.agent_alias_id, "AL7");
    assert!(requests[0].session_id.starts_with("session-"));
    assert!(kb.requests().is_empty());

    ws.close(None).await.unwrap();
}

#[tokio::test]
async fn upgrade_refused_without_runtime() {
    let state = AppState::with_parts(config(None), BackendRegistry::new(), None).unwrap();
    let addr = serve(state).await;

    let err = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap_err();
    assert_eq!(refusal_status(err), 503);
}

#[tokio::test]
async fn upgrade_refused_for_unsupported_sample_rate() {
    let factory = ScriptedRuntimeFactory::new("{}");
    let state = AppState::with_parts(
        config(None),
        BackendRegistry::new(),
        Some(factory.clone() as Arc<dyn RuntimeFactory>),
    )
    .unwrap();
    let addr = serve(state).await;

    let err = tokio_tungstenite::connect_async(format!("ws://{addr}/ws?sample_rate=1234"))
        .await
        .unwrap_err();
    assert_eq!(refusal_status(err), 400);
    assert_eq!(factory.log.created.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn sample_rate_must_match_the_runtime() {
    let factory = ScriptedRuntimeFactory::new("{}");
    let state = AppState::with_parts(
        config(None),
        BackendRegistry::new(),
        Some(factory.clone() as Arc<dyn RuntimeFactory>),
    )
    .unwrap();
    let addr = serve(state).await;

    // A supported rate the runtime does not consume is refused.
    let err = tokio_tungstenite::connect_async(format!("ws://{addr}/ws?sample_rate=16000"))
        .await
        .unwrap_err();
    assert_eq!(refusal_status(err), 400);

    let (mut ws, _) = tokio_tungstenite::connect_async(format!(
        "ws://{addr}/ws?sample_rate={MOCK_NATIVE_RATE}"
    ))
    .await
    .unwrap();
    let pcm = samples_to_bytes(&sine(20, 16000, 440.0, 0.3));
    ws.send(Message::binary(pcm)).await.unwrap();

    let log = factory.log.clone();
    wait_for(|| !log.frames.lock().is_empty()).await;
    let frame = log.frames.lock()[0].clone();
    assert_eq!(frame.sample_rate(), MOCK_NATIVE_RATE);
    assert!(frame.num_samples().abs_diff(samples_for(20, MOCK_NATIVE_RATE)) <= 4);

    ws.close(None).await.unwrap();
}

#[tokio::test]
async fn configured_native_rate_must_match_the_runtime() {
    let factory = ScriptedRuntimeFactory::new("{}");
    let mut server_config = config(None);
    server_config.native_sample_rate = Some(16000);
    let state = AppState::with_parts(
        server_config,
        BackendRegistry::new(),
        Some(factory.clone() as Arc<dyn RuntimeFactory>),
    )
    .unwrap();
    let addr = serve(state).await;

    let err = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap_err();
    assert_eq!(refusal_status(err), 503);
    assert!(factory.log.frames.lock().is_empty());
}

#[tokio::test]
async fn token_authentication_on_upgrade() {
    let factory = ScriptedRuntimeFactory::new("{}");
    let state = AppState::with_parts(
        config(Some("secret-token")),
        BackendRegistry::new(),
        Some(factory.clone() as Arc<dyn RuntimeFactory>),
    )
    .unwrap();
    let addr = serve(state).await;

    let err = tokio_tungstenite::connect_async(format!("ws://{addr}/ws?token=nope"))
        .await
        .unwrap_err();
    assert_eq!(refusal_status(err), 401);

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws?token=secret-token"))
        .await
        .unwrap();
    ws.close(None).await.unwrap();

    // Browsers can only offer the token as a subprotocol; it is echoed back.
    let mut request = format!("ws://{addr}/ws").into_client_request().unwrap();
    request.headers_mut().insert(
        "sec-websocket-protocol",
        HeaderValue::from_static("secret-token"),
    );
    let (mut ws, response) = tokio_tungstenite::connect_async(request).await.unwrap();
    assert_eq!(
        response.headers().get("sec-websocket-protocol").unwrap(),
        "secret-token"
    );
    ws.close(None).await.unwrap();

    assert_eq!(factory.log.created.load(Ordering::SeqCst), 2);
}
