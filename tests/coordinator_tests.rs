//! Tool-call coordinator behaviour under virtual time.

mod fixtures;

use std::sync::Arc;
use std::time::Duration;

use fixtures::*;
use tokio::sync::mpsc;
use tokio::time::Instant;
use voicebridge_gateway::core::backends::accounts::{AccountBackend, InMemoryAccountSource};
use voicebridge_gateway::core::backends::{BackendKind, BackendRegistry};
use voicebridge_gateway::core::codec::WireEvent;
use voicebridge_gateway::core::coordinator::{
    ACCOUNTS_EMPTY_MESSAGE, DEFAULT_TOOL_TIMEOUT, KeepAliveFrames, KeepAliveSchedule,
    LOOKUP_FAILED_MESSAGE, TIMEOUT_MESSAGE, ToolCoordinator,
    ToolOutcome,
};
use voicebridge_gateway::core::session::{
    DEFAULT_SEND_TIMEOUT, OutboundSink, RoutingTarget, SessionRoute, SessionRouting,
};

fn keepalive(schedule: &str) -> Arc<KeepAliveFrames> {
    let schedule: KeepAliveSchedule = schedule.parse().unwrap();
    Arc::new(KeepAliveFrames::prepare(&schedule, 16000).unwrap())
}

fn coordinator(
    registry: BackendRegistry,
    schedule: &str,
) -> (ToolCoordinator, mpsc::Receiver<SessionRoute>, SessionRouting) {
    let (sink, rx) = OutboundSink::channel(256, DEFAULT_SEND_TIMEOUT);
    let routing = SessionRouting::new();
    let coordinator = ToolCoordinator::new("session-it", registry, routing.clone(), sink)
        .with_keepalive(Some(keepalive(schedule)));
    (coordinator, rx, routing)
}

fn drain(rx: &mut mpsc::Receiver<SessionRoute>) -> Vec<SessionRoute> {
    let mut routes = Vec::new();
    while let Ok(route) = rx.try_recv() {
        routes.push(route);
    }
    routes
}

fn events(routes: &[SessionRoute]) -> Vec<&WireEvent> {
    routes
        .iter()
        .filter_map(|route| match route {
            SessionRoute::Event(event) => Some(event),
            _ => None,
        })
        .collect()
}

fn keepalive_count(routes: &[SessionRoute]) -> usize {
    routes
        .iter()
        .filter(|route| matches!(route, SessionRoute::Prepared(_)))
        .count()
}

fn target(agent_id: &str) -> RoutingTarget {
    RoutingTarget {
        agent_id: agent_id.to_string(),
        agent_alias_id: "LIVE".to_string(),
        region: None,
    }
}

#[tokio::test(start_paused = true)]
async fn stalled_lookup_times_out_with_keepalive_flowing() {
    let backend = Arc::new(StalledBackend::default());
    let (coordinator, mut rx, _) = coordinator(
        BackendRegistry::new().with(backend.clone()),
        "200:5000,500:5000,1000:5000",
    );

    let started = Instant::now();
    let result = coordinator
        .execute("query_knowledge_base", r#"{"query":"what is our retention policy"}"#)
        .await;
    let elapsed = started.elapsed();

    assert_eq!(result.outcome, ToolOutcome::Timeout);
    assert_eq!(result.summary, TIMEOUT_MESSAGE);
    assert_eq!(result.backend, Some(BackendKind::KnowledgeBase));
    assert!(elapsed >= DEFAULT_TOOL_TIMEOUT);
    assert!(elapsed < DEFAULT_TOOL_TIMEOUT + Duration::from_secs(1));
    assert_eq!(backend.calls(), 1);
    assert_eq!(coordinator.keepalive_tasks().active(), 0);
    assert!(!coordinator.is_busy());

    let routes = drain(&mut rx);
    assert!(keepalive_count(&routes) >= 5);

    let events = events(&routes);
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], WireEvent::KbProcessing { .. }));
    let WireEvent::KnowledgeBase { data } = events[1] else {
        panic!("expected display push, got {:?}", events[1]);
    };
    assert!(data.contains(TIMEOUT_MESSAGE));

    // Nothing keeps emitting after the call resolved.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn stalled_account_source_times_out_with_keepalive_flowing() {
    let source = Arc::new(StalledAccountSource::default());
    let (coordinator, mut rx, _) = coordinator(
        BackendRegistry::new().with(Arc::new(AccountBackend::new(source.clone()))),
        "200:5000,500:5000,1000:5000",
    );

    let started = Instant::now();
    let result = coordinator.execute("get_total_cost", "{}").await;

    assert_eq!(result.outcome, ToolOutcome::Timeout);
    assert_eq!(result.backend, Some(BackendKind::Accounts));
    assert!(started.elapsed() >= DEFAULT_TOOL_TIMEOUT);
    assert_eq!(source.calls(), 1);
    assert_eq!(coordinator.keepalive_tasks().active(), 0);

    let routes = drain(&mut rx);
    assert!(keepalive_count(&routes) >= 5);
    assert!(matches!(
        events(&routes).last(),
        Some(WireEvent::KnowledgeBase { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn account_tools_skip_classification() {
    let kb = ScriptedBackend::new(BackendKind::KnowledgeBase, Duration::ZERO, "kb");
    let accounts = AccountBackend::new(Arc::new(InMemoryAccountSource::new(account_records())));
    let (coordinator, mut rx, _) = coordinator(
        BackendRegistry::new().with(kb.clone()).with(Arc::new(accounts)),
        "200:1000",
    );

    let result = coordinator
        .execute(
            "get_accounts_by_classification",
            r#"{"classification":"class 2"}"#,
        )
        .await;
    assert_eq!(result.outcome, ToolOutcome::Success);
    assert_eq!(result.backend, Some(BackendKind::Accounts));
    assert!(result.summary.starts_with("Found 2 accounts with classification Class-2"));
    assert_eq!(result.display.content.as_array().map(Vec::len), Some(2));

    let result = coordinator
        .execute("get_account_details", r#"{"account_name":"payments prod"}"#)
        .await;
    assert_eq!(result.outcome, ToolOutcome::Success);
    assert!(result.summary.contains("2 0 0 0 0 0 0 0 0 0 0 1"));
    assert_eq!(result.display.content["management_type"], "Self Service");

    let result = coordinator
        .execute("get_accounts_by_year", r#"{"year":1999}"#)
        .await;
    assert_eq!(result.outcome, ToolOutcome::Empty);
    assert_eq!(result.summary, ACCOUNTS_EMPTY_MESSAGE);

    assert!(kb.requests().is_empty());
    assert_eq!(keepalive_count(&drain(&mut rx)), 0);
}

#[tokio::test(start_paused = true)]
async fn account_tools_without_account_backend_never_reach_others() {
    let kb = ScriptedBackend::new(BackendKind::KnowledgeBase, Duration::ZERO, "kb");
    let (coordinator, _rx, _) = coordinator(BackendRegistry::new().with(kb.clone()), "200:1000");

    let result = coordinator.execute("get_account_status_summary", "{}").await;
    assert_eq!(result.outcome, ToolOutcome::Error);
    assert_eq!(result.backend, None);
    assert!(kb.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn custom_timeout_is_honoured() {
    let (sink, _rx) = OutboundSink::channel(256, DEFAULT_SEND_TIMEOUT);
    let coordinator = ToolCoordinator::new(
        "session-it",
        BackendRegistry::new().with(Arc::new(StalledBackend::default())),
        SessionRouting::new(),
        sink,
    )
    .with_timeout(Duration::from_secs(5));

    let started = Instant::now();
    let result = coordinator
        .execute("search_documents", r#"{"query":"quarterly report"}"#)
        .await;
    assert_eq!(result.outcome, ToolOutcome::Timeout);
    assert!(started.elapsed() < Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn keepalive_stops_after_every_outcome() {
    let cases: Vec<(BackendRegistry, ToolOutcome)> = vec![
        (
            BackendRegistry::new().with(ScriptedBackend::new(
                BackendKind::KnowledgeBase,
                Duration::from_secs(3),
                "Backups run nightly.",
            )),
            ToolOutcome::Success,
        ),
        (
            BackendRegistry::new().with(Arc::new(FailingBackend)),
            ToolOutcome::Error,
        ),
        (
            BackendRegistry::new().with(Arc::new(StalledBackend::default())),
            ToolOutcome::Timeout,
        ),
        (BackendRegistry::new(), ToolOutcome::Error),
    ];

    for (registry, expected) in cases {
        let (coordinator, mut rx, _) = coordinator(registry, "200:1000");
        let result = coordinator
            .execute("query_knowledge_base", r#"{"query":"backup schedule"}"#)
            .await;

        assert_eq!(result.outcome, expected);
        assert_eq!(coordinator.keepalive_tasks().active(), 0);

        let routes = drain(&mut rx);
        let events = events(&routes);
        assert!(matches!(events.last(), Some(WireEvent::KnowledgeBase { .. })));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(keepalive_count(&drain(&mut rx)), 0);
    }
}

#[tokio::test(start_paused = true)]
async fn backend_failure_details_stay_off_the_display() {
    let (coordinator, mut rx, _) =
        coordinator(BackendRegistry::new().with(Arc::new(FailingBackend)), "200:1000");
    let result = coordinator
        .execute("query_knowledge_base", r#"{"query":"backup schedule"}"#)
        .await;
    assert_eq!(result.outcome, ToolOutcome::Error);
    assert!(!result.summary.contains("kb.test"));

    let routes = drain(&mut rx);
    let Some(WireEvent::KnowledgeBase { data }) = events(&routes).last().copied() else {
        panic!("no display payload pushed");
    };
    let payload: serde_json::Value = serde_json::from_str(data).unwrap();
    assert_eq!(payload["content"], LOOKUP_FAILED_MESSAGE);
    assert!(!data.contains("kb.test"));
    assert!(!data.contains("502"));
    assert!(!data.contains("bad gateway"));
}

#[tokio::test(start_paused = true)]
async fn concurrent_calls_run_one_at_a_time() {
    let backend = ScriptedBackend::new(
        BackendKind::KnowledgeBase,
        Duration::from_secs(2),
        "Rotate credentials quarterly.",
    );
    let (coordinator, mut rx, _) =
        coordinator(BackendRegistry::new().with(backend.clone()), "200:500");

    let (first, second) = tokio::join!(
        coordinator.execute("query_knowledge_base", r#"{"query":"first question"}"#),
        coordinator.execute("search_documents", r#"{"query":"second question"}"#),
    );

    assert_eq!(first.outcome, ToolOutcome::Success);
    assert_eq!(second.outcome, ToolOutcome::Success);
    assert!(second.elapsed >= Duration::from_secs(2));
    assert_eq!(coordinator.keepalive_tasks().peak(), 1);
    assert_eq!(coordinator.keepalive_tasks().active(), 0);

    let queries: Vec<_> = backend.requests().into_iter().map(|r| r.query).collect();
    assert_eq!(queries, vec!["first question", "second question"]);

    // Notice, keep-alive, result; never interleaved across calls.
    let routes = drain(&mut rx);
    let mut in_call = false;
    let mut completed = 0;
    for route in &routes {
        match route {
            SessionRoute::Event(WireEvent::KbProcessing { .. }) => {
                assert!(!in_call, "second notice before first result");
                in_call = true;
            }
            SessionRoute::Event(WireEvent::KnowledgeBase { .. }) => {
                assert!(in_call, "result without a notice");
                in_call = false;
                completed += 1;
            }
            SessionRoute::Prepared(_) => assert!(in_call, "keep-alive outside a call"),
            other => panic!("unexpected route {other:?}"),
        }
    }
    assert_eq!(completed, 2);
    assert!(keepalive_count(&routes) >= 4);
}

#[tokio::test(start_paused = true)]
async fn procedure_queries_route_to_the_agent() {
    let kb = ScriptedBackend::new(BackendKind::KnowledgeBase, Duration::ZERO, "KB answer");
    let agent = ScriptedBackend::new(BackendKind::Agent, Duration::ZERO, "Agent answer");
    let registry = BackendRegistry::new().with(kb.clone()).with(agent.clone());
    let (coordinator, _rx, routing) = coordinator(registry, "200:5000");
    let coordinator = coordinator.with_default_agent_target(Some(Arc::new(target("DEFAULT"))));

    let result = coordinator
        .execute(
            "query_knowledge_base",
            r#"{"query":"Walk me through the SOP for database failover"}"#,
        )
        .await;
    assert_eq!(result.backend, Some(BackendKind::Agent));
    assert_eq!(result.outcome, ToolOutcome::Success);

    let result = coordinator
        .execute("query_knowledge_base", r#"{"query":"who owns the billing service"}"#)
        .await;
    assert_eq!(result.backend, Some(BackendKind::KnowledgeBase));

    routing.install(Some(target("SESSION")));
    coordinator
        .execute("query_knowledge_base", r#"{"query":"open the runbook for paging"}"#)
        .await;

    let agent_requests = agent.requests();
    assert_eq!(agent_requests.len(), 2);
    let targets: Vec<_> = agent_requests
        .iter()
        .map(|r| r.target.as_ref().unwrap().agent_id.clone())
        .collect();
    assert_eq!(targets, vec!["DEFAULT", "SESSION"]);
    assert!(agent_requests.iter().all(|r| r.session_id == "session-it"));
    assert_eq!(kb.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn procedure_queries_fall_back_without_agent_target() {
    let kb = ScriptedBackend::new(BackendKind::KnowledgeBase, Duration::ZERO, "KB answer");
    let agent = ScriptedBackend::new(BackendKind::Agent, Duration::ZERO, "Agent answer");
    let (coordinator, _rx, _) = coordinator(
        BackendRegistry::new().with(kb.clone()).with(agent.clone()),
        "200:5000",
    );

    let result = coordinator
        .execute("query_knowledge_base", r#"{"query":"what does the SOP say"}"#)
        .await;
    assert_eq!(result.backend, Some(BackendKind::KnowledgeBase));
    assert!(agent.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_resolves_in_flight_call_quietly() {
    let (coordinator, mut rx, _) = coordinator(
        BackendRegistry::new().with(Arc::new(StalledBackend::default())),
        "200:1000",
    );
    let coordinator = Arc::new(coordinator);

    let call = tokio::spawn({
        let coordinator = coordinator.clone();
        async move {
            coordinator
                .execute("query_knowledge_base", r#"{"query":"anything"}"#)
                .await
        }
    });

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(coordinator.is_busy());
    coordinator.cancel();

    let result = call.await.unwrap();
    assert_eq!(result.outcome, ToolOutcome::Error);
    assert_eq!(coordinator.keepalive_tasks().active(), 0);

    let routes = drain(&mut rx);
    let events = events(&routes);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], WireEvent::KbProcessing { .. }));
}

#[tokio::test(start_paused = true)]
async fn invalid_arguments_never_reach_a_backend() {
    let backend = ScriptedBackend::new(BackendKind::KnowledgeBase, Duration::ZERO, "unused");
    let (coordinator, mut rx, _) =
        coordinator(BackendRegistry::new().with(backend.clone()), "200:1000");

    let result = coordinator.execute("query_knowledge_base", "{not json").await;
    assert_eq!(result.outcome, ToolOutcome::Error);
    assert!(result.backend.is_none());
    assert!(backend.requests().is_empty());

    let routes = drain(&mut rx);
    assert_eq!(keepalive_count(&routes), 0);
    assert!(matches!(
        events(&routes).as_slice(),
        [WireEvent::KnowledgeBase { .. }]
    ));
}
