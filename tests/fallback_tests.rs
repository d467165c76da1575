//! Fallback execution through the orchestrator and directly

mod common;

use std::sync::Arc;

use common::{request, MockBackend};
use sdkwork_tts_orchestrator::{
    BackendRegistry, EngineConfigBuilder, FallbackExecutor, MetricsStore, Orchestrator,
    PerformanceMonitor, PerformanceThresholds, SelectionResult, TtsError,
};

async fn orchestrator_with(backends: Vec<MockBackend>) -> (Orchestrator, Vec<Arc<MockBackend>>) {
    let orchestrator = Orchestrator::new(EngineConfigBuilder::new().build().unwrap());
    let mut mocks = Vec::new();
    for backend in backends {
        let name = backend.name().to_string();
        let (mock, handle) = backend.handle();
        orchestrator.register_backend(&name, handle).await.unwrap();
        mocks.push(mock);
    }
    (orchestrator, mocks)
}

#[tokio::test]
async fn test_falls_through_to_first_working_backend() {
    let (orchestrator, mocks) = orchestrator_with(vec![
        MockBackend::failing("a"),
        MockBackend::failing("b"),
        MockBackend::new("c"),
    ])
    .await;

    let response = orchestrator
        .synthesize(&request("hello there"), None)
        .await
        .unwrap();

    assert_eq!(response.audio, b"hello there".to_vec());
    assert_eq!(response.metadata["adapter"], "c");
    assert_eq!(response.metadata["fallback_used"], true);
    assert_eq!(response.metadata["original_adapter"], "a");
    assert_eq!(response.metadata["fallback_adapter"], "c");
    assert_eq!(response.metadata["engine"], "c");
    assert!(response.metadata["request_id"].as_str().is_some());

    for mock in &mocks {
        assert_eq!(mock.synth_count(), 1);
    }

    let report = orchestrator.get_performance_report();
    for failed in ["a", "b"] {
        let snapshot = &report.per_backend[failed];
        assert_eq!(snapshot.total_requests, 1);
        assert_eq!(snapshot.failed_requests, 1);
        assert_eq!(snapshot.successful_requests, 0);
    }
    let c = &report.per_backend["c"];
    assert_eq!(c.total_requests, 1);
    assert_eq!(c.successful_requests, 1);
    assert_eq!(c.response_time.count, 1);
    assert!(c.last_used.is_some());
}

#[tokio::test]
async fn test_primary_success_sets_no_fallback_fields() {
    let (orchestrator, mocks) =
        orchestrator_with(vec![MockBackend::new("a"), MockBackend::new("b")]).await;

    let response = orchestrator
        .synthesize(
            &request("hi").with_request_id("req-42").with_metadata("chapter", 7),
            None,
        )
        .await
        .unwrap();

    assert_eq!(response.metadata["adapter"], "a");
    assert_eq!(response.metadata["fallback_used"], false);
    assert_eq!(response.metadata["request_id"], "req-42");
    assert_eq!(response.metadata["chapter"], 7);
    assert!(!response.metadata.contains_key("original_adapter"));
    assert_eq!(mocks[1].synth_count(), 0);
}

#[tokio::test]
async fn test_all_backends_failing_reports_last_error() {
    let (orchestrator, mocks) = orchestrator_with(vec![
        MockBackend::failing("a"),
        MockBackend::failing("b"),
        MockBackend::failing("c"),
    ])
    .await;

    let err = orchestrator
        .synthesize(&request("doomed").with_request_id("req-7"), None)
        .await
        .unwrap_err();

    match &err {
        TtsError::AllBackendsFailed {
            request_id,
            last_backend,
            attempted,
            source,
        } => {
            assert_eq!(request_id, "req-7");
            assert_eq!(last_backend, "c");
            assert_eq!(*attempted, 3);
            assert!(source.to_string().contains("c exploded"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(mocks.iter().all(|m| m.synth_count() == 1));

    let report = orchestrator.get_performance_report();
    assert_eq!(report.totals.failed_requests, 3);
    assert_eq!(report.totals.successful_requests, 0);
}

#[tokio::test]
async fn test_unknown_backend_in_chain_stops_execution() {
    let metrics = MetricsStore::new();
    let registry = BackendRegistry::new(metrics.clone());
    let (a, handle_a) = MockBackend::failing("a").handle();
    let (c, handle_c) = MockBackend::new("c").handle();
    registry.register("a", handle_a).await.unwrap();
    registry.register("c", handle_c).await.unwrap();

    let executor = FallbackExecutor::new(
        metrics.clone(),
        Arc::new(PerformanceMonitor::default()),
        PerformanceThresholds::default(),
    );
    let selection = SelectionResult {
        chosen_backend: "a".to_string(),
        reason: "test".to_string(),
        score: 0.0,
        fallback_chain: vec!["a".to_string(), "ghost".to_string(), "c".to_string()],
    };

    let err = executor
        .execute(&registry, &request("hi"), &selection)
        .await
        .unwrap_err();

    assert!(matches!(err, TtsError::BackendNotFound { ref name } if name == "ghost"));
    assert_eq!(a.synth_count(), 1);
    assert_eq!(c.synth_count(), 0);
    assert_eq!(metrics.get("c").unwrap().total_requests, 0);
}

#[tokio::test]
async fn test_recovered_backend_serves_again() {
    let (orchestrator, mocks) =
        orchestrator_with(vec![MockBackend::failing("a"), MockBackend::new("b")]).await;

    let first = orchestrator.synthesize(&request("one"), None).await.unwrap();
    assert_eq!(first.metadata["adapter"], "b");

    mocks[0].set_failing(false);
    mocks[1].set_failing(true);
    let second = orchestrator.synthesize(&request("two"), None).await.unwrap();
    assert_eq!(second.metadata["adapter"], "a");
}

#[tokio::test]
async fn test_non_recoverable_error_still_falls_through() {
    let (orchestrator, mocks) = orchestrator_with(vec![
        MockBackend::new("a").with_fatal_synthesis(),
        MockBackend::new("b"),
    ])
    .await;

    let response = orchestrator.synthesize(&request("hi"), None).await.unwrap();
    assert_eq!(response.metadata["adapter"], "b");
    assert_eq!(response.metadata["fallback_used"], true);
    assert_eq!(mocks[0].synth_count(), 1);
}
