/// Integration tests with a mocked upstream report API
/// Runs the full wrapper pipeline against wiremock and a temporary cache folder
use axum::body::to_bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use report_wrapper::cache_store::{Artifact, CacheStore};
use report_wrapper::config::Config;
use report_wrapper::endpoints::{EndpointRegistry, Params};
use report_wrapper::errors::AppError;
use report_wrapper::handlers::{self, AppState};
use report_wrapper::pipeline::{compare_from_cache, ReportPipeline, WrapperOutput};
use report_wrapper::report_client::ReportApiClient;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REPORT_PATH: &str = "/v1/convesation/download-report/agent";

fn sample_report() -> Value {
    json!({"data": [
        {
            "createdAt": "2026-01-10T20:00:00Z",
            "agentId": [],
            "aiAgent": {"name": "LIA"},
            "Full Conversation": [{"sender": []}, {"sender": [{"firstName": "LIA"}]}],
            "dataCollectFromUser": {"estado": "SP"}
        }
    ]})
}

fn registry() -> EndpointRegistry {
    let value = json!({
        "report_lia": {
            "path": REPORT_PATH,
            "default_params": {"agentId": "${LIA_AGENT_ID}", "by": "agent", "messageHistory": "true"}
        }
    });
    EndpointRegistry::from_value(&value, |var| {
        (var == "LIA_AGENT_ID").then(|| "agent-123".to_string())
    })
    .unwrap()
}

fn params(pairs: &[(&str, &str)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn pipeline(server: &MockServer, cache_dir: &TempDir) -> ReportPipeline {
    let client = ReportApiClient::new(
        server.uri(),
        Some("secret-key".to_string()),
        Duration::from_secs(5),
    )
    .unwrap();
    ReportPipeline::new(
        Arc::new(registry()),
        client,
        CacheStore::new(cache_dir.path()),
    )
}

#[tokio::test]
async fn test_dashboard_flow_writes_all_artifacts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(REPORT_PATH))
        .and(header("X-API-Key", "secret-key"))
        .and(query_param("agentId", "agent-123"))
        .and(query_param("from", "2026-01-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_report()))
        .expect(1)
        .mount(&server)
        .await;

    let cache_dir = TempDir::new().unwrap();
    let pipeline = pipeline(&server, &cache_dir);
    let query = params(&[("from", "2026-01-01"), ("to", "2026-01-31")]);

    let output = pipeline.run("report_lia", query.clone()).await.unwrap();
    let WrapperOutput::Dashboard(payload) = output else {
        panic!("expected dashboard output");
    };
    assert_eq!(payload.overview.total_conversations, 1);
    assert_eq!(payload.overview.after_hours_count, 1);
    assert!(payload.previous_period.is_none());

    let merged = params(&[
        ("agentId", "agent-123"),
        ("by", "agent"),
        ("from", "2026-01-01"),
        ("messageHistory", "true"),
        ("to", "2026-01-31"),
    ]);
    let cache = pipeline.cache();
    for artifact in [
        Artifact::Raw,
        Artifact::Optimized,
        Artifact::Dashboard,
        Artifact::ComparisonMarkdown,
        Artifact::ComparisonHtml,
        Artifact::ComparisonMetrics,
    ] {
        let path = cache.artifact_path("report_lia", &merged, artifact);
        assert!(path.exists(), "missing {}", path.display());
    }

    let optimized = cache
        .read_json("report_lia", &merged, Artifact::Optimized)
        .await
        .unwrap();
    assert_eq!(optimized["meta"]["agent"], json!({"name": "LIA"}));
    let raw = cache.read_json("report_lia", &merged, Artifact::Raw).await.unwrap();
    assert_eq!(raw, sample_report());
}

#[tokio::test]
async fn test_reserved_flags_are_not_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(REPORT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_report()))
        .mount(&server)
        .await;

    let cache_dir = TempDir::new().unwrap();
    let pipeline = pipeline(&server, &cache_dir);
    let output = pipeline
        .run("report_lia", params(&[("full", "true"), ("by", "user")]))
        .await
        .unwrap();
    assert!(matches!(output, WrapperOutput::Optimized(_)));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let query: Params = requests[0]
        .url
        .query_pairs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    assert!(!query.contains_key("full"));
    assert_eq!(query.get("by").map(String::as_str), Some("user"));
}

#[tokio::test]
async fn test_unknown_endpoint_lists_available_keys() {
    let server = MockServer::start().await;
    let cache_dir = TempDir::new().unwrap();
    let pipeline = pipeline(&server, &cache_dir);

    let err = pipeline.run("nope", Params::new()).await.unwrap_err();
    match err.root() {
        AppError::UnknownEndpoint { key, available } => {
            assert_eq!(key, "nope");
            assert_eq!(available, &vec!["report_lia".to_string()]);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upstream_failure_maps_to_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(REPORT_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let cache_dir = TempDir::new().unwrap();
    let pipeline = pipeline(&server, &cache_dir);
    let err = pipeline.run("report_lia", Params::new()).await.unwrap_err();
    assert!(matches!(err.root(), AppError::ExternalApiError(_)));
    assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_previous_month_comparison_attached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(REPORT_PATH))
        .and(query_param("from", "2025-12-01"))
        .and(query_param("to", "2025-12-31"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(REPORT_PATH))
        .and(query_param("from", "2026-01-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_report()))
        .expect(1)
        .mount(&server)
        .await;

    let cache_dir = TempDir::new().unwrap();
    let pipeline = pipeline(&server, &cache_dir);
    let output = pipeline
        .run(
            "report_lia",
            params(&[("from", "2026-01-01"), ("to", "2026-01-31"), ("compare", "1")]),
        )
        .await
        .unwrap();
    let WrapperOutput::Dashboard(payload) = output else {
        panic!("expected dashboard output");
    };
    let comparison = payload.previous_period.flatten().unwrap();
    assert_eq!(comparison.previous.total_conversations, 0);
    assert_eq!(comparison.deltas["total_conversations"].absolute_change, 1.0);
    assert_eq!(comparison.deltas["total_conversations"].percent_change, None);
    assert!(payload.previous_period_error.is_none());
}

#[tokio::test]
async fn test_previous_month_failure_degrades() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(REPORT_PATH))
        .and(query_param("from", "2025-12-01"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(REPORT_PATH))
        .and(query_param("from", "2026-01-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_report()))
        .mount(&server)
        .await;

    let cache_dir = TempDir::new().unwrap();
    let pipeline = pipeline(&server, &cache_dir);
    let output = pipeline
        .run("report_lia", params(&[("from", "2026-01-01"), ("compare", "true")]))
        .await
        .unwrap();
    let WrapperOutput::Dashboard(payload) = output else {
        panic!("expected dashboard output");
    };
    assert_eq!(payload.previous_period, Some(None));
    assert!(payload.previous_period_error.is_some());
    assert_eq!(payload.overview.total_conversations, 1);
}

#[tokio::test]
async fn test_cache_failure_does_not_fail_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(REPORT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_report()))
        .mount(&server)
        .await;

    // A plain file where the cache root folder should be
    let dir = TempDir::new().unwrap();
    let blocked = dir.path().join("cache");
    std::fs::write(&blocked, b"not a folder").unwrap();

    let client =
        ReportApiClient::new(server.uri(), None, Duration::from_secs(5)).unwrap();
    let pipeline = ReportPipeline::new(Arc::new(registry()), client, CacheStore::new(&blocked));

    let output = pipeline
        .run("report_lia", params(&[("raw", "1")]))
        .await
        .unwrap();
    let WrapperOutput::Raw(doc) = output else {
        panic!("expected raw output");
    };
    assert_eq!(doc, sample_report());
}

#[tokio::test]
async fn test_compare_from_cache_after_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(REPORT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_report()))
        .mount(&server)
        .await;

    let cache_dir = TempDir::new().unwrap();
    let pipeline = pipeline(&server, &cache_dir);
    pipeline.run("report_lia", Params::new()).await.unwrap();

    let artifacts = compare_from_cache(pipeline.cache(), "report_lia", None)
        .await
        .unwrap()
        .unwrap();
    assert!(artifacts.markdown.exists());
    assert!(artifacts.html.exists());
    assert_eq!(artifacts.metrics.items_with_ai_agent_removed, 1);

    let missing = compare_from_cache(pipeline.cache(), "report_other", None)
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_wrapper_handler_sets_optimized_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(REPORT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_report()))
        .mount(&server)
        .await;

    let cache_dir = TempDir::new().unwrap();
    let config = Config {
        base_url: server.uri(),
        port: 8000,
        api_key: Some("secret-key".to_string()),
        cache_dir: cache_dir.path().to_path_buf(),
        endpoints_file: "config/api_endpoints.json".into(),
        upstream_timeout_secs: 5,
    };
    let state = Arc::new(AppState {
        config,
        pipeline: pipeline(&server, &cache_dir),
    });

    let response = handlers::wrapper_get(
        State(state.clone()),
        Path("report_lia".to_string()),
        Query(params(&[("full", "true")])),
    )
    .await
    .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[handlers::OPTIMIZED_HEADER], "true");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let doc: Value = serde_json::from_slice(&body).unwrap();
    assert!(doc["data"][0].get("aiAgent").is_none());

    let response = handlers::wrapper_get(
        State(state.clone()),
        Path("report_lia".to_string()),
        Query(Params::new()),
    )
    .await
    .unwrap();
    assert!(response.headers().get(handlers::OPTIMIZED_HEADER).is_none());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let doc: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(doc["overview"]["total_conversations"], 1);

    let listing = handlers::list_endpoints(State(state)).await.0;
    assert_eq!(listing["endpoints"]["report_lia"]["path"], REPORT_PATH.trim_start_matches('/'));
}

#[tokio::test]
async fn test_one_shot_fetch_optimized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(REPORT_PATH))
        .and(query_param("by", "user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_report()))
        .expect(2)
        .mount(&server)
        .await;

    let cache_dir = TempDir::new().unwrap();
    let pipeline = pipeline(&server, &cache_dir);
    let query = params(&[("by", "user"), ("from", "2026-01-01")]);
    let merged = params(&[
        ("agentId", "agent-123"),
        ("by", "user"),
        ("from", "2026-01-01"),
        ("messageHistory", "true"),
    ]);
    let cache = pipeline.cache();

    let optimized = pipeline
        .fetch_optimized("report_lia", query.clone(), false)
        .await
        .unwrap();
    assert_eq!(optimized["meta"]["agent"], json!({"name": "LIA"}));
    assert!(cache.artifact_path("report_lia", &merged, Artifact::Raw).exists());
    assert!(!cache.artifact_path("report_lia", &merged, Artifact::Optimized).exists());
    assert!(!cache.artifact_path("report_lia", &merged, Artifact::Dashboard).exists());

    pipeline
        .fetch_optimized("report_lia", query, true)
        .await
        .unwrap();
    let cached = cache
        .read_json("report_lia", &merged, Artifact::Optimized)
        .await
        .unwrap();
    assert_eq!(cached, optimized);
}
