mod common;

use chrono::{
    TimeZone,
    Utc,
};
use common::{
    CannedServer,
    RecordedRequest,
    Reply,
};
use marklogic_metrics_collector::{
    CollectError,
    ManageClient,
    Normalizer,
    TimeWindow,
};
use marklogic_metrics_config::{
    AuthScheme,
    ManageConfig,
    ResourceKind,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;

fn client(server: &CannedServer, auth: AuthScheme) -> ManageClient {
    ManageClient::new(ManageConfig {
        url: server.url().parse().unwrap(),
        username: "admin".to_string(),
        password: "admin".into(),
        auth,
        request_timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn window() -> TimeWindow {
    TimeWindow::current_hour(Utc.with_ymd_and_hms(2024, 3, 7, 14, 42, 17).unwrap())
}

fn host_metrics() -> serde_json::Value {
    json!({
        "host-metrics-list": {
            "metrics-relations": {
                "host-metrics-list": {
                    "metrics": [
                        { "cpu-usage": { "summary": { "data": { "entry": [{ "value": "12.5" }] } } } }
                    ]
                }
            }
        }
    })
}

fn host_default_view() -> serde_json::Value {
    json!({
        "host-default-list": {
            "list-items": { "list-item": [{ "nameref": "node1" }] }
        }
    })
}

fn is_metrics_view(request: &RecordedRequest) -> bool {
    request.query.get("view").map(String::as_str) == Some("metrics")
}

#[tokio::test]
async fn fetches_host_metrics_and_resolves_the_host_name() {
    let server = CannedServer::start(|request| {
        if is_metrics_view(request) {
            Reply::json(200, host_metrics())
        } else {
            Reply::json(200, host_default_view())
        }
    })
    .await;

    let raw = client(&server, AuthScheme::Anonymous)
        .fetch_resource(ResourceKind::Hosts, window())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(raw.identity.as_deref(), Some("node1"));

    let normalized = Normalizer::default().normalize(ResourceKind::Hosts, &raw);
    assert_eq!(normalized.observations.len(), 1);
    assert_eq!(normalized.observations[0].value, 12.5);
    assert_eq!(normalized.observations[0].tag("host"), Some("node1"));

    let requests = server.requests();
    let metrics = requests.iter().find(|r| is_metrics_view(r)).unwrap();
    assert_eq!(metrics.path, "/manage/v2/hosts");
    assert_eq!(metrics.query["format"], "json");
    assert_eq!(metrics.query["period"], "hour");
    assert_eq!(metrics.query["start"], "2024-03-07T14:00:00Z");
    assert_eq!(metrics.query["end"], "2024-03-07T14:42:17Z");
    assert_eq!(metrics.headers["accept"], "application/json");

    let lookup = requests.iter().find(|r| !is_metrics_view(r)).unwrap();
    assert_eq!(lookup.path, "/manage/v2/hosts");
    assert_eq!(lookup.query.get("start"), None);
    assert_eq!(lookup.query["format"], "json");
}

#[tokio::test]
async fn databases_need_no_lookup() {
    let server = CannedServer::start(|_| Reply::json(200, json!({ "database-metrics-list": {} }))).await;

    let raw = client(&server, AuthScheme::Anonymous)
        .fetch_resource(ResourceKind::Databases, window())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(raw.identity, None);
    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/manage/v2/databases");
}

#[tokio::test]
async fn failed_host_lookup_keeps_the_metrics() {
    let server = CannedServer::start(|request| {
        if is_metrics_view(request) {
            Reply::json(200, host_metrics())
        } else {
            Reply::text(404, "not found")
        }
    })
    .await;

    let raw = client(&server, AuthScheme::Anonymous)
        .fetch_resource(ResourceKind::Hosts, window())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(raw.identity, None);

    let normalized = Normalizer::default().normalize(ResourceKind::Hosts, &raw);
    assert_eq!(normalized.observations[0].tag("host"), Some("unknown"));
}

#[tokio::test]
async fn server_errors_are_transport_errors() {
    let server = CannedServer::start(|_| Reply::text(500, "XDMP-INTERNAL")).await;

    let err = client(&server, AuthScheme::Anonymous)
        .fetch_resource(ResourceKind::Databases, window())
        .await
        .unwrap_err();

    match err {
        CollectError::Transport { status, message } => {
            assert_eq!(status, Some(500));
            assert!(message.contains("XDMP-INTERNAL"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn rejected_credentials_are_auth_errors() {
    let server = CannedServer::start(|_| Reply::text(401, "Unauthorized")).await;

    let err = client(&server, AuthScheme::Basic)
        .fetch_resource(ResourceKind::Hosts, window())
        .await
        .unwrap_err();

    assert!(err.is_auth(), "{err:?}");
    assert!(server.requests()[0].headers["authorization"].starts_with("Basic "));
}

#[tokio::test]
async fn non_json_bodies_are_skipped_without_error() {
    let server = CannedServer::start(|request| {
        if is_metrics_view(request) {
            Reply::text(200, "<html>maintenance</html>")
        } else {
            Reply::json(200, host_default_view())
        }
    })
    .await;

    let result = client(&server, AuthScheme::Anonymous)
        .fetch_resource(ResourceKind::Hosts, window())
        .await
        .unwrap();
    assert_eq!(result, None);

    let server = CannedServer::start(|_| Reply::json(200, json!(["not", "an", "object"]))).await;
    let result = client(&server, AuthScheme::Anonymous)
        .fetch_resource(ResourceKind::Databases, window())
        .await
        .unwrap();
    assert_eq!(result, None);
}

#[tokio::test]
async fn answers_digest_challenges() {
    let server = CannedServer::start(|request| match request.headers.get("authorization") {
        Some(value) if value.starts_with("Digest ") => Reply::json(200, json!({ "database-metrics-list": {} })),
        _ => Reply {
            status: 401,
            headers: vec![(
                "WWW-Authenticate",
                r#"Digest realm="public", qop="auth", nonce="a8f3c1d2e4b5", opaque="5ccc069c403ebaf9f0171e9517f40e41""#
                    .to_string(),
            )],
            body: "Unauthorized".to_string(),
        },
    })
    .await;

    let raw = client(&server, AuthScheme::Digest)
        .fetch_resource(ResourceKind::Databases, window())
        .await
        .unwrap();
    assert!(raw.is_some());

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    let authorization = requests
        .iter()
        .find_map(|r| r.headers.get("authorization"))
        .unwrap();
    assert!(authorization.contains(r#"username="admin""#), "{authorization}");
    assert!(authorization.contains(r#"realm="public""#), "{authorization}");
    assert!(authorization.contains("uri=\"/manage/v2/databases?format=json"), "{authorization}");
}
