// SPDX-License-Identifier: MIT OR Apache-2.0
//! REST client behaviour against a mock HTTP server.

use bas_config::RemoteSettings;
use bas_remote::{HttpOperationClient, OperationClient, RemoteError, check_health};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(server: &MockServer) -> RemoteSettings {
    RemoteSettings {
        enabled: true,
        base_url: format!("{}/", server.uri()),
        api_key: Some("k-123".into()),
        ..RemoteSettings::default()
    }
}

#[tokio::test]
async fn create_forces_operations_index_and_sends_key() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/rest"))
        .and(header("KEY", "k-123"))
        .and(header("Authorization", "Bearer k-123"))
        .and(body_partial_json(json!({"index": "operations", "name": "op"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "op-9", "state": "paused"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpOperationClient::new(&settings(&server)).unwrap();
    let op = client
        .create_operation(json!({"index": "adversaries", "name": "op"}))
        .await
        .unwrap();
    assert_eq!(op.id.as_deref(), Some("op-9"));
}

#[tokio::test]
async fn get_operation_and_links() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/rest"))
        .and(body_partial_json(json!({"index": "operations", "id": "op-9"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "op-9", "state": "running", "chain": [{"id": "l1"}, {"id": "l2"}]}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/links/l1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "l1", "output": "ok"})))
        .mount(&server)
        .await;

    let client = HttpOperationClient::new(&settings(&server)).unwrap();
    let op = client.get_operation("op-9").await.unwrap();
    assert_eq!(op.state.as_deref(), Some("running"));
    let links = client.operation_links("op-9").await.unwrap();
    assert_eq!(links.len(), 2);
    assert_eq!(client.link_detail("l1").await.unwrap()["output"], "ok");
}

#[tokio::test]
async fn delete_sends_operation_id_and_key() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/rest"))
        .and(header("KEY", "k-123"))
        .and(body_partial_json(json!({"index": "operations", "id": "op-9"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpOperationClient::new(&settings(&server)).unwrap();
    assert_eq!(client.delete_operation("op-9").await.unwrap(), Value::Null);
}

#[tokio::test]
async fn status_codes_map_to_error_kinds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/agents"))
        .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/links/missing"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "boom"})))
        .mount(&server)
        .await;

    let client = HttpOperationClient::new(&settings(&server)).unwrap();
    match client.ping().await.unwrap_err() {
        RemoteError::Authentication { status, payload } => {
            assert_eq!(status, 403);
            assert_eq!(payload, json!({"raw": "denied"}));
        }
        other => panic!("unexpected: {other}"),
    }
    match client.link_detail("missing").await.unwrap_err() {
        RemoteError::Api { status, payload, .. } => {
            assert_eq!(status, 500);
            assert_eq!(payload["error"], "boom");
        }
        other => panic!("unexpected: {other}"),
    }
}

#[tokio::test]
async fn empty_body_is_null() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/rest"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    let client = HttpOperationClient::new(&settings(&server)).unwrap();
    assert!(client.set_operation_state("op-9", "running").await.unwrap().is_null());
}

#[tokio::test]
async fn unreachable_service_is_unavailable() {
    let server = MockServer::start().await;
    let s = settings(&server);
    drop(server);
    let client = HttpOperationClient::new(&s).unwrap();
    assert!(matches!(client.ping().await.unwrap_err(), RemoteError::Unavailable(_)));
    let report = check_health(&s).await;
    assert!(!report.healthy);
    assert_eq!(report.reason, "unreachable");
}

#[tokio::test]
async fn health_reports_ok_and_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/agents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/agents"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let s = settings(&server);
    let first = check_health(&s).await;
    assert!(first.healthy);
    assert_eq!(first.reason, "ok");
    let second = check_health(&s).await;
    assert_eq!(second.reason, "http 502");
}
