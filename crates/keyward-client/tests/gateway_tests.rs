//! Integration tests for bearer attachment and refresh-and-replay.

mod common;

use std::sync::Arc;
use std::time::Duration;

use keyward_client::{AuthGateway, ClientError, MemoryTokenStore, PendingRequest, TokenStore};
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde_json::{Value, json};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{gateway, store_with};

async fn requests_to(server: &MockServer, p: &str) -> Vec<wiremock::Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == p)
        .collect()
}

#[tokio::test]
async fn attaches_bearer_exactly_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/test"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let gw = gateway(&server.uri(), store_with("A1", "R1"));
    let body: Value = gw.get("/auth/test").await.unwrap();
    assert_eq!(body["ok"], true);

    let received = requests_to(&server, "/auth/test").await;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].headers.get_all("authorization").iter().count(), 1);
}

fn authorization_values(request: &wiremock::Request) -> Vec<String> {
    request
        .headers
        .get_all("authorization")
        .iter()
        .map(|v| v.to_str().unwrap().to_owned())
        .collect()
}

#[tokio::test]
async fn caller_authorization_is_replaced_on_every_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reports"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "A2" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reports"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&server)
        .await;

    let gw = gateway(&server.uri(), store_with("A1", "R1"));
    let request = PendingRequest::get("/reports")
        .header(AUTHORIZATION, HeaderValue::from_static("Bearer STALE"));
    gw.send(&request).await.unwrap();

    let received = requests_to(&server, "/reports").await;
    assert_eq!(received.len(), 2);
    assert_eq!(authorization_values(&received[0]), vec!["Bearer A1"]);
    assert_eq!(authorization_values(&received[1]), vec!["Bearer A2"]);
}

#[tokio::test]
async fn caller_authorization_is_dropped_without_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/public"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let gw = gateway(&server.uri(), Arc::new(MemoryTokenStore::new()));
    let request = PendingRequest::get("/public")
        .header(AUTHORIZATION, HeaderValue::from_static("Bearer STALE"));
    gw.send(&request).await.unwrap();

    let received = requests_to(&server, "/public").await;
    assert!(authorization_values(&received[0]).is_empty());
}

#[tokio::test]
async fn sends_unauthenticated_without_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/public"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let gw = gateway(&server.uri(), Arc::new(MemoryTokenStore::new()));
    let _: Value = gw.get("/public").await.unwrap();

    let received = requests_to(&server, "/public").await;
    assert!(received[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn refreshes_once_and_replays_on_401() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/test"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "detail": "expired" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token/refresh/"))
        .and(body_json(json!({ "refresh": "R1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "A2" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/test"))
        .and(header("authorization", "Bearer A2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": 7 })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with("A1", "R1");
    let gw = gateway(&server.uri(), store.clone());
    let body: Value = gw.get("/auth/test").await.unwrap();

    assert_eq!(body["data"], 7);
    assert_eq!(store.access_token().await.unwrap().as_deref(), Some("A2"));
    // No rotation in the response: the old refresh token stays.
    assert_eq!(store.refresh_token().await.unwrap().as_deref(), Some("R1"));
}

#[tokio::test]
async fn replays_post_with_the_same_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/items/"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "A2" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/items/"))
        .and(header("authorization", "Bearer A2"))
        .and(body_json(json!({ "name": "widget" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    let gw = gateway(&server.uri(), store_with("A1", "R1"));
    let created: Value = gw.post("/items/", &json!({ "name": "widget" })).await.unwrap();
    assert_eq!(created["id"], 1);
}

#[tokio::test]
async fn second_401_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/test"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "A2" })))
        .expect(1)
        .mount(&server)
        .await;

    let gw = gateway(&server.uri(), store_with("A1", "R1"));
    let err = gw.get::<Value>("/auth/test").await.unwrap_err();
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn other_errors_are_not_intercepted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forbidden"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "detail": "nope" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "A2" })))
        .expect(0)
        .mount(&server)
        .await;

    let gw = gateway(&server.uri(), store_with("A1", "R1"));
    let err = gw.get::<Value>("/forbidden").await.unwrap_err();
    match err {
        ClientError::Api { status, detail, .. } => {
            assert_eq!(status, 403);
            assert_eq!(detail.as_deref(), Some("nope"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_refresh_token_propagates_original_401() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/test"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "detail": "expired" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token/refresh/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    store.set_access_token("A1").await.unwrap();
    let gw = gateway(&server.uri(), store);

    let err = gw.get::<Value>("/auth/test").await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized { detail: Some(ref d) } if d == "expired"));
}

#[tokio::test]
async fn rejected_refresh_propagates_401_and_keeps_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/test"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token/refresh/"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "detail": "Token is invalid or expired" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with("A1", "R1");
    let gw = gateway(&server.uri(), store.clone());

    let err = gw.get::<Value>("/auth/test").await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(store.access_token().await.unwrap().as_deref(), Some("A1"));
    assert_eq!(store.refresh_token().await.unwrap().as_deref(), Some("R1"));
}

#[tokio::test]
async fn rejected_refresh_can_clear_the_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/test"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token/refresh/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let store = store_with("A1", "R1");
    let gw = AuthGateway::builder()
        .base_url(server.uri())
        .store(store.clone())
        .clear_on_refresh_failure(true)
        .build()
        .unwrap();

    assert!(gw.get::<Value>("/auth/test").await.is_err());
    assert!(store.access_token().await.unwrap().is_none());
    assert!(store.refresh_token().await.unwrap().is_none());
}

#[tokio::test]
async fn rotated_refresh_token_is_persisted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/token/refresh/"))
        .and(body_json(json!({ "refresh": "R1" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "access": "A2", "refresh": "R2" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with("A1", "R1");
    let gw = gateway(&server.uri(), store.clone());

    assert_eq!(gw.refresh().await.unwrap(), "A2");
    assert_eq!(store.access_token().await.unwrap().as_deref(), Some("A2"));
    assert_eq!(store.refresh_token().await.unwrap().as_deref(), Some("R2"));
}

#[tokio::test]
async fn concurrent_401s_share_one_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token/refresh/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access": "A2" }))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer A2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(2)
        .mount(&server)
        .await;

    let gw = gateway(&server.uri(), store_with("A1", "R1"));
    let (a, b) = tokio::join!(gw.get::<Value>("/one"), gw.get::<Value>("/two"));
    assert_eq!(a.unwrap()["ok"], true);
    assert_eq!(b.unwrap()["ok"], true);
}

#[tokio::test]
async fn transport_errors_propagate() {
    let gw = gateway(&common::unreachable_base_url(), store_with("A1", "R1"));
    let err = gw.get::<Value>("/auth/test").await.unwrap_err();
    assert!(matches!(err, ClientError::Http(_)));
}

#[tokio::test]
async fn delete_accepts_no_content() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/items/1/"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let gw = gateway(&server.uri(), store_with("A1", "R1"));
    gw.delete("/items/1/").await.unwrap();
}

#[tokio::test]
async fn put_sends_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/items/1/"))
        .and(header("authorization", "Bearer A1"))
        .and(body_json(json!({ "name": "gadget" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1, "name": "gadget" })))
        .expect(1)
        .mount(&server)
        .await;

    let gw = gateway(&server.uri(), store_with("A1", "R1"));
    let updated: Value = gw.put("/items/1/", &json!({ "name": "gadget" })).await.unwrap();
    assert_eq!(updated["name"], "gadget");
}

#[tokio::test]
async fn patch_sends_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/items/1/"))
        .and(header("authorization", "Bearer A1"))
        .and(body_json(json!({ "archived": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1, "archived": true })))
        .expect(1)
        .mount(&server)
        .await;

    let gw = gateway(&server.uri(), store_with("A1", "R1"));
    let patched: Value = gw.patch("/items/1/", &json!({ "archived": true })).await.unwrap();
    assert_eq!(patched["archived"], true);
}
