//! HTTP-level tests for the session and authenticated client.

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use spacelift_client::{
    ApiKeySession, AuthenticatedClient, Credentials, ErrorKind, GraphQlRequest, HttpTransport,
    Session, CLIENT_IDENTIFIER,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeatsQuery {
    usage: Seats,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Seats {
    used_seats: i64,
}

const SEATS_QUERY: &str = "query { usage { usedSeats } }";

fn token_body(jwt: &str) -> serde_json::Value {
    json!({
        "data": {
            "apiKeyUser": {
                "id": "key-id",
                "jwt": jwt,
                "validUntil": Utc::now().timestamp() + 3600,
            }
        }
    })
}

async fn mount_token(server: &MockServer, jwt: &str) {
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("apiKeyUser"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(jwt)))
        .up_to_n_times(1)
        .expect(1)
        .mount(server)
        .await;
}

fn transport() -> Arc<HttpTransport> {
    Arc::new(HttpTransport::new(reqwest::Client::new()))
}

#[tokio::test]
async fn test_connect_exchanges_api_key() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("\"id\":\"key-id\""))
        .and(body_string_contains("\"secret\":\"key-secret\""))
        .and(header("user-agent", CLIENT_IDENTIFIER))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("jwt-1")))
        .expect(1)
        .mount(&server)
        .await;

    let session = ApiKeySession::connect(
        transport(),
        &server.uri(),
        Credentials::new("key-id", "key-secret"),
    )
    .await
    .expect("session should connect");

    assert_eq!(session.bearer_token().unwrap(), "jwt-1");
    assert!(session.is_fresh());
}

#[tokio::test]
async fn test_query_presents_bearer_token() {
    let server = MockServer::start().await;
    mount_token(&server, "jwt-1").await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer jwt-1"))
        .and(body_string_contains("usedSeats"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "usage": { "usedSeats": 7 } } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport();
    let session = ApiKeySession::connect(
        transport.clone(),
        &server.uri(),
        Credentials::new("key-id", "key-secret"),
    )
    .await
    .unwrap();
    let client = AuthenticatedClient::new(transport, Arc::new(session));

    let result: SeatsQuery = client.query(&GraphQlRequest::new(SEATS_QUERY)).await.unwrap();
    assert_eq!(result.usage.used_seats, 7);
}

#[tokio::test]
async fn test_unauthorized_query_is_retried_with_refreshed_token() {
    let server = MockServer::start().await;
    mount_token(&server, "jwt-1").await;
    mount_token(&server, "jwt-2").await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer jwt-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "errors": [{ "message": "unauthorized" }] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer jwt-2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "usage": { "usedSeats": 3 } } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport();
    let session = ApiKeySession::connect(
        transport.clone(),
        &server.uri(),
        Credentials::new("key-id", "key-secret"),
    )
    .await
    .unwrap();
    let client = AuthenticatedClient::new(transport, Arc::new(session));

    let result: SeatsQuery = client.query(&GraphQlRequest::new(SEATS_QUERY)).await.unwrap();
    assert_eq!(result.usage.used_seats, 3);
    assert_eq!(client.session().bearer_token().unwrap(), "jwt-2");
}

#[tokio::test]
async fn test_remote_errors_are_not_retried() {
    let server = MockServer::start().await;
    mount_token(&server, "jwt-1").await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer jwt-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "errors": [{ "message": "field 'usage' not found" }] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport();
    let session = ApiKeySession::connect(
        transport.clone(),
        &server.uri(),
        Credentials::new("key-id", "key-secret"),
    )
    .await
    .unwrap();
    let client = AuthenticatedClient::new(transport, Arc::new(session));

    let err = client
        .query::<SeatsQuery>(&GraphQlRequest::new(SEATS_QUERY))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteQuery);
}

#[tokio::test]
async fn test_rejected_api_key_fails_connect() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "apiKeyUser": null } })),
        )
        .mount(&server)
        .await;

    let err = ApiKeySession::connect(
        transport(),
        &server.uri(),
        Credentials::new("key-id", "wrong"),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthExchange);
}

#[tokio::test]
async fn test_gateway_error_is_transport_error() {
    let server = MockServer::start().await;
    mount_token(&server, "jwt-1").await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer jwt-1"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let transport = transport();
    let session = ApiKeySession::connect(
        transport.clone(),
        &server.uri(),
        Credentials::new("key-id", "key-secret"),
    )
    .await
    .unwrap();
    let client = AuthenticatedClient::new(transport, Arc::new(session));

    let err = client
        .query::<SeatsQuery>(&GraphQlRequest::new(SEATS_QUERY))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn test_slow_server_hits_http_timeout() {
    let server = MockServer::start().await;
    mount_token(&server, "jwt-1").await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer jwt-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "usage": { "usedSeats": 1 } } }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let transport = Arc::new(HttpTransport::new(http));
    let session = ApiKeySession::connect(
        transport.clone(),
        &server.uri(),
        Credentials::new("key-id", "key-secret"),
    )
    .await
    .unwrap();
    let client = AuthenticatedClient::new(transport, Arc::new(session));

    let err = client
        .query::<SeatsQuery>(&GraphQlRequest::new(SEATS_QUERY))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
}
