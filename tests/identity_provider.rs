//! Integration tests for the identity client against a local HTTP provider.
//!
//! The mock mirrors the provider's two endpoints under a `/v2/xbox` base so the
//! client's path handling is exercised end to end.

use axum::{extract::Path, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpListener;

use rolegate::config::IdentityConfig;
use rolegate::identity::{resolve_claim, IdentityClient, IdentityLookupError, IdentityProvider};

/// Mock identity provider.
///
/// - `Steve` resolves to a string xuid
/// - `Number Guy` resolves to a numeric xuid
/// - `Ghost` answers 200 with no xuid field
/// - `Sleepy` never answers within the client timeout
/// - `Busy` and `Throttled` answer 503 and 429
/// - anything else is 404
struct MockProvider {
    base_url: String,
    _task: tokio::task::JoinHandle<()>,
}

impl MockProvider {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let router = Router::new()
            .route("/v2/xbox/xuid/{gamertag}", get(xuid))
            .route("/v2/xbox/gamertag/{xuid}", get(gamertag));

        let task = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: format!("http://{}/v2/xbox", addr),
            _task: task,
        }
    }

    fn client(&self, timeout_secs: u64) -> IdentityClient {
        IdentityClient::new(&IdentityConfig {
            base_url: self.base_url.clone(),
            timeout_secs,
        })
        .unwrap()
    }
}

async fn xuid(Path(gamertag): Path<String>) -> impl IntoResponse {
    match gamertag.to_lowercase().as_str() {
        "steve" => (StatusCode::OK, Json(json!({ "xuid": "2535400000000001" }))),
        "number guy" => (StatusCode::OK, Json(json!({ "xuid": 2535400000000002u64 }))),
        "ghost" => (StatusCode::OK, Json(json!({ "message": "no such player" }))),
        "busy" => (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "message": "down" }))),
        "throttled" => (StatusCode::TOO_MANY_REQUESTS, Json(json!({ "message": "slow down" }))),
        "sleepy" => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            (StatusCode::OK, Json(json!({ "xuid": "1" })))
        }
        _ => (StatusCode::NOT_FOUND, Json(json!({ "message": "not found" }))),
    }
}

async fn gamertag(Path(xuid): Path<String>) -> impl IntoResponse {
    match xuid.as_str() {
        "2535400000000001" => (StatusCode::OK, Json(json!({ "gamertag": "Steve" }))),
        "2535400000000002" => (StatusCode::OK, Json(json!({ "gamertag": "Number Guy" }))),
        _ => (StatusCode::NOT_FOUND, Json(json!({ "message": "not found" }))),
    }
}

#[tokio::test]
async fn test_resolves_string_xuid() {
    let server = MockProvider::start().await;
    let client = server.client(5);

    assert_eq!(client.resolve_id("Steve").await.unwrap(), "2535400000000001");
    assert_eq!(
        client.resolve_canonical_name("2535400000000001").await.unwrap(),
        "Steve"
    );
}

#[tokio::test]
async fn test_resolves_numeric_xuid() {
    let server = MockProvider::start().await;
    let client = server.client(5);

    assert_eq!(client.resolve_id("Number Guy").await.unwrap(), "2535400000000002");
}

#[tokio::test]
async fn test_unknown_gamertag_is_not_found() {
    let server = MockProvider::start().await;
    let client = server.client(5);

    assert_eq!(
        client.resolve_id("Nobody").await,
        Err(IdentityLookupError::NotFound)
    );
}

#[tokio::test]
async fn test_missing_xuid_field_is_not_found() {
    let server = MockProvider::start().await;
    let client = server.client(5);

    assert_eq!(
        client.resolve_id("Ghost").await,
        Err(IdentityLookupError::NotFound)
    );
}

#[tokio::test]
async fn test_provider_outage_is_transport_error() {
    let server = MockProvider::start().await;
    let client = server.client(5);

    for gamertag in ["Busy", "Throttled"] {
        assert!(matches!(
            client.resolve_id(gamertag).await,
            Err(IdentityLookupError::Transport(_))
        ));
    }
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let server = MockProvider::start().await;
    let client = server.client(1);

    assert_eq!(
        client.resolve_id("Sleepy").await,
        Err(IdentityLookupError::Timeout)
    );
}

#[tokio::test]
async fn test_claim_round_trip_ignores_case() {
    let server = MockProvider::start().await;
    let client = server.client(5);

    let identity = resolve_claim(&client, "  sTeVe ").await.unwrap();
    assert_eq!(identity.claimed_name, "sTeVe");
    assert_eq!(identity.canonical_name, "Steve");
    assert!(identity.matches());
}

#[tokio::test]
async fn test_unreachable_provider_is_transport_error() {
    // Bind then drop to get a port with nothing listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = IdentityClient::new(&IdentityConfig {
        base_url: format!("http://{}", addr),
        timeout_secs: 2,
    })
    .unwrap();

    assert!(matches!(
        client.resolve_id("Steve").await,
        Err(IdentityLookupError::Transport(_))
    ));
}
