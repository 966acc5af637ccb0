mod common;

use axum::{
    extract::State,
    http::{header, HeaderMap, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use c2b_gateway::services::{
    daraja_service::{DarajaError, DarajaService},
    token_cache::InMemoryTokenCache,
};
use common::{test_app_with_config, test_app_with_daraja, test_config};

const ACCESS_TOKEN: &str = "sandbox-token";

/// Stand-in for the Daraja sandbox. Counts OAuth calls and echoes posted bodies.
async fn spawn_provider() -> (String, Arc<AtomicUsize>) {
    let oauth_hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/oauth/v1/generate", get(oauth))
        .route("/mpesa/c2b/v1/registerurl", post(echo))
        .route("/mpesa/c2b/v1/simulate", post(echo))
        .with_state(oauth_hits.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), oauth_hits)
}

async fn oauth(State(hits): State<Arc<AtomicUsize>>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    hits.fetch_add(1, Ordering::SeqCst);
    // base64("ck:cs")
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some("Basic Y2s6Y3M=");
    if !authorized {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"errorMessage": "Invalid Authentication passed"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"access_token": ACCESS_TOKEN, "expires_in": "3599"})),
    )
}

async fn echo(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if bearer != Some(format!("Bearer {}", ACCESS_TOKEN)) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"errorMessage": "Invalid Access Token"})));
    }
    (
        StatusCode::OK,
        Json(json!({"ResponseDescription": "Success", "received": body})),
    )
}

#[tokio::test]
async fn register_urls_sends_tokenized_callbacks() {
    let (base_url, hits) = spawn_provider().await;
    let app = test_app_with_daraja(&base_url);
    let (id, token) = app.create_merchant("600400").await;
    let uri = format!("/api/merchants/{}/register-urls", id);

    let (status, body) = app.admin(Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let sent = &body["provider_response"]["received"];
    assert_eq!(sent["ShortCode"], "600400");
    assert_eq!(sent["ResponseType"], "Completed");
    assert_eq!(
        sent["ValidationURL"],
        format!("https://pay.example.com/webhooks/c2b/{}/{}/validation/", id, token)
    );
    assert_eq!(sent["ConfirmationURL"], body["confirmation_url"]);

    // Second call reuses the cached access token.
    let (status, _) = app.admin(Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn register_urls_refuses_unreachable_callback_urls() {
    let (base_url, hits) = spawn_provider().await;
    let mut config = test_config(&base_url);
    config.public_base_url = "http://localhost:8000".to_string();
    let app = test_app_with_config(config);
    let (id, _) = app.create_merchant("600401").await;

    let (status, body) = app
        .admin(Method::POST, &format!("/api/merchants/{}/register-urls", id), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("https://"));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn simulate_defaults_follow_shortcode_type() {
    let (base_url, _) = spawn_provider().await;
    let app = test_app_with_daraja(&base_url);
    let (paybill, _) = app.create_merchant("600402").await;

    let (status, body) = app
        .admin(Method::POST, &format!("/api/merchants/{}/simulate", paybill), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let sent = &body["provider_response"]["received"];
    assert_eq!(sent["CommandID"], "CustomerPayBillOnline");
    assert_eq!(sent["Amount"], "1");
    assert_eq!(sent["Msisdn"], "254708374149");
    assert_eq!(sent["BillRefNumber"], "TEST");

    let (_, created) = app
        .admin(
            Method::POST,
            "/api/merchants",
            Some(json!({
                "name": "Till",
                "shortcode": "600403",
                "type": "TILL",
                "consumer_key": "ck",
                "consumer_secret": "cs",
            })),
        )
        .await;
    let till = created["merchant"]["id"].as_str().unwrap();

    let (status, body) = app
        .admin(
            Method::POST,
            &format!("/api/merchants/{}/simulate", till),
            Some(json!({"amount": "250", "bill_ref": "INV-9"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["command_id"], "CustomerBuyGoodsOnline");
    let sent = &body["provider_response"]["received"];
    assert_eq!(sent["Amount"], "250");
    assert_eq!(sent["BillRefNumber"], "INV-9");
    assert_eq!(sent["ShortCode"], "600403");
}

#[tokio::test]
async fn provider_failures_surface_as_bad_gateway() {
    let (base_url, _) = spawn_provider().await;
    let app = test_app_with_daraja(&base_url);

    let (_, created) = app
        .admin(
            Method::POST,
            "/api/merchants",
            Some(json!({
                "name": "Bad creds",
                "shortcode": "600404",
                "type": "PAYBILL",
                "consumer_key": "wrong",
                "consumer_secret": "creds",
            })),
        )
        .await;
    let id = created["merchant"]["id"].as_str().unwrap();

    let (status, body) = app
        .admin(Method::POST, &format!("/api/merchants/{}/simulate", id), None)
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn unreachable_provider_is_a_transport_error() {
    // Nothing listens on the discard port.
    let app = test_app_with_daraja("http://127.0.0.1:9");
    let (id, _) = app.create_merchant("600405").await;

    let (status, _) = app
        .admin(Method::POST, &format!("/api/merchants/{}/simulate", id), None)
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn tokens_are_cached_per_credential_pair() {
    let (base_url, hits) = spawn_provider().await;
    let daraja = DarajaService::new(
        &base_url,
        Duration::from_secs(5),
        Arc::new(InMemoryTokenCache::new()),
    )
    .unwrap();

    assert_eq!(daraja.get_access_token("ck", "cs").await.unwrap(), ACCESS_TOKEN);
    assert_eq!(daraja.get_access_token("ck", "cs").await.unwrap(), ACCESS_TOKEN);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // Failed fetches are not cached.
    let err = daraja.get_access_token("ck", "rotated").await.unwrap_err();
    assert!(matches!(err, DarajaError::Transport(_)));
    assert!(daraja.get_access_token("ck", "rotated").await.is_err());
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}
