#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::FixedOffset;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use c2b_gateway::{
    build_router,
    config::{AppConfig, StorageBackend},
    database::{MemoryStore, Store},
    services::{daraja_service::DarajaService, token_cache::InMemoryTokenCache},
    state::AppState,
};

pub const ADMIN_KEY: &str = "test-admin-key";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
}

pub fn test_config(daraja_base_url: &str) -> AppConfig {
    AppConfig {
        storage_backend: StorageBackend::Memory,
        database_url: String::new(),
        database_name: "c2b_test".to_string(),
        mpesa_environment: "sandbox".to_string(),
        daraja_base_url: daraja_base_url.to_string(),
        daraja_timeout: Duration::from_secs(5),
        public_base_url: "https://pay.example.com".to_string(),
        admin_api_key: ADMIN_KEY.to_string(),
        trust_proxy_headers: false,
        provider_utc_offset: FixedOffset::east_opt(3 * 3600).unwrap(),
        port: 0,
        host: "127.0.0.1".to_string(),
    }
}

pub fn test_app() -> TestApp {
    test_app_with_daraja("http://127.0.0.1:9")
}

pub fn test_app_with_daraja(daraja_base_url: &str) -> TestApp {
    test_app_with_config(test_config(daraja_base_url))
}

pub fn test_app_with_config(config: AppConfig) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    TestApp {
        router: router_with_store(config, store.clone()),
        store,
    }
}

/// Router over an arbitrary store, for tests that swap in their own implementation.
pub fn router_with_store(config: AppConfig, shared: Arc<dyn Store>) -> Router {
    let daraja = DarajaService::new(
        &config.daraja_base_url,
        config.daraja_timeout,
        Arc::new(InMemoryTokenCache::new()),
    )
    .unwrap();

    build_router(AppState::new(config, shared, Arc::new(daraja)))
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::String(
                String::from_utf8_lossy(&bytes).into_owned(),
            ))
        };
        (status, body)
    }

    /// Admin GET returning headers and the undecoded body.
    pub async fn admin_raw(&self, uri: &str) -> (StatusCode, HeaderMap, String) {
        let request = Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", ADMIN_KEY))
            .body(Body::empty())
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
    }

    pub async fn admin(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", ADMIN_KEY));
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn callback(
        &self,
        merchant_id: &str,
        token: &str,
        kind: &str,
        body: &str,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/webhooks/c2b/{}/{}/{}/", merchant_id, token, kind))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Creates a merchant through the admin API and returns `(id, webhook_token)`.
    pub async fn create_merchant(&self, shortcode: &str) -> (String, String) {
        let (status, body) = self
            .admin(
                Method::POST,
                "/api/merchants",
                Some(serde_json::json!({
                    "name": format!("Shop {}", shortcode),
                    "shortcode": shortcode,
                    "type": "PAYBILL",
                    "consumer_key": "ck",
                    "consumer_secret": "cs",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        (
            body["merchant"]["id"].as_str().unwrap().to_string(),
            body["webhook_token"].as_str().unwrap().to_string(),
        )
    }
}
