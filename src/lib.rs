//! Multi-merchant M-Pesa C2B webhook gateway.
//!
//! Receives validation and confirmation callbacks on per-merchant tokenized
//! URLs, applies each merchant's acceptance rule, logs every callback and
//! keeps one reconciled ledger row per provider transaction.

use axum::{
    extract::State,
    http::Method,
    middleware::from_fn_with_state,
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod config;
pub mod database;
pub mod dtos;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use middleware::auth::admin_auth_middleware;
use state::AppState;

pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_credentials(false);

    let admin = Router::new()
        .nest("/api/merchants", routes::merchants::routes())
        .nest("/api/transactions", routes::transactions::routes())
        .route_layer(from_fn_with_state(app_state.clone(), admin_auth_middleware));

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/api/health", get(api_health_check))
        .nest("/webhooks/c2b", routes::webhooks::routes())
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

async fn root_handler() -> &'static str {
    "🚀 M-Pesa C2B Gateway"
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn api_health_check(State(state): State<AppState>) -> Json<Value> {
    let storage_status = match state.store.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!("Storage ping failed: {}", e);
            "disconnected"
        }
    };

    Json(json!({
        "status": "healthy",
        "storage": storage_status,
        "environment": state.config.mpesa_environment,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
