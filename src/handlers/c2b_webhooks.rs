// handlers/c2b_webhooks.rs
use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde_json::json;
use std::collections::BTreeMap;
use std::net::SocketAddr;

use crate::errors::Result;
use crate::models::EventKind;
use crate::services::dispatcher::{CallbackMeta, DispatchOutcome};
use crate::state::AppState;

pub async fn c2b_validation(
    State(state): State<AppState>,
    Path((merchant_id, token)): Path<(String, String)>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    handle_callback(
        &state,
        EventKind::Validation,
        &merchant_id,
        &token,
        connect_info,
        &headers,
        &body,
    )
    .await
}

pub async fn c2b_confirmation(
    State(state): State<AppState>,
    Path((merchant_id, token)): Path<(String, String)>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    handle_callback(
        &state,
        EventKind::Confirmation,
        &merchant_id,
        &token,
        connect_info,
        &headers,
        &body,
    )
    .await
}

async fn handle_callback(
    state: &AppState,
    kind: EventKind,
    merchant_id: &str,
    token: &str,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response> {
    let meta = CallbackMeta {
        headers: capture_headers(headers),
        source_ip: client_ip(state.config.trust_proxy_headers, headers, connect_info),
    };

    let outcome = state
        .dispatcher
        .dispatch(kind, merchant_id, token, body, meta)
        .await?;

    Ok(match outcome {
        DispatchOutcome::NotFound => {
            (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found" }))).into_response()
        }
        // Always 200: Daraja retries anything else.
        DispatchOutcome::Respond(response) => (StatusCode::OK, Json(response)).into_response(),
    })
}

fn capture_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut captured: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        captured
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    captured
}

fn client_ip(
    trust_proxy_headers: bool,
    headers: &HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Option<String> {
    if trust_proxy_headers {
        // First hop is the original client.
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        if let Some(ip) = forwarded {
            return Some(ip.to_string());
        }
    }
    connect_info.map(|ConnectInfo(addr)| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_only_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("196.201.214.200, 10.0.0.1"));
        let peer = Some(ConnectInfo(SocketAddr::from(([10, 0, 0, 1], 443))));

        assert_eq!(
            client_ip(true, &headers, peer).as_deref(),
            Some("196.201.214.200")
        );
        assert_eq!(client_ip(false, &headers, peer).as_deref(), Some("10.0.0.1"));
        assert_eq!(client_ip(false, &HeaderMap::new(), None), None);
    }

    #[test]
    fn repeated_headers_are_joined() {
        let mut headers = HeaderMap::new();
        headers.append("x-trace", HeaderValue::from_static("a"));
        headers.append("x-trace", HeaderValue::from_static("b"));
        assert_eq!(capture_headers(&headers)["x-trace"], "a, b");
    }
}
