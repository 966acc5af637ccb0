// handlers/daraja_handlers.rs
use axum::{
    extract::{Path, State},
    response::Json,
};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::{
    dtos::merchant_dtos::SimulatePaymentRequest,
    errors::Result,
    handlers::merchants::load_merchant,
    state::AppState,
};

const DEFAULT_SIMULATE_AMOUNT: &str = "1";
const DEFAULT_SIMULATE_MSISDN: &str = "254708374149";
const DEFAULT_SIMULATE_BILL_REF: &str = "TEST";

// Register this gateway's callback URLs for the merchant's shortcode
pub async fn register_urls(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let merchant = load_merchant(&state, &id).await?;
    let (validation_url, confirmation_url) = state
        .config
        .webhook_urls(&merchant.id.to_hex(), &merchant.webhook_token);

    info!("📡 Registering C2B URLs for shortcode {}", merchant.shortcode);
    let provider_response = state
        .daraja
        .register_c2b_urls(
            &merchant.consumer_key,
            &merchant.consumer_secret,
            &merchant.shortcode,
            merchant.response_type.as_str(),
            &validation_url,
            &confirmation_url,
        )
        .await
        .map_err(|e| {
            error!("❌ RegisterURL failed for {}: {}", merchant.shortcode, e);
            e
        })?;

    Ok(Json(json!({
        "success": true,
        "validation_url": validation_url,
        "confirmation_url": confirmation_url,
        "provider_response": provider_response,
    })))
}

// Ask the sandbox to send a test payment to the merchant's shortcode
pub async fn simulate_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<SimulatePaymentRequest>>,
) -> Result<Json<Value>> {
    let merchant = load_merchant(&state, &id).await?;
    let request = body.map(|Json(r)| r).unwrap_or_default();

    let amount = non_empty(request.amount, DEFAULT_SIMULATE_AMOUNT);
    let msisdn = non_empty(request.msisdn, DEFAULT_SIMULATE_MSISDN);
    let bill_ref = non_empty(request.bill_ref, DEFAULT_SIMULATE_BILL_REF);
    let command_id = non_empty(
        request.command_id,
        merchant.shortcode_type.simulate_command(),
    );

    let provider_response = state
        .daraja
        .simulate_c2b(
            &merchant.consumer_key,
            &merchant.consumer_secret,
            &merchant.shortcode,
            &amount,
            &msisdn,
            &bill_ref,
            &command_id,
        )
        .await?;

    info!("🧪 Simulated C2B payment of {} to {}", amount, merchant.shortcode);
    Ok(Json(json!({
        "success": true,
        "command_id": command_id,
        "provider_response": provider_response,
    })))
}

fn non_empty(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
