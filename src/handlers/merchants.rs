// handlers/merchants.rs
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use serde_json::{json, Value};
use tracing::{info, warn};
use validator::Validate;

use crate::{
    dtos::merchant_dtos::{
        CreateMerchantRequest, EventsQuery, MerchantCreatedResponse, UpdateMerchantRequest,
        UpsertRuleRequest,
    },
    errors::{AppError, Result},
    models::{
        IncomingEventView, Merchant, MerchantSummary, MerchantUpdate, ValidationRule,
        ValidationRuleView,
    },
    services::rule_engine::{self, PatternCheck},
    state::AppState,
};

const DEFAULT_EVENT_LIMIT: usize = 50;
const MAX_EVENT_LIMIT: usize = 500;

pub(crate) async fn load_merchant(state: &AppState, id: &str) -> Result<Merchant> {
    let id = ObjectId::parse_str(id)?;
    state
        .store
        .find_merchant(&id)
        .await?
        .ok_or(AppError::NotFound("Merchant"))
}

pub async fn create_merchant(
    State(state): State<AppState>,
    Json(payload): Json<CreateMerchantRequest>,
) -> Result<(StatusCode, Json<MerchantCreatedResponse>)> {
    payload.validate()?;
    info!("🏪 Creating merchant {} ({})", payload.name, payload.shortcode);

    let merchant = Merchant::new(
        payload.name.trim().to_string(),
        payload.shortcode,
        payload.shortcode_type,
        payload.consumer_key,
        payload.consumer_secret,
        payload.response_type,
    );
    state.store.insert_merchant(&merchant).await?;

    let (validation_url, confirmation_url) = state
        .config
        .webhook_urls(&merchant.id.to_hex(), &merchant.webhook_token);

    info!("✅ Merchant created: {}", merchant.id);
    Ok((
        StatusCode::CREATED,
        Json(MerchantCreatedResponse {
            success: true,
            merchant: MerchantSummary::from(&merchant),
            webhook_token: merchant.webhook_token.clone(),
            validation_url,
            confirmation_url,
        }),
    ))
}

pub async fn list_merchants(State(state): State<AppState>) -> Result<Json<Vec<MerchantSummary>>> {
    let merchants = state.store.list_merchants().await?;
    Ok(Json(merchants.iter().map(MerchantSummary::from).collect()))
}

pub async fn get_merchant(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MerchantSummary>> {
    let merchant = load_merchant(&state, &id).await?;
    Ok(Json(MerchantSummary::from(&merchant)))
}

pub async fn update_merchant(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateMerchantRequest>,
) -> Result<Json<MerchantSummary>> {
    payload.validate()?;
    let id = ObjectId::parse_str(&id)?;

    let update = MerchantUpdate::from(payload);
    let merchant = state
        .store
        .update_merchant(&id, update)
        .await?
        .ok_or(AppError::NotFound("Merchant"))?;

    info!("📝 Merchant updated: {} (active: {})", merchant.id, merchant.is_active);
    Ok(Json(MerchantSummary::from(&merchant)))
}

pub async fn delete_merchant(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = ObjectId::parse_str(&id)?;

    if !state.store.delete_merchant(&id).await? {
        return Err(AppError::NotFound("Merchant"));
    }

    info!("🗑️ Merchant deleted with its rule, events and transactions: {}", id);
    Ok(Json(json!({
        "success": true,
        "message": "Merchant deleted",
    })))
}

pub async fn get_validation_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ValidationRuleView>> {
    let merchant = load_merchant(&state, &id).await?;
    let rule = state
        .store
        .find_rule(&merchant.id)
        .await?
        .ok_or(AppError::NotFound("Validation rule"))?;
    Ok(Json(ValidationRuleView::from(&rule)))
}

pub async fn put_validation_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpsertRuleRequest>,
) -> Result<Json<ValidationRuleView>> {
    payload.validate()?;
    let merchant = load_merchant(&state, &id).await?;

    let billref_regex = payload.billref_regex.filter(|p| !p.is_empty());
    if let Some(pattern) = billref_regex.as_deref() {
        // Stored anyway; the engine lets payments through on a broken pattern.
        if rule_engine::check_reference(pattern, "") == PatternCheck::InvalidPattern {
            warn!(
                merchant_id = %merchant.id,
                "BillRefNumber pattern {:?} does not compile and will be ignored",
                pattern
            );
        }
    }

    let mut rule = state
        .store
        .find_rule(&merchant.id)
        .await?
        .unwrap_or_else(|| ValidationRule::new(merchant.id));
    rule.min_amount = payload.min_amount;
    rule.max_amount = payload.max_amount;
    rule.require_billref = payload.require_billref;
    rule.billref_regex = billref_regex;
    rule.updated_at = Utc::now();

    state.store.save_rule(&rule).await?;
    info!("📏 Validation rule saved for merchant {}", merchant.id);
    Ok(Json(ValidationRuleView::from(&rule)))
}

pub async fn delete_validation_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let merchant = load_merchant(&state, &id).await?;
    if !state.store.delete_rule(&merchant.id).await? {
        return Err(AppError::NotFound("Validation rule"));
    }
    Ok(Json(json!({
        "success": true,
        "message": "Validation rule removed; all payments will be accepted",
    })))
}

pub async fn list_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<IncomingEventView>>> {
    let merchant = load_merchant(&state, &id).await?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_EVENT_LIMIT)
        .clamp(1, MAX_EVENT_LIMIT);

    let events = state.store.list_events(&merchant.id, limit).await?;
    Ok(Json(events.into_iter().map(IncomingEventView::from).collect()))
}
