// handlers/transactions.rs
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{NaiveDate, Utc};
use mongodb::bson::oid::ObjectId;
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

use crate::{
    dtos::merchant_dtos::TransactionsQuery,
    errors::{AppError, Result},
    models::{C2bTransaction, C2bTransactionView, TransactionQuery},
    state::AppState,
};

/// Rows returned by the daily view at most. The CSV export is not capped.
pub const DAILY_LIMIT: usize = 500;

const CSV_HEADER: [&str; 8] = [
    "shortcode",
    "trans_id",
    "amount",
    "msisdn",
    "bill_ref",
    "trans_time",
    "status",
    "created_at",
];

#[derive(Debug, Serialize)]
pub struct DailyTransactions {
    pub date: NaiveDate,
    pub count: usize,
    pub transactions: Vec<C2bTransactionView>,
}

fn daily_query(
    state: &AppState,
    params: &TransactionsQuery,
    limit: Option<usize>,
) -> Result<TransactionQuery> {
    let offset = state.provider_offset();

    let date = match params.date.as_deref().filter(|d| !d.is_empty()) {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| AppError::invalid_data(format!("date must be YYYY-MM-DD (got {})", raw)))?,
        None => Utc::now().with_timezone(&offset).date_naive(),
    };

    let merchant_id = match params.merchant_id.as_deref().filter(|m| !m.is_empty()) {
        Some(raw) => Some(ObjectId::parse_str(raw)?),
        None => None,
    };

    Ok(TransactionQuery {
        merchant_id,
        date,
        offset,
        limit,
    })
}

// Ledger rows for one business day in the provider's timezone, newest first
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(params): Query<TransactionsQuery>,
) -> Result<Json<DailyTransactions>> {
    let query = daily_query(&state, &params, Some(DAILY_LIMIT))?;
    let rows = state.store.list_transactions(&query).await?;

    let transactions: Vec<C2bTransactionView> =
        rows.into_iter().map(C2bTransactionView::from).collect();
    Ok(Json(DailyTransactions {
        date: query.date,
        count: transactions.len(),
        transactions,
    }))
}

// Same day and merchant filter as the daily view, as a CSV download
pub async fn export_transactions_csv(
    State(state): State<AppState>,
    Query(params): Query<TransactionsQuery>,
) -> Result<Response> {
    let query = daily_query(&state, &params, None)?;
    let rows = state.store.list_transactions(&query).await?;

    let shortcodes: HashMap<ObjectId, String> = state
        .store
        .list_merchants()
        .await?
        .into_iter()
        .map(|m| (m.id, m.shortcode))
        .collect();

    let body = write_csv(&rows, &shortcodes)?;
    info!("📄 Exported {} transactions for {}", rows.len(), query.date);

    let disposition = format!("attachment; filename=\"transactions_{}.csv\"", query.date);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

fn write_csv(rows: &[C2bTransaction], shortcodes: &HashMap<ObjectId, String>) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for t in rows {
        let amount = t.amount.map(|a| a.to_string()).unwrap_or_default();
        let trans_time = t.trans_time.map(|tt| tt.to_rfc3339()).unwrap_or_default();
        let created_at = t.created_at.to_rfc3339();

        writer.write_record([
            shortcodes.get(&t.merchant_id).map(String::as_str).unwrap_or(""),
            t.trans_id.as_deref().unwrap_or(""),
            amount.as_str(),
            t.msisdn.as_deref().unwrap_or(""),
            t.bill_ref_number.as_deref().unwrap_or(""),
            trans_time.as_str(),
            t.status.as_str(),
            created_at.as_str(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Export(e.to_string()))
}
