use axum::{routing::get, Router};

use crate::handlers::transactions::{export_transactions_csv, list_transactions};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        // GET /api/transactions?date=2024-01-15&merchant_id=... - Daily ledger view
        .route("/", get(list_transactions))

        // GET /api/transactions/export.csv?date=2024-01-15 - Same filter, uncapped, as a download
        .route("/export.csv", get(export_transactions_csv))
}
