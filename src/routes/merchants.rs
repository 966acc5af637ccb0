use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::daraja_handlers::{register_urls, simulate_payment};
use crate::handlers::merchants::{
    create_merchant, delete_merchant, delete_validation_rule, get_merchant, get_validation_rule,
    list_events, list_merchants, put_validation_rule, update_merchant,
};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        // GET /api/merchants - List merchants (no secrets)
        // POST /api/merchants - Create a merchant; the only response carrying its webhook token
        .route("/", get(list_merchants).post(create_merchant))
        .route(
            "/:id",
            get(get_merchant).patch(update_merchant).delete(delete_merchant),
        )

        // Acceptance rule applied to validation callbacks
        .route(
            "/:id/validation-rule",
            get(get_validation_rule)
                .put(put_validation_rule)
                .delete(delete_validation_rule),
        )

        // GET /api/merchants/:id/events?limit=50 - Raw callback log, newest first
        .route("/:id/events", get(list_events))

        // Daraja calls
        .route("/:id/register-urls", post(register_urls))
        .route("/:id/simulate", post(simulate_payment))
}
