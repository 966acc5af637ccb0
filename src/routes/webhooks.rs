use axum::{routing::post, Router};

use crate::handlers::c2b_webhooks::{c2b_confirmation, c2b_validation};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        // POST /webhooks/c2b/:merchant_id/:token/validation/
        // Registered URLs carry the trailing slash; accept both forms.
        .route("/:merchant_id/:token/validation", post(c2b_validation))
        .route("/:merchant_id/:token/validation/", post(c2b_validation))

        // POST /webhooks/c2b/:merchant_id/:token/confirmation/
        .route("/:merchant_id/:token/confirmation", post(c2b_confirmation))
        .route("/:merchant_id/:token/confirmation/", post(c2b_confirmation))
}
