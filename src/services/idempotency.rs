// services/idempotency.rs
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::models::c2b_payload::C2bPayload;

/// Correlation key for the event log.
///
/// The provider transaction id when the payload carries one, otherwise the
/// SHA-256 of the payload in canonical form (sorted keys, no whitespace), so
/// the same logical payload always maps to the same key whatever order its
/// fields arrived in.
pub fn derive_key(payload: &C2bPayload) -> String {
    match &payload.trans_id {
        Some(id) => id.clone(),
        None => content_digest(&payload.raw),
    }
}

pub fn content_digest(raw: &Map<String, Value>) -> String {
    // serde_json's Map is ordered by key (no `preserve_order`), so this is canonical.
    let canonical = Value::Object(raw.clone()).to_string();
    hex::encode(Sha256::digest(canonical.as_bytes()))
}
