use chrono::{DateTime, Utc};
use mongodb::bson;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Validation,
    Confirmation,
}

/// Append-only audit record of one authenticated, parseable callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingEvent {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub merchant_id: ObjectId,
    pub event_type: EventKind,
    pub idempotency_key: String,
    pub payload: Map<String, Value>,
    pub headers: BTreeMap<String, String>,
    pub source_ip: Option<String>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct IncomingEventView {
    pub id: String,
    pub event_type: EventKind,
    pub idempotency_key: String,
    pub payload: Map<String, Value>,
    pub source_ip: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl From<IncomingEvent> for IncomingEventView {
    fn from(event: IncomingEvent) -> Self {
        IncomingEventView {
            id: event.id.to_hex(),
            event_type: event.event_type,
            idempotency_key: event.idempotency_key,
            payload: event.payload,
            source_ip: event.source_ip,
            received_at: event.received_at,
        }
    }
}
