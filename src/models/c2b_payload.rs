// models/c2b_payload.rs
//! Inbound C2B callback body.
//!
//! Daraja sends a flat JSON object whose values are not reliably typed
//! (`TransAmount` may be a string or a number, `MSISDN` is sometimes numeric).
//! Recognized keys are lifted into typed optional fields; the full document is
//! kept in `raw` so that unrecognized keys survive into the event log and the
//! ledger's last-payload column.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use thiserror::Error;

/// Field names Daraja has used for the transaction id, in lookup order.
pub const TRANSACTION_ID_FIELDS: [&str; 3] = ["TransID", "TransactionID", "TransId"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedPayload {
    #[error("body is not valid JSON")]
    InvalidJson,
    #[error("body is not a JSON object")]
    NotAnObject,
}

#[derive(Debug, Clone, PartialEq)]
pub struct C2bPayload {
    pub trans_id: Option<String>,
    pub trans_time: Option<String>,
    pub trans_amount: Option<String>,
    pub msisdn: Option<String>,
    pub bill_ref_number: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub raw: Map<String, Value>,
}

impl C2bPayload {
    /// Parses a request body. An empty body is read as `{}`.
    pub fn parse(body: &[u8]) -> Result<Self, MalformedPayload> {
        let value: Value = if body.is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_slice(body).map_err(|_| MalformedPayload::InvalidJson)?
        };

        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            _ => Err(MalformedPayload::NotAnObject),
        }
    }

    pub fn from_map(raw: Map<String, Value>) -> Self {
        let text = |key: &str| raw.get(key).and_then(scalar_text);

        let trans_id = TRANSACTION_ID_FIELDS
            .iter()
            .filter_map(|key| text(key))
            .find(|id| !id.is_empty());

        C2bPayload {
            trans_id,
            // A numeric TransTime is not a timestamp we can trust.
            trans_time: raw
                .get("TransTime")
                .and_then(Value::as_str)
                .map(str::to_string),
            trans_amount: text("TransAmount"),
            msisdn: text("MSISDN"),
            bill_ref_number: text("BillRefNumber"),
            first_name: text("FirstName"),
            middle_name: text("MiddleName"),
            last_name: text("LastName"),
            raw,
        }
    }

    /// Identity today; the place to coerce provider field quirks.
    pub fn normalize(self) -> Self {
        self
    }

    /// `TransAmount` as a decimal. Unparseable amounts are absent, not zero.
    pub fn amount(&self) -> Option<Decimal> {
        self.trans_amount.as_deref().and_then(parse_amount)
    }

    /// `TransTime` read in the provider's local offset.
    pub fn transaction_time(&self, offset: &FixedOffset) -> Option<DateTime<Utc>> {
        self.trans_time
            .as_deref()
            .and_then(|value| parse_trans_time(value, offset))
    }

    /// Payer reference, treating an empty string as not supplied.
    pub fn reference(&self) -> Option<&str> {
        self.bill_ref_number.as_deref().filter(|r| !r.is_empty())
    }
}

/// Response body Daraja expects from both callback endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct C2bResponse {
    #[serde(rename = "ResultCode")]
    pub result_code: u8,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

impl C2bResponse {
    pub const ACCEPTED: &'static str = "Accepted";

    pub fn accept(message: impl Into<String>) -> Self {
        C2bResponse {
            result_code: 0,
            result_desc: message.into(),
        }
    }

    pub fn reject(message: impl Into<String>) -> Self {
        C2bResponse {
            result_code: 1,
            result_desc: message.into(),
        }
    }

    pub fn invalid_json() -> Self {
        Self::reject("Rejected: invalid JSON")
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn parse_amount(value: &str) -> Option<Decimal> {
    let value = value.trim();
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .ok()
}

/// Reads Daraja's `YYYYMMDDHHMMSS`. Anything else is treated as absent.
pub fn parse_trans_time(value: &str, offset: &FixedOffset) -> Option<DateTime<Utc>> {
    if value.len() != 14 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let part = |range: std::ops::Range<usize>| value[range].parse::<u32>().ok();
    let year = value[0..4].parse::<i32>().ok()?;
    let naive = NaiveDate::from_ymd_opt(year, part(4..6)?, part(6..8)?)?.and_hms_opt(
        part(8..10)?,
        part(10..12)?,
        part(12..14)?,
    )?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eat() -> FixedOffset {
        FixedOffset::east_opt(3 * 3600).unwrap()
    }

    #[test]
    fn parse_rejects_non_objects() {
        assert_eq!(C2bPayload::parse(b"not json"), Err(MalformedPayload::InvalidJson));
        assert_eq!(C2bPayload::parse(b"[1,2]"), Err(MalformedPayload::NotAnObject));
        assert_eq!(C2bPayload::parse(b"\"T1\""), Err(MalformedPayload::NotAnObject));
    }

    #[test]
    fn empty_body_is_an_empty_object() {
        let payload = C2bPayload::parse(b"").unwrap();
        assert!(payload.raw.is_empty());
        assert_eq!(payload.trans_id, None);
    }

    #[test]
    fn transaction_id_uses_first_non_empty_variant() {
        let payload = C2bPayload::parse(br#"{"TransID":"","TransactionID":"ABC","TransId":"XYZ"}"#)
            .unwrap();
        assert_eq!(payload.trans_id.as_deref(), Some("ABC"));

        let payload = C2bPayload::parse(br#"{"TransId":"XYZ"}"#).unwrap();
        assert_eq!(payload.trans_id.as_deref(), Some("XYZ"));
    }

    #[test]
    fn numeric_fields_are_rendered_as_text() {
        let payload = C2bPayload::from_map(
            json!({"MSISDN": 254708374149u64, "TransAmount": 50.5, "FirstName": "Jane"})
                .as_object()
                .unwrap()
                .clone(),
        );
        assert_eq!(payload.msisdn.as_deref(), Some("254708374149"));
        assert_eq!(payload.amount(), Some(Decimal::new(505, 1)));
        assert_eq!(payload.first_name.as_deref(), Some("Jane"));
        assert!(payload.raw.contains_key("FirstName"));
    }

    #[test]
    fn bad_amount_is_absent_not_zero() {
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("1000.00"), Some(Decimal::new(100000, 2)));
    }

    #[test]
    fn trans_time_parses_in_provider_offset() {
        let parsed = parse_trans_time("20240131235959", &eat()).unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-01-31T20:59:59+00:00");
    }

    #[test]
    fn trans_time_rejects_deviations() {
        assert_eq!(parse_trans_time("2024013123595", &eat()), None);
        assert_eq!(parse_trans_time("2024-01-31 23:59", &eat()), None);
        assert_eq!(parse_trans_time("20241331235959", &eat()), None);
        assert_eq!(parse_trans_time("20240131250000", &eat()), None);
    }

    #[test]
    fn numeric_trans_time_is_absent() {
        let payload = C2bPayload::parse(br#"{"TransTime":20240115143000}"#).unwrap();
        assert_eq!(payload.trans_time, None);
        assert_eq!(payload.transaction_time(&eat()), None);
        assert!(payload.raw.contains_key("TransTime"));

        let payload = C2bPayload::parse(br#"{"TransTime":"20240115143000"}"#).unwrap();
        assert!(payload.transaction_time(&eat()).is_some());
    }

    #[test]
    fn empty_reference_counts_as_missing() {
        let payload = C2bPayload::parse(br#"{"BillRefNumber":""}"#).unwrap();
        assert_eq!(payload.bill_ref_number.as_deref(), Some(""));
        assert_eq!(payload.reference(), None);
    }
}
