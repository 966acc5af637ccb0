// services/dispatcher.rs
//! C2B callback pipeline.
//!
//! Every request moves through `AUTH -> PARSE -> LOGGED -> (VALIDATED) ->
//! UPSERTED -> RESPONDED`. A failure at AUTH or PARSE ends the request with no
//! side effects; once the event is logged the request always reaches the
//! ledger upsert. Business rejections are answered with `ResultCode: 1`, never
//! with an HTTP error, so the provider does not retry a callback we have
//! already recorded.

use chrono::{FixedOffset, Utc};
use mongodb::bson::oid::ObjectId;
use std::collections::BTreeMap;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use super::{idempotency, rule_engine};
use crate::database::Store;
use crate::errors::Result;
use crate::models::{
    C2bPayload, C2bResponse, EventKind, IncomingEvent, Merchant, TransactionFields,
    TransactionStatus,
};

/// Request metadata captured into the event log.
#[derive(Debug, Clone, Default)]
pub struct CallbackMeta {
    pub headers: BTreeMap<String, String>,
    pub source_ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Unknown merchant, inactive merchant, or wrong token. Deliberately indistinguishable.
    NotFound,
    Respond(C2bResponse),
}

#[derive(Clone)]
pub struct WebhookDispatcher {
    store: Arc<dyn Store>,
    provider_offset: FixedOffset,
}

impl WebhookDispatcher {
    pub fn new(store: Arc<dyn Store>, provider_offset: FixedOffset) -> Self {
        WebhookDispatcher {
            store,
            provider_offset,
        }
    }

    pub async fn dispatch(
        &self,
        kind: EventKind,
        merchant_id: &str,
        token: &str,
        body: &[u8],
        meta: CallbackMeta,
    ) -> Result<DispatchOutcome> {
        let Some(merchant) = self.authenticate(merchant_id, token).await? else {
            warn!(kind = ?kind, "C2B callback failed authentication");
            return Ok(DispatchOutcome::NotFound);
        };

        let payload = match C2bPayload::parse(body) {
            Ok(payload) => payload.normalize(),
            Err(e) => {
                warn!(merchant_id = %merchant.id, kind = ?kind, "C2B callback rejected: {}", e);
                return Ok(DispatchOutcome::Respond(C2bResponse::invalid_json()));
            }
        };

        self.log_event(&merchant, kind, &payload, meta).await?;

        let response = match kind {
            EventKind::Validation => {
                let rule = self.store.find_rule(&merchant.id).await?;
                let verdict = rule_engine::evaluate(rule.as_ref(), &payload);
                let status = if verdict.accepted {
                    TransactionStatus::Pending
                } else {
                    TransactionStatus::Rejected
                };
                self.upsert(&merchant, &payload, status).await?;

                if verdict.accepted {
                    C2bResponse::accept(verdict.message)
                } else {
                    C2bResponse::reject(verdict.message)
                }
            }
            EventKind::Confirmation => {
                // Money has already moved; confirmations are recorded, never refused.
                self.upsert(&merchant, &payload, TransactionStatus::Confirmed)
                    .await?;
                C2bResponse::accept(C2bResponse::ACCEPTED)
            }
        };

        info!(
            merchant_id = %merchant.id,
            kind = ?kind,
            trans_id = payload.trans_id.as_deref().unwrap_or("-"),
            result_code = response.result_code,
            "C2B callback handled"
        );
        Ok(DispatchOutcome::Respond(response))
    }

    /// Resolves the merchant only if it exists, is active, and the token matches.
    pub async fn authenticate(&self, merchant_id: &str, token: &str) -> Result<Option<Merchant>> {
        let Ok(id) = ObjectId::parse_str(merchant_id) else {
            return Ok(None);
        };

        let merchant = match self.store.find_merchant(&id).await? {
            Some(m) if m.is_active => m,
            _ => return Ok(None),
        };

        if tokens_match(token, &merchant.webhook_token) {
            Ok(Some(merchant))
        } else {
            Ok(None)
        }
    }

    async fn log_event(
        &self,
        merchant: &Merchant,
        kind: EventKind,
        payload: &C2bPayload,
        meta: CallbackMeta,
    ) -> Result<()> {
        let event = IncomingEvent {
            id: ObjectId::new(),
            merchant_id: merchant.id,
            event_type: kind,
            idempotency_key: idempotency::derive_key(payload),
            payload: payload.raw.clone(),
            headers: meta.headers,
            source_ip: meta.source_ip,
            received_at: Utc::now(),
        };
        self.store.append_event(&event).await
    }

    async fn upsert(
        &self,
        merchant: &Merchant,
        payload: &C2bPayload,
        status: TransactionStatus,
    ) -> Result<()> {
        let fields = TransactionFields {
            trans_time: payload.transaction_time(&self.provider_offset),
            amount: payload.amount().map(|a| a.round_dp(2)),
            msisdn: payload.msisdn.clone(),
            bill_ref_number: payload.bill_ref_number.clone(),
            first_name: payload.first_name.clone(),
            middle_name: payload.middle_name.clone(),
            last_name: payload.last_name.clone(),
            status,
            raw_last_payload: payload.raw.clone(),
        };

        self.store
            .upsert_transaction(&merchant.id, payload.trans_id.as_deref(), fields)
            .await?;
        Ok(())
    }
}

/// Constant-time token comparison; unequal lengths compare unequal without
/// short-circuiting on content.
pub fn tokens_match(supplied: &str, expected: &str) -> bool {
    let lengths_equal = supplied.len().ct_eq(&expected.len());

    let max_len = supplied.len().max(expected.len());
    let mut a = vec![0u8; max_len];
    let mut b = vec![0xFFu8; max_len];
    a[..supplied.len()].copy_from_slice(supplied.as_bytes());
    b[..expected.len()].copy_from_slice(expected.as_bytes());

    (lengths_equal & a.ct_eq(&b)).into()
}
