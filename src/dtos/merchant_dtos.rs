use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::merchant::MerchantSummary;
use crate::models::{MerchantUpdate, ResponseType, ShortcodeType};

fn validate_shortcode(value: &str) -> Result<(), ValidationError> {
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("shortcode_not_numeric"))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMerchantRequest {
    #[validate(length(min = 1, max = 120, message = "Name must be 1-120 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 20), custom(function = "validate_shortcode"))]
    pub shortcode: String,

    #[serde(rename = "type")]
    pub shortcode_type: ShortcodeType,

    #[validate(length(min = 1, max = 200))]
    pub consumer_key: String,

    #[validate(length(min = 1, max = 200))]
    pub consumer_secret: String,

    #[serde(default)]
    pub response_type: ResponseType,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateMerchantRequest {
    #[validate(length(min = 1, max = 120, message = "Name must be 1-120 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 20), custom(function = "validate_shortcode"))]
    pub shortcode: Option<String>,

    #[serde(rename = "type")]
    pub shortcode_type: Option<ShortcodeType>,

    #[validate(length(min = 1, max = 200))]
    pub consumer_key: Option<String>,

    #[validate(length(min = 1, max = 200))]
    pub consumer_secret: Option<String>,

    pub response_type: Option<ResponseType>,
    pub is_active: Option<bool>,
}

impl From<UpdateMerchantRequest> for MerchantUpdate {
    fn from(req: UpdateMerchantRequest) -> Self {
        MerchantUpdate {
            name: req.name,
            shortcode: req.shortcode,
            shortcode_type: req.shortcode_type,
            consumer_key: req.consumer_key,
            consumer_secret: req.consumer_secret,
            response_type: req.response_type,
            is_active: req.is_active,
        }
    }
}

/// Only returned by the create call; the token is not retrievable afterwards.
#[derive(Debug, Serialize)]
pub struct MerchantCreatedResponse {
    pub success: bool,
    pub merchant: MerchantSummary,
    pub webhook_token: String,
    pub validation_url: String,
    pub confirmation_url: String,
}

fn validate_amount_bounds(rule: &UpsertRuleRequest) -> Result<(), ValidationError> {
    if rule.min_amount.is_some_and(|min| min < Decimal::ZERO) {
        return Err(ValidationError::new("min_amount_negative"));
    }
    if let (Some(min), Some(max)) = (rule.min_amount, rule.max_amount) {
        if min > max {
            return Err(ValidationError::new("min_amount_above_max_amount"));
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_amount_bounds"))]
pub struct UpsertRuleRequest {
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,

    #[serde(default)]
    pub require_billref: bool,

    #[validate(length(max = 200))]
    pub billref_regex: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SimulatePaymentRequest {
    pub amount: Option<String>,
    pub msisdn: Option<String>,
    pub bill_ref: Option<String>,
    pub command_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    /// `YYYY-MM-DD`; defaults to today in the provider's offset.
    pub date: Option<String>,
    pub merchant_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(min: Option<i64>, max: Option<i64>) -> UpsertRuleRequest {
        UpsertRuleRequest {
            min_amount: min.map(Decimal::from),
            max_amount: max.map(Decimal::from),
            require_billref: false,
            billref_regex: None,
        }
    }

    #[test]
    fn bounds_must_be_ordered() {
        assert!(rule(Some(100), Some(1000)).validate().is_ok());
        assert!(rule(Some(1000), Some(1000)).validate().is_ok());
        assert!(rule(Some(1001), Some(1000)).validate().is_err());
        assert!(rule(Some(-1), None).validate().is_err());
        assert!(rule(None, Some(5)).validate().is_ok());
    }

    #[test]
    fn shortcode_must_be_digits() {
        assert!(validate_shortcode("600000").is_ok());
        assert!(validate_shortcode("60a000").is_err());
        assert!(validate_shortcode("").is_err());
    }
}
