use chrono::{DateTime, Utc};
use mongodb::bson;
use mongodb::bson::oid::ObjectId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-merchant acceptance policy applied to validation callbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub merchant_id: ObjectId,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub require_billref: bool,
    pub billref_regex: Option<String>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl ValidationRule {
    pub fn new(merchant_id: ObjectId) -> Self {
        let now = Utc::now();
        ValidationRule {
            merchant_id,
            min_amount: None,
            max_amount: None,
            require_billref: false,
            billref_regex: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationRuleView {
    pub merchant_id: String,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub require_billref: bool,
    pub billref_regex: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ValidationRule> for ValidationRuleView {
    fn from(rule: &ValidationRule) -> Self {
        ValidationRuleView {
            merchant_id: rule.merchant_id.to_hex(),
            min_amount: rule.min_amount,
            max_amount: rule.max_amount,
            require_billref: rule.require_billref,
            billref_regex: rule.billref_regex.clone(),
            updated_at: rule.updated_at,
        }
    }
}
