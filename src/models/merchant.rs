use chrono::{DateTime, Utc};
use mongodb::bson;
use mongodb::bson::oid::ObjectId;
use rand::RngCore;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ShortcodeType {
    Till,
    Paybill,
}

impl ShortcodeType {
    /// Default Daraja `CommandID` for a simulated payment to this kind of number.
    pub fn simulate_command(&self) -> &'static str {
        match self {
            ShortcodeType::Till => "CustomerBuyGoodsOnline",
            ShortcodeType::Paybill => "CustomerPayBillOnline",
        }
    }
}

/// What Daraja should do when the validation endpoint is unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseType {
    Completed,
    Cancelled,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Completed => "Completed",
            ResponseType::Cancelled => "Cancelled",
        }
    }
}

impl Default for ResponseType {
    fn default() -> Self {
        ResponseType::Completed
    }
}

/// A provider-registered till or paybill number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Merchant {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub shortcode: String,
    #[serde(rename = "type")]
    pub shortcode_type: ShortcodeType,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub response_type: ResponseType,
    pub webhook_token: String,
    pub is_active: bool,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Merchant {
    pub fn new(
        name: String,
        shortcode: String,
        shortcode_type: ShortcodeType,
        consumer_key: String,
        consumer_secret: String,
        response_type: ResponseType,
    ) -> Self {
        let now = Utc::now();
        Merchant {
            id: ObjectId::new(),
            name,
            shortcode,
            shortcode_type,
            consumer_key,
            consumer_secret,
            response_type,
            webhook_token: generate_webhook_token(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// 256 random bits, hex encoded so it is path-safe without escaping.
pub fn generate_webhook_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Fields an operator may change after creation. The webhook token is not one of them.
#[derive(Debug, Clone, Default)]
pub struct MerchantUpdate {
    pub name: Option<String>,
    pub shortcode: Option<String>,
    pub shortcode_type: Option<ShortcodeType>,
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
    pub response_type: Option<ResponseType>,
    pub is_active: Option<bool>,
}

impl MerchantUpdate {
    pub fn apply(self, merchant: &mut Merchant) {
        if let Some(name) = self.name {
            merchant.name = name;
        }
        if let Some(shortcode) = self.shortcode {
            merchant.shortcode = shortcode;
        }
        if let Some(shortcode_type) = self.shortcode_type {
            merchant.shortcode_type = shortcode_type;
        }
        if let Some(consumer_key) = self.consumer_key {
            merchant.consumer_key = consumer_key;
        }
        if let Some(consumer_secret) = self.consumer_secret {
            merchant.consumer_secret = consumer_secret;
        }
        if let Some(response_type) = self.response_type {
            merchant.response_type = response_type;
        }
        if let Some(is_active) = self.is_active {
            merchant.is_active = is_active;
        }
        merchant.updated_at = Utc::now();
    }
}

/// Listing/detail view. Credentials and the webhook token are never echoed back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantSummary {
    pub id: String,
    pub name: String,
    pub shortcode: String,
    #[serde(rename = "type")]
    pub shortcode_type: ShortcodeType,
    pub consumer_key_set: bool,
    pub response_type: ResponseType,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Merchant> for MerchantSummary {
    fn from(m: &Merchant) -> Self {
        MerchantSummary {
            id: m.id.to_hex(),
            name: m.name.clone(),
            shortcode: m.shortcode.clone(),
            shortcode_type: m.shortcode_type,
            consumer_key_set: !m.consumer_key.is_empty(),
            response_type: m.response_type,
            is_active: m.is_active,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_tokens_are_long_and_distinct() {
        let a = generate_webhook_token();
        let b = generate_webhook_token();
        assert_eq!(a.len(), 64);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn update_leaves_token_alone() {
        let mut merchant = Merchant::new(
            "Shop".into(),
            "600000".into(),
            ShortcodeType::Paybill,
            "key".into(),
            "secret".into(),
            ResponseType::Completed,
        );
        let token = merchant.webhook_token.clone();

        MerchantUpdate {
            is_active: Some(false),
            name: Some("Renamed".into()),
            ..Default::default()
        }
        .apply(&mut merchant);

        assert!(!merchant.is_active);
        assert_eq!(merchant.name, "Renamed");
        assert_eq!(merchant.webhook_token, token);
    }
}
