use chrono::{DateTime, NaiveDate, Utc};
use mongodb::bson;
use mongodb::bson::oid::ObjectId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Confirmed => "CONFIRMED",
            TransactionStatus::Rejected => "REJECTED",
        }
    }
}

/// Reconciled ledger row, one per (merchant, trans_id) when the id is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct C2bTransaction {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub merchant_id: ObjectId,
    pub trans_id: Option<String>,
    pub trans_time: Option<DateTime<Utc>>,
    pub amount: Option<Decimal>,
    pub msisdn: Option<String>,
    pub bill_ref_number: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub status: TransactionStatus,
    pub raw_last_payload: Map<String, Value>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// Everything a later callback overwrites in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionFields {
    pub trans_time: Option<DateTime<Utc>>,
    pub amount: Option<Decimal>,
    pub msisdn: Option<String>,
    pub bill_ref_number: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub status: TransactionStatus,
    pub raw_last_payload: Map<String, Value>,
}

impl C2bTransaction {
    pub fn new(
        merchant_id: ObjectId,
        trans_id: Option<String>,
        fields: TransactionFields,
        now: DateTime<Utc>,
    ) -> Self {
        let mut transaction = C2bTransaction {
            id: ObjectId::new(),
            merchant_id,
            trans_id,
            trans_time: None,
            amount: None,
            msisdn: None,
            bill_ref_number: None,
            first_name: None,
            middle_name: None,
            last_name: None,
            status: fields.status,
            raw_last_payload: Map::new(),
            created_at: now,
            updated_at: now,
        };
        transaction.overwrite(fields, now);
        transaction
    }

    /// Replaces every mutable column with the values from a later callback.
    pub fn overwrite(&mut self, fields: TransactionFields, now: DateTime<Utc>) {
        self.trans_time = fields.trans_time;
        self.amount = fields.amount;
        self.msisdn = fields.msisdn;
        self.bill_ref_number = fields.bill_ref_number;
        self.first_name = fields.first_name;
        self.middle_name = fields.middle_name;
        self.last_name = fields.last_name;
        self.status = fields.status;
        self.raw_last_payload = fields.raw_last_payload;
        self.updated_at = now;
    }

    /// Business date of the row: `trans_time` when known, otherwise arrival.
    pub fn falls_on(&self, date: NaiveDate, offset: &chrono::FixedOffset) -> bool {
        match self.trans_time {
            Some(t) => t.with_timezone(offset).date_naive() == date,
            None => self.created_at.with_timezone(offset).date_naive() == date,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct C2bTransactionView {
    pub id: String,
    pub merchant_id: String,
    pub trans_id: Option<String>,
    pub trans_time: Option<DateTime<Utc>>,
    pub amount: Option<Decimal>,
    pub msisdn: Option<String>,
    pub bill_ref_number: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<C2bTransaction> for C2bTransactionView {
    fn from(t: C2bTransaction) -> Self {
        C2bTransactionView {
            id: t.id.to_hex(),
            merchant_id: t.merchant_id.to_hex(),
            trans_id: t.trans_id,
            trans_time: t.trans_time,
            amount: t.amount,
            msisdn: t.msisdn,
            bill_ref_number: t.bill_ref_number,
            first_name: t.first_name,
            middle_name: t.middle_name,
            last_name: t.last_name,
            status: t.status,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransactionQuery {
    pub merchant_id: Option<ObjectId>,
    pub date: NaiveDate,
    /// Offset the calendar date is interpreted in.
    pub offset: chrono::FixedOffset,
    /// `None` returns the whole day.
    pub limit: Option<usize>,
}

impl TransactionQuery {
    /// `[start, end)` of the requested day, in UTC.
    pub fn day_bounds(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        use chrono::TimeZone;

        let start = self
            .offset
            .from_local_datetime(&self.date.and_hms_opt(0, 0, 0)?)
            .single()?
            .with_timezone(&Utc);
        Some((start, start + chrono::Duration::days(1)))
    }
}
