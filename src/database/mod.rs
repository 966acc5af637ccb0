//! Persistence seams for the four C2B collections.
//!
//! Each component of the pipeline talks to storage through its own trait so the
//! dispatcher can be exercised against [`MemoryStore`] in tests and against
//! MongoDB in production.

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;

use crate::errors::Result;
use crate::models::{
    C2bTransaction, IncomingEvent, Merchant, MerchantUpdate, TransactionFields, TransactionQuery,
    ValidationRule,
};

pub mod connection;
pub mod memory_store;
pub mod mongo_store;

pub use memory_store::MemoryStore;
pub use mongo_store::MongoStore;

pub const MERCHANTS: &str = "merchants";
pub const VALIDATION_RULES: &str = "validation_rules";
pub const INCOMING_EVENTS: &str = "incoming_events";
pub const C2B_TRANSACTIONS: &str = "c2b_transactions";

#[async_trait]
pub trait MerchantRegistry: Send + Sync {
    /// Fails with `DuplicateKey` if the webhook token is already taken.
    async fn insert_merchant(&self, merchant: &Merchant) -> Result<()>;
    async fn find_merchant(&self, id: &ObjectId) -> Result<Option<Merchant>>;
    async fn list_merchants(&self) -> Result<Vec<Merchant>>;
    async fn update_merchant(
        &self,
        id: &ObjectId,
        update: MerchantUpdate,
    ) -> Result<Option<Merchant>>;
    /// Removes the merchant together with its rule, events and transactions.
    async fn delete_merchant(&self, id: &ObjectId) -> Result<bool>;
}

#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn find_rule(&self, merchant_id: &ObjectId) -> Result<Option<ValidationRule>>;
    async fn save_rule(&self, rule: &ValidationRule) -> Result<()>;
    async fn delete_rule(&self, merchant_id: &ObjectId) -> Result<bool>;
}

#[async_trait]
pub trait EventLog: Send + Sync {
    async fn append_event(&self, event: &IncomingEvent) -> Result<()>;
    /// Newest first.
    async fn list_events(&self, merchant_id: &ObjectId, limit: usize) -> Result<Vec<IncomingEvent>>;
}

#[async_trait]
pub trait TransactionLedger: Send + Sync {
    /// With a `trans_id`, atomically creates or overwrites the single row for
    /// `(merchant_id, trans_id)`. Without one, always inserts a new row.
    async fn upsert_transaction(
        &self,
        merchant_id: &ObjectId,
        trans_id: Option<&str>,
        fields: TransactionFields,
    ) -> Result<C2bTransaction>;

    /// Daily view, newest first.
    async fn list_transactions(&self, query: &TransactionQuery) -> Result<Vec<C2bTransaction>>;

    async fn merchant_transactions(&self, merchant_id: &ObjectId) -> Result<Vec<C2bTransaction>>;
}

#[async_trait]
pub trait Store: MerchantRegistry + RuleStore + EventLog + TransactionLedger {
    async fn ping(&self) -> Result<()>;
}
