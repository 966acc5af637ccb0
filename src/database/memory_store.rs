// database/memory_store.rs
use async_trait::async_trait;
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{EventLog, MerchantRegistry, RuleStore, Store, TransactionLedger};
use crate::errors::{AppError, Result};
use crate::models::{
    C2bTransaction, IncomingEvent, Merchant, MerchantUpdate, TransactionFields, TransactionQuery,
    ValidationRule,
};

#[derive(Default)]
struct Tables {
    merchants: HashMap<ObjectId, Merchant>,
    rules: HashMap<ObjectId, ValidationRule>,
    events: Vec<IncomingEvent>,
    transactions: Vec<C2bTransaction>,
}

/// In-process store. A single lock serializes every write, which gives the
/// ledger upsert the same all-or-nothing behaviour as the unique index does
/// in MongoDB.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MerchantRegistry for MemoryStore {
    async fn insert_merchant(&self, merchant: &Merchant) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if tables
            .merchants
            .values()
            .any(|m| m.webhook_token == merchant.webhook_token)
        {
            return Err(AppError::DuplicateKey("webhook_token".into()));
        }
        tables.merchants.insert(merchant.id, merchant.clone());
        Ok(())
    }

    async fn find_merchant(&self, id: &ObjectId) -> Result<Option<Merchant>> {
        Ok(self.tables.lock().await.merchants.get(id).cloned())
    }

    async fn list_merchants(&self) -> Result<Vec<Merchant>> {
        let mut merchants: Vec<Merchant> =
            self.tables.lock().await.merchants.values().cloned().collect();
        merchants.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(merchants)
    }

    async fn update_merchant(
        &self,
        id: &ObjectId,
        update: MerchantUpdate,
    ) -> Result<Option<Merchant>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.merchants.get_mut(id).map(|merchant| {
            update.apply(merchant);
            merchant.clone()
        }))
    }

    async fn delete_merchant(&self, id: &ObjectId) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        tables.rules.remove(id);
        tables.events.retain(|e| &e.merchant_id != id);
        tables.transactions.retain(|t| &t.merchant_id != id);
        Ok(tables.merchants.remove(id).is_some())
    }
}

#[async_trait]
impl RuleStore for MemoryStore {
    async fn find_rule(&self, merchant_id: &ObjectId) -> Result<Option<ValidationRule>> {
        Ok(self.tables.lock().await.rules.get(merchant_id).cloned())
    }

    async fn save_rule(&self, rule: &ValidationRule) -> Result<()> {
        self.tables
            .lock()
            .await
            .rules
            .insert(rule.merchant_id, rule.clone());
        Ok(())
    }

    async fn delete_rule(&self, merchant_id: &ObjectId) -> Result<bool> {
        Ok(self.tables.lock().await.rules.remove(merchant_id).is_some())
    }
}

#[async_trait]
impl EventLog for MemoryStore {
    async fn append_event(&self, event: &IncomingEvent) -> Result<()> {
        self.tables.lock().await.events.push(event.clone());
        Ok(())
    }

    async fn list_events(&self, merchant_id: &ObjectId, limit: usize) -> Result<Vec<IncomingEvent>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .events
            .iter()
            .rev()
            .filter(|e| &e.merchant_id == merchant_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TransactionLedger for MemoryStore {
    async fn upsert_transaction(
        &self,
        merchant_id: &ObjectId,
        trans_id: Option<&str>,
        fields: TransactionFields,
    ) -> Result<C2bTransaction> {
        let now = Utc::now();
        let mut tables = self.tables.lock().await;

        if let Some(id) = trans_id {
            if let Some(existing) = tables
                .transactions
                .iter_mut()
                .find(|t| &t.merchant_id == merchant_id && t.trans_id.as_deref() == Some(id))
            {
                existing.overwrite(fields, now);
                return Ok(existing.clone());
            }
        }

        let transaction =
            C2bTransaction::new(*merchant_id, trans_id.map(str::to_string), fields, now);
        tables.transactions.push(transaction.clone());
        Ok(transaction)
    }

    async fn list_transactions(&self, query: &TransactionQuery) -> Result<Vec<C2bTransaction>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<C2bTransaction> = tables
            .transactions
            .iter()
            .filter(|t| query.merchant_id.map_or(true, |id| t.merchant_id == id))
            .filter(|t| t.falls_on(query.date, &query.offset))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn merchant_transactions(&self, merchant_id: &ObjectId) -> Result<Vec<C2bTransaction>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .transactions
            .iter()
            .filter(|t| &t.merchant_id == merchant_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
