// database/mongo_store.rs
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use futures_util::TryStreamExt;
use mongodb::{
    bson::{self, doc, oid::ObjectId, Document},
    options::ReturnDocument,
    Collection, Database,
};

use super::{
    EventLog, MerchantRegistry, RuleStore, Store, TransactionLedger, C2B_TRANSACTIONS,
    INCOMING_EVENTS, MERCHANTS, VALIDATION_RULES,
};
use crate::errors::{AppError, Result};
use crate::models::{
    C2bTransaction, IncomingEvent, Merchant, MerchantUpdate, TransactionFields, TransactionQuery,
    ValidationRule,
};

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        MongoStore { db }
    }

    fn merchants(&self) -> Collection<Merchant> {
        self.db.collection(MERCHANTS)
    }

    fn rules(&self) -> Collection<ValidationRule> {
        self.db.collection(VALIDATION_RULES)
    }

    fn events(&self) -> Collection<IncomingEvent> {
        self.db.collection(INCOMING_EVENTS)
    }

    fn transactions(&self) -> Collection<C2bTransaction> {
        self.db.collection(C2B_TRANSACTIONS)
    }
}

fn merchant_changes(update: MerchantUpdate) -> Result<Document> {
    let mut set = doc! { "updated_at": bson::DateTime::from_chrono(Utc::now()) };

    if let Some(name) = update.name {
        set.insert("name", name);
    }
    if let Some(shortcode) = update.shortcode {
        set.insert("shortcode", shortcode);
    }
    if let Some(shortcode_type) = update.shortcode_type {
        set.insert("type", bson::to_bson(&shortcode_type)?);
    }
    if let Some(consumer_key) = update.consumer_key {
        set.insert("consumer_key", consumer_key);
    }
    if let Some(consumer_secret) = update.consumer_secret {
        set.insert("consumer_secret", consumer_secret);
    }
    if let Some(response_type) = update.response_type {
        set.insert("response_type", bson::to_bson(&response_type)?);
    }
    if let Some(is_active) = update.is_active {
        set.insert("is_active", is_active);
    }

    Ok(set)
}

#[async_trait]
impl MerchantRegistry for MongoStore {
    async fn insert_merchant(&self, merchant: &Merchant) -> Result<()> {
        match self.merchants().insert_one(merchant).await {
            Ok(_) => Ok(()),
            Err(e) if AppError::is_duplicate_key(&e) => {
                Err(AppError::DuplicateKey("webhook_token".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_merchant(&self, id: &ObjectId) -> Result<Option<Merchant>> {
        Ok(self.merchants().find_one(doc! { "_id": *id }).await?)
    }

    async fn list_merchants(&self) -> Result<Vec<Merchant>> {
        let cursor = self
            .merchants()
            .find(doc! {})
            .sort(doc! { "created_at": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_merchant(
        &self,
        id: &ObjectId,
        update: MerchantUpdate,
    ) -> Result<Option<Merchant>> {
        let set = merchant_changes(update)?;
        Ok(self
            .merchants()
            .find_one_and_update(doc! { "_id": *id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn delete_merchant(&self, id: &ObjectId) -> Result<bool> {
        let owned = doc! { "merchant_id": *id };
        self.rules().delete_many(owned.clone()).await?;
        self.events().delete_many(owned.clone()).await?;
        self.transactions().delete_many(owned).await?;

        let result = self.merchants().delete_one(doc! { "_id": *id }).await?;
        Ok(result.deleted_count > 0)
    }
}

#[async_trait]
impl RuleStore for MongoStore {
    async fn find_rule(&self, merchant_id: &ObjectId) -> Result<Option<ValidationRule>> {
        Ok(self
            .rules()
            .find_one(doc! { "merchant_id": *merchant_id })
            .await?)
    }

    async fn save_rule(&self, rule: &ValidationRule) -> Result<()> {
        self.rules()
            .replace_one(doc! { "merchant_id": rule.merchant_id }, rule)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn delete_rule(&self, merchant_id: &ObjectId) -> Result<bool> {
        let result = self
            .rules()
            .delete_one(doc! { "merchant_id": *merchant_id })
            .await?;
        Ok(result.deleted_count > 0)
    }
}

#[async_trait]
impl EventLog for MongoStore {
    async fn append_event(&self, event: &IncomingEvent) -> Result<()> {
        self.events().insert_one(event).await?;
        Ok(())
    }

    async fn list_events(&self, merchant_id: &ObjectId, limit: usize) -> Result<Vec<IncomingEvent>> {
        let cursor = self
            .events()
            .find(doc! { "merchant_id": *merchant_id })
            .sort(doc! { "received_at": -1 })
            .limit(limit as i64)
            .await?;
        Ok(cursor.try_collect().await?)
    }
}

#[async_trait]
impl TransactionLedger for MongoStore {
    async fn upsert_transaction(
        &self,
        merchant_id: &ObjectId,
        trans_id: Option<&str>,
        fields: TransactionFields,
    ) -> Result<C2bTransaction> {
        let now = Utc::now();

        let Some(trans_id) = trans_id else {
            let transaction = C2bTransaction::new(*merchant_id, None, fields, now);
            self.transactions().insert_one(&transaction).await?;
            return Ok(transaction);
        };

        // Single round trip against the unique (merchant_id, trans_id) index;
        // concurrent first sightings collapse into one document.
        let mut set = bson::to_document(&fields)?;
        set.insert("updated_at", bson::DateTime::from_chrono(now));
        let update = doc! {
            "$set": set,
            "$setOnInsert": { "created_at": bson::DateTime::from_chrono(now) },
        };

        let filter = doc! { "merchant_id": *merchant_id, "trans_id": trans_id };

        // Two first sightings racing on the unique index: the loser retries as an update.
        let mut attempt = 0;
        let updated = loop {
            attempt += 1;
            match self
                .transactions()
                .find_one_and_update(filter.clone(), update.clone())
                .upsert(true)
                .return_document(ReturnDocument::After)
                .await
            {
                Err(e) if attempt < 2 && AppError::is_duplicate_key(&e) => continue,
                other => break other?,
            }
        };

        updated.ok_or_else(|| AppError::StorageUnavailable("upsert returned no document".into()))
    }

    async fn list_transactions(&self, query: &TransactionQuery) -> Result<Vec<C2bTransaction>> {
        let (start, end) = query
            .day_bounds()
            .ok_or_else(|| AppError::invalid_data("date is out of range"))?;

        // trans_time is persisted as an RFC 3339 string; created_at as a BSON date.
        let text = |t: chrono::DateTime<Utc>| t.to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut filter = doc! {
            "$or": [
                { "trans_time": { "$gte": text(start), "$lt": text(end) } },
                {
                    "trans_time": null,
                    "created_at": {
                        "$gte": bson::DateTime::from_chrono(start),
                        "$lt": bson::DateTime::from_chrono(end),
                    },
                },
            ]
        };
        if let Some(merchant_id) = query.merchant_id {
            filter.insert("merchant_id", merchant_id);
        }

        let transactions = self.transactions();
        let mut find = transactions
            .find(filter)
            .sort(doc! { "created_at": -1 });
        if let Some(limit) = query.limit {
            find = find.limit(limit as i64);
        }
        let cursor = find.await?;
        Ok(cursor.try_collect().await?)
    }

    async fn merchant_transactions(&self, merchant_id: &ObjectId) -> Result<Vec<C2bTransaction>> {
        let cursor = self
            .transactions()
            .find(doc! { "merchant_id": *merchant_id })
            .await?;
        Ok(cursor.try_collect().await?)
    }
}

#[async_trait]
impl Store for MongoStore {
    async fn ping(&self) -> Result<()> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}
