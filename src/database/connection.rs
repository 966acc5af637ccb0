use mongodb::{
    bson::{doc, Document},
    options::IndexOptions,
    Client, Database, IndexModel,
};

use super::{C2B_TRANSACTIONS, INCOMING_EVENTS, MERCHANTS, VALIDATION_RULES};
use crate::config::AppConfig;
use crate::errors::Result;

pub async fn get_db_client(config: &AppConfig) -> Result<Database> {
    let client = Client::with_uri_str(&config.database_url).await?;
    let db = client.database(&config.database_name);

    match db.list_collection_names().await {
        Ok(collections) => {
            tracing::info!("✅ Connected to database: {}", config.database_name);
            tracing::info!("📂 Collections found: {:?}", collections);
        }
        Err(e) => {
            tracing::error!(
                "❌ Database '{}' may not exist or is inaccessible: {}",
                config.database_name,
                e
            );
            return Err(e.into());
        }
    }

    ensure_indexes(&db).await?;
    Ok(db)
}

fn index(keys: Document, options: Option<IndexOptions>) -> IndexModel {
    IndexModel::builder().keys(keys).options(options).build()
}

fn unique() -> IndexOptions {
    IndexOptions::builder().unique(true).build()
}

/// The `(merchant_id, trans_id)` index is what makes the ledger upsert
/// collision-free; it only covers rows that actually carry an id.
pub async fn ensure_indexes(db: &Database) -> Result<()> {
    db.collection::<Document>(MERCHANTS)
        .create_index(index(doc! { "webhook_token": 1 }, Some(unique())))
        .await?;
    db.collection::<Document>(MERCHANTS)
        .create_index(index(doc! { "shortcode": 1 }, None))
        .await?;

    db.collection::<Document>(VALIDATION_RULES)
        .create_index(index(doc! { "merchant_id": 1 }, Some(unique())))
        .await?;

    db.collection::<Document>(INCOMING_EVENTS)
        .create_index(index(doc! { "idempotency_key": 1 }, None))
        .await?;
    db.collection::<Document>(INCOMING_EVENTS)
        .create_index(index(doc! { "merchant_id": 1, "received_at": -1 }, None))
        .await?;

    let with_trans_id = IndexOptions::builder()
        .unique(true)
        .name("uniq_merchant_trans_id".to_string())
        .partial_filter_expression(doc! { "trans_id": { "$type": "string" } })
        .build();
    let transactions = db.collection::<Document>(C2B_TRANSACTIONS);
    transactions
        .create_index(index(doc! { "merchant_id": 1, "trans_id": 1 }, Some(with_trans_id)))
        .await?;
    transactions
        .create_index(index(doc! { "merchant_id": 1, "trans_time": 1 }, None))
        .await?;
    transactions
        .create_index(index(doc! { "status": 1 }, None))
        .await?;

    tracing::info!("✅ Indexes ensured");
    Ok(())
}
