// services/token_cache.rs
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Tokens are treated as expired this long before the provider says they are.
pub const SAFETY_MARGIN_SECS: i64 = 30;

/// Identity of a Daraja app. The secret is only kept as a digest so it never
/// ends up in cache keys or logs, but rotating it still misses the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CredentialKey {
    pub consumer_key: String,
    secret_digest: String,
}

impl CredentialKey {
    pub fn new(consumer_key: &str, consumer_secret: &str) -> Self {
        CredentialKey {
            consumer_key: consumer_key.to_string(),
            secret_digest: hex::encode(Sha256::digest(consumer_secret.as_bytes())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    pub fn new(access_token: String, expires_in_secs: i64, obtained_at: DateTime<Utc>) -> Self {
        let lifetime = (expires_in_secs - SAFETY_MARGIN_SECS).max(0);
        CachedToken {
            access_token,
            expires_at: obtained_at + Duration::seconds(lifetime),
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[async_trait]
pub trait TokenCache: Send + Sync {
    /// A token that is still valid now, if one is cached.
    async fn get(&self, key: &CredentialKey) -> Option<CachedToken>;
    async fn put(&self, key: CredentialKey, token: CachedToken);
}

#[derive(Default)]
pub struct InMemoryTokenCache {
    tokens: RwLock<HashMap<CredentialKey, CachedToken>>,
}

impl InMemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenCache for InMemoryTokenCache {
    async fn get(&self, key: &CredentialKey) -> Option<CachedToken> {
        let tokens = self.tokens.read().await;
        tokens
            .get(key)
            .filter(|token| token.is_valid_at(Utc::now()))
            .cloned()
    }

    async fn put(&self, key: CredentialKey, token: CachedToken) {
        self.tokens.write().await.insert(key, token);
    }
}
