// services/daraja_service.rs
use base64::{engine::general_purpose::STANDARD as base64, Engine as _};
use chrono::Utc;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

use super::token_cache::{CachedToken, CredentialKey, TokenCache};

const DEFAULT_EXPIRES_IN: i64 = 3599;

#[derive(Debug, Error)]
pub enum DarajaError {
    /// Local misconfiguration, e.g. a callback URL the provider can never reach.
    #[error("{0}")]
    Config(String),

    /// The request failed in transit, timed out, or the provider refused it.
    #[error("{0}")]
    Transport(String),
}

#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub access_token: Option<String>,
    pub expires_in: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct RegisterUrlRequest {
    #[serde(rename = "ShortCode")]
    pub short_code: String,
    #[serde(rename = "ResponseType")]
    pub response_type: String,
    #[serde(rename = "ConfirmationURL")]
    pub confirmation_url: String,
    #[serde(rename = "ValidationURL")]
    pub validation_url: String,
}

#[derive(Debug, Serialize)]
pub struct SimulateRequest {
    #[serde(rename = "ShortCode")]
    pub short_code: String,
    #[serde(rename = "CommandID")]
    pub command_id: String,
    #[serde(rename = "Amount")]
    pub amount: String,
    #[serde(rename = "Msisdn")]
    pub msisdn: String,
    #[serde(rename = "BillRefNumber")]
    pub bill_ref_number: String,
}

/// Thin client for the Daraja endpoints the gateway calls out to.
///
/// Never retries; a timeout or non-2xx answer is returned to the caller as
/// [`DarajaError::Transport`].
#[derive(Clone)]
pub struct DarajaService {
    base_url: String,
    client: Client,
    token_cache: Arc<dyn TokenCache>,
}

impl DarajaService {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        token_cache: Arc<dyn TokenCache>,
    ) -> Result<Self, DarajaError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DarajaError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(DarajaService {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            token_cache,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    pub async fn get_access_token(
        &self,
        consumer_key: &str,
        consumer_secret: &str,
    ) -> Result<String, DarajaError> {
        let cache_key = CredentialKey::new(consumer_key, consumer_secret);
        if let Some(token) = self.token_cache.get(&cache_key).await {
            info!("Using cached access token");
            return Ok(token.access_token);
        }

        info!("Requesting new access token");
        let encoded_auth = base64.encode(format!("{}:{}", consumer_key, consumer_secret));

        let response = self
            .client
            .get(self.url("oauth/v1/generate?grant_type=client_credentials"))
            .header(header::AUTHORIZATION, format!("Basic {}", encoded_auth))
            .send()
            .await
            .map_err(|e| DarajaError::Transport(format!("OAuth request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Failed to get access token: {} - {}", status, body);
            return Err(DarajaError::Transport(format!(
                "OAuth request failed ({})",
                status
            )));
        }

        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| DarajaError::Transport(format!("OAuth response unreadable: {}", e)))?;

        let access_token = auth
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| DarajaError::Transport("OAuth response missing access_token".into()))?;

        // Daraja sends expires_in as a string ("3599"); tolerate numbers too.
        let expires_in = match auth.expires_in {
            Some(Value::String(s)) => s.parse().unwrap_or(DEFAULT_EXPIRES_IN),
            Some(Value::Number(n)) => n.as_i64().unwrap_or(DEFAULT_EXPIRES_IN),
            _ => DEFAULT_EXPIRES_IN,
        };

        self.token_cache
            .put(
                cache_key,
                CachedToken::new(access_token.clone(), expires_in, Utc::now()),
            )
            .await;

        info!("Access token obtained");
        Ok(access_token)
    }

    /// C2B RegisterURL.
    #[allow(clippy::too_many_arguments)]
    pub async fn register_c2b_urls(
        &self,
        consumer_key: &str,
        consumer_secret: &str,
        short_code: &str,
        response_type: &str,
        validation_url: &str,
        confirmation_url: &str,
    ) -> Result<Value, DarajaError> {
        check_callback_url("ValidationURL", validation_url)?;
        check_callback_url("ConfirmationURL", confirmation_url)?;

        info!("C2B: registering callback URLs for {}", short_code);
        let request = RegisterUrlRequest {
            short_code: short_code.to_string(),
            response_type: response_type.to_string(),
            confirmation_url: confirmation_url.to_string(),
            validation_url: validation_url.to_string(),
        };

        let token = self.get_access_token(consumer_key, consumer_secret).await?;
        self.post_json("mpesa/c2b/v1/registerurl", &token, &request, "RegisterURL")
            .await
    }

    /// C2B Simulate. Sandbox only on the provider side.
    #[allow(clippy::too_many_arguments)]
    pub async fn simulate_c2b(
        &self,
        consumer_key: &str,
        consumer_secret: &str,
        short_code: &str,
        amount: &str,
        msisdn: &str,
        bill_ref_number: &str,
        command_id: &str,
    ) -> Result<Value, DarajaError> {
        info!("C2B: simulating KSh {} to {}", amount, short_code);
        let request = SimulateRequest {
            short_code: short_code.to_string(),
            command_id: command_id.to_string(),
            amount: amount.to_string(),
            msisdn: msisdn.to_string(),
            bill_ref_number: bill_ref_number.to_string(),
        };

        let token = self.get_access_token(consumer_key, consumer_secret).await?;
        self.post_json("mpesa/c2b/v1/simulate", &token, &request, "Simulate")
            .await
    }

    async fn post_json<T: Serialize>(
        &self,
        path: &str,
        access_token: &str,
        body: &T,
        label: &str,
    ) -> Result<Value, DarajaError> {
        let response = self
            .client
            .post(self.url(path))
            .header(header::AUTHORIZATION, format!("Bearer {}", access_token))
            .header(header::CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| DarajaError::Transport(format!("{} failed: {}", label, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("{} failed: {} - {}", label, status, body);
            return Err(DarajaError::Transport(format!(
                "{} failed ({}): {}",
                label, status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| DarajaError::Transport(format!("{} response unreadable: {}", label, e)))
    }
}

/// Daraja only calls public HTTPS endpoints.
pub fn check_callback_url(label: &str, url: &str) -> Result<(), DarajaError> {
    let lower = url.to_lowercase();
    if !lower.starts_with("https://") {
        return Err(DarajaError::Config(format!(
            "{} must be https:// (got {:?}). Use a tunnel and register the public URL.",
            label, url
        )));
    }
    if lower.contains("localhost") || lower.contains("127.0.0.1") {
        return Err(DarajaError::Config(format!(
            "{} cannot be localhost/127.0.0.1 (got {:?}).",
            label, url
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_urls_must_be_public_https() {
        assert!(check_callback_url("ValidationURL", "https://pay.example.com/webhooks/").is_ok());
        assert!(matches!(
            check_callback_url("ValidationURL", "http://pay.example.com/"),
            Err(DarajaError::Config(_))
        ));
        assert!(matches!(
            check_callback_url("ConfirmationURL", "https://localhost:8000/"),
            Err(DarajaError::Config(_))
        ));
        assert!(matches!(
            check_callback_url("ConfirmationURL", "https://127.0.0.1/"),
            Err(DarajaError::Config(_))
        ));
    }
}
