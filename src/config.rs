// config.rs
use chrono::FixedOffset;
use std::env;
use std::time::Duration;

use crate::errors::{AppError, Result};

const SANDBOX_BASE_URL: &str = "https://sandbox.safaricom.co.ke";
const PRODUCTION_BASE_URL: &str = "https://api.safaricom.co.ke";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    MongoDb,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage_backend: StorageBackend,
    pub database_url: String,
    pub database_name: String,
    pub mpesa_environment: String,
    pub daraja_base_url: String,
    pub daraja_timeout: Duration,
    /// Externally reachable origin the provider calls back on, e.g. `https://pay.example.com`.
    pub public_base_url: String,
    pub admin_api_key: String,
    pub trust_proxy_headers: bool,
    /// Offset of the provider's local clock, used to read `TransTime`.
    pub provider_utc_offset: FixedOffset,
    pub port: u16,
    pub host: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let storage_backend = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "mongodb".to_string())
            .to_lowercase()
            .as_str()
        {
            "mongodb" | "mongo" => StorageBackend::MongoDb,
            "memory" => StorageBackend::Memory,
            other => {
                return Err(AppError::configuration(format!(
                    "STORAGE_BACKEND must be mongodb or memory (got {})",
                    other
                )))
            }
        };

        let database_url = match storage_backend {
            StorageBackend::MongoDb => required("DATABASE_URL")?,
            StorageBackend::Memory => env::var("DATABASE_URL").unwrap_or_default(),
        };

        let mpesa_environment =
            env::var("MPESA_ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string());
        let daraja_base_url = env::var("DARAJA_BASE_URL").unwrap_or_else(|_| {
            if mpesa_environment == "production" {
                PRODUCTION_BASE_URL.to_string()
            } else {
                SANDBOX_BASE_URL.to_string()
            }
        });

        let daraja_timeout = env::var("DARAJA_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| AppError::configuration("DARAJA_TIMEOUT_SECS must be a number"))?;

        let provider_utc_offset = parse_utc_offset(
            &env::var("PROVIDER_UTC_OFFSET").unwrap_or_else(|_| "+03:00".to_string()),
        )?;

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| AppError::configuration("PORT must be a number"))?;

        Ok(AppConfig {
            storage_backend,
            database_url,
            database_name: env::var("DATABASE_NAME").unwrap_or_else(|_| "c2b".to_string()),
            mpesa_environment,
            daraja_base_url,
            daraja_timeout,
            public_base_url: required("PUBLIC_BASE_URL")?,
            admin_api_key: required("ADMIN_API_KEY")?,
            trust_proxy_headers: env::var("TRUST_PROXY_HEADERS")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            provider_utc_offset,
            port,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.mpesa_environment == "production"
    }

    /// Callback URLs for a merchant, as registered with the provider.
    pub fn webhook_urls(&self, merchant_id: &str, token: &str) -> (String, String) {
        let base = self.public_base_url.trim_end_matches('/');
        (
            format!("{}/webhooks/c2b/{}/{}/validation/", base, merchant_id, token),
            format!("{}/webhooks/c2b/{}/{}/confirmation/", base, merchant_id, token),
        )
    }

    pub fn get_config_info(&self) -> serde_json::Value {
        serde_json::json!({
            "environment": self.mpesa_environment,
            "is_production": self.is_production(),
            "daraja_base_url": self.daraja_base_url,
            "public_base_url": self.public_base_url,
            "storage_backend": format!("{:?}", self.storage_backend),
            "trust_proxy_headers": self.trust_proxy_headers,
            "provider_utc_offset": self.provider_utc_offset.to_string(),
            "port": self.port,
            "host": self.host,
        })
    }
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| AppError::configuration(format!("{} must be set", name)))
}

/// Parses `+HH:MM` / `-HH:MM`.
pub fn parse_utc_offset(value: &str) -> Result<FixedOffset> {
    let invalid = || AppError::configuration(format!("invalid UTC offset: {}", value));

    let (sign, rest) = match value.as_bytes().first() {
        Some(b'+') => (1, &value[1..]),
        Some(b'-') => (-1, &value[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 14 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}
