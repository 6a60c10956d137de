use anyhow::{Context, Result};

/// Service configuration, resolved eagerly at startup. The gateway client is
/// built from this once in `main` and injected through `AppState`.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub key_id: String,
    pub key_secret: String,
    pub currency: String,
    pub callback_url: String,
    pub timeout_secs: u64,
}

pub fn load() -> Result<Config> {
    Ok(Config {
        database_url: require("DATABASE_URL")?,
        bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        gateway: GatewayConfig {
            base_url: std::env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.razorpay.com".to_string()),
            key_id: require("GATEWAY_KEY_ID")?,
            key_secret: require("GATEWAY_KEY_SECRET")?,
            currency: std::env::var("GATEWAY_CURRENCY").unwrap_or_else(|_| "INR".to_string()),
            callback_url: std::env::var("PAYMENT_CALLBACK_URL")
                .unwrap_or_else(|_| "/payments/callback".to_string()),
            timeout_secs: std::env::var("GATEWAY_TIMEOUT_SECS")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(10),
        },
    })
}

fn require(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Missing required environment variable {key}"))
}
