//! Thin client for the external payment gateway: opens transactions in
//! manual-capture mode, verifies callback signatures and captures authorized
//! funds. Built once at startup from configuration and carried in `AppState`.

use std::time::Duration;

use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::{app_error::AppError, config::GatewayConfig};

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
    currency: String,
    callback_url: String,
}

#[derive(Deserialize)]
struct GatewayOrder {
    id: String,
}

impl GatewayClient {
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build gateway HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            currency: config.currency.clone(),
            callback_url: config.callback_url.clone(),
        })
    }

    /// Public merchant key, safe to hand to the payment page.
    pub fn merchant_key(&self) -> &str {
        &self.key_id
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    /// Opens a gateway transaction for the exact amount. Capture is manual:
    /// funds are only authorized until the verified callback captures them.
    pub async fn create_order(&self, amount_minor_units: i64) -> Result<String, AppError> {
        let res = self
            .http
            .post(format!("{}/v1/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&serde_json::json!({
                "amount": amount_minor_units,
                "currency": self.currency,
                "payment_capture": 0,
            }))
            .send()
            .await
            .map_err(|_| AppError::ServiceUnreachable("PaymentGateway".into()))?;

        if !res.status().is_success() {
            return Err(AppError::Gateway(format!(
                "order creation returned {}",
                res.status()
            )));
        }

        let order: GatewayOrder = res.json().await.context("Failed to parse gateway order")?;
        Ok(order.id)
    }

    /// Verifies the callback signature: hex HMAC-SHA256 over
    /// `"{gateway_order_id}|{payment_id}"` keyed with the shared secret.
    /// Comparison is constant-time.
    pub fn verify_signature(
        &self,
        gateway_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<(), AppError> {
        let provided = hex::decode(signature).map_err(|_| AppError::SignatureMismatch)?;

        let mut mac = HmacSha256::new_from_slice(self.key_secret.as_bytes())
            .map_err(|_| AppError::SignatureMismatch)?;
        mac.update(gateway_order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());

        mac.verify_slice(&provided)
            .map_err(|_| AppError::SignatureMismatch)
    }

    /// Collects previously authorized funds for a payment.
    pub async fn capture(&self, payment_id: &str, amount_minor_units: i64) -> Result<(), AppError> {
        let res = self
            .http
            .post(format!(
                "{}/v1/payments/{}/capture",
                self.base_url, payment_id
            ))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&serde_json::json!({
                "amount": amount_minor_units,
                "currency": self.currency,
            }))
            .send()
            .await
            .map_err(|_| AppError::ServiceUnreachable("PaymentGateway".into()))?;

        if !res.status().is_success() {
            return Err(AppError::Capture(format!(
                "capture returned {}",
                res.status()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GatewayClient {
        GatewayClient::from_config(&GatewayConfig {
            base_url: "http://localhost:9999".into(),
            key_id: "rzp_test_key".into(),
            key_secret: "test_secret_key".into(),
            currency: "INR".into(),
            callback_url: "/payments/callback".into(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    // HMAC-SHA256("order_ABC123|pay_XYZ789", "test_secret_key")
    const VALID_SIG: &str = "b0b12113290ee2725c910a905e505ee6bb5ee8f268c106200dcc08f5fe79ad64";

    #[test]
    fn accepts_a_valid_signature() {
        assert!(
            client()
                .verify_signature("order_ABC123", "pay_XYZ789", VALID_SIG)
                .is_ok()
        );
    }

    #[test]
    fn rejects_a_signature_for_different_ids() {
        // Same signature bytes, but signed over a different order id.
        let result = client().verify_signature("order_other", "pay_XYZ789", VALID_SIG);
        assert!(matches!(result, Err(AppError::SignatureMismatch)));
    }

    #[test]
    fn rejects_a_tampered_signature() {
        let mut tampered = VALID_SIG.to_string();
        tampered.replace_range(0..1, "c");
        let result = client().verify_signature("order_ABC123", "pay_XYZ789", &tampered);
        assert!(matches!(result, Err(AppError::SignatureMismatch)));
    }

    #[test]
    fn rejects_a_non_hex_signature() {
        let result = client().verify_signature("order_ABC123", "pay_XYZ789", "not-hex!");
        assert!(matches!(result, Err(AppError::SignatureMismatch)));
    }
}
