use std::collections::HashMap;

use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::{CheckoutRequest, CheckoutSession, PaymentGateway, to_minor_units};
use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API_URL: &str = "https://api.stripe.com/v1";

/// Signed timestamps older (or newer) than this are rejected.
pub const STRIPE_SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
    webhook_secret: Option<String>,
}

impl StripeClient {
    pub fn new(secret_key: &str, webhook_secret: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            secret_key: secret_key.to_string(),
            webhook_secret: webhook_secret.map(String::from),
        }
    }

    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest<'_>,
    ) -> Result<CheckoutSession> {
        let unit_amount = to_minor_units(request.amount)?;
        let currency = request.currency.as_ref().to_lowercase();

        let form: Vec<(&str, String)> = vec![
            ("mode", "payment".to_string()),
            ("success_url", request.success_url.to_string()),
            ("cancel_url", request.cancel_url.to_string()),
            ("client_reference_id", request.transaction_id.to_string()),
            ("customer_email", request.customer_email.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", currency),
            ("line_items[0][price_data][unit_amount]", unit_amount.to_string()),
            (
                "line_items[0][price_data][product_data][name]",
                request.description.to_string(),
            ),
            ("metadata[transaction_id]", request.transaction_id.to_string()),
        ];

        let response = self
            .client
            .post(format!("{}/checkout/sessions", STRIPE_API_URL))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Stripe API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!("Stripe API error: {}", error_text)));
        }

        let session: CreateSessionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Stripe response: {}", e)))?;

        let url = session
            .url
            .ok_or_else(|| AppError::Internal("Stripe session has no checkout URL".into()))?;

        Ok(CheckoutSession {
            reference: session.id,
            redirect_url: url,
            gateway: PaymentGateway::Stripe,
        })
    }

    /// Verify a `Stripe-Signature` header (`t=...,v1=...`) against the raw body.
    ///
    /// Returns `Ok(false)` for a well-formed header that does not match or is
    /// outside the tolerance window; `Err` when no webhook secret is configured.
    pub fn verify_webhook_signature(&self, payload: &[u8], header: &str, now: i64) -> Result<bool> {
        let secret = self
            .webhook_secret
            .as_deref()
            .ok_or_else(|| AppError::Internal("Stripe webhook secret not configured".into()))?;

        let mut timestamp: Option<i64> = None;
        let mut candidates: Vec<&str> = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse().ok(),
                Some(("v1", value)) => candidates.push(value),
                _ => {}
            }
        }

        let Some(timestamp) = timestamp else {
            return Ok(false);
        };
        if (now - timestamp).abs() > STRIPE_SIGNATURE_TOLERANCE_SECS {
            tracing::warn!(timestamp, now, "Stripe signature outside tolerance window");
            return Ok(false);
        }

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| AppError::Internal("Invalid webhook secret".into()))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        let expected = hex::encode(mac.finalize().into_bytes());

        Ok(candidates
            .iter()
            .any(|candidate| bool::from(expected.as_bytes().ct_eq(candidate.as_bytes()))))
    }
}

/// Compute a `Stripe-Signature` header value. Used by tests and local tooling.
pub fn sign_stripe_payload(secret: &str, payload: &[u8], timestamp: i64) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub payment_status: String,
    pub client_reference_id: Option<String>,
    pub customer: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripeCheckoutSession {
    pub fn transaction_id(&self) -> Option<&str> {
        self.metadata
            .get("transaction_id")
            .map(String::as_str)
            .or(self.client_reference_id.as_deref())
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: Option<String>,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    fn client() -> StripeClient {
        StripeClient::new("sk_test_123", Some(SECRET))
    }

    #[test]
    fn test_valid_signature() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign_stripe_payload(SECRET, payload, 1_700_000_000);
        assert!(client().verify_webhook_signature(payload, &header, 1_700_000_010).unwrap());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let header = sign_stripe_payload(SECRET, br#"{"id":"evt_1"}"#, 1_700_000_000);
        assert!(!client()
            .verify_webhook_signature(br#"{"id":"evt_2"}"#, &header, 1_700_000_000)
            .unwrap());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign_stripe_payload(SECRET, payload, 1_700_000_000);
        let later = 1_700_000_000 + STRIPE_SIGNATURE_TOLERANCE_SECS + 1;
        assert!(!client().verify_webhook_signature(payload, &header, later).unwrap());
    }

    #[test]
    fn test_any_v1_candidate_may_match() {
        let payload = b"{}";
        let good = sign_stripe_payload(SECRET, payload, 100);
        let v1 = good.split("v1=").nth(1).unwrap();
        let header = format!("t=100,v1=deadbeef,v1={}", v1);
        assert!(client().verify_webhook_signature(payload, &header, 100).unwrap());
    }

    #[test]
    fn test_missing_secret_is_error() {
        let client = StripeClient::new("sk_test_123", None);
        assert!(client.verify_webhook_signature(b"{}", "t=1,v1=aa", 1).is_err());
    }

    #[test]
    fn test_malformed_header_rejected() {
        assert!(!client().verify_webhook_signature(b"{}", "garbage", 1).unwrap());
    }
}
