use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use subtle::ConstantTimeEq;

use super::{CheckoutRequest, CheckoutSession, PaymentGateway, to_minor_units};
use crate::error::{AppError, Result};

type HmacSha512 = Hmac<Sha512>;

const PAYSTACK_API_URL: &str = "https://api.paystack.co";

#[derive(Debug, Serialize)]
struct InitializeRequest<'a> {
    email: &'a str,
    /// Minor units (kobo/cents)
    amount: i64,
    currency: &'a str,
    reference: &'a str,
    callback_url: &'a str,
    metadata: InitializeMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct InitializeMetadata<'a> {
    transaction_id: &'a str,
    cancel_action: &'a str,
}

#[derive(Debug, Deserialize)]
struct PaystackEnvelope<T> {
    status: bool,
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    reference: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaystackTransaction {
    pub reference: String,
    pub status: String,
    pub amount: i64,
    pub currency: String,
}

impl PaystackTransaction {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Debug, Clone)]
pub struct PaystackClient {
    client: Client,
    secret_key: String,
}

impl PaystackClient {
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(),
            secret_key: secret_key.to_string(),
        }
    }

    /// Initialize a transaction. Our transaction id is used as the Paystack
    /// reference so webhooks and callbacks map straight back to it.
    pub async fn initialize(&self, request: &CheckoutRequest<'_>) -> Result<CheckoutSession> {
        let body = InitializeRequest {
            email: request.customer_email,
            amount: to_minor_units(request.amount)?,
            currency: request.currency.as_ref(),
            reference: request.transaction_id,
            callback_url: request.success_url,
            metadata: InitializeMetadata {
                transaction_id: request.transaction_id,
                cancel_action: request.cancel_url,
            },
        };

        let response = self
            .client
            .post(format!("{}/transaction/initialize", PAYSTACK_API_URL))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Paystack API error: {}", e)))?;

        let envelope: PaystackEnvelope<InitializeData> = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Paystack response: {}", e)))?;

        let data = match (envelope.status, envelope.data) {
            (true, Some(data)) => data,
            _ => {
                return Err(AppError::Internal(format!(
                    "Paystack API error: {}",
                    envelope.message
                )));
            }
        };

        Ok(CheckoutSession {
            reference: data.reference,
            redirect_url: data.authorization_url,
            gateway: PaymentGateway::Paystack,
        })
    }

    pub async fn verify(&self, reference: &str) -> Result<PaystackTransaction> {
        let response = self
            .client
            .get(format!(
                "{}/transaction/verify/{}",
                PAYSTACK_API_URL,
                urlencoding::encode(reference)
            ))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Paystack API error: {}", e)))?;

        let envelope: PaystackEnvelope<PaystackTransaction> = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Paystack response: {}", e)))?;

        envelope
            .data
            .filter(|_| envelope.status)
            .ok_or_else(|| AppError::Internal(format!("Paystack API error: {}", envelope.message)))
    }

    /// Paystack signs the raw body with the account secret key (HMAC-SHA512, hex).
    pub fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<bool> {
        let expected = sign_paystack_payload(&self.secret_key, payload)?;
        Ok(bool::from(
            expected.as_bytes().ct_eq(signature.trim().to_ascii_lowercase().as_bytes()),
        ))
    }
}

pub fn sign_paystack_payload(secret_key: &str, payload: &[u8]) -> Result<String> {
    let mut mac = HmacSha512::new_from_slice(secret_key.as_bytes())
        .map_err(|_| AppError::Internal("Invalid Paystack secret".into()))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[derive(Debug, Deserialize)]
pub struct PaystackWebhookEvent {
    pub event: String,
    pub data: PaystackEventData,
}

#[derive(Debug, Deserialize)]
pub struct PaystackEventData {
    pub id: Option<i64>,
    pub reference: String,
    pub status: String,
    pub amount: i64,
    pub currency: String,
}
