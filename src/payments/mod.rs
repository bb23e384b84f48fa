mod paypal;
mod paystack;
mod stripe;

pub use paypal::*;
pub use paystack::*;
pub use stripe::*;

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::error::{AppError, Result};
use crate::models::{Currency, GatewayConfig};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString, Display, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PaymentGateway {
    Stripe,
    Paystack,
    Paypal,
}

impl PaymentGateway {
    pub fn default_display_name(&self) -> &'static str {
        match self {
            PaymentGateway::Stripe => "Card (Stripe)",
            PaymentGateway::Paystack => "M-Pesa & Card (Paystack)",
            PaymentGateway::Paypal => "PayPal",
        }
    }
}

/// What the gateway needs to open a hosted checkout for one transaction.
#[derive(Debug, Clone)]
pub struct CheckoutRequest<'a> {
    pub transaction_id: &'a str,
    pub description: &'a str,
    pub amount: Decimal,
    pub currency: Currency,
    pub customer_email: &'a str,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Gateway-side id (Stripe session, Paystack reference, PayPal order)
    pub reference: String,
    pub redirect_url: String,
    pub gateway: PaymentGateway,
}

/// Convert a decimal amount to the integer minor unit gateways expect (cents).
pub fn to_minor_units(amount: Decimal) -> Result<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| AppError::BadRequest("Amount out of range".into()))
}

fn require_secret(config: &GatewayConfig) -> Result<&str> {
    config.secret_key.as_deref().ok_or_else(|| {
        AppError::BadRequest(format!("{} is missing its secret key", config.display_name))
    })
}

/// Open a hosted checkout with whichever gateway `config` describes.
pub async fn create_checkout(
    config: &GatewayConfig,
    request: &CheckoutRequest<'_>,
) -> Result<CheckoutSession> {
    let secret = require_secret(config)?;
    match config.name {
        PaymentGateway::Stripe => {
            StripeClient::new(secret, config.webhook_secret.as_deref())
                .create_checkout_session(request)
                .await
        }
        PaymentGateway::Paystack => PaystackClient::new(secret).initialize(request).await,
        PaymentGateway::Paypal => {
            let client_id = config.public_key.as_deref().ok_or_else(|| {
                AppError::BadRequest("PayPal is missing its client id".into())
            })?;
            PaypalClient::new(client_id, secret, config.sandbox)
                .create_order(request)
                .await
        }
    }
}
