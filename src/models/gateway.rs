use serde::{Deserialize, Serialize};

use crate::crypto::{MasterKey, mask_secret};
use crate::error::Result;
use crate::payments::PaymentGateway;

/// Gateway credentials as stored: secrets are sealed with the master key.
#[derive(Debug, Clone)]
pub struct GatewayConfigRow {
    pub name: PaymentGateway,
    pub sandbox: bool,
    pub is_active: bool,
    pub display_name: String,
    pub public_key: Option<String>,
    pub encrypted_secret_key: Option<Vec<u8>>,
    pub encrypted_webhook_secret: Option<Vec<u8>>,
    pub updated_at: i64,
}

/// Decrypted gateway credentials, only ever held in memory.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub name: PaymentGateway,
    pub sandbox: bool,
    pub is_active: bool,
    pub display_name: String,
    /// Stripe publishable key, Paystack public key or PayPal client id
    pub public_key: Option<String>,
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub updated_at: i64,
}

pub fn gateway_secret_context(name: PaymentGateway, sandbox: bool, field: &str) -> String {
    format!(
        "gateway:{}:{}:{}",
        name.as_ref(),
        if sandbox { "sandbox" } else { "live" },
        field
    )
}

impl GatewayConfigRow {
    pub fn decrypt(&self, master_key: &MasterKey) -> Result<GatewayConfig> {
        let secret_key = self
            .encrypted_secret_key
            .as_deref()
            .map(|data| {
                master_key.decrypt_str(
                    &gateway_secret_context(self.name, self.sandbox, "secret_key"),
                    data,
                )
            })
            .transpose()?;
        let webhook_secret = self
            .encrypted_webhook_secret
            .as_deref()
            .map(|data| {
                master_key.decrypt_str(
                    &gateway_secret_context(self.name, self.sandbox, "webhook_secret"),
                    data,
                )
            })
            .transpose()?;

        Ok(GatewayConfig {
            name: self.name,
            sandbox: self.sandbox,
            is_active: self.is_active,
            display_name: self.display_name.clone(),
            public_key: self.public_key.clone(),
            secret_key,
            webhook_secret,
            updated_at: self.updated_at,
        })
    }
}

/// Admin view: secrets masked.
#[derive(Debug, Serialize)]
pub struct GatewayConfigMasked {
    pub name: PaymentGateway,
    pub sandbox: bool,
    pub is_active: bool,
    pub display_name: String,
    pub public_key: Option<String>,
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub updated_at: Option<i64>,
}

impl From<&GatewayConfig> for GatewayConfigMasked {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            name: config.name,
            sandbox: config.sandbox,
            is_active: config.is_active,
            display_name: config.display_name.clone(),
            public_key: config.public_key.clone(),
            secret_key: config.secret_key.as_deref().map(mask_secret),
            webhook_secret: config.webhook_secret.as_deref().map(mask_secret),
            updated_at: Some(config.updated_at),
        }
    }
}

impl GatewayConfigMasked {
    /// Placeholder returned for a gateway that has never been configured.
    pub fn unconfigured(name: PaymentGateway, sandbox: bool) -> Self {
        Self {
            name,
            sandbox,
            is_active: false,
            display_name: name.default_display_name().to_string(),
            public_key: None,
            secret_key: None,
            webhook_secret: None,
            updated_at: None,
        }
    }
}

/// `PUT /api/admin/payment-gateways/{name}`. Omitted secrets keep their
/// stored value so the admin form can round-trip masked values.
#[derive(Debug, Deserialize)]
pub struct UpdateGatewayConfig {
    pub is_active: bool,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

/// Entry of `GET /api/billing/active-gateways`.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveGateway {
    pub name: PaymentGateway,
    pub display_name: String,
}
