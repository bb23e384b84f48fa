use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{CheckoutRequest, CheckoutSession, PaymentGateway};
use crate::error::{AppError, Result};
use crate::models::Currency;

const PAYPAL_SANDBOX_URL: &str = "https://api-m.sandbox.paypal.com";
const PAYPAL_LIVE_URL: &str = "https://api-m.paypal.com";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    intent: &'static str,
    purchase_units: Vec<PurchaseUnit<'a>>,
    application_context: ApplicationContext<'a>,
}

#[derive(Debug, Serialize)]
struct PurchaseUnit<'a> {
    reference_id: &'a str,
    custom_id: &'a str,
    description: &'a str,
    amount: OrderAmount,
}

#[derive(Debug, Serialize)]
struct OrderAmount {
    currency_code: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct ApplicationContext<'a> {
    return_url: &'a str,
    cancel_url: &'a str,
    user_action: &'static str,
}

#[derive(Debug, Deserialize)]
struct OrderLink {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
pub struct PaypalOrder {
    pub id: String,
    pub status: String,
    #[serde(default)]
    links: Vec<OrderLink>,
}

impl PaypalOrder {
    pub fn is_completed(&self) -> bool {
        self.status == "COMPLETED"
    }

    fn approve_url(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.rel == "approve" || l.rel == "payer-action")
            .map(|l| l.href.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct PaypalClient {
    client: Client,
    client_id: String,
    client_secret: String,
    base_url: &'static str,
}

impl PaypalClient {
    pub fn new(client_id: &str, client_secret: &str, sandbox: bool) -> Self {
        Self {
            client: Client::new(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            base_url: if sandbox { PAYPAL_SANDBOX_URL } else { PAYPAL_LIVE_URL },
        }
    }

    async fn access_token(&self) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/v1/oauth2/token", self.base_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("PayPal API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!("PayPal auth error: {}", error_text)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse PayPal response: {}", e)))?;
        Ok(token.access_token)
    }

    pub async fn create_order(&self, request: &CheckoutRequest<'_>) -> Result<CheckoutSession> {
        // PayPal does not settle in Kenyan shillings
        if request.currency == Currency::Kes {
            return Err(AppError::BadRequest(
                "PayPal does not support KES payments".into(),
            ));
        }

        let token = self.access_token().await?;
        let body = CreateOrderRequest {
            intent: "CAPTURE",
            purchase_units: vec![PurchaseUnit {
                reference_id: request.transaction_id,
                custom_id: request.transaction_id,
                description: request.description,
                amount: OrderAmount {
                    currency_code: request.currency.as_ref().to_string(),
                    value: request.amount.round_dp(2).to_string(),
                },
            }],
            application_context: ApplicationContext {
                return_url: request.success_url,
                cancel_url: request.cancel_url,
                user_action: "PAY_NOW",
            },
        };

        let response = self
            .client
            .post(format!("{}/v2/checkout/orders", self.base_url))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("PayPal API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!("PayPal API error: {}", error_text)));
        }

        let order: PaypalOrder = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse PayPal response: {}", e)))?;

        let redirect_url = order
            .approve_url()
            .ok_or_else(|| AppError::Internal("PayPal order has no approval link".into()))?
            .to_string();

        Ok(CheckoutSession {
            reference: order.id,
            redirect_url,
            gateway: PaymentGateway::Paypal,
        })
    }

    pub async fn capture_order(&self, order_id: &str) -> Result<PaypalOrder> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(format!(
                "{}/v2/checkout/orders/{}/capture",
                self.base_url,
                urlencoding::encode(order_id)
            ))
            .bearer_auth(&token)
            .header("Content-Type", "application/json")
            .body("{}")
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("PayPal API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!("PayPal capture error: {}", error_text)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse PayPal response: {}", e)))
    }
}
