use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};

use super::{active_gateway, process_once};
use crate::billing::purchase::complete_purchase;
use crate::db::{AppState, queries};
use crate::error::Result;
use crate::models::TransactionStatus;
use crate::payments::{PaymentGateway, PaystackClient, PaystackEventData, PaystackWebhookEvent, to_minor_units};

pub async fn handle_paystack_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let signature = match headers.get("x-paystack-signature").map(|v| v.to_str()) {
        Some(Ok(s)) => s.to_string(),
        Some(Err(_)) => return (StatusCode::BAD_REQUEST, "Invalid signature header"),
        None => return (StatusCode::BAD_REQUEST, "Missing x-paystack-signature header"),
    };

    let config = match active_gateway(&state, PaymentGateway::Paystack) {
        Ok(Some(c)) => c,
        Ok(None) => return (StatusCode::OK, "Paystack not configured"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load Paystack settings");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };
    let Some(secret) = config.secret_key.as_deref() else {
        return (StatusCode::OK, "Paystack not configured");
    };

    match PaystackClient::new(secret).verify_webhook_signature(&body, &signature) {
        Ok(true) => {}
        Ok(false) => return (StatusCode::UNAUTHORIZED, "Invalid signature"),
        Err(e) => {
            tracing::error!(error = %e, "Paystack signature verification error");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Signature verification failed");
        }
    }

    let event: PaystackWebhookEvent = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse Paystack webhook");
            return (StatusCode::BAD_REQUEST, "Invalid JSON");
        }
    };

    if event.event != "charge.success" {
        return (StatusCode::OK, "Event ignored");
    }

    // Paystack has no event id; the charge id or reference identifies it
    let event_id = match event.data.id {
        Some(id) => format!("{}:{}", event.event, id),
        None => format!("{}:{}", event.event, event.data.reference),
    };
    process_once(&state, "paystack", &event_id, || charge_success(&state, &event.data))
}

fn charge_success(state: &AppState, charge: &PaystackEventData) -> Result<&'static str> {
    if !charge.status.eq_ignore_ascii_case("success") {
        return Ok("Charge not successful");
    }

    let tx = {
        let conn = state.db.get()?;
        match queries::get_transaction_by_id(&conn, &charge.reference)? {
            Some(tx) if tx.gateway_name == PaymentGateway::Paystack => tx,
            _ => {
                tracing::warn!(reference = %charge.reference, "Paystack charge for unknown transaction");
                return Ok("Transaction not found");
            }
        }
    };

    if tx.status != TransactionStatus::Pending {
        return Ok("Already processed");
    }
    if charge.amount != to_minor_units(tx.amount)?
        || !charge.currency.eq_ignore_ascii_case(tx.currency.as_ref())
    {
        tracing::warn!(
            transaction_id = %tx.id,
            expected_amount = %tx.amount,
            charged_minor = charge.amount,
            currency = %charge.currency,
            "Paystack charge does not match transaction"
        );
        return Ok("Amount mismatch");
    }

    complete_purchase(state, &tx.id, "paystack_webhook")?;
    Ok("OK")
}
