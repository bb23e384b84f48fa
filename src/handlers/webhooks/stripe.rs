use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};

use super::{active_gateway, process_once};
use crate::billing::purchase::complete_purchase;
use crate::db::{AppState, queries};
use crate::error::Result;
use crate::models::{ActorType, AuditAction};
use crate::payments::{
    PaymentGateway, StripeCheckoutSession, StripeClient, StripeSubscription, StripeWebhookEvent,
};
use crate::util::AuditLogBuilder;

pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let signature = match headers.get("stripe-signature") {
        Some(sig) => match sig.to_str() {
            Ok(s) => s.to_string(),
            Err(_) => return (StatusCode::BAD_REQUEST, "Invalid signature header"),
        },
        None => return (StatusCode::BAD_REQUEST, "Missing stripe-signature header"),
    };

    let config = match active_gateway(&state, PaymentGateway::Stripe) {
        Ok(Some(c)) => c,
        Ok(None) => return (StatusCode::OK, "Stripe not configured"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load Stripe settings");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };
    let Some(secret) = config.secret_key.as_deref() else {
        return (StatusCode::OK, "Stripe not configured");
    };

    let client = StripeClient::new(secret, config.webhook_secret.as_deref());
    let now = chrono::Utc::now().timestamp();
    match client.verify_webhook_signature(&body, &signature, now) {
        Ok(true) => {}
        Ok(false) => return (StatusCode::UNAUTHORIZED, "Invalid signature"),
        Err(e) => {
            tracing::error!(error = %e, "Stripe signature verification error");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Signature verification failed");
        }
    }

    let event: StripeWebhookEvent = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse Stripe webhook");
            return (StatusCode::BAD_REQUEST, "Invalid JSON");
        }
    };

    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let session: StripeCheckoutSession = match serde_json::from_value(event.data.object.clone()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to parse checkout session");
                    return (StatusCode::BAD_REQUEST, "Invalid checkout session");
                }
            };
            process_once(&state, "stripe", &event.id, || checkout_completed(&state, &session))
        }
        "customer.subscription.deleted" => {
            let subscription: StripeSubscription = match serde_json::from_value(event.data.object.clone()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to parse subscription");
                    return (StatusCode::BAD_REQUEST, "Invalid subscription");
                }
            };
            process_once(&state, "stripe", &event.id, || subscription_deleted(&state, &subscription))
        }
        _ => (StatusCode::OK, "Event ignored"),
    }
}

fn checkout_completed(state: &AppState, session: &StripeCheckoutSession) -> Result<&'static str> {
    if session.payment_status != "paid" {
        return Ok("Payment not completed");
    }
    let Some(transaction_id) = session.transaction_id() else {
        tracing::warn!(session_id = %session.id, "Checkout session without transaction id");
        return Ok("No transaction reference");
    };

    let tx = {
        let conn = state.db.get()?;
        let tx = match queries::get_transaction_by_id(&conn, transaction_id)? {
            Some(tx) => tx,
            None => match queries::get_transaction_by_reference(&conn, PaymentGateway::Stripe, &session.id)? {
                Some(tx) => tx,
                None => {
                    tracing::warn!(transaction_id, session_id = %session.id, "Stripe checkout for unknown transaction");
                    return Ok("Transaction not found");
                }
            },
        };
        if let (Some(customer), Some(user_id)) = (session.customer.as_deref(), tx.user_id.as_deref()) {
            queries::set_stripe_customer_id(&conn, user_id, customer)?;
        }
        tx
    };

    complete_purchase(state, &tx.id, "stripe_webhook")?;
    Ok("OK")
}

fn subscription_deleted(state: &AppState, subscription: &StripeSubscription) -> Result<&'static str> {
    let Some(customer) = subscription.customer.as_deref() else {
        return Ok("No customer");
    };
    let cancelled = {
        let conn = state.db.get()?;
        queries::cancel_subscription_by_stripe_customer(&conn, customer)?
    };

    tracing::info!(
        subscription_id = %subscription.id,
        customer,
        cancelled,
        "Stripe subscription deleted"
    );

    if cancelled > 0 {
        let audit_conn = state.audit.get()?;
        AuditLogBuilder::system(&audit_conn, state.audit_log_enabled)
            .actor(ActorType::System, None)
            .action(AuditAction::CancelSubscription)
            .resource("stripe_customer", customer)
            .details(&serde_json::json!({ "subscription_id": subscription.id }))
            .save()?;
    }
    Ok("OK")
}
