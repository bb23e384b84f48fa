mod paystack;
mod stripe;

pub use paystack::*;
pub use stripe::*;

use axum::{Router, http::StatusCode, routing::post};

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::models::GatewayConfig;
use crate::payments::PaymentGateway;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhooks/stripe", post(handle_stripe_webhook))
        .route("/webhooks/paystack", post(handle_paystack_webhook))
}

/// Gateway settings for the configured mode, only when active.
fn active_gateway(state: &AppState, gateway: PaymentGateway) -> Result<Option<GatewayConfig>> {
    let conn = state.db.get()?;
    match queries::get_gateway_config(&conn, gateway, state.payments_sandbox)? {
        Some(row) if row.is_active => Ok(Some(row.decrypt(&state.master_key)?)),
        _ => Ok(None),
    }
}

/// Run `process` once per provider event id. A failed run releases the id
/// so the provider's retry is handled again.
fn process_once<F>(
    state: &AppState,
    provider: &str,
    event_id: &str,
    process: F,
) -> (StatusCode, &'static str)
where
    F: FnOnce() -> Result<&'static str>,
{
    let record = || -> Result<bool> {
        let conn = state.db.get()?;
        queries::try_record_webhook_event(&conn, provider, event_id)
    };
    let first_delivery = match record() {
        Ok(first) => first,
        Err(e) => {
            tracing::error!(provider, event_id, error = %e, "Failed to record webhook event");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };
    if !first_delivery {
        tracing::info!(provider, event_id, "Duplicate webhook event ignored");
        return (StatusCode::OK, "Already processed");
    }

    match process() {
        Ok(message) => (StatusCode::OK, message),
        Err(e) => {
            tracing::error!(provider, event_id, error = %e, "Webhook processing failed");
            if let Ok(conn) = state.db.get() {
                if let Err(e) = queries::release_webhook_event(&conn, provider, event_id) {
                    tracing::error!(provider, event_id, error = %e, "Failed to release webhook event");
                }
            }
            (StatusCode::INTERNAL_SERVER_ERROR, "Processing failed")
        }
    }
}
