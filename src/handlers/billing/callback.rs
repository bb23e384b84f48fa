use axum::{extract::State, response::Redirect};
use serde::Deserialize;

use crate::billing::purchase::complete_purchase;
use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Query;
use crate::models::{GatewayConfig, Transaction, TransactionStatus};
use crate::payments::{PaymentGateway, PaypalClient, PaystackClient, to_minor_units};
use crate::util::append_query_params;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub transaction: String,
    /// PayPal order id
    pub token: Option<String>,
    /// Paystack reference (`trxref` is its alias)
    pub reference: Option<String>,
    pub trxref: Option<String>,
}

fn load_gateway(state: &AppState, gateway: PaymentGateway) -> Result<GatewayConfig> {
    let conn = state.db.get()?;
    let row = queries::get_gateway_config(&conn, gateway, state.payments_sandbox)?
        .ok_or_else(|| AppError::Internal(format!("{} is not configured", gateway)))?;
    row.decrypt(&state.master_key)
}

/// Ask the gateway whether the payment went through. Stripe is confirmed
/// only by its webhook, so it never confirms here.
async fn confirm_with_gateway(state: &AppState, tx: &Transaction, query: &CallbackQuery) -> Result<bool> {
    match tx.gateway_name {
        PaymentGateway::Stripe => Ok(false),
        PaymentGateway::Paypal => {
            let config = load_gateway(state, PaymentGateway::Paypal)?;
            let (Some(client_id), Some(secret)) =
                (config.public_key.as_deref(), config.secret_key.as_deref())
            else {
                return Err(AppError::Internal("PayPal credentials incomplete".into()));
            };
            let order_id = query
                .token
                .as_deref()
                .or(tx.gateway_reference.as_deref())
                .ok_or_else(|| AppError::BadRequest("Missing PayPal order".into()))?;
            if tx.gateway_reference.as_deref().is_some_and(|r| r != order_id) {
                return Err(AppError::BadRequest("PayPal order does not match transaction".into()));
            }
            let order = PaypalClient::new(client_id, secret, config.sandbox)
                .capture_order(order_id)
                .await?;
            Ok(order.is_completed())
        }
        PaymentGateway::Paystack => {
            let config = load_gateway(state, PaymentGateway::Paystack)?;
            let secret = config
                .secret_key
                .as_deref()
                .ok_or_else(|| AppError::Internal("Paystack secret missing".into()))?;
            let reference = query
                .reference
                .as_deref()
                .or(query.trxref.as_deref())
                .unwrap_or(&tx.id);
            if reference != tx.id {
                return Err(AppError::BadRequest("Paystack reference does not match transaction".into()));
            }
            let verified = PaystackClient::new(secret).verify(reference).await?;
            Ok(verified.is_success()
                && verified.amount == to_minor_units(tx.amount)?
                && verified.currency.eq_ignore_ascii_case(tx.currency.as_ref()))
        }
    }
}

/// Return URL after the hosted checkout. Confirms PayPal and Paystack
/// payments synchronously, then sends the buyer to the success page with
/// `status=success` or `status=pending`.
pub async fn payment_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect> {
    let tx = {
        let conn = state.db.get()?;
        queries::get_transaction_by_id(&conn, &query.transaction)?
            .ok_or_else(|| AppError::NotFound("Transaction not found".into()))?
    };

    let mut status = tx.status;
    if status == TransactionStatus::Pending {
        match confirm_with_gateway(&state, &tx, &query).await {
            Ok(true) => {
                complete_purchase(&state, &tx.id, "callback")?;
                status = TransactionStatus::Active;
            }
            Ok(false) => {}
            Err(e) => {
                // The webhook may still confirm it
                tracing::warn!(transaction_id = %tx.id, error = %e, "Callback confirmation failed");
            }
        }
    }

    let outcome = if status == TransactionStatus::Active {
        "success"
    } else {
        "pending"
    };
    let redirect_url = append_query_params(
        &state.success_page_url,
        &[("status", outcome), ("transaction", &tx.id)],
    );
    Ok(Redirect::temporary(&redirect_url))
}
