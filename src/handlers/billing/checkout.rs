use axum::{Extension, extract::State, http::HeaderMap};

use crate::billing::purchase::{self, InitiatePayment, InitiatePaymentResponse};
use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::Json;
use crate::middleware::UserContext;
use crate::models::{ActiveGateway, AuditAction, Transaction};
use crate::util::AuditLogBuilder;

pub async fn list_active_gateways(State(state): State<AppState>) -> Result<Json<Vec<ActiveGateway>>> {
    let conn = state.db.get()?;
    let gateways = queries::list_active_gateways(&conn, state.payments_sandbox)?
        .into_iter()
        .map(|g| ActiveGateway {
            name: g.name,
            display_name: g.display_name,
        })
        .collect();
    Ok(Json(gateways))
}

pub async fn initiate_payment(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    headers: HeaderMap,
    Json(input): Json<InitiatePayment>,
) -> Result<Json<InitiatePaymentResponse>> {
    let (transaction, response) = purchase::initiate_payment(&state, &ctx.user, &input).await?;

    let audit_conn = state.audit.get()?;
    AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
        .actor(ctx.actor_type(), Some(&ctx.user.id))
        .email(&ctx.user.email)
        .action(AuditAction::InitiatePayment)
        .resource("transaction", &transaction.id)
        .details(&serde_json::json!({
            "gateway": transaction.gateway_name,
            "amount": transaction.amount,
            "currency": transaction.currency,
            "purchase_type": transaction.transaction_type,
            "plan_id": transaction.plan_id,
        }))
        .save()?;

    Ok(Json(response))
}

pub async fn list_my_transactions(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
) -> Result<Json<Vec<Transaction>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_transactions_for_user(&conn, &ctx.user.id)?))
}
