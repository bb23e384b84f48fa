use axum::{Extension, extract::State, http::HeaderMap};
use serde::Deserialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::middleware::UserContext;
use crate::models::{AuditAction, GatewayConfigMasked, UpdateGatewayConfig};
use crate::payments::PaymentGateway;
use crate::util::AuditLogBuilder;

#[derive(Debug, Deserialize)]
pub struct ModeQuery {
    /// Defaults to the server's configured mode
    pub sandbox: Option<bool>,
}

fn parse_gateway(name: &str) -> Result<PaymentGateway> {
    name.parse()
        .map_err(|_| AppError::NotFound(format!("Unknown payment gateway: {}", name)))
}

fn masked_config(state: &AppState, gateway: PaymentGateway, sandbox: bool) -> Result<GatewayConfigMasked> {
    let conn = state.db.get()?;
    match queries::get_gateway_config(&conn, gateway, sandbox)? {
        Some(row) => Ok(GatewayConfigMasked::from(&row.decrypt(&state.master_key)?)),
        None => Ok(GatewayConfigMasked::unconfigured(gateway, sandbox)),
    }
}

pub async fn get_payment_gateway(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(mode): Query<ModeQuery>,
) -> Result<Json<GatewayConfigMasked>> {
    let gateway = parse_gateway(&name)?;
    let sandbox = mode.sandbox.unwrap_or(state.payments_sandbox);
    Ok(Json(masked_config(&state, gateway, sandbox)?))
}

pub async fn update_payment_gateway(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    headers: HeaderMap,
    Path(name): Path<String>,
    Query(mode): Query<ModeQuery>,
    Json(input): Json<UpdateGatewayConfig>,
) -> Result<Json<GatewayConfigMasked>> {
    let gateway = parse_gateway(&name)?;
    let sandbox = mode.sandbox.unwrap_or(state.payments_sandbox);

    {
        let conn = state.db.get()?;
        queries::upsert_gateway_config(&conn, gateway, sandbox, &input, &state.master_key)?;
    }

    let audit_conn = state.audit.get()?;
    AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
        .actor(ctx.actor_type(), Some(&ctx.user.id))
        .email(&ctx.user.email)
        .action(AuditAction::UpdatePaymentGateway)
        .resource("payment_gateway", gateway.as_ref())
        .details(&serde_json::json!({
            "sandbox": sandbox,
            "is_active": input.is_active,
            "secret_key_changed": input.secret_key.as_deref().is_some_and(|s| !s.is_empty()),
            "webhook_secret_changed": input.webhook_secret.as_deref().is_some_and(|s| !s.is_empty()),
        }))
        .save()?;

    tracing::info!(gateway = %gateway, sandbox, is_active = input.is_active, "Payment gateway updated");

    Ok(Json(masked_config(&state, gateway, sandbox)?))
}
