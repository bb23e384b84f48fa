use axum::{Extension, extract::State, http::HeaderMap};
use serde::Serialize;

use super::ModeQuery;
use crate::db::{AppState, queries};
use crate::email::{DEFAULT_TEMPLATES, EmailSendResult, TEST_EMAIL_TEMPLATE};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Query};
use crate::middleware::UserContext;
use crate::models::{AuditAction, MailgunSettingsMasked, SendTestEmail, UpdateMailgunSettings, validate_email};
use crate::util::AuditLogBuilder;

#[derive(Debug, Serialize)]
pub struct InstallTemplatesResponse {
    pub installed: usize,
    pub total: usize,
}

fn masked_settings(state: &AppState, sandbox: bool) -> Result<MailgunSettingsMasked> {
    let conn = state.db.get()?;
    match queries::get_mailgun_settings(&conn, sandbox)? {
        Some(row) => Ok(MailgunSettingsMasked::from(&row.decrypt(&state.master_key)?)),
        None => Ok(MailgunSettingsMasked::unconfigured(sandbox)),
    }
}

pub async fn get_mailgun_settings(
    State(state): State<AppState>,
    Query(mode): Query<ModeQuery>,
) -> Result<Json<MailgunSettingsMasked>> {
    let sandbox = mode.sandbox.unwrap_or(state.payments_sandbox);
    Ok(Json(masked_settings(&state, sandbox)?))
}

pub async fn update_mailgun_settings(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    headers: HeaderMap,
    Query(mode): Query<ModeQuery>,
    Json(input): Json<UpdateMailgunSettings>,
) -> Result<Json<MailgunSettingsMasked>> {
    if input.domain.trim().is_empty() {
        return Err(AppError::BadRequest("domain is required".into()));
    }
    if let Some(ref from) = input.from_email {
        validate_email(from)?;
    }
    let sandbox = mode.sandbox.unwrap_or(state.payments_sandbox);

    {
        let conn = state.db.get()?;
        queries::upsert_mailgun_settings(&conn, sandbox, &input, &state.master_key)?;
    }

    let audit_conn = state.audit.get()?;
    AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
        .actor(ctx.actor_type(), Some(&ctx.user.id))
        .email(&ctx.user.email)
        .action(AuditAction::UpdateEmailSettings)
        .resource("email_settings", "mailgun")
        .details(&serde_json::json!({
            "sandbox": sandbox,
            "domain": input.domain,
            "is_active": input.is_active,
            "api_key_changed": input.api_key.is_some(),
        }))
        .save()?;

    Ok(Json(masked_settings(&state, sandbox)?))
}

pub async fn send_test_email(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    headers: HeaderMap,
    Json(input): Json<SendTestEmail>,
) -> Result<Json<serde_json::Value>> {
    validate_email(&input.to)?;
    let sandbox = input.sandbox.unwrap_or(state.payments_sandbox);

    let result = state
        .email
        .send_template(&state.db, &state.master_key, sandbox, TEST_EMAIL_TEMPLATE, &input.to, &[])
        .await?;
    match result {
        EmailSendResult::Sent => {}
        EmailSendResult::NotConfigured => {
            return Err(AppError::BadRequest(
                "Mailgun is not configured or not active for this mode".into(),
            ));
        }
        EmailSendResult::NoTemplate => {
            return Err(AppError::BadRequest(
                "Email templates are not installed yet".into(),
            ));
        }
    }

    let audit_conn = state.audit.get()?;
    AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
        .actor(ctx.actor_type(), Some(&ctx.user.id))
        .email(&ctx.user.email)
        .action(AuditAction::SendTestEmail)
        .resource("email_settings", "mailgun")
        .details(&serde_json::json!({ "to": input.to, "sandbox": sandbox }))
        .save()?;

    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn install_email_templates(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    headers: HeaderMap,
) -> Result<Json<InstallTemplatesResponse>> {
    let installed = {
        let conn = state.db.get()?;
        queries::install_email_templates(&conn, DEFAULT_TEMPLATES)?
    };

    let audit_conn = state.audit.get()?;
    AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
        .actor(ctx.actor_type(), Some(&ctx.user.id))
        .email(&ctx.user.email)
        .action(AuditAction::InstallEmailTemplates)
        .resource("email_templates", "default")
        .details(&serde_json::json!({ "installed": installed }))
        .save()?;

    Ok(Json(InstallTemplatesResponse {
        installed,
        total: DEFAULT_TEMPLATES.len(),
    }))
}
