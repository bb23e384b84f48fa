use axum::{Extension, extract::State, http::HeaderMap};
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path};
use crate::middleware::UserContext;
use crate::models::{AuditAction, CampaignTemplate, UpdateTemplate};
use crate::templates;
use crate::util::AuditLogBuilder;

#[derive(Debug, Serialize)]
pub struct TemplateList {
    pub templates: Vec<CampaignTemplate>,
    /// False until the built-in catalog has been copied into the database
    pub migrated: bool,
}

#[derive(Debug, Serialize)]
pub struct MigrateResponse {
    pub inserted: usize,
    pub total: usize,
}

fn not_found() -> AppError {
    AppError::NotFound("Template not found".into())
}

pub async fn list_templates(State(state): State<AppState>) -> Result<Json<TemplateList>> {
    let conn = state.db.get()?;
    let migrated = queries::count_campaign_templates(&conn)? > 0;
    Ok(Json(TemplateList {
        templates: templates::available_templates(&conn)?,
        migrated,
    }))
}

pub async fn get_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CampaignTemplate>> {
    let conn = state.db.get()?;
    templates::resolve_template(&conn, &id)?
        .map(Json)
        .ok_or_else(not_found)
}

/// Edit a stored template. Built-ins must be migrated before they can be edited.
pub async fn update_template(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(input): Json<UpdateTemplate>,
) -> Result<Json<CampaignTemplate>> {
    if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::BadRequest("name cannot be empty".into()));
    }
    if input.wheel_segments.as_ref().is_some_and(Vec::is_empty) {
        return Err(AppError::BadRequest("A template needs at least one segment".into()));
    }

    let template = {
        let conn = state.db.get()?;
        if !queries::update_campaign_template(&conn, &id, &input)? {
            return Err(not_found());
        }
        queries::get_campaign_template(&conn, &id)?.ok_or_else(not_found)?
    };

    let audit_conn = state.audit.get()?;
    AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
        .actor(ctx.actor_type(), Some(&ctx.user.id))
        .email(&ctx.user.email)
        .action(AuditAction::UpdateTemplate)
        .resource("template", &id)
        .details(&serde_json::json!({ "name": template.name }))
        .save()?;

    Ok(Json(template))
}

pub async fn delete_template(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    {
        let conn = state.db.get()?;
        if !queries::delete_campaign_template(&conn, &id)? {
            return Err(not_found());
        }
    }

    let audit_conn = state.audit.get()?;
    AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
        .actor(ctx.actor_type(), Some(&ctx.user.id))
        .email(&ctx.user.email)
        .action(AuditAction::DeleteTemplate)
        .resource("template", &id)
        .save()?;

    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn duplicate_template(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<CampaignTemplate>> {
    let copy = {
        let conn = state.db.get()?;
        queries::duplicate_campaign_template(&conn, &id)?.ok_or_else(not_found)?
    };

    let audit_conn = state.audit.get()?;
    AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
        .actor(ctx.actor_type(), Some(&ctx.user.id))
        .email(&ctx.user.email)
        .action(AuditAction::DuplicateTemplate)
        .resource("template", &copy.id)
        .details(&serde_json::json!({ "source_id": id }))
        .save()?;

    Ok(Json(copy))
}

pub async fn migrate_templates(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    headers: HeaderMap,
) -> Result<Json<MigrateResponse>> {
    let inserted = {
        let conn = state.db.get()?;
        templates::migrate_builtin_templates(&conn)?
    };

    let audit_conn = state.audit.get()?;
    AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
        .actor(ctx.actor_type(), Some(&ctx.user.id))
        .email(&ctx.user.email)
        .action(AuditAction::MigrateTemplates)
        .resource("template", "builtin")
        .details(&serde_json::json!({ "inserted": inserted }))
        .save()?;

    Ok(Json(MigrateResponse {
        inserted,
        total: templates::builtin_templates().len(),
    }))
}
