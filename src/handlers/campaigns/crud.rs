use axum::{Extension, extract::State, http::HeaderMap};

use super::{Access, load_campaign_for};
use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path};
use crate::middleware::UserContext;
use crate::models::{AuditAction, Campaign, CreateCampaign, NewCampaign, UpdateCampaign};
use crate::templates;
use crate::util::{AuditLogBuilder, slugify};

const SLUG_ATTEMPTS: usize = 5;

fn unique_slug(conn: &rusqlite::Connection, name: &str) -> Result<String> {
    let base = match slugify(name) {
        s if s.is_empty() => "campaign".to_string(),
        s => s,
    };
    for _ in 0..SLUG_ATTEMPTS {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let candidate = format!("{}-{}", base, &suffix[..6]);
        if !queries::slug_exists(conn, &candidate)? {
            return Ok(candidate);
        }
    }
    Err(AppError::Internal("Could not allocate a unique campaign slug".into()))
}

/// Merge the request over its template (or the first built-in of the same
/// type when none is named).
fn build_new_campaign(conn: &rusqlite::Connection, input: CreateCampaign) -> Result<NewCampaign> {
    let template = match input.template_id {
        Some(ref id) => Some(
            templates::resolve_template(conn, id)?
                .ok_or_else(|| AppError::BadRequest("Template not found".into()))?,
        ),
        None => templates::builtin_templates()
            .into_iter()
            .find(|t| t.campaign_type == input.campaign_type),
    };

    let wheel_segments = input
        .wheel_segments
        .or_else(|| template.as_ref().map(|t| t.wheel_segments.clone()))
        .unwrap_or_default();
    if wheel_segments.is_empty() {
        return Err(AppError::BadRequest("A campaign needs at least one prize segment".into()));
    }
    let wheel_colors = input
        .wheel_colors
        .or_else(|| template.as_ref().map(|t| t.wheel_colors.clone()))
        .unwrap_or_else(|| wheel_segments.iter().map(|s| s.color.clone()).collect());
    let lead_form_fields = input
        .lead_form_fields
        .or_else(|| template.as_ref().map(|t| t.lead_form_fields.clone()))
        .unwrap_or_default();

    Ok(NewCampaign {
        public_slug: unique_slug(conn, &input.name)?,
        name: input.name,
        campaign_type: input.campaign_type,
        wheel_segments,
        wheel_colors,
        lead_form_fields,
        redemption_days: input.redemption_days,
        template_id: input.template_id,
    })
}

/// Create a campaign, consuming one campaign credit.
pub async fn create_campaign(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    headers: HeaderMap,
    Json(input): Json<CreateCampaign>,
) -> Result<Json<Campaign>> {
    input.validate()?;

    let mut conn = state.db.get()?;
    let audit_conn = state.audit.get()?;

    let new_campaign = build_new_campaign(&conn, input)?;
    let campaign = queries::create_campaign_with_credit(&mut conn, &ctx.user.id, &new_campaign)?;

    AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
        .actor(ctx.actor_type(), Some(&ctx.user.id))
        .email(&ctx.user.email)
        .action(AuditAction::CreateCampaign)
        .resource("campaign", &campaign.id)
        .details(&serde_json::json!({
            "name": campaign.name,
            "slug": campaign.public_slug,
            "template_id": campaign.template_id,
        }))
        .save()?;

    tracing::info!(
        campaign_id = %campaign.id,
        user_id = %ctx.user.id,
        "Campaign created"
    );
    Ok(Json(campaign))
}

pub async fn list_campaigns(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
) -> Result<Json<Vec<Campaign>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_campaigns_for_user(&conn, &ctx.user.id)?))
}

pub async fn get_campaign(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<Json<Campaign>> {
    let conn = state.db.get()?;
    Ok(Json(load_campaign_for(&conn, &id, &ctx.user, Access::Read)?))
}

pub async fn update_campaign(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(input): Json<UpdateCampaign>,
) -> Result<Json<Campaign>> {
    input.validate()?;

    let conn = state.db.get()?;
    let audit_conn = state.audit.get()?;
    load_campaign_for(&conn, &id, &ctx.user, Access::Write)?;

    queries::update_campaign(&conn, &id, &input)?;

    AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
        .actor(ctx.actor_type(), Some(&ctx.user.id))
        .email(&ctx.user.email)
        .action(AuditAction::UpdateCampaign)
        .resource("campaign", &id)
        .details(&serde_json::json!({
            "name": input.name,
            "status": input.status,
        }))
        .save()?;

    let campaign = queries::get_campaign_by_id(&conn, &id)?
        .ok_or_else(|| AppError::NotFound("Campaign not found".into()))?;
    Ok(Json(campaign))
}

/// Deleting a campaign does not refund its credit.
pub async fn delete_campaign(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let audit_conn = state.audit.get()?;
    let campaign = load_campaign_for(&conn, &id, &ctx.user, Access::Write)?;

    queries::delete_campaign(&conn, &id)?;

    AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
        .actor(ctx.actor_type(), Some(&ctx.user.id))
        .email(&ctx.user.email)
        .action(AuditAction::DeleteCampaign)
        .resource("campaign", &id)
        .details(&serde_json::json!({ "name": campaign.name, "leads": campaign.leads_count }))
        .save()?;

    Ok(Json(serde_json::json!({ "success": true })))
}
