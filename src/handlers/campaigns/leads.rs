use axum::{
    Extension,
    extract::State,
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Serialize;

use super::{Access, load_campaign_for};
use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::leads::{LeadQuery, LeadView, export_filename, filter_leads, leads_to_csv};
use crate::middleware::UserContext;
use crate::models::{AuditAction, SetRedemption};
use crate::util::AuditLogBuilder;

#[derive(Debug, Serialize)]
pub struct LeadListResponse {
    pub leads: Vec<LeadView>,
}

pub async fn list_campaign_leads(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
    Query(query): Query<LeadQuery>,
) -> Result<Json<LeadListResponse>> {
    let conn = state.db.get()?;
    let campaign = load_campaign_for(&conn, &id, &ctx.user, Access::Read)?;

    let all = queries::list_leads_for_campaign(&conn, &campaign.id)?;
    let now = Utc::now().timestamp();
    let leads = filter_leads(&all, &query)
        .into_iter()
        .map(|lead| LeadView::new(lead, now))
        .collect();
    Ok(Json(LeadListResponse { leads }))
}

/// Toggle redemption. Reversible: un-redeeming clears the timestamp and actor.
pub async fn set_lead_redemption(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    headers: HeaderMap,
    Path((id, lead_id)): Path<(String, String)>,
    Json(input): Json<SetRedemption>,
) -> Result<Json<LeadView>> {
    let conn = state.db.get()?;
    let audit_conn = state.audit.get()?;
    let campaign = load_campaign_for(&conn, &id, &ctx.user, Access::Write)?;

    let previous = queries::get_lead(&conn, &campaign.id, &lead_id)?
        .ok_or_else(|| AppError::NotFound("Lead not found".into()))?;

    queries::set_lead_redemption(&conn, &lead_id, input.is_redeemed, &ctx.user.id)?;

    AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
        .actor(ctx.actor_type(), Some(&ctx.user.id))
        .email(&ctx.user.email)
        .action(if input.is_redeemed {
            AuditAction::RedeemLead
        } else {
            AuditAction::UnredeemLead
        })
        .resource("lead", &lead_id)
        .details(&serde_json::json!({
            "campaign_id": campaign.id,
            "was_redeemed": previous.is_redeemed,
            "reference_number": previous.reference_number,
        }))
        .save()?;

    let lead = queries::get_lead(&conn, &campaign.id, &lead_id)?
        .ok_or_else(|| AppError::NotFound("Lead not found".into()))?;
    Ok(Json(LeadView::new(&lead, Utc::now().timestamp())))
}

/// CSV of the same filtered view the lead list shows.
pub async fn export_campaign_leads(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<LeadQuery>,
) -> Result<Response> {
    let conn = state.db.get()?;
    let audit_conn = state.audit.get()?;
    let campaign = load_campaign_for(&conn, &id, &ctx.user, Access::Read)?;

    let all = queries::list_leads_for_campaign(&conn, &campaign.id)?;
    let now = Utc::now().timestamp();
    let rows = filter_leads(&all, &query);
    let csv = leads_to_csv(&rows, now);

    AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
        .actor(ctx.actor_type(), Some(&ctx.user.id))
        .email(&ctx.user.email)
        .action(AuditAction::ExportLeads)
        .resource("campaign", &campaign.id)
        .details(&serde_json::json!({ "rows": rows.len(), "search": query.search }))
        .save()?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_filename(&campaign.public_slug, now)
    );
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|_| AppError::Internal("Invalid export filename".into()))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}
