use axum::extract::State;
use chrono::Utc;

use crate::billing;
use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path};
use crate::leads::generate_reference_number;
use crate::models::{
    AppUser, Campaign, CampaignStatus, CaptureLead, Lead, PublicCampaign, RecordSpin, Spin,
};

const SECONDS_PER_DAY: i64 = 86400;

/// Load a campaign that is open to players. Anything not active is a 404 so
/// drafts stay private.
fn load_active_campaign(conn: &rusqlite::Connection, slug: &str) -> Result<Campaign> {
    queries::get_campaign_by_slug(conn, slug)?
        .filter(|c| c.status == CampaignStatus::Active)
        .ok_or_else(|| AppError::NotFound("Campaign not found".into()))
}

fn load_owner(conn: &rusqlite::Connection, campaign: &Campaign) -> Result<AppUser> {
    queries::get_user_by_id(conn, &campaign.user_id)?
        .ok_or_else(|| AppError::Internal("Campaign owner not found".into()))
}

pub async fn get_public_campaign(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PublicCampaign>> {
    let conn = state.db.get()?;
    let campaign = load_active_campaign(&conn, &slug)?;
    let owner = load_owner(&conn, &campaign)?;

    let plan = match owner.active_plan_id {
        Some(ref plan_id) => queries::get_billing_plan_by_id(&conn, plan_id)?,
        None => None,
    };
    let flags = billing::entitlement_flags(&owner, plan.as_ref(), Utc::now().timestamp());

    Ok(Json(PublicCampaign {
        name: campaign.name,
        public_slug: campaign.public_slug,
        campaign_type: campaign.campaign_type,
        wheel_segments: campaign.wheel_segments,
        wheel_colors: campaign.wheel_colors,
        lead_form_fields: campaign.lead_form_fields,
        show_watermark: !flags.remove_watermark,
    }))
}

pub async fn record_public_spin(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(input): Json<RecordSpin>,
) -> Result<Json<Spin>> {
    let mut conn = state.db.get()?;
    let campaign = load_active_campaign(&conn, &slug)?;

    if let Some(ref prize) = input.prize_won {
        if !campaign.wheel_segments.iter().any(|s| &s.label == prize) {
            return Err(AppError::BadRequest("Prize is not on this wheel".into()));
        }
    }

    let spin = queries::record_spin(&mut conn, &campaign.id, input.prize_won.as_deref())?;
    Ok(Json(spin))
}

/// Capture a player's details after a spin.
///
/// Owners without an active subscription pay one lead credit per captured
/// lead; with none left the campaign stops accepting entries.
pub async fn capture_public_lead(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(input): Json<CaptureLead>,
) -> Result<Json<Lead>> {
    input.validate()?;

    let (campaign, lead) = {
        let mut conn = state.db.get()?;
        let campaign = load_active_campaign(&conn, &slug)?;
        let owner = load_owner(&conn, &campaign)?;
        let now = Utc::now().timestamp();

        let prize_won = input
            .prize_won
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());
        let reference_number = generate_reference_number();
        let redemption_expires_at = match (prize_won, campaign.redemption_days) {
            (Some(_), Some(days)) => Some(now + days * SECONDS_PER_DAY),
            _ => None,
        };

        let lead = queries::capture_lead(
            &mut conn,
            &campaign,
            &queries::NewLead {
                name: input.name.as_deref().map(str::trim).filter(|n| !n.is_empty()),
                email: &input.email,
                phone: input.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()),
                prize_won,
                reference_number: &reference_number,
                redemption_expires_at,
            },
            billing::lead_capture_consumes_credit(&owner, now),
        )?;
        (campaign, lead)
    };

    tracing::info!(
        campaign_id = %campaign.id,
        lead_id = %lead.id,
        "Lead captured"
    );

    state.email.spawn_prize_email(
        state.db.clone(),
        state.master_key.clone(),
        state.payments_sandbox,
        &campaign,
        &lead,
    );

    Ok(Json(lead))
}
