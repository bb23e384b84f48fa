use axum::{Extension, extract::State};
use chrono::Utc;

use super::{Access, load_campaign_for};
use crate::analytics::{
    AnalyticsQuery, CampaignAnalytics, daily_series, prize_distribution, range_start, total_stats,
};
use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::middleware::UserContext;

/// Daily series for the requested range; totals cover the campaign's lifetime.
pub async fn campaign_analytics(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<CampaignAnalytics>> {
    let conn = state.db.get()?;
    let campaign = load_campaign_for(&conn, &id, &ctx.user, Access::Read)?;
    let now = Utc::now().timestamp();

    let start = range_start(query.range, campaign.created_at, now)
        .ok_or_else(|| AppError::Internal("Invalid analytics range".into()))?;
    let since = start
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp());

    let spins = queries::list_spins_for_campaign(&conn, &campaign.id, since)?;
    let leads = queries::list_leads_for_campaign(&conn, &campaign.id)?;

    Ok(Json(CampaignAnalytics {
        time_series_data: daily_series(&spins, &leads, start, now),
        prize_distribution: prize_distribution(&leads),
        total_stats: total_stats(campaign.spins_count, &leads, now),
    }))
}
