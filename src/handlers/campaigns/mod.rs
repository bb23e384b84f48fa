mod analytics;
mod crud;
mod leads;

pub use analytics::*;
pub use crud::*;
pub use leads::*;

use axum::{
    Router, middleware,
    routing::{get, patch},
};
use rusqlite::Connection;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::{AppUser, Campaign};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
    Read,
    Write,
}

/// Load a campaign the caller may act on. Other users' campaigns are
/// reported as missing; admins may read (not modify) any campaign.
pub(crate) fn load_campaign_for(
    conn: &Connection,
    id: &str,
    user: &AppUser,
    access: Access,
) -> Result<Campaign> {
    let campaign = queries::get_campaign_by_id(conn, id)?
        .ok_or_else(|| AppError::NotFound("Campaign not found".into()))?;
    let allowed = campaign.user_id == user.id || (access == Access::Read && user.is_admin);
    if !allowed {
        return Err(AppError::NotFound("Campaign not found".into()));
    }
    Ok(campaign)
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/campaigns", get(list_campaigns).post(create_campaign))
        .route(
            "/campaigns/{id}",
            get(get_campaign).patch(update_campaign).delete(delete_campaign),
        )
        .route("/campaigns/{id}/leads", get(list_campaign_leads))
        .route("/campaigns/{id}/leads/export", get(export_campaign_leads))
        .route("/campaigns/{id}/leads/{lead_id}/redeem", patch(set_lead_redemption))
        .route("/campaigns/{id}/analytics", get(campaign_analytics))
        .layer(middleware::from_fn_with_state(state, crate::middleware::user_auth))
}
