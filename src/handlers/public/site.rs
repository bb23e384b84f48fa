use axum::extract::State;

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::Json;
use crate::models::{CampaignTemplate, HomepageConfig};
use crate::templates;

/// Homepage document for the marketing site. An unconfigured site gets an
/// empty document (every section hidden).
pub async fn get_homepage_config(State(state): State<AppState>) -> Result<Json<HomepageConfig>> {
    let conn = state.db.get()?;
    let config = queries::get_homepage_config(&conn)?.unwrap_or_default();
    Ok(Json(config))
}

pub async fn list_templates(State(state): State<AppState>) -> Result<Json<Vec<CampaignTemplate>>> {
    let conn = state.db.get()?;
    Ok(Json(templates::available_templates(&conn)?))
}
