mod campaigns;
mod site;

pub use campaigns::*;
pub use site::*;

use axum::{
    Json, Router, middleware,
    routing::{get, post},
};
use serde::Serialize;

use crate::db::AppState;
use crate::middleware::rate_limit_public;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/public/campaigns/{slug}", get(get_public_campaign))
        .route("/public/campaigns/{slug}/spin", post(record_public_spin))
        .route("/public/campaigns/{slug}/leads", post(capture_public_lead))
        .layer(middleware::from_fn_with_state(state, rate_limit_public))
        .route("/health", get(health))
        .route("/homepage-config", get(get_homepage_config))
        .route("/templates", get(list_templates))
}
