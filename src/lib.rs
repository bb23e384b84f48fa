//! Prizewheel: spin-the-wheel and scratch-card lead capture for businesses,
//! with plan billing, credit entitlements and prize redemption tracking.

pub mod analytics;
pub mod billing;
pub mod config;
pub mod crypto;
pub mod db;
pub mod email;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod leads;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod payments;
pub mod phone;
pub mod templates;
pub mod util;

use axum::{Router, http::HeaderValue};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use db::AppState;

/// Every API route, mounted under `/api`.
pub fn api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(handlers::public::router(state.clone()))
        .merge(handlers::users::router(state.clone()))
        .merge(handlers::campaigns::router(state.clone()))
        .merge(handlers::billing::router(state.clone()))
        .merge(handlers::admin::router(state))
        .merge(handlers::webhooks::router())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if allowed.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(allowed)
    }
}

/// The full application with tracing and CORS applied.
pub fn app(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .nest("/api", api_router(state.clone()))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
