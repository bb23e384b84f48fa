use axum::{
    Extension, Router,
    extract::State,
    http::HeaderMap,
    middleware,
    routing::{get, post},
};
use chrono::Utc;
use serde::Serialize;

use crate::billing::EntitlementSummary;
use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::middleware::{UserContext, user_auth};
use crate::models::{AppUser, AuditAction, Currency, ProfileSetup, UpdateProfile};
use crate::phone::is_valid_phone;
use crate::util::AuditLogBuilder;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: AppUser,
    pub entitlements: EntitlementSummary,
}

fn profile_response(conn: &rusqlite::Connection, user: AppUser) -> Result<ProfileResponse> {
    let plan = match user.active_plan_id {
        Some(ref plan_id) => queries::get_billing_plan_by_id(conn, plan_id)?,
        None => None,
    };
    let entitlements = EntitlementSummary::for_user(&user, plan.as_ref(), Utc::now().timestamp());
    Ok(ProfileResponse { user, entitlements })
}

fn reload_user(conn: &rusqlite::Connection, id: &str) -> Result<AppUser> {
    queries::get_user_by_id(conn, id)?.ok_or_else(|| AppError::NotFound("User not found".into()))
}

pub async fn get_me(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
) -> Result<Json<ProfileResponse>> {
    let conn = state.db.get()?;
    Ok(Json(profile_response(&conn, ctx.user)?))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Json(input): Json<UpdateProfile>,
) -> Result<Json<ProfileResponse>> {
    input.validate()?;
    if let Some(Some(ref phone)) = input.phone {
        let country = ctx.user.country.as_deref().unwrap_or("KE");
        if !is_valid_phone(country, phone) {
            return Err(AppError::BadRequest(format!(
                "Invalid phone number for country {}",
                country
            )));
        }
    }

    let conn = state.db.get()?;
    queries::update_profile(&conn, &ctx.user.id, &input)?;
    let user = reload_user(&conn, &ctx.user.id)?;
    Ok(Json(profile_response(&conn, user)?))
}

/// First-login onboarding. The billing currency follows the country.
pub async fn profile_setup(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    headers: HeaderMap,
    Json(input): Json<ProfileSetup>,
) -> Result<Json<ProfileResponse>> {
    if input.name.trim().is_empty() {
        return Err(AppError::BadRequest("Name is required".into()));
    }
    let country = input.country.trim();
    if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::BadRequest("country must be an ISO 3166 alpha-2 code".into()));
    }
    if let Some(ref phone) = input.phone {
        if !phone.trim().is_empty() && !is_valid_phone(country, phone) {
            return Err(AppError::BadRequest(format!(
                "Invalid phone number for country {}",
                country.to_ascii_uppercase()
            )));
        }
    }

    let currency = Currency::for_country(Some(country));
    let conn = state.db.get()?;
    let audit_conn = state.audit.get()?;

    queries::complete_profile_setup(&conn, &ctx.user.id, &input, currency)?;

    AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
        .actor(ctx.actor_type(), Some(&ctx.user.id))
        .email(&ctx.user.email)
        .action(AuditAction::CompleteProfile)
        .resource("user", &ctx.user.id)
        .details(&serde_json::json!({
            "country": country.to_ascii_uppercase(),
            "currency": currency,
        }))
        .save()?;

    let user = reload_user(&conn, &ctx.user.id)?;
    Ok(Json(profile_response(&conn, user)?))
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/users/me", get(get_me).patch(update_me))
        .route("/users/profile-setup", post(profile_setup))
        .layer(middleware::from_fn_with_state(state, user_auth))
}
