use axum::{Extension, extract::State, http::HeaderMap};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::billing::EntitlementSummary;
use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::middleware::UserContext;
use crate::models::{AppUser, AuditAction, GrantCredits, SetSubscription, Transaction};
use crate::pagination::{Paginated, PaginationQuery};
use crate::util::AuditLogBuilder;

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// Case-insensitive substring of the email
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserDetail {
    pub user: AppUser,
    pub entitlements: EntitlementSummary,
    pub transactions: Vec<Transaction>,
}

fn load_user(conn: &rusqlite::Connection, id: &str) -> Result<AppUser> {
    queries::get_user_by_id(conn, id)?.ok_or_else(|| AppError::NotFound("User not found".into()))
}

fn user_detail(conn: &rusqlite::Connection, id: &str) -> Result<UserDetail> {
    let user = load_user(conn, id)?;
    let plan = match user.active_plan_id {
        Some(ref plan_id) => queries::get_billing_plan_by_id(conn, plan_id)?,
        None => None,
    };
    let entitlements = EntitlementSummary::for_user(&user, plan.as_ref(), Utc::now().timestamp());
    let transactions = queries::list_transactions_for_user(conn, &user.id)?;
    Ok(UserDetail {
        user,
        entitlements,
        transactions,
    })
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Paginated<AppUser>>> {
    let conn = state.db.get()?;
    let page = PaginationQuery {
        limit: query.limit,
        offset: query.offset,
    };
    let (limit, offset) = (page.limit(), page.offset());
    let (users, total) = queries::list_users_paginated(&conn, query.email.as_deref(), limit, offset)?;
    Ok(Json(Paginated::new(users, total, limit, offset)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserDetail>> {
    let conn = state.db.get()?;
    Ok(Json(user_detail(&conn, &id)?))
}

pub async fn grant_credits(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(input): Json<GrantCredits>,
) -> Result<Json<UserDetail>> {
    input.validate()?;

    let conn = state.db.get()?;
    if !queries::grant_credits(&conn, &id, input.campaign_credits, input.lead_credits)? {
        return Err(AppError::NotFound("User not found".into()));
    }
    let detail = user_detail(&conn, &id)?;

    let audit_conn = state.audit.get()?;
    AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
        .actor(ctx.actor_type(), Some(&ctx.user.id))
        .email(&ctx.user.email)
        .action(AuditAction::GrantCredits)
        .resource("user", &id)
        .details(&serde_json::json!({
            "campaign_credits": input.campaign_credits,
            "lead_credits": input.lead_credits,
            "reason": input.reason,
            "target_email": detail.user.email,
        }))
        .save()?;

    tracing::info!(
        admin_id = %ctx.user.id,
        user_id = %id,
        campaign_credits = input.campaign_credits,
        lead_credits = input.lead_credits,
        "Credits granted"
    );

    Ok(Json(detail))
}

pub async fn set_subscription(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(input): Json<SetSubscription>,
) -> Result<Json<UserDetail>> {
    let conn = state.db.get()?;
    if let Some(ref plan_id) = input.active_plan_id {
        if queries::get_billing_plan_by_id(&conn, plan_id)?.is_none() {
            return Err(AppError::BadRequest("active_plan_id does not exist".into()));
        }
    }
    if !queries::set_subscription(&conn, &id, &input)? {
        return Err(AppError::NotFound("User not found".into()));
    }
    let detail = user_detail(&conn, &id)?;

    let audit_conn = state.audit.get()?;
    AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
        .actor(ctx.actor_type(), Some(&ctx.user.id))
        .email(&ctx.user.email)
        .action(AuditAction::SetSubscription)
        .resource("user", &id)
        .details(&serde_json::json!({
            "plan_type": input.plan_type,
            "subscription_status": input.subscription_status,
            "plan_expires_at": input.plan_expires_at,
            "active_plan_id": input.active_plan_id,
        }))
        .save()?;

    Ok(Json(detail))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    if id == ctx.user.id {
        return Err(AppError::BadRequest("You cannot delete your own account".into()));
    }

    let user = {
        let conn = state.db.get()?;
        let user = load_user(&conn, &id)?;
        queries::delete_user(&conn, &id)?;
        user
    };

    let audit_conn = state.audit.get()?;
    AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
        .actor(ctx.actor_type(), Some(&ctx.user.id))
        .email(&ctx.user.email)
        .action(AuditAction::DeleteUser)
        .resource("user", &id)
        .details(&serde_json::json!({ "email": user.email }))
        .save()?;

    Ok(Json(serde_json::json!({ "success": true })))
}
