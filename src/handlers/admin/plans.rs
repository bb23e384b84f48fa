use axum::{Extension, extract::State, http::HeaderMap};
use serde::{Deserialize, Serialize};

use crate::billing::currency_sync::{SyncOutcome, sync_kes_plan};
use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::middleware::UserContext;
use crate::models::{
    AuditAction, BillingPlan, CreateBillingPlan, Currency, MovePlan, PlanType, UpdateBillingPlan,
};
use crate::util::AuditLogBuilder;

#[derive(Debug, Deserialize)]
pub struct PlanListQuery {
    pub currency: Option<Currency>,
    #[serde(rename = "type")]
    pub plan_type: Option<PlanType>,
}

#[derive(Debug, Deserialize)]
pub struct SaveOptions {
    /// Mirror a saved KES plan onto its USD counterpart (default on)
    #[serde(default = "default_sync")]
    pub sync_currency: bool,
}

fn default_sync() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct PlanSaveResponse {
    pub plan: BillingPlan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synced_plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Run the KES to USD sync after a committed save. Failures become a warning
/// on the response; the save itself stands.
fn sync_after_save(state: &AppState, plan: &BillingPlan, options: &SaveOptions) -> (Option<String>, Option<String>) {
    if !options.sync_currency || plan.currency != Currency::Kes {
        return (None, None);
    }
    let sync = || -> Result<SyncOutcome> {
        let mut conn = state.db.get()?;
        sync_kes_plan(&mut conn, plan)
    };
    match sync() {
        Ok(SyncOutcome::Synced { usd_plan_id, .. }) => (Some(usd_plan_id), None),
        Ok(outcome) => (None, outcome.warning(&plan.name)),
        Err(e) => {
            tracing::warn!(plan_id = %plan.id, error = %e, "Currency sync failed");
            (None, Some(format!("Plan saved, but USD sync failed: {}", e)))
        }
    }
}

fn audit_sync(
    audit_conn: &rusqlite::Connection,
    state: &AppState,
    ctx: &UserContext,
    headers: &HeaderMap,
    kes_plan: &BillingPlan,
    usd_plan_id: &str,
) -> Result<()> {
    AuditLogBuilder::new(audit_conn, state.audit_log_enabled, headers)
        .actor(ctx.actor_type(), Some(&ctx.user.id))
        .email(&ctx.user.email)
        .action(AuditAction::SyncBillingPlan)
        .resource("billing_plan", usd_plan_id)
        .details(&serde_json::json!({ "source_plan_id": kes_plan.id, "source_amount": kes_plan.amount }))
        .save()?;
    Ok(())
}

fn load_plan(state: &AppState, id: &str) -> Result<BillingPlan> {
    let conn = state.db.get()?;
    queries::get_billing_plan_by_id(&conn, id)?
        .ok_or_else(|| AppError::NotFound("Billing plan not found".into()))
}

pub async fn list_billing_plans(
    State(state): State<AppState>,
    Query(query): Query<PlanListQuery>,
) -> Result<Json<Vec<BillingPlan>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_billing_plans(
        &conn,
        query.currency,
        query.plan_type,
        false,
    )?))
}

pub async fn get_billing_plan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BillingPlan>> {
    Ok(Json(load_plan(&state, &id)?))
}

pub async fn create_billing_plan(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    headers: HeaderMap,
    Query(options): Query<SaveOptions>,
    Json(input): Json<CreateBillingPlan>,
) -> Result<Json<PlanSaveResponse>> {
    input.validate()?;

    let plan = {
        let mut conn = state.db.get()?;
        queries::create_billing_plan(&mut conn, &input)?
    };
    let (synced_plan_id, warning) = sync_after_save(&state, &plan, &options);

    let audit_conn = state.audit.get()?;
    AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
        .actor(ctx.actor_type(), Some(&ctx.user.id))
        .email(&ctx.user.email)
        .action(AuditAction::CreateBillingPlan)
        .resource("billing_plan", &plan.id)
        .details(&serde_json::json!({
            "name": plan.name,
            "currency": plan.currency,
            "plan_type": plan.plan_type,
            "amount": plan.amount,
            "synced_plan_id": synced_plan_id,
        }))
        .save()?;
    if let Some(ref usd_plan_id) = synced_plan_id {
        audit_sync(&audit_conn, &state, &ctx, &headers, &plan, usd_plan_id)?;
    }

    Ok(Json(PlanSaveResponse {
        plan,
        synced_plan_id,
        warning,
    }))
}

pub async fn update_billing_plan(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(options): Query<SaveOptions>,
    Json(input): Json<UpdateBillingPlan>,
) -> Result<Json<PlanSaveResponse>> {
    input.validate()?;

    let plan = {
        let mut conn = state.db.get()?;
        if !queries::update_billing_plan(&mut conn, &id, &input)? {
            return Err(AppError::NotFound("Billing plan not found".into()));
        }
        queries::get_billing_plan_by_id(&conn, &id)?
            .ok_or_else(|| AppError::NotFound("Billing plan not found".into()))?
    };
    let (synced_plan_id, warning) = sync_after_save(&state, &plan, &options);

    let audit_conn = state.audit.get()?;
    AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
        .actor(ctx.actor_type(), Some(&ctx.user.id))
        .email(&ctx.user.email)
        .action(AuditAction::UpdateBillingPlan)
        .resource("billing_plan", &plan.id)
        .details(&serde_json::json!({
            "name": plan.name,
            "amount": plan.amount,
            "synced_plan_id": synced_plan_id,
            "sync_warning": warning,
        }))
        .save()?;
    if let Some(ref usd_plan_id) = synced_plan_id {
        audit_sync(&audit_conn, &state, &ctx, &headers, &plan, usd_plan_id)?;
    }

    Ok(Json(PlanSaveResponse {
        plan,
        synced_plan_id,
        warning,
    }))
}

pub async fn delete_billing_plan(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let plan = {
        let mut conn = state.db.get()?;
        queries::delete_billing_plan(&mut conn, &id)?
            .ok_or_else(|| AppError::NotFound("Billing plan not found".into()))?
    };

    let audit_conn = state.audit.get()?;
    AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
        .actor(ctx.actor_type(), Some(&ctx.user.id))
        .email(&ctx.user.email)
        .action(AuditAction::DeleteBillingPlan)
        .resource("billing_plan", &plan.id)
        .details(&serde_json::json!({ "name": plan.name, "currency": plan.currency }))
        .save()?;

    Ok(Json(serde_json::json!({ "success": true })))
}

/// Swap a plan with its neighbour and return the reordered group.
pub async fn move_billing_plan(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(input): Json<MovePlan>,
) -> Result<Json<Vec<BillingPlan>>> {
    let (moved, group) = {
        let mut conn = state.db.get()?;
        let moved = queries::move_billing_plan(&mut conn, &id, input.direction)?;
        let plan = queries::get_billing_plan_by_id(&conn, &id)?
            .ok_or_else(|| AppError::NotFound("Billing plan not found".into()))?;
        (moved, queries::list_plans_in_group(&conn, plan.currency, plan.plan_type)?)
    };

    if moved {
        let audit_conn = state.audit.get()?;
        AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
            .actor(ctx.actor_type(), Some(&ctx.user.id))
            .email(&ctx.user.email)
            .action(AuditAction::MoveBillingPlan)
            .resource("billing_plan", &id)
            .details(&serde_json::json!({ "direction": input.direction }))
            .save()?;
    }

    Ok(Json(group))
}
