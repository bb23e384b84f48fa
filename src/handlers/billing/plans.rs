use axum::extract::State;
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::models::{AppUser, BillingInterval, BillingPlan, Currency, PlanType};

#[derive(Debug, Deserialize)]
pub struct PurchasePlansQuery {
    pub currency: Option<Currency>,
    #[serde(rename = "type")]
    pub plan_type: Option<PlanType>,
    pub billing_cycle: Option<BillingInterval>,
}

#[derive(Debug, Serialize)]
pub struct PurchasePlansResponse {
    pub plans: Vec<BillingPlan>,
    pub show_weekly_toggle: bool,
}

/// The caller, when a valid token is sent. Anonymous callers get defaults.
fn optional_user(state: &AppState, auth: Option<&Authorization<Bearer>>) -> Result<Option<AppUser>> {
    let Some(auth) = auth else {
        return Ok(None);
    };
    let conn = state.db.get()?;
    queries::get_user_by_api_token(&conn, auth.token().trim())
}

/// Keep the plans a buyer can pick. Subscription plans are narrowed to the
/// selected billing interval whether or not the listing is filtered by type.
pub fn purchasable_plans(plans: Vec<BillingPlan>, billing_cycle: BillingInterval) -> Vec<BillingPlan> {
    plans
        .into_iter()
        .filter(|p| p.is_active)
        .filter(|p| p.plan_type != PlanType::Subscription || p.billing_interval == Some(billing_cycle))
        .collect()
}

pub async fn list_purchase_plans(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<PurchasePlansQuery>,
) -> Result<Json<PurchasePlansResponse>> {
    let user = optional_user(&state, auth.as_ref().map(|TypedHeader(a)| a))?;
    let currency = query
        .currency
        .or(user.as_ref().map(|u| u.currency))
        .unwrap_or(Currency::Usd);
    let billing_cycle = query
        .billing_cycle
        .or(user.as_ref().map(|u| u.billing_cycle))
        .unwrap_or(BillingInterval::Monthly);

    let conn = state.db.get()?;
    let plans = queries::list_billing_plans(&conn, Some(currency), query.plan_type, true)?;
    let show_weekly_toggle = queries::has_weekly_subscription_plan(&conn)?;

    Ok(Json(PurchasePlansResponse {
        plans: purchasable_plans(plans, billing_cycle),
        show_weekly_toggle,
    }))
}
