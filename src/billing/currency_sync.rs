//! One-way propagation of KES plan edits into their USD counterparts.

use rusqlite::Connection;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::{BillingPlan, Currency, UpdateBillingPlan};

/// Fixed exchange rate: this many KES make one USD.
pub const KES_PER_USD: Decimal = Decimal::ONE_HUNDRED;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    Synced { usd_plan_id: String, amount: Decimal },
    NoMatch { available: Vec<String> },
}

impl SyncOutcome {
    /// Admin-facing warning, if the sync did not reach a USD plan.
    pub fn warning(&self, kes_name: &str) -> Option<String> {
        match self {
            SyncOutcome::Synced { .. } => None,
            SyncOutcome::NoMatch { available } if available.is_empty() => Some(format!(
                "No USD plan named \"{}\" to sync; there are no USD plans of this type",
                kes_name.trim()
            )),
            SyncOutcome::NoMatch { available } => Some(format!(
                "No USD plan named \"{}\" to sync. Available USD plans: {}",
                kes_name.trim(),
                available.join(", ")
            )),
        }
    }
}

/// `round(kes / 100, 2)`, half away from zero.
pub fn kes_to_usd(kes: Decimal) -> Decimal {
    (kes / KES_PER_USD).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn normalize_plan_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// First USD plan whose normalized name equals the KES plan's. No fuzzy
/// matching: "Starter" does not match "Starter Plan".
pub fn find_counterpart<'a>(kes_plan: &BillingPlan, usd_plans: &'a [BillingPlan]) -> Option<&'a BillingPlan> {
    let wanted = normalize_plan_name(&kes_plan.name);
    usd_plans.iter().find(|candidate| {
        let normalized = normalize_plan_name(&candidate.name);
        let matched = normalized == wanted;
        tracing::debug!(
            kes_plan = %wanted,
            usd_plan = %normalized,
            matched,
            "Comparing plan names for currency sync"
        );
        matched
    })
}

/// Mirror a saved KES plan onto the USD plan of the same name and type.
///
/// Runs after the KES save has committed. The mirrored `display_order` is
/// re-densified within the USD group by the update itself.
pub fn sync_kes_plan(conn: &mut Connection, kes_plan: &BillingPlan) -> Result<SyncOutcome> {
    if kes_plan.currency != Currency::Kes {
        return Err(AppError::BadRequest("Only KES plans are synced to USD".into()));
    }

    let usd_plans = queries::list_plans_in_group(conn, Currency::Usd, kes_plan.plan_type)?;
    let Some(target) = find_counterpart(kes_plan, &usd_plans) else {
        let available: Vec<String> = usd_plans.iter().map(|p| p.name.clone()).collect();
        tracing::warn!(
            kes_plan_id = %kes_plan.id,
            name = %kes_plan.name,
            available = ?available,
            "No USD counterpart for KES plan"
        );
        return Ok(SyncOutcome::NoMatch { available });
    };

    let amount = kes_to_usd(kes_plan.amount);
    queries::update_billing_plan(conn, &target.id, &UpdateBillingPlan::mirror_of(kes_plan, amount))?;

    tracing::info!(
        kes_plan_id = %kes_plan.id,
        usd_plan_id = %target.id,
        %amount,
        "Synced KES plan to USD"
    );
    Ok(SyncOutcome::Synced {
        usd_plan_id: target.id.clone(),
        amount,
    })
}
