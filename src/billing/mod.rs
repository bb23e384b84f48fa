//! Entitlement rules: what a user may do given their credits, plan and
//! subscription state.

pub mod currency_sync;
pub mod purchase;

use serde::Serialize;

use crate::db::{DbPool, queries};
use crate::error::Result;
use crate::models::{
    ActorType, AppUser, AuditAction, BillingPlan, EntitlementFlags, SubscriptionStatus, UserPlanType,
};
use crate::util::AuditLogBuilder;

/// Subscription status as it should be read at `now`. A subscription still
/// marked active after its expiry reads as expired until the sweep persists it.
pub fn effective_status(user: &AppUser, now: i64) -> Option<SubscriptionStatus> {
    match (user.subscription_status, user.plan_expires_at) {
        (Some(SubscriptionStatus::Active), Some(expires_at)) if expires_at < now => {
            Some(SubscriptionStatus::Expired)
        }
        (status, _) => status,
    }
}

/// Persist `active -> expired` for every subscription past its expiry.
/// Run at startup, hourly, and from the CLI.
pub fn expire_subscriptions(db: &DbPool, audit: &DbPool, audit_enabled: bool, now: i64) -> Result<usize> {
    let expired = {
        let conn = db.get()?;
        queries::expire_lapsed_subscriptions(&conn, now)?
    };
    if expired > 0 {
        tracing::info!(expired, "Expired lapsed subscriptions");
        let audit_conn = audit.get()?;
        AuditLogBuilder::system(&audit_conn, audit_enabled)
            .actor(ActorType::System, None)
            .action(AuditAction::ExpireSubscriptions)
            .resource("app_users", "*")
            .details(&serde_json::json!({ "expired": expired, "at": now }))
            .save()?;
    }
    Ok(expired)
}

pub fn has_active_subscription(user: &AppUser, now: i64) -> bool {
    user.plan_type == UserPlanType::Subscription
        && effective_status(user, now) == Some(SubscriptionStatus::Active)
}

/// Campaign creation is gated on credits alone. An expired subscriber with
/// leftover credits may still create campaigns.
pub fn can_create_campaign(user: &AppUser) -> bool {
    user.campaign_credits > 0
}

/// Whether a new lead on one of this owner's campaigns consumes a lead credit.
pub fn lead_capture_consumes_credit(owner: &AppUser, now: i64) -> bool {
    !has_active_subscription(owner, now)
}

/// Display label for the account page. Never stored.
pub fn plan_label(user: &AppUser) -> &'static str {
    match user.plan_type {
        UserPlanType::Free if user.campaign_credits > 0 || user.lead_credits > 0 => "Pay-Per-Use",
        UserPlanType::Free => "Free",
        UserPlanType::Subscription => "Subscription",
        UserPlanType::Campaign => "Pay-Per-Campaign",
        UserPlanType::Leads => "Pay-Per-Lead",
    }
}

/// Feature flags granted by the user's active plan. `plan` is the row behind
/// `active_plan_id`, if it still exists.
pub fn entitlement_flags(user: &AppUser, plan: Option<&BillingPlan>, now: i64) -> EntitlementFlags {
    let entitled = match user.plan_type {
        UserPlanType::Subscription => has_active_subscription(user, now),
        UserPlanType::Campaign | UserPlanType::Leads => true,
        UserPlanType::Free => false,
    };
    match plan {
        Some(plan) if entitled => plan.flags,
        _ => EntitlementFlags::default(),
    }
}

/// Entitlement summary returned with the user profile.
#[derive(Debug, Serialize)]
pub struct EntitlementSummary {
    pub plan_label: &'static str,
    pub effective_status: Option<SubscriptionStatus>,
    pub can_create_campaign: bool,
    pub campaign_credits: i64,
    pub lead_credits: i64,
    #[serde(flatten)]
    pub flags: EntitlementFlags,
}

impl EntitlementSummary {
    pub fn for_user(user: &AppUser, plan: Option<&BillingPlan>, now: i64) -> Self {
        Self {
            plan_label: plan_label(user),
            effective_status: effective_status(user, now),
            can_create_campaign: can_create_campaign(user),
            campaign_credits: user.campaign_credits,
            lead_credits: user.lead_credits,
            flags: entitlement_flags(user, plan, now),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::models::*;

    pub fn user(plan_type: UserPlanType, campaign_credits: i64, lead_credits: i64) -> AppUser {
        AppUser {
            id: "user-1".into(),
            email: "owner@example.com".into(),
            name: "Owner".into(),
            plan_type,
            subscription_status: None,
            plan_expires_at: None,
            active_plan_id: None,
            campaign_credits,
            lead_credits,
            currency: Currency::Usd,
            country: None,
            phone: None,
            business_name: None,
            is_admin: false,
            stripe_customer_id: None,
            billing_cycle: BillingInterval::Monthly,
            profile_completed: true,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn plan(name: &str, currency: Currency, amount: &str) -> BillingPlan {
        BillingPlan {
            id: format!("{}-{}", currency, name.trim().to_lowercase()),
            plan_type: PlanType::Subscription,
            name: name.into(),
            description: None,
            currency,
            amount: amount.parse().unwrap(),
            billing_interval: Some(BillingInterval::Monthly),
            campaign_limit: Some(5),
            lead_limit: Some(500),
            features: vec![],
            is_active: true,
            display_order: 0,
            is_popular: false,
            flags: EntitlementFlags::default(),
            created_at: 0,
            updated_at: 0,
        }
    }
}
