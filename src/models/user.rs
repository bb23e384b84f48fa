use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::{BillingInterval, Currency, PlanType};
use crate::error::{AppError, Result};

/// What the user is currently on. `Free` users may still hold purchased
/// credits; purchasing a credit pack does not change the plan type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UserPlanType {
    Free,
    Subscription,
    Campaign,
    Leads,
}

impl From<PlanType> for UserPlanType {
    fn from(plan_type: PlanType) -> Self {
        match plan_type {
            PlanType::Subscription => UserPlanType::Subscription,
            PlanType::Campaign => UserPlanType::Campaign,
            PlanType::Leads => UserPlanType::Leads,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Pending,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub plan_type: UserPlanType,
    pub subscription_status: Option<SubscriptionStatus>,
    pub plan_expires_at: Option<i64>,
    pub active_plan_id: Option<String>,
    pub campaign_credits: i64,
    pub lead_credits: i64,
    pub currency: Currency,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub business_name: Option<String>,
    pub is_admin: bool,
    pub stripe_customer_id: Option<String>,
    pub billing_cycle: BillingInterval,
    pub profile_completed: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateAppUser {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub is_admin: bool,
}

impl CreateAppUser {
    pub fn validate(&self) -> Result<()> {
        validate_email(&self.email)?;
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest("Name is required".into()));
        }
        Ok(())
    }
}

/// Self-service profile edits (`PATCH /api/users/me`).
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfile {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub business_name: Option<Option<String>>,
    pub billing_cycle: Option<BillingInterval>,
    pub currency: Option<Currency>,
}

impl UpdateProfile {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref name) = self.name {
            if name.trim().is_empty() {
                return Err(AppError::BadRequest("Name cannot be empty".into()));
            }
        }
        Ok(())
    }
}

/// First-login onboarding (`POST /api/users/profile-setup`).
#[derive(Debug, Deserialize)]
pub struct ProfileSetup {
    pub name: String,
    #[serde(default)]
    pub business_name: Option<String>,
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Admin manual grant. Deltas are added to the current balance.
#[derive(Debug, Deserialize)]
pub struct GrantCredits {
    #[serde(default)]
    pub campaign_credits: i64,
    #[serde(default)]
    pub lead_credits: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

impl GrantCredits {
    pub fn validate(&self) -> Result<()> {
        if self.campaign_credits < 0 || self.lead_credits < 0 {
            return Err(AppError::BadRequest("Credit grants cannot be negative".into()));
        }
        if self.campaign_credits == 0 && self.lead_credits == 0 {
            return Err(AppError::BadRequest("Nothing to grant".into()));
        }
        Ok(())
    }
}

/// Admin override of subscription state.
#[derive(Debug, Deserialize)]
pub struct SetSubscription {
    pub plan_type: UserPlanType,
    #[serde(default)]
    pub subscription_status: Option<SubscriptionStatus>,
    #[serde(default)]
    pub plan_expires_at: Option<i64>,
    #[serde(default)]
    pub active_plan_id: Option<String>,
}

pub fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid {
        return Err(AppError::BadRequest("A valid email address is required".into()));
    }
    Ok(())
}
