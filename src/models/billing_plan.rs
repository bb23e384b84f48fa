use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PlanType {
    Subscription,
    Campaign,
    Leads,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Currency {
    Usd,
    Kes,
}

impl Currency {
    /// Currency a user is billed in, derived from their ISO country code.
    pub fn for_country(country: Option<&str>) -> Self {
        match country.map(|c| c.trim().to_ascii_uppercase()) {
            Some(c) if c == "KE" => Currency::Kes,
            _ => Currency::Usd,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BillingInterval {
    Weekly,
    Monthly,
    Yearly,
}

impl BillingInterval {
    pub fn period_days(&self) -> i64 {
        match self {
            BillingInterval::Weekly => 7,
            BillingInterval::Monthly => 30,
            BillingInterval::Yearly => 365,
        }
    }
}

/// Feature toggles a plan unlocks on the campaigns of its buyer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementFlags {
    #[serde(default)]
    pub remove_watermark: bool,
    #[serde(default)]
    pub allow_background_image: bool,
    #[serde(default)]
    pub allow_logo_upload: bool,
    #[serde(default)]
    pub allow_external_border: bool,
    #[serde(default)]
    pub allow_qr_code: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingPlan {
    pub id: String,
    pub plan_type: PlanType,
    pub name: String,
    pub description: Option<String>,
    pub currency: Currency,
    pub amount: Decimal,
    pub billing_interval: Option<BillingInterval>,
    pub campaign_limit: Option<i64>,
    pub lead_limit: Option<i64>,
    pub features: Vec<String>,
    pub is_active: bool,
    pub display_order: i64,
    pub is_popular: bool,
    #[serde(flatten)]
    pub flags: EntitlementFlags,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateBillingPlan {
    pub plan_type: PlanType,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub currency: Currency,
    pub amount: Decimal,
    #[serde(default)]
    pub billing_interval: Option<BillingInterval>,
    #[serde(default)]
    pub campaign_limit: Option<i64>,
    #[serde(default)]
    pub lead_limit: Option<i64>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_popular: bool,
    #[serde(flatten)]
    pub flags: EntitlementFlags,
}

fn default_true() -> bool {
    true
}

impl CreateBillingPlan {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest("Plan name is required".into()));
        }
        if self.amount.is_sign_negative() {
            return Err(AppError::BadRequest("Amount cannot be negative".into()));
        }
        if self.plan_type == PlanType::Subscription && self.billing_interval.is_none() {
            return Err(AppError::BadRequest(
                "Subscription plans require a billing_interval".into(),
            ));
        }
        if matches!(self.campaign_limit, Some(n) if n < 0)
            || matches!(self.lead_limit, Some(n) if n < 0)
        {
            return Err(AppError::BadRequest("Limits cannot be negative".into()));
        }
        Ok(())
    }
}

/// Partial update. Currency and plan type are fixed at creation so a plan
/// never changes reordering group. `Option<Option<T>>` distinguishes
/// "leave alone" from "set to null".
#[derive(Debug, Default, Deserialize)]
pub struct UpdateBillingPlan {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub description: Option<Option<String>>,
    pub amount: Option<Decimal>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub billing_interval: Option<Option<BillingInterval>>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub campaign_limit: Option<Option<i64>>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub lead_limit: Option<Option<i64>>,
    pub features: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub display_order: Option<i64>,
    pub is_popular: Option<bool>,
    pub remove_watermark: Option<bool>,
    pub allow_background_image: Option<bool>,
    pub allow_logo_upload: Option<bool>,
    pub allow_external_border: Option<bool>,
    pub allow_qr_code: Option<bool>,
}

impl UpdateBillingPlan {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref name) = self.name {
            if name.trim().is_empty() {
                return Err(AppError::BadRequest("Plan name cannot be empty".into()));
            }
        }
        if let Some(amount) = self.amount {
            if amount.is_sign_negative() {
                return Err(AppError::BadRequest("Amount cannot be negative".into()));
            }
        }
        Ok(())
    }

    /// Full mirror of `source` (everything except id and currency), with the
    /// amount replaced. Used when syncing a plan into the other currency.
    pub fn mirror_of(source: &BillingPlan, amount: Decimal) -> Self {
        Self {
            name: Some(source.name.clone()),
            description: Some(source.description.clone()),
            amount: Some(amount),
            billing_interval: Some(source.billing_interval),
            campaign_limit: Some(source.campaign_limit),
            lead_limit: Some(source.lead_limit),
            features: Some(source.features.clone()),
            is_active: Some(source.is_active),
            display_order: Some(source.display_order),
            is_popular: Some(source.is_popular),
            remove_watermark: Some(source.flags.remove_watermark),
            allow_background_image: Some(source.flags.allow_background_image),
            allow_logo_upload: Some(source.flags.allow_logo_upload),
            allow_external_border: Some(source.flags.allow_external_border),
            allow_qr_code: Some(source.flags.allow_qr_code),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Up,
    Down,
}

#[derive(Debug, Deserialize)]
pub struct MovePlan {
    pub direction: MoveDirection,
}
