use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CampaignType {
    Spinwheel,
    Scratch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Ended,
}

/// One slice of a wheel (or one prize tier of a scratch card).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WheelSegment {
    pub label: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prize_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prize_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redemption_instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadFormField {
    pub name: String,
    pub label: String,
    #[serde(default = "default_field_type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
}

fn default_field_type() -> String {
    "text".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub public_slug: String,
    pub status: CampaignStatus,
    pub campaign_type: CampaignType,
    pub wheel_segments: Vec<WheelSegment>,
    pub wheel_colors: Vec<String>,
    pub lead_form_fields: Vec<LeadFormField>,
    /// Days a winner has to redeem; None means prizes never expire.
    pub redemption_days: Option<i64>,
    pub spins_count: i64,
    pub leads_count: i64,
    pub template_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateCampaign {
    pub name: String,
    pub campaign_type: CampaignType,
    /// Start from a catalog template; explicit fields below override it.
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub wheel_segments: Option<Vec<WheelSegment>>,
    #[serde(default)]
    pub wheel_colors: Option<Vec<String>>,
    #[serde(default)]
    pub lead_form_fields: Option<Vec<LeadFormField>>,
    #[serde(default)]
    pub redemption_days: Option<i64>,
}

impl CreateCampaign {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest("Campaign name is required".into()));
        }
        if matches!(self.redemption_days, Some(d) if d <= 0) {
            return Err(AppError::BadRequest("redemption_days must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCampaign {
    pub name: Option<String>,
    pub status: Option<CampaignStatus>,
    pub wheel_segments: Option<Vec<WheelSegment>>,
    pub wheel_colors: Option<Vec<String>>,
    pub lead_form_fields: Option<Vec<LeadFormField>>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub redemption_days: Option<Option<i64>>,
}

impl UpdateCampaign {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref name) = self.name {
            if name.trim().is_empty() {
                return Err(AppError::BadRequest("Campaign name cannot be empty".into()));
            }
        }
        if matches!(self.redemption_days, Some(Some(d)) if d <= 0) {
            return Err(AppError::BadRequest("redemption_days must be positive".into()));
        }
        Ok(())
    }
}

/// What the public play page needs; owner-only counters are left out.
#[derive(Debug, Serialize)]
pub struct PublicCampaign {
    pub name: String,
    pub public_slug: String,
    pub campaign_type: CampaignType,
    pub wheel_segments: Vec<WheelSegment>,
    pub wheel_colors: Vec<String>,
    pub lead_form_fields: Vec<LeadFormField>,
    pub show_watermark: bool,
}

#[derive(Debug, Deserialize)]
pub struct RecordSpin {
    #[serde(default)]
    pub prize_won: Option<String>,
}

/// Campaign content after template defaults are merged, ready to insert.
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub name: String,
    pub public_slug: String,
    pub campaign_type: CampaignType,
    pub wheel_segments: Vec<WheelSegment>,
    pub wheel_colors: Vec<String>,
    pub lead_form_fields: Vec<LeadFormField>,
    pub redemption_days: Option<i64>,
    pub template_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Spin {
    pub id: String,
    pub campaign_id: String,
    pub prize_won: Option<String>,
    pub created_at: i64,
}
