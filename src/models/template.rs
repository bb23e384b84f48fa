use serde::{Deserialize, Serialize};

use super::{CampaignType, LeadFormField, WheelSegment};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignTemplate {
    pub id: String,
    pub name: String,
    pub campaign_type: CampaignType,
    pub wheel_segments: Vec<WheelSegment>,
    pub wheel_colors: Vec<String>,
    pub lead_form_fields: Vec<LeadFormField>,
    pub is_builtin: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTemplate {
    pub name: Option<String>,
    pub campaign_type: Option<CampaignType>,
    pub wheel_segments: Option<Vec<WheelSegment>>,
    pub wheel_colors: Option<Vec<String>>,
    pub lead_form_fields: Option<Vec<LeadFormField>>,
}
