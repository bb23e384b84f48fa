use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActorType {
    /// Platform administrator acting through the admin API
    Admin,
    /// Signed-in business user acting on their own account
    User,
    /// Anonymous visitor on a public campaign page
    Public,
    /// Background jobs, webhooks and the CLI
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuditAction {
    CreateBillingPlan,
    UpdateBillingPlan,
    DeleteBillingPlan,
    MoveBillingPlan,
    SyncBillingPlan,
    UpdatePaymentGateway,
    UpdateEmailSettings,
    InstallEmailTemplates,
    SendTestEmail,
    UpdateHomepage,
    UpdateTemplate,
    DeleteTemplate,
    DuplicateTemplate,
    MigrateTemplates,
    GrantCredits,
    SetSubscription,
    DeleteUser,
    CompleteProfile,
    CreateCampaign,
    UpdateCampaign,
    DeleteCampaign,
    RedeemLead,
    UnredeemLead,
    ExportLeads,
    InitiatePayment,
    CompletePayment,
    CancelSubscription,
    ExpireSubscriptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditLog {
    pub id: String,
    pub timestamp: i64,
    pub actor_type: ActorType,
    pub user_id: Option<String>,
    pub user_email: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditLogQuery {
    pub actor_type: Option<ActorType>,
    pub user_id: Option<String>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub from_timestamp: Option<i64>,
    pub to_timestamp: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl AuditLogQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(100).clamp(1, 1000)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}
