use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::{BillingInterval, Currency, PlanType};
use crate::payments::PaymentGateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Active,
    Expired,
    Cancelled,
    Failed,
}

/// Append-only record of a purchase attempt and its outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: Option<String>,
    pub transaction_type: PlanType,
    pub plan_id: Option<String>,
    /// Label of what was bought, as sent by the client (plan name or pack label).
    pub plan_type: String,
    pub gateway_name: PaymentGateway,
    pub gateway_reference: Option<String>,
    pub amount: Decimal,
    pub currency: Currency,
    pub status: TransactionStatus,
    pub description: String,
    pub billing_cycle: Option<BillingInterval>,
    pub credits: Option<i64>,
    pub leads: Option<i64>,
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct CreateTransaction {
    pub user_id: String,
    pub transaction_type: PlanType,
    pub plan_id: Option<String>,
    pub plan_type: String,
    pub gateway_name: PaymentGateway,
    pub amount: Decimal,
    pub currency: Currency,
    pub description: String,
    pub billing_cycle: Option<BillingInterval>,
    pub credits: Option<i64>,
    pub leads: Option<i64>,
}
