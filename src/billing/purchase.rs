//! Purchase initiation: turn a checkout request into a pending transaction
//! and a hosted checkout redirect.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::queries::PurchaseCompletion;
use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::{
    ActorType, AppUser, AuditAction, BillingInterval, BillingPlan, CreateTransaction, Currency,
    PlanType, Transaction,
};
use crate::payments::{self, CheckoutRequest, PaymentGateway};
use crate::util::{AuditLogBuilder, append_query_params};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePayment {
    pub gateway: String,
    pub amount: Decimal,
    pub currency: Currency,
    pub description: String,
    /// Label of what is being bought (plan name or pack label)
    pub plan_type: String,
    pub purchase_type: PlanType,
    #[serde(default)]
    pub billing_cycle: Option<BillingInterval>,
    #[serde(default)]
    pub credits: Option<i64>,
    #[serde(default)]
    pub leads: Option<i64>,
    #[serde(default)]
    pub plan_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentResponse {
    pub redirect_url: String,
    pub transaction_id: String,
}

/// Validated description of what is being bought and for how much.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseDescriptor {
    pub purchase_type: PlanType,
    pub plan_id: Option<String>,
    pub label: String,
    pub description: String,
    pub amount: Decimal,
    pub currency: Currency,
    pub billing_cycle: Option<BillingInterval>,
    pub credits: Option<i64>,
    pub leads: Option<i64>,
}

impl PurchaseDescriptor {
    /// Validate the client's request. When it names a catalog plan, the
    /// descriptor is rebuilt from the plan and the client amount must agree.
    pub fn resolve(input: &InitiatePayment, plan: Option<&BillingPlan>) -> Result<Self> {
        if input.description.trim().is_empty() {
            return Err(AppError::BadRequest("description is required".into()));
        }

        let descriptor = match plan {
            Some(plan) => {
                if !plan.is_active {
                    return Err(AppError::BadRequest("This plan is not available".into()));
                }
                if plan.plan_type != input.purchase_type {
                    return Err(AppError::BadRequest(
                        "purchaseType does not match the selected plan".into(),
                    ));
                }
                if plan.currency != input.currency || plan.amount != input.amount {
                    return Err(AppError::BadRequest(
                        "Amount does not match the selected plan".into(),
                    ));
                }
                Self {
                    purchase_type: plan.plan_type,
                    plan_id: Some(plan.id.clone()),
                    label: plan.name.clone(),
                    description: input.description.trim().to_string(),
                    amount: plan.amount,
                    currency: plan.currency,
                    billing_cycle: match plan.plan_type {
                        PlanType::Subscription => plan.billing_interval.or(input.billing_cycle),
                        _ => None,
                    },
                    credits: match plan.plan_type {
                        PlanType::Leads => None,
                        _ => plan.campaign_limit,
                    },
                    leads: match plan.plan_type {
                        PlanType::Campaign => None,
                        _ => plan.lead_limit,
                    },
                }
            }
            None => Self {
                purchase_type: input.purchase_type,
                plan_id: None,
                label: input.plan_type.trim().to_string(),
                description: input.description.trim().to_string(),
                amount: input.amount,
                currency: input.currency,
                billing_cycle: input.billing_cycle,
                credits: input.credits,
                leads: input.leads,
            },
        };

        descriptor.validate()?;
        Ok(descriptor)
    }

    fn validate(&self) -> Result<()> {
        if self.amount <= Decimal::ZERO {
            return Err(AppError::BadRequest("amount must be greater than zero".into()));
        }
        match self.purchase_type {
            PlanType::Subscription if self.billing_cycle.is_none() => Err(AppError::BadRequest(
                "billingCycle is required for subscriptions".into(),
            )),
            PlanType::Campaign if !matches!(self.credits, Some(n) if n > 0) => Err(
                AppError::BadRequest("credits must be greater than zero".into()),
            ),
            PlanType::Leads if !matches!(self.leads, Some(n) if n > 0) => Err(
                AppError::BadRequest("leads must be greater than zero".into()),
            ),
            _ => Ok(()),
        }
    }
}

/// Create a pending transaction and open a hosted checkout for it.
///
/// A gateway failure marks the transaction failed and is returned as an
/// error. Nothing is retried.
pub async fn initiate_payment(
    state: &AppState,
    user: &AppUser,
    input: &InitiatePayment,
) -> Result<(Transaction, InitiatePaymentResponse)> {
    let (gateway_config, transaction) = {
        let conn = state.db.get()?;

        let active = queries::list_active_gateways(&conn, state.payments_sandbox)?;
        if active.is_empty() {
            return Err(AppError::BadRequest(
                "No payment gateways are currently available".into(),
            ));
        }

        let gateway: PaymentGateway = input
            .gateway
            .parse()
            .map_err(|_| AppError::BadRequest(format!("Unknown gateway: {}", input.gateway)))?;
        let row = active
            .into_iter()
            .find(|g| g.name == gateway)
            .ok_or_else(|| {
                AppError::BadRequest(format!("{} is not currently available", gateway))
            })?;

        let plan = match input.plan_id {
            Some(ref plan_id) => Some(
                queries::get_billing_plan_by_id(&conn, plan_id)?
                    .ok_or_else(|| AppError::BadRequest("Selected plan does not exist".into()))?,
            ),
            None => None,
        };
        let descriptor = PurchaseDescriptor::resolve(input, plan.as_ref())?;

        let config = row.decrypt(&state.master_key)?;
        let transaction = queries::create_transaction(
            &conn,
            &CreateTransaction {
                user_id: user.id.clone(),
                transaction_type: descriptor.purchase_type,
                plan_id: descriptor.plan_id,
                plan_type: descriptor.label,
                gateway_name: gateway,
                amount: descriptor.amount,
                currency: descriptor.currency,
                description: descriptor.description,
                billing_cycle: descriptor.billing_cycle,
                credits: descriptor.credits,
                leads: descriptor.leads,
            },
        )?;
        (config, transaction)
    };

    let callback = format!("{}/api/billing/callback", state.base_url);
    let success_url = append_query_params(&callback, &[("transaction", &transaction.id)]);
    let cancel_url = append_query_params(
        &state.success_page_url,
        &[("status", "cancelled"), ("transaction", &transaction.id)],
    );

    let request = CheckoutRequest {
        transaction_id: &transaction.id,
        description: &transaction.description,
        amount: transaction.amount,
        currency: transaction.currency,
        customer_email: &user.email,
        success_url: &success_url,
        cancel_url: &cancel_url,
    };

    let session = match payments::create_checkout(&gateway_config, &request).await {
        Ok(session) => session,
        Err(err) => {
            tracing::error!(
                transaction_id = %transaction.id,
                gateway = %gateway_config.name,
                error = %err,
                "Checkout creation failed"
            );
            let conn = state.db.get()?;
            queries::mark_transaction_failed(&conn, &transaction.id)?;
            return Err(err);
        }
    };

    {
        let conn = state.db.get()?;
        queries::set_transaction_reference(&conn, &transaction.id, &session.reference)?;
    }

    tracing::info!(
        transaction_id = %transaction.id,
        user_id = %user.id,
        gateway = %session.gateway,
        amount = %transaction.amount,
        currency = %transaction.currency,
        "Payment initiated"
    );

    let response = InitiatePaymentResponse {
        redirect_url: session.redirect_url,
        transaction_id: transaction.id.clone(),
    };
    Ok((transaction, response))
}

/// Complete a transaction on behalf of a gateway confirmation and record it
/// in the audit log when this call is the one that applied it.
pub fn complete_purchase(state: &AppState, transaction_id: &str, source: &str) -> Result<PurchaseCompletion> {
    let outcome = {
        let mut conn = state.db.get()?;
        queries::complete_transaction(&mut conn, transaction_id)?
    };

    match outcome {
        PurchaseCompletion::Applied(ref tx) => {
            tracing::info!(
                transaction_id = %tx.id,
                user_id = ?tx.user_id,
                purchase_type = %tx.transaction_type,
                source,
                "Purchase completed"
            );
            let audit_conn = state.audit.get()?;
            AuditLogBuilder::system(&audit_conn, state.audit_log_enabled)
                .actor(ActorType::System, tx.user_id.as_deref())
                .action(AuditAction::CompletePayment)
                .resource("transaction", &tx.id)
                .details(&serde_json::json!({
                    "source": source,
                    "gateway": tx.gateway_name,
                    "amount": tx.amount,
                    "currency": tx.currency,
                    "purchase_type": tx.transaction_type,
                    "plan_id": tx.plan_id,
                }))
                .save()?;
        }
        PurchaseCompletion::AlreadyProcessed(ref tx) => {
            tracing::info!(
                transaction_id = %tx.id,
                status = %tx.status,
                source,
                "Transaction already processed, skipping"
            );
        }
    }
    Ok(outcome)
}
