use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior, params, types::Value};
use uuid::Uuid;

use crate::crypto::{MasterKey, generate_token, hash_secret};
use crate::error::{AppError, Result};
use crate::models::*;
use crate::payments::PaymentGateway;

use super::from_row::{
    AUDIT_LOG_COLS, BILLING_PLAN_COLS, CAMPAIGN_COLS, EMAIL_TEMPLATE_COLS, GATEWAY_COLS,
    LEAD_COLS, MAILGUN_COLS, SPIN_COLS, TEMPLATE_COLS, TRANSACTION_COLS, USER_COLS, query_all,
    query_one,
};

const SECONDS_PER_DAY: i64 = 86400;

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Builder for dynamic UPDATE statements with optional fields.
/// Combines multiple field updates into a single query.
struct UpdateBuilder {
    table: &'static str,
    id: String,
    fields: Vec<(&'static str, Value)>,
    track_updated_at: bool,
}

impl UpdateBuilder {
    fn new(table: &'static str, id: &str) -> Self {
        Self {
            table,
            id: id.to_string(),
            fields: Vec::new(),
            track_updated_at: false,
        }
    }

    fn with_updated_at(mut self) -> Self {
        self.track_updated_at = true;
        self
    }

    fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    fn set_opt<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    /// Set a column to an explicit value (including NULL).
    fn set_nullable<V: Into<Value>>(mut self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.fields.push((column, v.into())),
            None => self.fields.push((column, Value::Null)),
        }
        self
    }

    /// `Some(None)` clears the column, `None` leaves it untouched.
    fn set_patch<V: Into<Value>>(self, column: &'static str, value: Option<Option<V>>) -> Self {
        match value {
            Some(inner) => self.set_nullable(column, inner),
            None => self,
        }
    }

    fn execute(mut self, conn: &Connection) -> Result<bool> {
        if self.fields.is_empty() {
            return Ok(false);
        }
        if self.track_updated_at {
            self.fields.push(("updated_at", now().into()));
        }
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.id.into());
        let sql = format!("UPDATE {} SET {} WHERE id = ?", self.table, sets.join(", "));
        let affected = conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(affected > 0)
    }
}

// ============ Users ============

pub fn create_user(conn: &Connection, input: &CreateAppUser) -> Result<AppUser> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO app_users (id, email, name, is_admin, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![&id, input.email.trim(), input.name.trim(), input.is_admin, now, now],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            AppError::Conflict("A user with this email already exists".into())
        }
        other => other.into(),
    })?;

    get_user_by_id(conn, &id)?
        .ok_or_else(|| AppError::Internal("User vanished after insert".into()))
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<AppUser>> {
    query_one(
        conn,
        &format!("SELECT {} FROM app_users WHERE id = ?1", USER_COLS),
        params![id],
    )
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<AppUser>> {
    query_one(
        conn,
        &format!("SELECT {} FROM app_users WHERE email = ?1", USER_COLS),
        params![email.trim()],
    )
}

pub fn list_users_paginated(
    conn: &Connection,
    email_filter: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<AppUser>, i64)> {
    let pattern = email_filter
        .map(|e| e.trim())
        .filter(|e| !e.is_empty())
        .map(|e| format!("%{}%", e.to_lowercase()));

    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM app_users WHERE (?1 IS NULL OR lower(email) LIKE ?1)",
        params![&pattern],
        |row| row.get(0),
    )?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM app_users WHERE (?1 IS NULL OR lower(email) LIKE ?1)
             ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
            USER_COLS
        ),
        params![&pattern, limit, offset],
    )?;
    Ok((items, total))
}

pub fn update_profile(conn: &Connection, id: &str, input: &UpdateProfile) -> Result<bool> {
    UpdateBuilder::new("app_users", id)
        .with_updated_at()
        .set_opt("name", input.name.as_deref().map(|n| n.trim().to_string()))
        .set_patch("phone", input.phone.clone())
        .set_patch("business_name", input.business_name.clone())
        .set_opt("billing_cycle", input.billing_cycle.map(|c| c.as_ref().to_string()))
        .set_opt("currency", input.currency.map(|c| c.as_ref().to_string()))
        .execute(conn)
}

pub fn complete_profile_setup(
    conn: &Connection,
    id: &str,
    input: &ProfileSetup,
    currency: Currency,
) -> Result<bool> {
    UpdateBuilder::new("app_users", id)
        .with_updated_at()
        .set("name", input.name.trim().to_string())
        .set_nullable("business_name", input.business_name.clone())
        .set("country", input.country.trim().to_ascii_uppercase())
        .set_nullable("phone", input.phone.clone())
        .set("currency", currency.as_ref().to_string())
        .set("profile_completed", true)
        .execute(conn)
}

/// Add non-negative deltas to a user's credit balances.
pub fn grant_credits(conn: &Connection, id: &str, campaign: i64, lead: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE app_users SET campaign_credits = campaign_credits + ?1,
                lead_credits = lead_credits + ?2, updated_at = ?3
         WHERE id = ?4",
        params![campaign, lead, now(), id],
    )?;
    Ok(affected > 0)
}

pub fn set_subscription(conn: &Connection, id: &str, input: &SetSubscription) -> Result<bool> {
    UpdateBuilder::new("app_users", id)
        .with_updated_at()
        .set("plan_type", input.plan_type.as_ref().to_string())
        .set_nullable(
            "subscription_status",
            input.subscription_status.map(|s| s.as_ref().to_string()),
        )
        .set_nullable("plan_expires_at", input.plan_expires_at)
        .set_nullable("active_plan_id", input.active_plan_id.clone())
        .execute(conn)
}

pub fn set_stripe_customer_id(conn: &Connection, id: &str, customer_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE app_users SET stripe_customer_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![customer_id, now(), id],
    )?;
    Ok(())
}

/// Mark the subscription of whoever owns this Stripe customer as cancelled.
/// Access continues until `plan_expires_at`; the expiry sweep handles the rest.
pub fn cancel_subscription_by_stripe_customer(conn: &Connection, customer_id: &str) -> Result<usize> {
    let affected = conn.execute(
        "UPDATE app_users SET subscription_status = 'cancelled', updated_at = ?1
         WHERE stripe_customer_id = ?2 AND plan_type = 'subscription'",
        params![now(), customer_id],
    )?;
    Ok(affected)
}

/// Persist `active -> expired` for every subscription whose period has ended.
pub fn expire_lapsed_subscriptions(conn: &Connection, at: i64) -> Result<usize> {
    let affected = conn.execute(
        "UPDATE app_users SET subscription_status = 'expired', updated_at = ?1
         WHERE subscription_status = 'active'
           AND plan_expires_at IS NOT NULL AND plan_expires_at < ?1",
        params![at],
    )?;
    Ok(affected)
}

pub fn delete_user(conn: &Connection, id: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM app_users WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

// ============ API Tokens ============

/// Issue a bearer token for a user. Only the hash is stored; the plaintext
/// is returned once.
pub fn create_api_token(conn: &Connection, user_id: &str, name: Option<&str>) -> Result<String> {
    let token = generate_token("pw");
    conn.execute(
        "INSERT INTO api_tokens (id, user_id, token_hash, name, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![gen_id(), user_id, hash_secret(&token), name, now()],
    )?;
    Ok(token)
}

pub fn get_user_by_api_token(conn: &Connection, token: &str) -> Result<Option<AppUser>> {
    let token_hash = hash_secret(token);
    let user: Option<AppUser> = query_one(
        conn,
        &format!(
            "SELECT {} FROM app_users
             WHERE id = (SELECT user_id FROM api_tokens WHERE token_hash = ?1)",
            USER_COLS
        ),
        params![&token_hash],
    )?;

    if user.is_some() {
        conn.execute(
            "UPDATE api_tokens SET last_used_at = ?1 WHERE token_hash = ?2",
            params![now(), &token_hash],
        )?;
    }
    Ok(user)
}

// ============ Billing Plans ============

pub fn create_billing_plan(conn: &mut Connection, input: &CreateBillingPlan) -> Result<BillingPlan> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    // Appended at the end of its (currency, plan_type) group
    let display_order: i64 = tx.query_row(
        "SELECT COUNT(*) FROM billing_plans WHERE currency = ?1 AND plan_type = ?2",
        params![input.currency.as_ref(), input.plan_type.as_ref()],
        |row| row.get(0),
    )?;

    let id = gen_id();
    let now = now();
    tx.execute(
        "INSERT INTO billing_plans (id, plan_type, name, description, currency, amount,
            billing_interval, campaign_limit, lead_limit, features, is_active, display_order,
            is_popular, remove_watermark, allow_background_image, allow_logo_upload,
            allow_external_border, allow_qr_code, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
        params![
            &id,
            input.plan_type.as_ref(),
            input.name.trim(),
            &input.description,
            input.currency.as_ref(),
            input.amount.to_string(),
            input.billing_interval.map(|i| i.as_ref().to_string()),
            input.campaign_limit,
            input.lead_limit,
            to_json(&input.features)?,
            input.is_active,
            display_order,
            input.is_popular,
            input.flags.remove_watermark,
            input.flags.allow_background_image,
            input.flags.allow_logo_upload,
            input.flags.allow_external_border,
            input.flags.allow_qr_code,
            now,
            now
        ],
    )?;

    let plan = get_billing_plan_by_id(&tx, &id)?
        .ok_or_else(|| AppError::Internal("Plan vanished after insert".into()))?;
    tx.commit()?;
    Ok(plan)
}

pub fn get_billing_plan_by_id(conn: &Connection, id: &str) -> Result<Option<BillingPlan>> {
    query_one(
        conn,
        &format!("SELECT {} FROM billing_plans WHERE id = ?1", BILLING_PLAN_COLS),
        params![id],
    )
}

/// Plans ordered by `(currency, plan_type, display_order)`.
pub fn list_billing_plans(
    conn: &Connection,
    currency: Option<Currency>,
    plan_type: Option<PlanType>,
    active_only: bool,
) -> Result<Vec<BillingPlan>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM billing_plans
             WHERE (?1 IS NULL OR currency = ?1)
               AND (?2 IS NULL OR plan_type = ?2)
               AND (?3 = 0 OR is_active = 1)
             ORDER BY currency, plan_type, display_order, created_at, id",
            BILLING_PLAN_COLS
        ),
        params![
            currency.map(|c| c.as_ref().to_string()),
            plan_type.map(|t| t.as_ref().to_string()),
            active_only
        ],
    )
}

pub fn list_plans_in_group(
    conn: &Connection,
    currency: Currency,
    plan_type: PlanType,
) -> Result<Vec<BillingPlan>> {
    list_billing_plans(conn, Some(currency), Some(plan_type), false)
}

/// Partial update. A new `display_order` is applied and the plan's group
/// re-densified in the same transaction, so orders stay `0..n-1`.
pub fn update_billing_plan(conn: &mut Connection, id: &str, input: &UpdateBillingPlan) -> Result<bool> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let Some(plan) = get_billing_plan_by_id(&tx, id)? else {
        return Ok(false);
    };
    let updated = apply_billing_plan_update(&tx, id, input)?;
    if input.display_order.is_some() {
        normalize_plan_group(&tx, plan.currency, plan.plan_type)?;
    }
    tx.commit()?;
    Ok(updated)
}

fn apply_billing_plan_update(conn: &Connection, id: &str, input: &UpdateBillingPlan) -> Result<bool> {
    let features = input.features.as_ref().map(to_json).transpose()?;
    UpdateBuilder::new("billing_plans", id)
        .with_updated_at()
        .set_opt("name", input.name.as_deref().map(|n| n.trim().to_string()))
        .set_patch("description", input.description.clone())
        .set_opt("amount", input.amount.map(|a| a.to_string()))
        .set_patch(
            "billing_interval",
            input.billing_interval.map(|i| i.map(|i| i.as_ref().to_string())),
        )
        .set_patch("campaign_limit", input.campaign_limit)
        .set_patch("lead_limit", input.lead_limit)
        .set_opt("features", features)
        .set_opt("is_active", input.is_active)
        .set_opt("display_order", input.display_order)
        .set_opt("is_popular", input.is_popular)
        .set_opt("remove_watermark", input.remove_watermark)
        .set_opt("allow_background_image", input.allow_background_image)
        .set_opt("allow_logo_upload", input.allow_logo_upload)
        .set_opt("allow_external_border", input.allow_external_border)
        .set_opt("allow_qr_code", input.allow_qr_code)
        .execute(conn)
}

/// Rewrite `display_order` of a group to 0..n-1, keeping the current order.
pub fn normalize_plan_group(conn: &Connection, currency: Currency, plan_type: PlanType) -> Result<()> {
    let plans = list_plans_in_group(conn, currency, plan_type)?;
    let mut stmt = conn.prepare("UPDATE billing_plans SET display_order = ?1 WHERE id = ?2")?;
    for (index, plan) in plans.iter().enumerate() {
        if plan.display_order != index as i64 {
            stmt.execute(params![index as i64, &plan.id])?;
        }
    }
    Ok(())
}

pub fn delete_billing_plan(conn: &mut Connection, id: &str) -> Result<Option<BillingPlan>> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let Some(plan) = get_billing_plan_by_id(&tx, id)? else {
        return Ok(None);
    };
    tx.execute("DELETE FROM billing_plans WHERE id = ?1", params![id])?;
    normalize_plan_group(&tx, plan.currency, plan.plan_type)?;
    tx.commit()?;
    Ok(Some(plan))
}

/// Swap a plan with its neighbour in its group. Moving the first plan up or
/// the last plan down changes nothing and returns `Ok(false)`.
pub fn move_billing_plan(conn: &mut Connection, id: &str, direction: MoveDirection) -> Result<bool> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let plan = get_billing_plan_by_id(&tx, id)?
        .ok_or_else(|| AppError::NotFound("Billing plan not found".into()))?;

    let mut group = list_plans_in_group(&tx, plan.currency, plan.plan_type)?;
    let index = group
        .iter()
        .position(|p| p.id == plan.id)
        .ok_or_else(|| AppError::Internal("Plan missing from its own group".into()))?;

    let neighbour = match direction {
        MoveDirection::Up if index > 0 => index - 1,
        MoveDirection::Down if index + 1 < group.len() => index + 1,
        _ => return Ok(false),
    };
    group.swap(index, neighbour);

    let now = now();
    let mut stmt =
        tx.prepare("UPDATE billing_plans SET display_order = ?1, updated_at = ?2 WHERE id = ?3")?;
    for (order, p) in group.iter().enumerate() {
        stmt.execute(params![order as i64, now, &p.id])?;
    }
    drop(stmt);
    tx.commit()?;
    Ok(true)
}

/// True if any subscription plan, in any currency, bills weekly.
pub fn has_weekly_subscription_plan(conn: &Connection) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM billing_plans
             WHERE plan_type = 'subscription' AND billing_interval = 'weekly')",
        [],
        |row| row.get(0),
    )?;
    Ok(exists)
}

// ============ Campaigns ============

/// Insert a campaign, consuming one campaign credit from its owner in the
/// same IMMEDIATE transaction. Fails with 403 when the owner has none left.
pub fn create_campaign_with_credit(
    conn: &mut Connection,
    user_id: &str,
    input: &NewCampaign,
) -> Result<Campaign> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let debited = tx.execute(
        "UPDATE app_users SET campaign_credits = campaign_credits - 1, updated_at = ?1
         WHERE id = ?2 AND campaign_credits > 0",
        params![now(), user_id],
    )?;
    if debited == 0 {
        return Err(AppError::Forbidden(
            "No campaign credits remaining. Purchase a plan or credit pack to create campaigns."
                .into(),
        ));
    }

    let id = gen_id();
    let now = now();
    tx.execute(
        "INSERT INTO campaigns (id, user_id, name, public_slug, status, campaign_type,
            wheel_segments, wheel_colors, lead_form_fields, redemption_days, template_id,
            created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 'draft', ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            &id,
            user_id,
            input.name.trim(),
            &input.public_slug,
            input.campaign_type.as_ref(),
            to_json(&input.wheel_segments)?,
            to_json(&input.wheel_colors)?,
            to_json(&input.lead_form_fields)?,
            input.redemption_days,
            &input.template_id,
            now,
            now
        ],
    )?;

    let campaign = get_campaign_by_id(&tx, &id)?
        .ok_or_else(|| AppError::Internal("Campaign vanished after insert".into()))?;
    tx.commit()?;
    Ok(campaign)
}

pub fn get_campaign_by_id(conn: &Connection, id: &str) -> Result<Option<Campaign>> {
    query_one(
        conn,
        &format!("SELECT {} FROM campaigns WHERE id = ?1", CAMPAIGN_COLS),
        params![id],
    )
}

pub fn get_campaign_by_slug(conn: &Connection, slug: &str) -> Result<Option<Campaign>> {
    query_one(
        conn,
        &format!("SELECT {} FROM campaigns WHERE public_slug = ?1", CAMPAIGN_COLS),
        params![slug],
    )
}

pub fn slug_exists(conn: &Connection, slug: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM campaigns WHERE public_slug = ?1)",
        params![slug],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn list_campaigns_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Campaign>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM campaigns WHERE user_id = ?1 ORDER BY created_at DESC",
            CAMPAIGN_COLS
        ),
        params![user_id],
    )
}

pub fn update_campaign(conn: &Connection, id: &str, input: &UpdateCampaign) -> Result<bool> {
    let segments = input.wheel_segments.as_ref().map(to_json).transpose()?;
    let colors = input.wheel_colors.as_ref().map(to_json).transpose()?;
    let fields = input.lead_form_fields.as_ref().map(to_json).transpose()?;
    UpdateBuilder::new("campaigns", id)
        .with_updated_at()
        .set_opt("name", input.name.as_deref().map(|n| n.trim().to_string()))
        .set_opt("status", input.status.map(|s| s.as_ref().to_string()))
        .set_opt("wheel_segments", segments)
        .set_opt("wheel_colors", colors)
        .set_opt("lead_form_fields", fields)
        .set_patch("redemption_days", input.redemption_days)
        .execute(conn)
}

pub fn delete_campaign(conn: &Connection, id: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM campaigns WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

// ============ Spins ============

pub fn record_spin(conn: &mut Connection, campaign_id: &str, prize_won: Option<&str>) -> Result<Spin> {
    let tx = conn.transaction()?;
    let spin = Spin {
        id: gen_id(),
        campaign_id: campaign_id.to_string(),
        prize_won: prize_won.map(String::from),
        created_at: now(),
    };
    tx.execute(
        "INSERT INTO spins (id, campaign_id, prize_won, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![&spin.id, &spin.campaign_id, &spin.prize_won, spin.created_at],
    )?;
    tx.execute(
        "UPDATE campaigns SET spins_count = spins_count + 1 WHERE id = ?1",
        params![campaign_id],
    )?;
    tx.commit()?;
    Ok(spin)
}

pub fn list_spins_for_campaign(
    conn: &Connection,
    campaign_id: &str,
    since: Option<i64>,
) -> Result<Vec<Spin>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM spins WHERE campaign_id = ?1 AND (?2 IS NULL OR created_at >= ?2)
             ORDER BY created_at",
            SPIN_COLS
        ),
        params![campaign_id, since],
    )
}

// ============ Leads ============

/// Fields of a captured lead after validation and enrichment.
#[derive(Debug, Clone)]
pub struct NewLead<'a> {
    pub name: Option<&'a str>,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub prize_won: Option<&'a str>,
    pub reference_number: &'a str,
    pub redemption_expires_at: Option<i64>,
}

/// Store a lead and bump the campaign counter. When `debit_owner` is set,
/// one lead credit is taken from the campaign owner in the same transaction;
/// an owner without credits gets the capture refused.
pub fn capture_lead(
    conn: &mut Connection,
    campaign: &Campaign,
    input: &NewLead<'_>,
    debit_owner: bool,
) -> Result<Lead> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let now = now();

    if debit_owner {
        let debited = tx.execute(
            "UPDATE app_users SET lead_credits = lead_credits - 1, updated_at = ?1
             WHERE id = ?2 AND lead_credits > 0",
            params![now, &campaign.user_id],
        )?;
        if debited == 0 {
            return Err(AppError::Forbidden(
                "This campaign is not accepting entries right now".into(),
            ));
        }
    }

    let id = gen_id();
    tx.execute(
        "INSERT INTO leads (id, campaign_id, name, email, phone, prize_won, reference_number,
            redemption_expires_at, is_redeemed, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9)",
        params![
            &id,
            &campaign.id,
            input.name,
            input.email.trim(),
            input.phone,
            input.prize_won,
            input.reference_number,
            input.redemption_expires_at,
            now
        ],
    )?;
    tx.execute(
        "UPDATE campaigns SET leads_count = leads_count + 1 WHERE id = ?1",
        params![&campaign.id],
    )?;

    let lead = get_lead(&tx, &campaign.id, &id)?
        .ok_or_else(|| AppError::Internal("Lead vanished after insert".into()))?;
    tx.commit()?;
    Ok(lead)
}

pub fn get_lead(conn: &Connection, campaign_id: &str, lead_id: &str) -> Result<Option<Lead>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM leads WHERE id = ?1 AND campaign_id = ?2",
            LEAD_COLS
        ),
        params![lead_id, campaign_id],
    )
}

/// Newest first.
pub fn list_leads_for_campaign(conn: &Connection, campaign_id: &str) -> Result<Vec<Lead>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM leads WHERE campaign_id = ?1 ORDER BY created_at DESC, id",
            LEAD_COLS
        ),
        params![campaign_id],
    )
}

/// Set or clear redemption. Redeeming records when and by whom; un-redeeming
/// clears both.
pub fn set_lead_redemption(
    conn: &Connection,
    lead_id: &str,
    is_redeemed: bool,
    actor_id: &str,
) -> Result<bool> {
    let (redeemed_at, redeemed_by) = if is_redeemed {
        (Some(now()), Some(actor_id))
    } else {
        (None, None)
    };
    let affected = conn.execute(
        "UPDATE leads SET is_redeemed = ?1, redeemed_at = ?2, redeemed_by = ?3 WHERE id = ?4",
        params![is_redeemed, redeemed_at, redeemed_by, lead_id],
    )?;
    Ok(affected > 0)
}

// ============ Transactions ============

pub fn create_transaction(conn: &Connection, input: &CreateTransaction) -> Result<Transaction> {
    let id = gen_id();
    let now = now();
    conn.execute(
        "INSERT INTO transactions (id, user_id, transaction_type, plan_id, plan_type,
            gateway_name, amount, currency, status, description, billing_cycle, credits,
            leads, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending', ?9, ?10, ?11, ?12, ?13)",
        params![
            &id,
            &input.user_id,
            input.transaction_type.as_ref(),
            &input.plan_id,
            &input.plan_type,
            input.gateway_name.as_ref(),
            input.amount.to_string(),
            input.currency.as_ref(),
            &input.description,
            input.billing_cycle.map(|c| c.as_ref().to_string()),
            input.credits,
            input.leads,
            now
        ],
    )?;

    Ok(Transaction {
        id,
        user_id: Some(input.user_id.clone()),
        transaction_type: input.transaction_type,
        plan_id: input.plan_id.clone(),
        plan_type: input.plan_type.clone(),
        gateway_name: input.gateway_name,
        gateway_reference: None,
        amount: input.amount,
        currency: input.currency,
        status: TransactionStatus::Pending,
        description: input.description.clone(),
        billing_cycle: input.billing_cycle,
        credits: input.credits,
        leads: input.leads,
        created_at: now,
        completed_at: None,
    })
}

pub fn get_transaction_by_id(conn: &Connection, id: &str) -> Result<Option<Transaction>> {
    query_one(
        conn,
        &format!("SELECT {} FROM transactions WHERE id = ?1", TRANSACTION_COLS),
        params![id],
    )
}

pub fn get_transaction_by_reference(
    conn: &Connection,
    gateway: PaymentGateway,
    reference: &str,
) -> Result<Option<Transaction>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM transactions WHERE gateway_name = ?1 AND gateway_reference = ?2",
            TRANSACTION_COLS
        ),
        params![gateway.as_ref(), reference],
    )
}

pub fn set_transaction_reference(conn: &Connection, id: &str, reference: &str) -> Result<()> {
    conn.execute(
        "UPDATE transactions SET gateway_reference = ?1 WHERE id = ?2",
        params![reference, id],
    )?;
    Ok(())
}

/// Pending -> failed. Returns false if the transaction already left pending.
pub fn mark_transaction_failed(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE transactions SET status = 'failed', completed_at = ?1
         WHERE id = ?2 AND status = 'pending'",
        params![now(), id],
    )?;
    Ok(affected > 0)
}

pub fn list_transactions_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Transaction>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM transactions WHERE user_id = ?1 ORDER BY created_at DESC",
            TRANSACTION_COLS
        ),
        params![user_id],
    )
}

pub fn list_transactions_paginated(
    conn: &Connection,
    status: Option<TransactionStatus>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Transaction>, i64)> {
    let status = status.map(|s| s.as_ref().to_string());
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM transactions WHERE (?1 IS NULL OR status = ?1)",
        params![&status],
        |row| row.get(0),
    )?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM transactions WHERE (?1 IS NULL OR status = ?1)
             ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
            TRANSACTION_COLS
        ),
        params![&status, limit, offset],
    )?;
    Ok((items, total))
}

/// Outcome of completing a purchase.
#[derive(Debug)]
pub enum PurchaseCompletion {
    /// This call moved the transaction to active and granted entitlements
    Applied(Transaction),
    /// Someone else already completed (or failed) it
    AlreadyProcessed(Transaction),
}

/// Complete a pending transaction and grant what it bought, atomically.
///
/// The `pending -> active` compare-and-swap and the entitlement update share
/// one IMMEDIATE transaction, so a webhook delivered twice (or racing the
/// return callback) grants exactly once.
pub fn complete_transaction(conn: &mut Connection, id: &str) -> Result<PurchaseCompletion> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let now = now();

    let transaction = get_transaction_by_id(&tx, id)?
        .ok_or_else(|| AppError::NotFound("Transaction not found".into()))?;

    let claimed = tx.execute(
        "UPDATE transactions SET status = 'active', completed_at = ?1
         WHERE id = ?2 AND status = 'pending'",
        params![now, id],
    )?;
    if claimed == 0 {
        return Ok(PurchaseCompletion::AlreadyProcessed(transaction));
    }

    let Some(ref user_id) = transaction.user_id else {
        // User deleted while the payment was in flight; keep the record
        tracing::warn!(transaction_id = %id, "Completed transaction has no user");
        tx.commit()?;
        return Ok(PurchaseCompletion::Applied(Transaction {
            status: TransactionStatus::Active,
            completed_at: Some(now),
            ..transaction
        }));
    };

    let plan = match transaction.plan_id {
        Some(ref plan_id) => get_billing_plan_by_id(&tx, plan_id)?,
        None => None,
    };
    let user = get_user_by_id(&tx, user_id)?
        .ok_or_else(|| AppError::Internal("Transaction user not found".into()))?;

    match transaction.transaction_type {
        PlanType::Subscription => {
            let cycle = transaction
                .billing_cycle
                .or(plan.as_ref().and_then(|p| p.billing_interval))
                .unwrap_or(BillingInterval::Monthly);
            // Renewing a running subscription extends it from its current end
            let starts_at = match user.plan_expires_at {
                Some(current_end) if crate::billing::has_active_subscription(&user, now) => current_end.max(now),
                _ => now,
            };
            let expires_at = starts_at + cycle.period_days() * SECONDS_PER_DAY;
            let campaigns = transaction
                .credits
                .or(plan.as_ref().and_then(|p| p.campaign_limit))
                .unwrap_or(0);
            let leads = transaction
                .leads
                .or(plan.as_ref().and_then(|p| p.lead_limit))
                .unwrap_or(0);

            tx.execute(
                "UPDATE app_users SET plan_type = 'subscription', subscription_status = 'active',
                    billing_cycle = ?1, active_plan_id = ?2, plan_expires_at = ?3,
                    campaign_credits = campaign_credits + ?4, lead_credits = lead_credits + ?5,
                    updated_at = ?6
                 WHERE id = ?7",
                params![
                    cycle.as_ref(),
                    &transaction.plan_id,
                    expires_at,
                    campaigns,
                    leads,
                    now,
                    user_id
                ],
            )?;
        }
        PlanType::Campaign | PlanType::Leads => {
            let (campaigns, leads) = match transaction.transaction_type {
                PlanType::Campaign => (
                    transaction
                        .credits
                        .or(plan.as_ref().and_then(|p| p.campaign_limit))
                        .unwrap_or(0),
                    0,
                ),
                _ => (
                    0,
                    transaction
                        .leads
                        .or(plan.as_ref().and_then(|p| p.lead_limit))
                        .unwrap_or(0),
                ),
            };
            tx.execute(
                "UPDATE app_users SET campaign_credits = campaign_credits + ?1,
                    lead_credits = lead_credits + ?2, updated_at = ?3
                 WHERE id = ?4",
                params![campaigns, leads, now, user_id],
            )?;

            // A running subscription keeps precedence over a pack purchase
            if !crate::billing::has_active_subscription(&user, now) {
                tx.execute(
                    "UPDATE app_users SET plan_type = ?1,
                        active_plan_id = COALESCE(?2, active_plan_id)
                     WHERE id = ?3",
                    params![
                        UserPlanType::from(transaction.transaction_type).as_ref(),
                        &transaction.plan_id,
                        user_id
                    ],
                )?;
            }
        }
    }

    tx.commit()?;
    Ok(PurchaseCompletion::Applied(Transaction {
        status: TransactionStatus::Active,
        completed_at: Some(now),
        ..transaction
    }))
}

// ============ Webhook Event Deduplication ============

/// Atomically record a webhook event, returning true if this is a new event.
/// Returns false if the event was already processed.
pub fn try_record_webhook_event(conn: &Connection, provider: &str, event_id: &str) -> Result<bool> {
    let id = gen_id();
    let affected = conn.execute(
        "INSERT OR IGNORE INTO webhook_events (id, provider, event_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![id, provider, event_id, now()],
    )?;
    Ok(affected > 0)
}

/// Forget a recorded event so the provider's retry is processed again.
pub fn release_webhook_event(conn: &Connection, provider: &str, event_id: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM webhook_events WHERE provider = ?1 AND event_id = ?2",
        params![provider, event_id],
    )?;
    Ok(())
}

// ============ Payment Gateways ============

pub fn get_gateway_config(
    conn: &Connection,
    name: PaymentGateway,
    sandbox: bool,
) -> Result<Option<GatewayConfigRow>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM payment_gateways WHERE name = ?1 AND sandbox = ?2",
            GATEWAY_COLS
        ),
        params![name.as_ref(), sandbox],
    )
}

pub fn list_active_gateways(conn: &Connection, sandbox: bool) -> Result<Vec<GatewayConfigRow>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM payment_gateways
             WHERE sandbox = ?1 AND is_active = 1 AND encrypted_secret_key IS NOT NULL
             ORDER BY name",
            GATEWAY_COLS
        ),
        params![sandbox],
    )
}

/// Insert or update a gateway row. Secrets left as `None` keep their stored
/// ciphertext.
pub fn upsert_gateway_config(
    conn: &Connection,
    name: PaymentGateway,
    sandbox: bool,
    input: &UpdateGatewayConfig,
    master_key: &MasterKey,
) -> Result<()> {
    let seal = |field: &str, value: &Option<String>| -> Result<Option<Vec<u8>>> {
        value
            .as_deref()
            .filter(|v| !v.is_empty())
            .map(|v| master_key.encrypt_str(&gateway_secret_context(name, sandbox, field), v))
            .transpose()
    };
    let secret_key = seal("secret_key", &input.secret_key)?;
    let webhook_secret = seal("webhook_secret", &input.webhook_secret)?;
    let display_name = input
        .display_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| name.default_display_name().to_string());

    conn.execute(
        "INSERT INTO payment_gateways (name, sandbox, is_active, display_name, public_key,
            encrypted_secret_key, encrypted_webhook_secret, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(name, sandbox) DO UPDATE SET
            is_active = excluded.is_active,
            display_name = excluded.display_name,
            public_key = COALESCE(excluded.public_key, payment_gateways.public_key),
            encrypted_secret_key = COALESCE(excluded.encrypted_secret_key, payment_gateways.encrypted_secret_key),
            encrypted_webhook_secret = COALESCE(excluded.encrypted_webhook_secret, payment_gateways.encrypted_webhook_secret),
            updated_at = excluded.updated_at",
        params![
            name.as_ref(),
            sandbox,
            input.is_active,
            display_name,
            &input.public_key,
            secret_key,
            webhook_secret,
            now()
        ],
    )?;
    Ok(())
}

// ============ Email Settings & Templates ============

pub fn get_mailgun_settings(conn: &Connection, sandbox: bool) -> Result<Option<MailgunSettingsRow>> {
    query_one(
        conn,
        &format!("SELECT {} FROM email_settings WHERE sandbox = ?1", MAILGUN_COLS),
        params![sandbox],
    )
}

pub fn upsert_mailgun_settings(
    conn: &Connection,
    sandbox: bool,
    input: &UpdateMailgunSettings,
    master_key: &MasterKey,
) -> Result<()> {
    let sealed = input
        .api_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .map(|k| master_key.encrypt_str(&mailgun_secret_context(sandbox), k))
        .transpose()?;

    let existing = get_mailgun_settings(conn, sandbox)?;
    let encrypted_api_key = match (sealed, existing) {
        (Some(sealed), _) => sealed,
        (None, Some(existing)) => existing.encrypted_api_key,
        (None, None) => {
            return Err(AppError::BadRequest("api_key is required".into()));
        }
    };

    conn.execute(
        "INSERT INTO email_settings (sandbox, domain, from_email, region, encrypted_api_key,
            is_active, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(sandbox) DO UPDATE SET
            domain = excluded.domain,
            from_email = excluded.from_email,
            region = excluded.region,
            encrypted_api_key = excluded.encrypted_api_key,
            is_active = excluded.is_active,
            updated_at = excluded.updated_at",
        params![
            sandbox,
            input.domain.trim(),
            &input.from_email,
            input.region.as_ref(),
            encrypted_api_key,
            input.is_active,
            now()
        ],
    )?;
    Ok(())
}

pub fn get_email_template(conn: &Connection, slug: &str) -> Result<Option<EmailTemplate>> {
    query_one(
        conn,
        &format!("SELECT {} FROM email_templates WHERE slug = ?1", EMAIL_TEMPLATE_COLS),
        params![slug],
    )
}

/// Insert templates whose slug is not present yet. Returns how many were added.
pub fn install_email_templates(
    conn: &Connection,
    templates: &[(&str, &str, &str, &str)],
) -> Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO email_templates (id, slug, subject, text_body, html_body, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    let now = now();
    let mut installed = 0;
    for (slug, subject, text_body, html_body) in templates {
        installed += stmt.execute(params![gen_id(), slug, subject, text_body, html_body, now])?;
    }
    Ok(installed)
}

// ============ Campaign Templates ============

pub fn list_campaign_templates(conn: &Connection) -> Result<Vec<CampaignTemplate>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM campaign_templates ORDER BY is_builtin DESC, created_at, name",
            TEMPLATE_COLS
        ),
        [],
    )
}

pub fn count_campaign_templates(conn: &Connection) -> Result<i64> {
    let count: i64 =
        conn.query_row("SELECT COUNT(*) FROM campaign_templates", [], |row| row.get(0))?;
    Ok(count)
}

pub fn get_campaign_template(conn: &Connection, id: &str) -> Result<Option<CampaignTemplate>> {
    query_one(
        conn,
        &format!("SELECT {} FROM campaign_templates WHERE id = ?1", TEMPLATE_COLS),
        params![id],
    )
}

/// Insert a template keeping its id. Existing ids are left untouched.
pub fn insert_campaign_template_if_missing(conn: &Connection, template: &CampaignTemplate) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO campaign_templates (id, name, campaign_type, wheel_segments,
            wheel_colors, lead_form_fields, is_builtin, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            &template.id,
            &template.name,
            template.campaign_type.as_ref(),
            to_json(&template.wheel_segments)?,
            to_json(&template.wheel_colors)?,
            to_json(&template.lead_form_fields)?,
            template.is_builtin,
            template.created_at,
            template.updated_at
        ],
    )?;
    Ok(inserted > 0)
}

pub fn update_campaign_template(conn: &Connection, id: &str, input: &UpdateTemplate) -> Result<bool> {
    let segments = input.wheel_segments.as_ref().map(to_json).transpose()?;
    let colors = input.wheel_colors.as_ref().map(to_json).transpose()?;
    let fields = input.lead_form_fields.as_ref().map(to_json).transpose()?;
    UpdateBuilder::new("campaign_templates", id)
        .with_updated_at()
        .set_opt("name", input.name.clone())
        .set_opt("campaign_type", input.campaign_type.map(|t| t.as_ref().to_string()))
        .set_opt("wheel_segments", segments)
        .set_opt("wheel_colors", colors)
        .set_opt("lead_form_fields", fields)
        .execute(conn)
}

/// Copy a template under a new id. The copy is never built-in.
pub fn duplicate_campaign_template(conn: &Connection, id: &str) -> Result<Option<CampaignTemplate>> {
    let Some(source) = get_campaign_template(conn, id)? else {
        return Ok(None);
    };
    let now = now();
    let copy = CampaignTemplate {
        id: gen_id(),
        name: format!("{} (Copy)", source.name),
        is_builtin: false,
        created_at: now,
        updated_at: now,
        ..source
    };
    insert_campaign_template_if_missing(conn, &copy)?;
    Ok(Some(copy))
}

pub fn delete_campaign_template(conn: &Connection, id: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM campaign_templates WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

// ============ Homepage ============

pub fn get_homepage_config(conn: &Connection) -> Result<Option<HomepageConfig>> {
    let raw: Option<String> = conn
        .query_row("SELECT config FROM homepage_config WHERE id = 1", [], |row| row.get(0))
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;
    raw.map(|s| serde_json::from_str(&s).map_err(AppError::from))
        .transpose()
}

pub fn save_homepage_config(conn: &Connection, config: &HomepageConfig) -> Result<()> {
    conn.execute(
        "INSERT INTO homepage_config (id, config, updated_at) VALUES (1, ?1, ?2)
         ON CONFLICT(id) DO UPDATE SET config = excluded.config, updated_at = excluded.updated_at",
        params![to_json(config)?, now()],
    )?;
    Ok(())
}

// ============ Audit Logs ============

#[allow(clippy::too_many_arguments)]
pub fn create_audit_log(
    conn: &Connection,
    enabled: bool,
    actor_type: ActorType,
    user_id: Option<&str>,
    user_email: Option<&str>,
    action: &str,
    resource_type: &str,
    resource_id: &str,
    details: Option<&serde_json::Value>,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
) -> Result<AuditLog> {
    let log = AuditLog {
        id: gen_id(),
        timestamp: now(),
        actor_type,
        user_id: user_id.map(String::from),
        user_email: user_email.map(String::from),
        action: action.to_string(),
        resource_type: resource_type.to_string(),
        resource_id: resource_id.to_string(),
        details: details.cloned(),
        ip_address: ip_address.map(String::from),
        user_agent: user_agent.map(String::from),
    };

    // Skip database insert if audit logging is disabled
    if !enabled {
        return Ok(log);
    }

    conn.execute(
        "INSERT INTO audit_logs (id, timestamp, actor_type, user_id, user_email, action,
            resource_type, resource_id, details, ip_address, user_agent)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            &log.id,
            log.timestamp,
            log.actor_type.as_ref(),
            &log.user_id,
            &log.user_email,
            &log.action,
            &log.resource_type,
            &log.resource_id,
            details.map(|d| d.to_string()),
            &log.ip_address,
            &log.user_agent
        ],
    )?;

    Ok(log)
}

pub fn query_audit_logs(conn: &Connection, query: &AuditLogQuery) -> Result<(Vec<AuditLog>, i64)> {
    // Shared between COUNT and SELECT
    let mut where_clause = String::from("WHERE 1=1");
    let mut filter_params: Vec<Value> = Vec::new();

    if let Some(actor_type) = query.actor_type {
        where_clause.push_str(" AND actor_type = ?");
        filter_params.push(actor_type.as_ref().to_string().into());
    }
    if let Some(ref user_id) = query.user_id {
        where_clause.push_str(" AND user_id = ?");
        filter_params.push(user_id.clone().into());
    }
    if let Some(ref action) = query.action {
        where_clause.push_str(" AND action = ?");
        filter_params.push(action.clone().into());
    }
    if let Some(ref resource_type) = query.resource_type {
        where_clause.push_str(" AND resource_type = ?");
        filter_params.push(resource_type.clone().into());
    }
    if let Some(ref resource_id) = query.resource_id {
        where_clause.push_str(" AND resource_id = ?");
        filter_params.push(resource_id.clone().into());
    }
    if let Some(from_ts) = query.from_timestamp {
        where_clause.push_str(" AND timestamp >= ?");
        filter_params.push(from_ts.into());
    }
    if let Some(to_ts) = query.to_timestamp {
        where_clause.push_str(" AND timestamp <= ?");
        filter_params.push(to_ts.into());
    }

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM audit_logs {}", where_clause),
        rusqlite::params_from_iter(filter_params.iter()),
        |row| row.get(0),
    )?;

    let mut select_params = filter_params;
    select_params.push(query.limit().into());
    select_params.push(query.offset().into());
    let logs = query_all(
        conn,
        &format!(
            "SELECT {} FROM audit_logs {} ORDER BY timestamp DESC LIMIT ? OFFSET ?",
            AUDIT_LOG_COLS, where_clause
        ),
        rusqlite::params_from_iter(select_params),
    )?;

    Ok((logs, total))
}

/// Purge audit logs older than the retention window. Returns the number of
/// deleted records.
pub fn purge_old_audit_logs(conn: &Connection, retention_days: i64) -> Result<usize> {
    let cutoff = now() - (retention_days * SECONDS_PER_DAY);
    let deleted = conn.execute("DELETE FROM audit_logs WHERE timestamp < ?1", params![cutoff])?;
    Ok(deleted)
}
