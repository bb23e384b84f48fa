//! Row mapping for every table. Column lists are shared constants so a
//! SELECT and its `FromRow` impl cannot drift apart.

use std::str::FromStr;

use rusqlite::{Connection, Params, Row, types::Type};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::models::*;

pub const USER_COLS: &str = "id, email, name, plan_type, subscription_status, plan_expires_at, active_plan_id, campaign_credits, lead_credits, currency, country, phone, business_name, is_admin, stripe_customer_id, billing_cycle, profile_completed, created_at, updated_at";

pub const BILLING_PLAN_COLS: &str = "id, plan_type, name, description, currency, amount, billing_interval, campaign_limit, lead_limit, features, is_active, display_order, is_popular, remove_watermark, allow_background_image, allow_logo_upload, allow_external_border, allow_qr_code, created_at, updated_at";

pub const CAMPAIGN_COLS: &str = "id, user_id, name, public_slug, status, campaign_type, wheel_segments, wheel_colors, lead_form_fields, redemption_days, spins_count, leads_count, template_id, created_at, updated_at";

pub const LEAD_COLS: &str = "id, campaign_id, name, email, phone, prize_won, reference_number, redemption_expires_at, is_redeemed, redeemed_at, redeemed_by, created_at";

pub const SPIN_COLS: &str = "id, campaign_id, prize_won, created_at";

pub const TRANSACTION_COLS: &str = "id, user_id, transaction_type, plan_id, plan_type, gateway_name, gateway_reference, amount, currency, status, description, billing_cycle, credits, leads, created_at, completed_at";

pub const GATEWAY_COLS: &str = "name, sandbox, is_active, display_name, public_key, encrypted_secret_key, encrypted_webhook_secret, updated_at";

pub const MAILGUN_COLS: &str =
    "sandbox, domain, from_email, region, encrypted_api_key, is_active, updated_at";

pub const EMAIL_TEMPLATE_COLS: &str = "id, slug, subject, text_body, html_body, created_at";

pub const TEMPLATE_COLS: &str = "id, name, campaign_type, wheel_segments, wheel_colors, lead_form_fields, is_builtin, created_at, updated_at";

pub const AUDIT_LOG_COLS: &str = "id, timestamp, actor_type, user_id, user_email, action, resource_type, resource_id, details, ip_address, user_agent";

pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

pub fn query_one<T: FromRow>(conn: &Connection, sql: &str, params: impl Params) -> Result<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    match rows.next()? {
        Some(row) => Ok(Some(T::from_row(row)?)),
        None => Ok(None),
    }
}

pub fn query_all<T: FromRow>(conn: &Connection, sql: &str, params: impl Params) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let items = stmt
        .query_map(params, |row| T::from_row(row))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(items)
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_enum<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn parse_enum_opt<T>(row: &Row, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| s.parse().map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn parse_decimal(row: &Row, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn parse_json<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

impl FromRow for AppUser {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(AppUser {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            plan_type: parse_enum(row, 3)?,
            subscription_status: parse_enum_opt(row, 4)?,
            plan_expires_at: row.get(5)?,
            active_plan_id: row.get(6)?,
            campaign_credits: row.get(7)?,
            lead_credits: row.get(8)?,
            currency: parse_enum(row, 9)?,
            country: row.get(10)?,
            phone: row.get(11)?,
            business_name: row.get(12)?,
            is_admin: row.get(13)?,
            stripe_customer_id: row.get(14)?,
            billing_cycle: parse_enum(row, 15)?,
            profile_completed: row.get(16)?,
            created_at: row.get(17)?,
            updated_at: row.get(18)?,
        })
    }
}

impl FromRow for BillingPlan {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(BillingPlan {
            id: row.get(0)?,
            plan_type: parse_enum(row, 1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            currency: parse_enum(row, 4)?,
            amount: parse_decimal(row, 5)?,
            billing_interval: parse_enum_opt(row, 6)?,
            campaign_limit: row.get(7)?,
            lead_limit: row.get(8)?,
            features: parse_json(row, 9)?,
            is_active: row.get(10)?,
            display_order: row.get(11)?,
            is_popular: row.get(12)?,
            flags: EntitlementFlags {
                remove_watermark: row.get(13)?,
                allow_background_image: row.get(14)?,
                allow_logo_upload: row.get(15)?,
                allow_external_border: row.get(16)?,
                allow_qr_code: row.get(17)?,
            },
            created_at: row.get(18)?,
            updated_at: row.get(19)?,
        })
    }
}

impl FromRow for Campaign {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Campaign {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            public_slug: row.get(3)?,
            status: parse_enum(row, 4)?,
            campaign_type: parse_enum(row, 5)?,
            wheel_segments: parse_json(row, 6)?,
            wheel_colors: parse_json(row, 7)?,
            lead_form_fields: parse_json(row, 8)?,
            redemption_days: row.get(9)?,
            spins_count: row.get(10)?,
            leads_count: row.get(11)?,
            template_id: row.get(12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }
}

impl FromRow for Lead {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Lead {
            id: row.get(0)?,
            campaign_id: row.get(1)?,
            name: row.get(2)?,
            email: row.get(3)?,
            phone: row.get(4)?,
            prize_won: row.get(5)?,
            reference_number: row.get(6)?,
            redemption_expires_at: row.get(7)?,
            is_redeemed: row.get(8)?,
            redeemed_at: row.get(9)?,
            redeemed_by: row.get(10)?,
            created_at: row.get(11)?,
        })
    }
}

impl FromRow for Spin {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Spin {
            id: row.get(0)?,
            campaign_id: row.get(1)?,
            prize_won: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

impl FromRow for Transaction {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Transaction {
            id: row.get(0)?,
            user_id: row.get(1)?,
            transaction_type: parse_enum(row, 2)?,
            plan_id: row.get(3)?,
            plan_type: row.get(4)?,
            gateway_name: parse_enum(row, 5)?,
            gateway_reference: row.get(6)?,
            amount: parse_decimal(row, 7)?,
            currency: parse_enum(row, 8)?,
            status: parse_enum(row, 9)?,
            description: row.get(10)?,
            billing_cycle: parse_enum_opt(row, 11)?,
            credits: row.get(12)?,
            leads: row.get(13)?,
            created_at: row.get(14)?,
            completed_at: row.get(15)?,
        })
    }
}

impl FromRow for GatewayConfigRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(GatewayConfigRow {
            name: parse_enum(row, 0)?,
            sandbox: row.get(1)?,
            is_active: row.get(2)?,
            display_name: row.get(3)?,
            public_key: row.get(4)?,
            encrypted_secret_key: row.get(5)?,
            encrypted_webhook_secret: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

impl FromRow for MailgunSettingsRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(MailgunSettingsRow {
            sandbox: row.get(0)?,
            domain: row.get(1)?,
            from_email: row.get(2)?,
            region: parse_enum(row, 3)?,
            encrypted_api_key: row.get(4)?,
            is_active: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

impl FromRow for EmailTemplate {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(EmailTemplate {
            id: row.get(0)?,
            slug: row.get(1)?,
            subject: row.get(2)?,
            text_body: row.get(3)?,
            html_body: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

impl FromRow for CampaignTemplate {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(CampaignTemplate {
            id: row.get(0)?,
            name: row.get(1)?,
            campaign_type: parse_enum(row, 2)?,
            wheel_segments: parse_json(row, 3)?,
            wheel_colors: parse_json(row, 4)?,
            lead_form_fields: parse_json(row, 5)?,
            is_builtin: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

impl FromRow for AuditLog {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let details: Option<String> = row.get(8)?;
        Ok(AuditLog {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            actor_type: parse_enum(row, 2)?,
            user_id: row.get(3)?,
            user_email: row.get(4)?,
            action: row.get(5)?,
            resource_type: row.get(6)?,
            resource_id: row.get(7)?,
            details: details.and_then(|s| serde_json::from_str(&s).ok()),
            ip_address: row.get(9)?,
            user_agent: row.get(10)?,
        })
    }
}
