//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response},
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde_json::Value;
use tempfile::TempDir;

pub use prizewheel::crypto::MasterKey;
pub use prizewheel::db::{AppState, queries};
pub use prizewheel::models::*;
pub use prizewheel::payments::PaymentGateway;

use prizewheel::db::{create_pool, init_audit_db, init_db};
use prizewheel::email::EmailService;
use prizewheel::middleware::public_rate_limiter;

pub const STRIPE_SECRET: &str = "sk_test_prizewheel";
pub const STRIPE_WEBHOOK_SECRET: &str = "whsec_test_prizewheel";
pub const PAYSTACK_SECRET: &str = "sk_test_paystack";

pub fn test_master_key() -> MasterKey {
    MasterKey::from_bytes([7u8; 32])
}

/// App state over file-backed SQLite databases. Keep the `TestApp` alive for
/// the duration of the test; dropping it removes the directory.
pub struct TestApp {
    pub state: AppState,
    _dir: TempDir,
}

impl TestApp {
    pub fn router(&self) -> Router {
        prizewheel::app(self.state.clone(), &[])
    }

    pub fn conn(&self) -> r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager> {
        self.state.db.get().unwrap()
    }
}

pub fn create_test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("app.db");
    let audit_path = dir.path().join("audit.db");

    let db = create_pool(db_path.to_str().unwrap()).unwrap();
    let audit = create_pool(audit_path.to_str().unwrap()).unwrap();
    init_db(&db.get().unwrap()).unwrap();
    init_audit_db(&audit.get().unwrap()).unwrap();

    let state = AppState {
        db,
        audit,
        base_url: "http://api.test".to_string(),
        success_page_url: "http://app.test/billing/success".to_string(),
        audit_log_enabled: true,
        master_key: test_master_key(),
        payments_sandbox: true,
        email: EmailService::new("Prizewheel <no-reply@prizewheel.test>".to_string()),
        rate_limiter: Arc::new(public_rate_limiter(1000)),
        trust_proxy: false,
    };

    TestApp { state, _dir: dir }
}

/// Create a user and an API token for it.
pub fn create_test_user(conn: &Connection, email: &str, is_admin: bool) -> (AppUser, String) {
    let user = queries::create_user(
        conn,
        &CreateAppUser {
            email: email.to_string(),
            name: "Test User".to_string(),
            is_admin,
        },
    )
    .unwrap();
    let token = queries::create_api_token(conn, &user.id, Some("test")).unwrap();
    (user, token)
}

pub fn give_credits(conn: &Connection, user_id: &str, campaign: i64, lead: i64) {
    assert!(queries::grant_credits(conn, user_id, campaign, lead).unwrap());
}

pub fn reload_user(conn: &Connection, user_id: &str) -> AppUser {
    queries::get_user_by_id(conn, user_id).unwrap().unwrap()
}

pub fn create_test_plan(
    conn: &mut Connection,
    name: &str,
    currency: Currency,
    amount: &str,
    interval: BillingInterval,
) -> BillingPlan {
    queries::create_billing_plan(
        conn,
        &CreateBillingPlan {
            plan_type: PlanType::Subscription,
            name: name.to_string(),
            description: None,
            currency,
            amount: amount.parse::<Decimal>().unwrap(),
            billing_interval: Some(interval),
            campaign_limit: Some(5),
            lead_limit: Some(500),
            features: vec![],
            is_active: true,
            is_popular: false,
            flags: EntitlementFlags::default(),
        },
    )
    .unwrap()
}

/// An active campaign with a two-prize wheel.
pub fn create_test_campaign(conn: &mut Connection, user_id: &str, slug: &str) -> Campaign {
    give_credits(conn, user_id, 1, 0);
    let segment = |label: &str| WheelSegment {
        label: label.to_string(),
        color: "#FF6B6B".to_string(),
        icon: None,
        prize_type: None,
        prize_description: None,
        redemption_instructions: None,
    };
    let campaign = queries::create_campaign_with_credit(
        conn,
        user_id,
        &NewCampaign {
            name: format!("Campaign {}", slug),
            public_slug: slug.to_string(),
            campaign_type: CampaignType::Spinwheel,
            wheel_segments: vec![segment("Free Coffee"), segment("Try Again")],
            wheel_colors: vec!["#FF6B6B".to_string(), "#FF6B6B".to_string()],
            lead_form_fields: vec![],
            redemption_days: Some(30),
            template_id: None,
        },
    )
    .unwrap();
    queries::update_campaign(
        conn,
        &campaign.id,
        &UpdateCampaign {
            status: Some(CampaignStatus::Active),
            ..Default::default()
        },
    )
    .unwrap();
    queries::get_campaign_by_id(conn, &campaign.id).unwrap().unwrap()
}

pub fn configure_gateway(state: &AppState, gateway: PaymentGateway, secret: &str, webhook_secret: Option<&str>) {
    let conn = state.db.get().unwrap();
    queries::upsert_gateway_config(
        &conn,
        gateway,
        state.payments_sandbox,
        &UpdateGatewayConfig {
            is_active: true,
            display_name: None,
            public_key: None,
            secret_key: Some(secret.to_string()),
            webhook_secret: webhook_secret.map(String::from),
        },
        &state.master_key,
    )
    .unwrap();
}

pub fn pending_transaction(
    conn: &Connection,
    user_id: &str,
    gateway: PaymentGateway,
    purchase_type: PlanType,
    amount: &str,
    credits: Option<i64>,
    leads: Option<i64>,
) -> Transaction {
    queries::create_transaction(
        conn,
        &CreateTransaction {
            user_id: user_id.to_string(),
            transaction_type: purchase_type,
            plan_id: None,
            plan_type: "Credit pack".to_string(),
            gateway_name: gateway,
            amount: amount.parse().unwrap(),
            currency: Currency::Usd,
            description: "Credit pack".to_string(),
            billing_cycle: None,
            credits,
            leads,
        },
    )
    .unwrap()
}

pub fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
