use axum::http::{StatusCode, header};
use serde_json::json;
use tower::ServiceExt;

use crate::common::*;

fn pack_request(gateway: &str) -> serde_json::Value {
    json!({
        "gateway": gateway,
        "amount": 9.99,
        "currency": "USD",
        "description": "5 campaign credits",
        "planType": "Campaign pack",
        "purchaseType": "campaign",
        "credits": 5
    })
}

#[tokio::test]
async fn test_initiate_refused_without_active_gateways() {
    let app = create_test_app();
    let (user, token) = create_test_user(&app.conn(), "owner@shop.test", false);

    let response = app
        .router()
        .oneshot(request("POST", "/api/billing/initiate-payment", Some(&token), Some(pack_request("stripe"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], json!("No payment gateways are currently available"));

    let transactions = queries::list_transactions_for_user(&app.conn(), &user.id).unwrap();
    assert!(transactions.is_empty());
}

#[tokio::test]
async fn test_initiate_rejects_inactive_gateway() {
    let app = create_test_app();
    let (user, token) = create_test_user(&app.conn(), "owner@shop.test", false);
    configure_gateway(&app.state, PaymentGateway::Paystack, PAYSTACK_SECRET, None);

    let response = app
        .router()
        .oneshot(request("POST", "/api/billing/initiate-payment", Some(&token), Some(pack_request("stripe"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(queries::list_transactions_for_user(&app.conn(), &user.id).unwrap().is_empty());
}

#[tokio::test]
async fn test_active_gateways_lists_configured_mode_only() {
    let app = create_test_app();
    let (_, token) = create_test_user(&app.conn(), "owner@shop.test", false);
    configure_gateway(&app.state, PaymentGateway::Stripe, STRIPE_SECRET, Some(STRIPE_WEBHOOK_SECRET));

    // A live-mode row is invisible while the server runs in sandbox mode
    queries::upsert_gateway_config(
        &app.conn(),
        PaymentGateway::Paystack,
        false,
        &UpdateGatewayConfig {
            is_active: true,
            display_name: None,
            public_key: None,
            secret_key: Some("sk_live_x".into()),
            webhook_secret: None,
        },
        &app.state.master_key,
    )
    .unwrap();

    let response = app
        .router()
        .oneshot(request("GET", "/api/billing/active-gateways", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let names: Vec<&str> = body.as_array().unwrap().iter().map(|g| g["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["stripe"]);
}

#[tokio::test]
async fn test_callback_unknown_transaction_is_not_found() {
    let app = create_test_app();

    let response = app
        .router()
        .oneshot(request("GET", "/api/billing/callback?transaction=missing", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_callback_redirects_pending_stripe_payment() {
    let app = create_test_app();
    let (user, _) = create_test_user(&app.conn(), "owner@shop.test", false);
    let tx = pending_transaction(&app.conn(), &user.id, PaymentGateway::Stripe, PlanType::Campaign, "9.99", Some(5), None);

    let response = app
        .router()
        .oneshot(request("GET", &format!("/api/billing/callback?transaction={}", tx.id), None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert_eq!(
        location,
        format!("http://app.test/billing/success?status=pending&transaction={}", tx.id)
    );

    // Stripe is confirmed by webhook only
    assert_eq!(reload_user(&app.conn(), &user.id).campaign_credits, 0);
}

#[tokio::test]
async fn test_callback_mismatched_paystack_reference_stays_pending() {
    let app = create_test_app();
    let (user, _) = create_test_user(&app.conn(), "owner@shop.test", false);
    configure_gateway(&app.state, PaymentGateway::Paystack, PAYSTACK_SECRET, None);
    let tx = pending_transaction(&app.conn(), &user.id, PaymentGateway::Paystack, PlanType::Leads, "5.00", None, Some(100));

    let response = app
        .router()
        .oneshot(request(
            "GET",
            &format!("/api/billing/callback?transaction={}&reference=someone-else", tx.id),
            None,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.contains("status=pending"));

    let stored = queries::get_transaction_by_id(&app.conn(), &tx.id).unwrap().unwrap();
    assert_eq!(stored.status, TransactionStatus::Pending);
}

#[tokio::test]
async fn test_transactions_are_scoped_to_caller() {
    let app = create_test_app();
    let (alice, alice_token) = create_test_user(&app.conn(), "alice@shop.test", false);
    let (bob, _) = create_test_user(&app.conn(), "bob@shop.test", false);
    pending_transaction(&app.conn(), &alice.id, PaymentGateway::Stripe, PlanType::Campaign, "9.99", Some(5), None);
    pending_transaction(&app.conn(), &bob.id, PaymentGateway::Stripe, PlanType::Campaign, "9.99", Some(5), None);

    let response = app
        .router()
        .oneshot(request("GET", "/api/billing/transactions", Some(&alice_token), None))
        .await
        .unwrap();
    let body = body_json(response).await;
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["user_id"], json!(alice.id));
}

#[test]
fn test_renewal_extends_from_current_expiry() {
    let app = create_test_app();
    let (user, _) = create_test_user(&app.conn(), "owner@shop.test", false);
    let now = chrono::Utc::now().timestamp();
    let current_end = now + 10 * 86400;
    queries::set_subscription(
        &app.conn(),
        &user.id,
        &SetSubscription {
            plan_type: UserPlanType::Subscription,
            subscription_status: Some(SubscriptionStatus::Active),
            plan_expires_at: Some(current_end),
            active_plan_id: None,
        },
    )
    .unwrap();

    let tx = pending_transaction(&app.conn(), &user.id, PaymentGateway::Stripe, PlanType::Subscription, "10", Some(1), Some(10));
    let outcome = queries::complete_transaction(&mut app.conn(), &tx.id).unwrap();
    assert!(matches!(outcome, queries::PurchaseCompletion::Applied(_)));

    let renewed = reload_user(&app.conn(), &user.id);
    assert_eq!(renewed.plan_expires_at, Some(current_end + 30 * 86400));
    assert_eq!(renewed.campaign_credits, 1);
}

#[test]
fn test_lapsed_subscription_restarts_from_now() {
    let app = create_test_app();
    let (user, _) = create_test_user(&app.conn(), "owner@shop.test", false);
    let before = chrono::Utc::now().timestamp();
    queries::set_subscription(
        &app.conn(),
        &user.id,
        &SetSubscription {
            plan_type: UserPlanType::Subscription,
            subscription_status: Some(SubscriptionStatus::Active),
            plan_expires_at: Some(before - 86400),
            active_plan_id: None,
        },
    )
    .unwrap();

    let tx = pending_transaction(&app.conn(), &user.id, PaymentGateway::Stripe, PlanType::Subscription, "10", Some(1), Some(10));
    queries::complete_transaction(&mut app.conn(), &tx.id).unwrap();

    let expires_at = reload_user(&app.conn(), &user.id).plan_expires_at.unwrap();
    assert!(expires_at >= before + 30 * 86400);
    assert!(expires_at <= chrono::Utc::now().timestamp() + 30 * 86400);
}
