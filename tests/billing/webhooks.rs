use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

use prizewheel::payments::{sign_paystack_payload, sign_stripe_payload};

use crate::common::*;

fn stripe_request(payload: &[u8], signature: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/webhooks/stripe")
        .header("Content-Type", "application/json")
        .header("stripe-signature", signature)
        .body(Body::from(payload.to_vec()))
        .unwrap()
}

fn checkout_completed(event_id: &str, transaction_id: &str) -> Vec<u8> {
    json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_test_1",
            "payment_status": "paid",
            "client_reference_id": transaction_id,
            "customer": "cus_test_1",
            "metadata": { "transaction_id": transaction_id }
        }}
    })
    .to_string()
    .into_bytes()
}

#[tokio::test]
async fn test_stripe_checkout_applies_credits_once() {
    let app = create_test_app();
    configure_gateway(&app.state, PaymentGateway::Stripe, STRIPE_SECRET, Some(STRIPE_WEBHOOK_SECRET));
    let (user, _) = create_test_user(&app.conn(), "owner@shop.test", false);
    let tx = pending_transaction(&app.conn(), &user.id, PaymentGateway::Stripe, PlanType::Campaign, "9.99", Some(5), None);

    let payload = checkout_completed("evt_1", &tx.id);
    let now = chrono::Utc::now().timestamp();
    let signature = sign_stripe_payload(STRIPE_WEBHOOK_SECRET, &payload, now);

    let response = app.router().oneshot(stripe_request(&payload, &signature)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let after_first = reload_user(&app.conn(), &user.id);
    assert_eq!(after_first.campaign_credits, 5);
    assert_eq!(after_first.stripe_customer_id.as_deref(), Some("cus_test_1"));

    // Redelivery of the same event
    let response = app.router().oneshot(stripe_request(&payload, &signature)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(String::from_utf8(body_bytes(response).await).unwrap(), "Already processed");

    // A different event for the same transaction is stopped by the status check
    let payload = checkout_completed("evt_2", &tx.id);
    let signature = sign_stripe_payload(STRIPE_WEBHOOK_SECRET, &payload, now);
    let response = app.router().oneshot(stripe_request(&payload, &signature)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(reload_user(&app.conn(), &user.id).campaign_credits, 5);
    let stored = queries::get_transaction_by_id(&app.conn(), &tx.id).unwrap().unwrap();
    assert_eq!(stored.status, TransactionStatus::Active);
    assert!(stored.completed_at.is_some());
}

#[tokio::test]
async fn test_stripe_rejects_bad_signature() {
    let app = create_test_app();
    configure_gateway(&app.state, PaymentGateway::Stripe, STRIPE_SECRET, Some(STRIPE_WEBHOOK_SECRET));
    let (user, _) = create_test_user(&app.conn(), "owner@shop.test", false);
    let tx = pending_transaction(&app.conn(), &user.id, PaymentGateway::Stripe, PlanType::Campaign, "9.99", Some(5), None);

    let payload = checkout_completed("evt_forged", &tx.id);
    let signature = sign_stripe_payload("whsec_wrong", &payload, chrono::Utc::now().timestamp());

    let response = app.router().oneshot(stripe_request(&payload, &signature)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(reload_user(&app.conn(), &user.id).campaign_credits, 0);

    // Stale timestamps fall outside the tolerance window
    let signature = sign_stripe_payload(STRIPE_WEBHOOK_SECRET, &payload, chrono::Utc::now().timestamp() - 3600);
    let response = app.router().oneshot(stripe_request(&payload, &signature)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_stripe_subscription_deleted_cancels() {
    let app = create_test_app();
    configure_gateway(&app.state, PaymentGateway::Stripe, STRIPE_SECRET, Some(STRIPE_WEBHOOK_SECRET));
    let (user, _) = create_test_user(&app.conn(), "owner@shop.test", false);
    {
        let conn = app.conn();
        queries::set_stripe_customer_id(&conn, &user.id, "cus_sub").unwrap();
        queries::set_subscription(
            &conn,
            &user.id,
            &SetSubscription {
                plan_type: UserPlanType::Subscription,
                subscription_status: Some(SubscriptionStatus::Active),
                plan_expires_at: Some(chrono::Utc::now().timestamp() + 86400),
                active_plan_id: None,
            },
        )
        .unwrap();
    }

    let payload = json!({
        "id": "evt_sub_deleted",
        "type": "customer.subscription.deleted",
        "data": { "object": { "id": "sub_1", "customer": "cus_sub", "status": "canceled" } }
    })
    .to_string()
    .into_bytes();
    let signature = sign_stripe_payload(STRIPE_WEBHOOK_SECRET, &payload, chrono::Utc::now().timestamp());

    let response = app.router().oneshot(stripe_request(&payload, &signature)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        reload_user(&app.conn(), &user.id).subscription_status,
        Some(SubscriptionStatus::Cancelled)
    );
}

fn paystack_request(payload: &[u8]) -> Request<Body> {
    let signature = sign_paystack_payload(PAYSTACK_SECRET, payload).unwrap();
    Request::builder()
        .method("POST")
        .uri("/api/webhooks/paystack")
        .header("Content-Type", "application/json")
        .header("x-paystack-signature", signature)
        .body(Body::from(payload.to_vec()))
        .unwrap()
}

fn charge_success(charge_id: i64, reference: &str, amount_minor: i64) -> Vec<u8> {
    json!({
        "event": "charge.success",
        "data": {
            "id": charge_id,
            "reference": reference,
            "status": "success",
            "amount": amount_minor,
            "currency": "USD"
        }
    })
    .to_string()
    .into_bytes()
}

#[tokio::test]
async fn test_paystack_charge_grants_lead_credits() {
    let app = create_test_app();
    configure_gateway(&app.state, PaymentGateway::Paystack, PAYSTACK_SECRET, None);
    let (user, _) = create_test_user(&app.conn(), "owner@shop.test", false);
    let tx = pending_transaction(&app.conn(), &user.id, PaymentGateway::Paystack, PlanType::Leads, "5.00", None, Some(100));

    let response = app.router().oneshot(paystack_request(&charge_success(1, &tx.id, 500))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let user = reload_user(&app.conn(), &user.id);
    assert_eq!(user.lead_credits, 100);
    assert_eq!(user.plan_type, UserPlanType::Leads);
}

#[tokio::test]
async fn test_paystack_amount_mismatch_is_ignored() {
    let app = create_test_app();
    configure_gateway(&app.state, PaymentGateway::Paystack, PAYSTACK_SECRET, None);
    let (user, _) = create_test_user(&app.conn(), "owner@shop.test", false);
    let tx = pending_transaction(&app.conn(), &user.id, PaymentGateway::Paystack, PlanType::Leads, "5.00", None, Some(100));

    let response = app.router().oneshot(paystack_request(&charge_success(2, &tx.id, 100))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(reload_user(&app.conn(), &user.id).lead_credits, 0);
    let stored = queries::get_transaction_by_id(&app.conn(), &tx.id).unwrap().unwrap();
    assert_eq!(stored.status, TransactionStatus::Pending);
}
