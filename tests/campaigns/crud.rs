use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

use crate::common::*;

fn new_campaign() -> serde_json::Value {
    json!({ "name": "Summer Spin", "campaign_type": "spinwheel" })
}

#[tokio::test]
async fn test_create_campaign_requires_credit() {
    let app = create_test_app();
    let (user, token) = create_test_user(&app.conn(), "owner@shop.test", false);

    let response = app
        .router()
        .oneshot(request("POST", "/api/campaigns", Some(&token), Some(new_campaign())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(queries::list_campaigns_for_user(&app.conn(), &user.id).unwrap().is_empty());
}

#[tokio::test]
async fn test_create_campaign_debits_one_credit() {
    let app = create_test_app();
    let (user, token) = create_test_user(&app.conn(), "owner@shop.test", false);
    give_credits(&app.conn(), &user.id, 2, 0);

    let response = app
        .router()
        .oneshot(request("POST", "/api/campaigns", Some(&token), Some(new_campaign())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let first_slug = body["public_slug"].as_str().unwrap().to_string();
    assert!(first_slug.starts_with("summer-spin-"));
    assert_eq!(body["status"], json!("draft"));
    // No template named: the first built-in wheel supplies the segments
    assert!(!body["wheel_segments"].as_array().unwrap().is_empty());

    assert_eq!(reload_user(&app.conn(), &user.id).campaign_credits, 1);

    // Same name again gets a distinct slug
    let response = app
        .router()
        .oneshot(request("POST", "/api/campaigns", Some(&token), Some(new_campaign())))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_ne!(body["public_slug"].as_str().unwrap(), first_slug);
    assert_eq!(reload_user(&app.conn(), &user.id).campaign_credits, 0);
}

#[tokio::test]
async fn test_expired_subscriber_with_credits_can_create() {
    let app = create_test_app();
    let (user, token) = create_test_user(&app.conn(), "owner@shop.test", false);
    {
        let conn = app.conn();
        give_credits(&conn, &user.id, 1, 0);
        queries::set_subscription(
            &conn,
            &user.id,
            &SetSubscription {
                plan_type: UserPlanType::Subscription,
                subscription_status: Some(SubscriptionStatus::Active),
                plan_expires_at: Some(chrono::Utc::now().timestamp() - 60),
                active_plan_id: None,
            },
        )
        .unwrap();
    }

    let response = app
        .router()
        .oneshot(request("POST", "/api/campaigns", Some(&token), Some(new_campaign())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_other_owners_campaign_is_hidden() {
    let app = create_test_app();
    let (alice, _) = create_test_user(&app.conn(), "alice@shop.test", false);
    let (_, bob_token) = create_test_user(&app.conn(), "bob@shop.test", false);
    let (_, admin_token) = create_test_user(&app.conn(), "admin@prizewheel.test", true);
    let campaign = create_test_campaign(&mut app.conn(), &alice.id, "alice-wheel");

    let response = app
        .router()
        .oneshot(request("GET", &format!("/api/campaigns/{}", campaign.id), Some(&bob_token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .router()
        .oneshot(request("GET", &format!("/api/campaigns/{}", campaign.id), Some(&admin_token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Admins can read but not modify
    let response = app
        .router()
        .oneshot(request(
            "DELETE",
            &format!("/api/campaigns/{}", campaign.id),
            Some(&admin_token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_public_play_flow() {
    let app = create_test_app();
    let (owner, _) = create_test_user(&app.conn(), "owner@shop.test", false);
    let campaign = create_test_campaign(&mut app.conn(), &owner.id, "coffee-wheel");
    give_credits(&app.conn(), &owner.id, 0, 1);

    let response = app
        .router()
        .oneshot(request("GET", "/api/public/campaigns/coffee-wheel", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["show_watermark"], json!(true));
    assert!(body.get("spins_count").is_none());

    let response = app
        .router()
        .oneshot(request(
            "POST",
            "/api/public/campaigns/coffee-wheel/spin",
            None,
            Some(json!({ "prize_won": "Not on the wheel" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .router()
        .oneshot(request(
            "POST",
            "/api/public/campaigns/coffee-wheel/spin",
            None,
            Some(json!({ "prize_won": "Free Coffee" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router()
        .oneshot(request(
            "POST",
            "/api/public/campaigns/coffee-wheel/leads",
            None,
            Some(json!({ "name": "Jane", "email": "jane@example.com", "prize_won": "Free Coffee" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let lead = body_json(response).await;
    assert!(lead["reference_number"].as_str().unwrap().starts_with("PW-"));
    assert!(lead["redemption_expires_at"].as_i64().is_some());

    let stored = queries::get_campaign_by_id(&app.conn(), &campaign.id).unwrap().unwrap();
    assert_eq!(stored.spins_count, 1);
    assert_eq!(stored.leads_count, 1);
    assert_eq!(reload_user(&app.conn(), &owner.id).lead_credits, 0);

    // Out of lead credits and no subscription: entries are refused
    let response = app
        .router()
        .oneshot(request(
            "POST",
            "/api/public/campaigns/coffee-wheel/leads",
            None,
            Some(json!({ "email": "second@example.com" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_draft_campaign_is_not_public() {
    let app = create_test_app();
    let (owner, token) = create_test_user(&app.conn(), "owner@shop.test", false);
    give_credits(&app.conn(), &owner.id, 1, 0);

    let response = app
        .router()
        .oneshot(request("POST", "/api/campaigns", Some(&token), Some(new_campaign())))
        .await
        .unwrap();
    let slug = body_json(response).await["public_slug"].as_str().unwrap().to_string();

    let response = app
        .router()
        .oneshot(request("GET", &format!("/api/public/campaigns/{}", slug), None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_lead_capture_validates_phone_for_country() {
    let app = create_test_app();
    let (owner, _) = create_test_user(&app.conn(), "owner@shop.test", false);
    let campaign = create_test_campaign(&mut app.conn(), &owner.id, "coffee-wheel");
    give_credits(&app.conn(), &owner.id, 0, 5);

    let response = app
        .router()
        .oneshot(request(
            "POST",
            "/api/public/campaigns/coffee-wheel/leads",
            None,
            Some(json!({ "email": "jane@example.com", "phone": "12345", "country": "KE" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Rejected entries are not recorded and cost nothing
    let stored = queries::get_campaign_by_id(&app.conn(), &campaign.id).unwrap().unwrap();
    assert_eq!(stored.leads_count, 0);
    assert_eq!(reload_user(&app.conn(), &owner.id).lead_credits, 5);

    let response = app
        .router()
        .oneshot(request(
            "POST",
            "/api/public/campaigns/coffee-wheel/leads",
            None,
            Some(json!({ "email": "jane@example.com", "phone": "0712 345 678", "country": "KE" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["phone"], json!("0712 345 678"));
}

#[tokio::test]
async fn test_lead_capture_refused_without_subscription_or_credits() {
    let app = create_test_app();
    let (owner, _) = create_test_user(&app.conn(), "owner@shop.test", false);
    let campaign = create_test_campaign(&mut app.conn(), &owner.id, "coffee-wheel");

    let response = app
        .router()
        .oneshot(request(
            "POST",
            "/api/public/campaigns/coffee-wheel/leads",
            None,
            Some(json!({ "email": "jane@example.com" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let stored = queries::get_campaign_by_id(&app.conn(), &campaign.id).unwrap().unwrap();
    assert_eq!(stored.leads_count, 0);

    // An active subscription captures without touching lead credits
    queries::set_subscription(
        &app.conn(),
        &owner.id,
        &SetSubscription {
            plan_type: UserPlanType::Subscription,
            subscription_status: Some(SubscriptionStatus::Active),
            plan_expires_at: Some(chrono::Utc::now().timestamp() + 86400),
            active_plan_id: None,
        },
    )
    .unwrap();

    let response = app
        .router()
        .oneshot(request(
            "POST",
            "/api/public/campaigns/coffee-wheel/leads",
            None,
            Some(json!({ "email": "jane@example.com" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(reload_user(&app.conn(), &owner.id).lead_credits, 0);
}
