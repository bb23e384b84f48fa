use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

use crate::common::*;

fn admin(app: &TestApp) -> String {
    create_test_user(&app.conn(), "admin@prizewheel.test", true).1
}

#[tokio::test]
async fn test_admin_routes_require_admin() {
    let app = create_test_app();
    let (_, token) = create_test_user(&app.conn(), "owner@shop.test", false);

    let response = app
        .router()
        .oneshot(request("GET", "/api/admin/billing-plans", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .router()
        .oneshot(request("GET", "/api/admin/billing-plans", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_kes_save_syncs_matching_usd_plan() {
    let app = create_test_app();
    let token = admin(&app);
    let usd = create_test_plan(&mut app.conn(), "starter plan", Currency::Usd, "10.00", BillingInterval::Monthly);
    let kes = create_test_plan(&mut app.conn(), "Starter Plan ", Currency::Kes, "1000", BillingInterval::Monthly);

    let response = app
        .router()
        .oneshot(request(
            "PATCH",
            &format!("/api/admin/billing-plans/{}", kes.id),
            Some(&token),
            Some(json!({ "amount": 2999, "features": ["Unlimited spins"] })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["synced_plan_id"], json!(usd.id));
    assert!(body.get("warning").is_none());

    let mirrored = queries::get_billing_plan_by_id(&app.conn(), &usd.id).unwrap().unwrap();
    assert_eq!(mirrored.amount, "29.99".parse().unwrap());
    assert_eq!(mirrored.features, vec!["Unlimited spins".to_string()]);
    assert_eq!(mirrored.currency, Currency::Usd);
}

#[tokio::test]
async fn test_sync_without_match_warns_and_keeps_save() {
    let app = create_test_app();
    let token = admin(&app);
    create_test_plan(&mut app.conn(), "Starter", Currency::Usd, "10.00", BillingInterval::Monthly);
    let kes = create_test_plan(&mut app.conn(), "Starter Plan", Currency::Kes, "1000", BillingInterval::Monthly);

    let response = app
        .router()
        .oneshot(request(
            "PATCH",
            &format!("/api/admin/billing-plans/{}", kes.id),
            Some(&token),
            Some(json!({ "amount": 1500 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let warning = body["warning"].as_str().unwrap();
    assert!(warning.contains("Starter"));

    let saved = queries::get_billing_plan_by_id(&app.conn(), &kes.id).unwrap().unwrap();
    assert_eq!(saved.amount, "1500".parse().unwrap());
}

#[tokio::test]
async fn test_sync_can_be_skipped() {
    let app = create_test_app();
    let token = admin(&app);
    let usd = create_test_plan(&mut app.conn(), "Pro", Currency::Usd, "50.00", BillingInterval::Monthly);
    let kes = create_test_plan(&mut app.conn(), "Pro", Currency::Kes, "5000", BillingInterval::Monthly);

    let response = app
        .router()
        .oneshot(request(
            "PATCH",
            &format!("/api/admin/billing-plans/{}?sync_currency=false", kes.id),
            Some(&token),
            Some(json!({ "amount": 9900 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let untouched = queries::get_billing_plan_by_id(&app.conn(), &usd.id).unwrap().unwrap();
    assert_eq!(untouched.amount, "50.00".parse().unwrap());
}

#[tokio::test]
async fn test_move_and_delete_keep_order_dense() {
    let app = create_test_app();
    let token = admin(&app);
    let a = create_test_plan(&mut app.conn(), "A", Currency::Usd, "1", BillingInterval::Monthly);
    let b = create_test_plan(&mut app.conn(), "B", Currency::Usd, "2", BillingInterval::Monthly);
    let c = create_test_plan(&mut app.conn(), "C", Currency::Usd, "3", BillingInterval::Monthly);

    let response = app
        .router()
        .oneshot(request(
            "POST",
            &format!("/api/admin/billing-plans/{}/move", c.id),
            Some(&token),
            Some(json!({ "direction": "up" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let order: Vec<String> = body_json(response).await.as_array().unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(order, vec!["A", "C", "B"]);

    // First plan up is a no-op
    let response = app
        .router()
        .oneshot(request(
            "POST",
            &format!("/api/admin/billing-plans/{}/move", a.id),
            Some(&token),
            Some(json!({ "direction": "up" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router()
        .oneshot(request("DELETE", &format!("/api/admin/billing-plans/{}", a.id), Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let group = queries::list_plans_in_group(&app.conn(), Currency::Usd, PlanType::Subscription).unwrap();
    let orders: Vec<(String, i64)> = group.iter().map(|p| (p.id.clone(), p.display_order)).collect();
    assert_eq!(orders, vec![(c.id.clone(), 0), (b.id.clone(), 1)]);
}

#[tokio::test]
async fn test_weekly_toggle_considers_every_currency() {
    let app = create_test_app();
    create_test_plan(&mut app.conn(), "Monthly", Currency::Usd, "10", BillingInterval::Monthly);

    let response = app
        .router()
        .oneshot(request("GET", "/api/billing/plans?currency=USD&type=subscription", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["show_weekly_toggle"], json!(false));

    // A weekly plan in another currency turns the toggle on for USD buyers too
    create_test_plan(&mut app.conn(), "Weekly", Currency::Kes, "300", BillingInterval::Weekly);

    let response = app
        .router()
        .oneshot(request("GET", "/api/billing/plans?currency=USD&type=subscription", None, None))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["show_weekly_toggle"], json!(true));
    let names: Vec<&str> = body["plans"].as_array().unwrap().iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Monthly"]);
}

#[tokio::test]
async fn test_subscription_listing_follows_billing_cycle() {
    let app = create_test_app();
    create_test_plan(&mut app.conn(), "Monthly", Currency::Usd, "10", BillingInterval::Monthly);
    create_test_plan(&mut app.conn(), "Yearly", Currency::Usd, "100", BillingInterval::Yearly);

    let response = app
        .router()
        .oneshot(request(
            "GET",
            "/api/billing/plans?currency=USD&type=subscription&billing_cycle=yearly",
            None,
            None,
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    let names: Vec<&str> = body["plans"].as_array().unwrap().iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Yearly"]);
}

#[tokio::test]
async fn test_untyped_listing_narrows_subscriptions_to_cycle() {
    let app = create_test_app();
    create_test_plan(&mut app.conn(), "Monthly", Currency::Usd, "10", BillingInterval::Monthly);
    create_test_plan(&mut app.conn(), "Yearly", Currency::Usd, "100", BillingInterval::Yearly);

    let response = app
        .router()
        .oneshot(request("GET", "/api/billing/plans?currency=USD&billing_cycle=monthly", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let names: Vec<&str> = body["plans"].as_array().unwrap().iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Monthly"]);
}

#[tokio::test]
async fn test_patched_display_order_is_redensified() {
    let app = create_test_app();
    let token = admin(&app);
    let a = create_test_plan(&mut app.conn(), "A", Currency::Usd, "1", BillingInterval::Monthly);
    let b = create_test_plan(&mut app.conn(), "B", Currency::Usd, "2", BillingInterval::Monthly);

    let response = app
        .router()
        .oneshot(request(
            "PATCH",
            &format!("/api/admin/billing-plans/{}", a.id),
            Some(&token),
            Some(json!({ "display_order": 7 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let group = queries::list_plans_in_group(&app.conn(), Currency::Usd, PlanType::Subscription).unwrap();
    let orders: Vec<(String, i64)> = group.iter().map(|p| (p.id.clone(), p.display_order)).collect();
    assert_eq!(orders, vec![(b.id.clone(), 0), (a.id.clone(), 1)]);
}

#[tokio::test]
async fn test_weekly_toggle_counts_inactive_weekly_plans() {
    let app = create_test_app();
    let weekly = create_test_plan(&mut app.conn(), "Weekly", Currency::Usd, "3", BillingInterval::Weekly);
    let deactivated = queries::update_billing_plan(
        &mut app.conn(),
        &weekly.id,
        &UpdateBillingPlan {
            is_active: Some(false),
            ..Default::default()
        },
    )
    .unwrap();
    assert!(deactivated);

    let response = app
        .router()
        .oneshot(request("GET", "/api/billing/plans?currency=USD&type=subscription&billing_cycle=weekly", None, None))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["show_weekly_toggle"], json!(true));
    assert!(body["plans"].as_array().unwrap().is_empty());
}
