//! Account, admin user management and public site tests

mod common;

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

use common::*;

#[tokio::test]
async fn test_health_is_public() {
    let app = create_test_app();
    let response = app
        .router()
        .oneshot(request("GET", "/api/health", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], json!("ok"));
}

#[tokio::test]
async fn test_me_requires_token() {
    let app = create_test_app();
    let response = app
        .router()
        .oneshot(request("GET", "/api/users/me", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .router()
        .oneshot(request("GET", "/api/users/me", Some("pw_not_a_real_token"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_reports_entitlements() {
    let app = create_test_app();
    let (user, token) = create_test_user(&app.conn(), "owner@shop.test", false);
    give_credits(&app.conn(), &user.id, 2, 10);

    let response = app
        .router()
        .oneshot(request("GET", "/api/users/me", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["user"]["email"], json!("owner@shop.test"));
    assert_eq!(body["entitlements"]["campaign_credits"], json!(2));
    assert_eq!(body["entitlements"]["lead_credits"], json!(10));
    assert_eq!(body["entitlements"]["can_create_campaign"], json!(true));
}

#[tokio::test]
async fn test_profile_setup_sets_currency_from_country() {
    let app = create_test_app();
    let (user, token) = create_test_user(&app.conn(), "duka@shop.test", false);

    let response = app
        .router()
        .oneshot(request(
            "POST",
            "/api/users/profile-setup",
            Some(&token),
            Some(json!({ "name": "Amina", "business_name": "Duka", "country": "ke" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["user"]["currency"], json!("KES"));
    assert_eq!(body["user"]["country"], json!("KE"));
    assert_eq!(body["user"]["profile_completed"], json!(true));

    let stored = reload_user(&app.conn(), &user.id);
    assert_eq!(stored.currency, Currency::Kes);
    assert_eq!(stored.business_name.as_deref(), Some("Duka"));
}

#[tokio::test]
async fn test_profile_setup_rejects_bad_country() {
    let app = create_test_app();
    let (_, token) = create_test_user(&app.conn(), "owner@shop.test", false);

    let response = app
        .router()
        .oneshot(request(
            "POST",
            "/api/users/profile-setup",
            Some(&token),
            Some(json!({ "name": "Owner", "country": "Kenya" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_grants_credits_and_audits() {
    let app = create_test_app();
    let (_, admin_token) = create_test_user(&app.conn(), "admin@prizewheel.test", true);
    let (user, _) = create_test_user(&app.conn(), "owner@shop.test", false);

    let response = app
        .router()
        .oneshot(request(
            "POST",
            &format!("/api/admin/users/{}/grant-credits", user.id),
            Some(&admin_token),
            Some(json!({ "campaign_credits": 3, "reason": "launch promo" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["user"]["campaign_credits"], json!(3));
    assert_eq!(body["user"]["lead_credits"], json!(0));

    let response = app
        .router()
        .oneshot(request(
            "GET",
            "/api/admin/audit-logs?action=grant_credits",
            Some(&admin_token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], json!(1));
    assert_eq!(body["items"][0]["resource_id"], json!(user.id));
    assert_eq!(body["items"][0]["details"]["reason"], json!("launch promo"));
}

#[tokio::test]
async fn test_grant_rejects_negative_and_empty() {
    let app = create_test_app();
    let (_, admin_token) = create_test_user(&app.conn(), "admin@prizewheel.test", true);
    let (user, _) = create_test_user(&app.conn(), "owner@shop.test", false);
    let uri = format!("/api/admin/users/{}/grant-credits", user.id);

    for body in [json!({ "campaign_credits": -1 }), json!({})] {
        let response = app
            .router()
            .oneshot(request("POST", &uri, Some(&admin_token), Some(body)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
    assert_eq!(reload_user(&app.conn(), &user.id).campaign_credits, 0);
}

#[tokio::test]
async fn test_admin_cannot_delete_self() {
    let app = create_test_app();
    let (admin, admin_token) = create_test_user(&app.conn(), "admin@prizewheel.test", true);
    let (user, _) = create_test_user(&app.conn(), "owner@shop.test", false);

    let response = app
        .router()
        .oneshot(request(
            "DELETE",
            &format!("/api/admin/users/{}", admin.id),
            Some(&admin_token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .router()
        .oneshot(request(
            "DELETE",
            &format!("/api/admin/users/{}", user.id),
            Some(&admin_token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(queries::get_user_by_id(&app.conn(), &user.id).unwrap().is_none());
}

#[tokio::test]
async fn test_admin_sets_subscription() {
    let app = create_test_app();
    let (_, admin_token) = create_test_user(&app.conn(), "admin@prizewheel.test", true);
    let (user, _) = create_test_user(&app.conn(), "owner@shop.test", false);
    let uri = format!("/api/admin/users/{}/subscription", user.id);

    let response = app
        .router()
        .oneshot(request(
            "PUT",
            &uri,
            Some(&admin_token),
            Some(json!({ "plan_type": "subscription", "active_plan_id": "no-such-plan" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let expires = chrono::Utc::now().timestamp() + 30 * 86400;
    let response = app
        .router()
        .oneshot(request(
            "PUT",
            &uri,
            Some(&admin_token),
            Some(json!({
                "plan_type": "subscription",
                "subscription_status": "active",
                "plan_expires_at": expires,
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stored = reload_user(&app.conn(), &user.id);
    assert_eq!(stored.plan_type, UserPlanType::Subscription);
    assert_eq!(stored.subscription_status, Some(SubscriptionStatus::Active));
    assert_eq!(stored.plan_expires_at, Some(expires));
}

#[tokio::test]
async fn test_template_migration_is_idempotent() {
    let app = create_test_app();
    let (_, admin_token) = create_test_user(&app.conn(), "admin@prizewheel.test", true);

    let response = app
        .router()
        .oneshot(request("GET", "/api/templates", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let builtin_count = body_json(response).await.as_array().unwrap().len();
    assert!(builtin_count > 0);

    let response = app
        .router()
        .oneshot(request("POST", "/api/admin/migrate-templates", Some(&admin_token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["inserted"], json!(builtin_count));

    let response = app
        .router()
        .oneshot(request("POST", "/api/admin/migrate-templates", Some(&admin_token), None))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["inserted"], json!(0));
    assert_eq!(body["total"], json!(builtin_count));

    let response = app
        .router()
        .oneshot(request("GET", "/api/admin/templates", Some(&admin_token), None))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["migrated"], json!(true));
    assert_eq!(body["templates"].as_array().unwrap().len(), builtin_count);
}

#[tokio::test]
async fn test_homepage_config_round_trip() {
    let app = create_test_app();
    let (_, admin_token) = create_test_user(&app.conn(), "admin@prizewheel.test", true);

    let response = app
        .router()
        .oneshot(request("GET", "/api/homepage-config", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router()
        .oneshot(request(
            "PUT",
            "/api/admin/homepage-config",
            Some(&admin_token),
            Some(json!({ "hero": { "title": "Spin to win" } })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router()
        .oneshot(request("GET", "/api/homepage-config", None, None))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["hero"]["title"], json!("Spin to win"));
}

#[tokio::test]
async fn test_gateway_secrets_sealed_at_rest_and_masked() {
    let app = create_test_app();
    let (_, admin_token) = create_test_user(&app.conn(), "admin@prizewheel.test", true);
    let secret = "sk_test_51Habcdefghij4242";

    let response = app
        .router()
        .oneshot(request(
            "PUT",
            "/api/admin/payment-gateways/stripe",
            Some(&admin_token),
            Some(json!({
                "is_active": true,
                "public_key": "pk_test_123",
                "secret_key": secret,
                "webhook_secret": "whsec_0123456789abcdef",
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["is_active"], json!(true));
    assert_eq!(body["secret_key"], json!("sk_test_...4242"));
    assert_eq!(body["webhook_secret"], json!("whsec_01...cdef"));
    assert_eq!(body["public_key"], json!("pk_test_123"));

    let stored: Vec<u8> = app
        .conn()
        .query_row(
            "SELECT encrypted_secret_key FROM payment_gateways WHERE name = 'stripe' AND sandbox = 1",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(!stored.windows(secret.len()).any(|w| w == secret.as_bytes()));

    // Omitted secrets keep their stored value
    let response = app
        .router()
        .oneshot(request(
            "PUT",
            "/api/admin/payment-gateways/stripe",
            Some(&admin_token),
            Some(json!({ "is_active": false })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router()
        .oneshot(request("GET", "/api/admin/payment-gateways/stripe", Some(&admin_token), None))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["is_active"], json!(false));
    assert_eq!(body["secret_key"], json!("sk_test_...4242"));

    let config = queries::get_gateway_config(&app.conn(), PaymentGateway::Stripe, true)
        .unwrap()
        .unwrap()
        .decrypt(&app.state.master_key)
        .unwrap();
    assert_eq!(config.secret_key.as_deref(), Some(secret));
}

#[tokio::test]
async fn test_gateway_admin_rejects_unknown_gateway_and_non_admins() {
    let app = create_test_app();
    let (_, admin_token) = create_test_user(&app.conn(), "admin@prizewheel.test", true);
    let (_, user_token) = create_test_user(&app.conn(), "owner@shop.test", false);

    let response = app
        .router()
        .oneshot(request("GET", "/api/admin/payment-gateways/bitpay", Some(&admin_token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .router()
        .oneshot(request("GET", "/api/admin/payment-gateways/stripe", Some(&user_token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_mailgun_settings_masked_on_read() {
    let app = create_test_app();
    let (_, admin_token) = create_test_user(&app.conn(), "admin@prizewheel.test", true);

    let response = app
        .router()
        .oneshot(request("GET", "/api/admin/email-integration/mailgun", Some(&admin_token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["configured"], json!(false));

    // The first save needs a key
    let response = app
        .router()
        .oneshot(request(
            "PUT",
            "/api/admin/email-integration/mailgun",
            Some(&admin_token),
            Some(json!({ "domain": "mg.prizewheel.test" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .router()
        .oneshot(request(
            "PUT",
            "/api/admin/email-integration/mailgun",
            Some(&admin_token),
            Some(json!({
                "domain": "mg.prizewheel.test",
                "from_email": "hello@prizewheel.test",
                "region": "eu",
                "api_key": "key-0123456789abcdef",
                "is_active": true,
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router()
        .oneshot(request("GET", "/api/admin/email-integration/mailgun", Some(&admin_token), None))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["configured"], json!(true));
    assert_eq!(body["domain"], json!("mg.prizewheel.test"));
    assert_eq!(body["region"], json!("eu"));
    assert_eq!(body["api_key"], json!("key-0123...cdef"));
    assert!(!body.to_string().contains("key-0123456789abcdef"));
}

#[tokio::test]
async fn test_install_email_templates_is_idempotent() {
    let app = create_test_app();
    let (_, admin_token) = create_test_user(&app.conn(), "admin@prizewheel.test", true);

    let response = app
        .router()
        .oneshot(request("POST", "/api/admin/install-email-templates", Some(&admin_token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let total = body["total"].as_u64().unwrap();
    assert!(total > 0);
    assert_eq!(body["installed"], json!(total));

    let response = app
        .router()
        .oneshot(request("POST", "/api/admin/install-email-templates", Some(&admin_token), None))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["installed"], json!(0));
    assert_eq!(body["total"], json!(total));

    let count: i64 = app
        .conn()
        .query_row("SELECT COUNT(*) FROM email_templates", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count as u64, total);
}

#[tokio::test]
async fn test_duplicate_template_creates_editable_copy() {
    let app = create_test_app();
    let (_, admin_token) = create_test_user(&app.conn(), "admin@prizewheel.test", true);

    let response = app
        .router()
        .oneshot(request("POST", "/api/admin/migrate-templates", Some(&admin_token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router()
        .oneshot(request("GET", "/api/admin/templates", Some(&admin_token), None))
        .await
        .unwrap();
    let body = body_json(response).await;
    let templates = body["templates"].as_array().unwrap();
    let before = templates.len();
    let source = &templates[0];
    let source_id = source["id"].as_str().unwrap().to_string();

    let response = app
        .router()
        .oneshot(request(
            "POST",
            &format!("/api/admin/templates/{}/duplicate", source_id),
            Some(&admin_token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let copy = body_json(response).await;
    assert_ne!(copy["id"], json!(source_id));
    assert_eq!(copy["name"], json!(format!("{} (Copy)", source["name"].as_str().unwrap())));
    assert_eq!(copy["isBuiltin"], json!(false));
    assert_eq!(copy["wheelSegments"], source["wheelSegments"]);

    let response = app
        .router()
        .oneshot(request("GET", "/api/admin/templates", Some(&admin_token), None))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["templates"].as_array().unwrap().len(), before + 1);

    let response = app
        .router()
        .oneshot(request(
            "POST",
            "/api/admin/templates/missing/duplicate",
            Some(&admin_token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
