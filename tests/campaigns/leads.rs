use axum::http::{StatusCode, header};
use serde_json::json;
use tower::ServiceExt;

use crate::common::*;

/// Campaign with three leads: two prize winners and one without a prize.
fn seed_leads(app: &TestApp) -> (AppUser, String, Campaign, Vec<Lead>) {
    let (owner, token) = create_test_user(&app.conn(), "owner@shop.test", false);
    let mut conn = app.conn();
    let campaign = create_test_campaign(&mut conn, &owner.id, "lead-wheel");
    let expires = chrono::Utc::now().timestamp() + 86400;

    let entries = [
        ("Jane Doe", "jane@example.com", Some("Free Coffee"), "PW-AAAA1111"),
        ("John Roe", "john@example.com", Some("Free Coffee"), "PW-BBBB2222"),
        ("Kim Loe", "kim@example.com", None, "PW-CCCC3333"),
    ];
    let leads = entries
        .iter()
        .map(|&(name, email, prize, reference)| {
            queries::capture_lead(
                &mut conn,
                &campaign,
                &queries::NewLead {
                    name: Some(name),
                    email,
                    phone: None,
                    prize_won: prize,
                    reference_number: reference,
                    redemption_expires_at: prize.map(|_| expires),
                },
                false,
            )
            .unwrap()
        })
        .collect();
    (owner, token, campaign, leads)
}

#[tokio::test]
async fn test_list_leads_search_and_filter() {
    let app = create_test_app();
    let (_, token, campaign, _) = seed_leads(&app);

    let response = app
        .router()
        .oneshot(request(
            "GET",
            &format!("/api/campaigns/{}/leads?search=JANE", campaign.id),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let leads = body["leads"].as_array().unwrap();
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0]["email"], json!("jane@example.com"));
    assert_eq!(leads[0]["status"], json!("pending"));

    // Reference numbers are searchable too
    let response = app
        .router()
        .oneshot(request(
            "GET",
            &format!("/api/campaigns/{}/leads?search=pw-cccc", campaign.id),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["leads"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_redeem_toggle_is_reversible() {
    let app = create_test_app();
    let (owner, token, campaign, leads) = seed_leads(&app);
    let uri = format!("/api/campaigns/{}/leads/{}/redeem", campaign.id, leads[0].id);

    let response = app
        .router()
        .oneshot(request("PATCH", &uri, Some(&token), Some(json!({ "is_redeemed": true }))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], json!("redeemed"));
    assert_eq!(body["redeemed_by"], json!(owner.id));
    assert!(body["redeemed_at"].as_i64().is_some());

    let response = app
        .router()
        .oneshot(request(
            "GET",
            &format!("/api/campaigns/{}/leads?filter=redeemed", campaign.id),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["leads"].as_array().unwrap().len(), 1);

    let response = app
        .router()
        .oneshot(request("PATCH", &uri, Some(&token), Some(json!({ "is_redeemed": false }))))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["status"], json!("pending"));
    assert!(body["redeemed_at"].is_null());
    assert!(body["redeemed_by"].is_null());

    let response = app
        .router()
        .oneshot(request(
            "GET",
            &format!("/api/campaigns/{}/leads?filter=pending", campaign.id),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["leads"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_redeem_unknown_lead_is_not_found() {
    let app = create_test_app();
    let (_, token, campaign, _) = seed_leads(&app);

    let response = app
        .router()
        .oneshot(request(
            "PATCH",
            &format!("/api/campaigns/{}/leads/missing/redeem", campaign.id),
            Some(&token),
            Some(json!({ "is_redeemed": true })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_export_matches_filtered_view() {
    let app = create_test_app();
    let (owner, token, campaign, leads) = seed_leads(&app);
    queries::set_lead_redemption(&app.conn(), &leads[1].id, true, &owner.id).unwrap();

    let response = app
        .router()
        .oneshot(request(
            "GET",
            &format!(
                "/api/campaigns/{}/leads/export?search=coffee&filter=redeemed",
                campaign.id
            ),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/csv")
    );
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"leads-lead-wheel-"));

    let csv = String::from_utf8(body_bytes(response).await).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines[0],
        "Name,Email,Phone,Prize Won,Reference Number,Status,Created At,Redeemed At,Expires At"
    );
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with(
        r#""John Roe","john@example.com","","Free Coffee","PW-BBBB2222","redeemed","#
    ));
}

#[tokio::test]
async fn test_analytics_totals() {
    let app = create_test_app();
    let (_, token, campaign, _) = seed_leads(&app);
    {
        let mut conn = app.conn();
        for _ in 0..4 {
            queries::record_spin(&mut conn, &campaign.id, Some("Free Coffee")).unwrap();
        }
    }

    let response = app
        .router()
        .oneshot(request(
            "GET",
            &format!("/api/campaigns/{}/analytics?range=7d", campaign.id),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    assert_eq!(body["timeSeriesData"].as_array().unwrap().len(), 7);
    let stats = &body["totalStats"];
    assert_eq!(stats["totalSpins"], json!(4));
    assert_eq!(stats["totalLeads"], json!(3));
    assert_eq!(stats["pendingLeads"], json!(3));
    assert_eq!(stats["conversionRate"], json!(75.0));

    let slices = body["prizeDistribution"].as_array().unwrap();
    assert!(slices.iter().any(|s| s["name"] == json!("Free Coffee") && s["value"] == json!(2)));
}

#[tokio::test]
async fn test_leads_hidden_from_other_users() {
    let app = create_test_app();
    let (_, _, campaign, _) = seed_leads(&app);
    let (_, other_token) = create_test_user(&app.conn(), "other@shop.test", false);

    let response = app
        .router()
        .oneshot(request(
            "GET",
            &format!("/api/campaigns/{}/leads/export", campaign.id),
            Some(&other_token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
