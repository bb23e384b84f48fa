mod email;
mod gateways;
mod plans;
mod site;
mod templates;
mod users;

pub use email::*;
pub use gateways::*;
pub use plans::*;
pub use site::*;
pub use templates::*;
pub use users::*;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::db::AppState;
use crate::middleware::require_admin;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        // Plan catalog
        .route(
            "/admin/billing-plans",
            get(list_billing_plans).post(create_billing_plan),
        )
        .route(
            "/admin/billing-plans/{id}",
            get(get_billing_plan)
                .patch(update_billing_plan)
                .delete(delete_billing_plan),
        )
        .route("/admin/billing-plans/{id}/move", post(move_billing_plan))
        // Gateways and email
        .route(
            "/admin/payment-gateways/{name}",
            get(get_payment_gateway).put(update_payment_gateway),
        )
        .route(
            "/admin/email-integration/mailgun",
            get(get_mailgun_settings).put(update_mailgun_settings),
        )
        .route("/admin/send-test-email", post(send_test_email))
        .route("/admin/install-email-templates", post(install_email_templates))
        // Users
        .route("/admin/users", get(list_users))
        .route("/admin/users/{id}", get(get_user).delete(delete_user))
        .route("/admin/users/{id}/grant-credits", post(grant_credits))
        .route("/admin/users/{id}/subscription", put(set_subscription))
        // Templates
        .route("/admin/templates", get(list_templates))
        .route(
            "/admin/templates/{id}",
            get(get_template).put(update_template).delete(delete_template),
        )
        .route("/admin/templates/{id}/duplicate", post(duplicate_template))
        .route("/admin/migrate-templates", post(migrate_templates))
        // Site and records
        .route("/admin/homepage-config", put(update_homepage_config))
        .route("/admin/transactions", get(list_transactions))
        .route("/admin/audit-logs", get(query_audit_logs))
        .layer(middleware::from_fn_with_state(state, require_admin))
}
