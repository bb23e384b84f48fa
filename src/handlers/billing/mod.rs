mod callback;
mod checkout;
mod plans;

pub use callback::*;
pub use checkout::*;
pub use plans::*;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::db::AppState;
use crate::middleware::user_auth;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/billing/active-gateways", get(list_active_gateways))
        .route("/billing/initiate-payment", post(initiate_payment))
        .route("/billing/transactions", get(list_my_transactions))
        .layer(middleware::from_fn_with_state(state, user_auth))
        // Reached by unauthenticated redirects and pricing pages
        .route("/billing/plans", get(list_purchase_plans))
        .route("/billing/callback", get(payment_callback))
}
