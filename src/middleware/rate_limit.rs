use std::net::SocketAddr;
use std::num::NonZeroU32;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::db::AppState;
use crate::error::AppError;
use crate::util::extract_request_info;

/// Per-client-IP limiter for the unauthenticated public endpoints.
pub type PublicRateLimiter = DefaultKeyedRateLimiter<String>;

pub fn public_rate_limiter(per_minute: u32) -> PublicRateLimiter {
    let per_minute = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
    RateLimiter::keyed(Quota::per_minute(per_minute))
}

/// Drop clients whose buckets have fully refilled so the key map only holds
/// recently active callers.
pub fn prune_idle_clients(limiter: &PublicRateLimiter) {
    limiter.retain_recent();
    limiter.shrink_to_fit();
}

/// `x-forwarded-for` is client-controlled, so it only keys the limiter when
/// the server runs behind a trusted proxy. Otherwise the peer address is used.
fn client_key(request: &Request, trust_proxy: bool) -> String {
    let forwarded = if trust_proxy {
        extract_request_info(request.headers()).0
    } else {
        None
    };
    forwarded
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit_public(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request, state.trust_proxy);
    if state.rate_limiter.check_key(&key).is_err() {
        tracing::warn!(client = %key, path = %request.uri().path(), "Public rate limit exceeded");
        return AppError::TooManyRequests.into_response();
    }
    next.run(request).await
}
