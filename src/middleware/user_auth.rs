use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::db::{AppState, queries};
use crate::models::{ActorType, AppUser};
use crate::util::extract_bearer_token;

#[derive(Clone)]
pub struct UserContext {
    pub user: AppUser,
}

impl UserContext {
    /// Actor type to record in the audit log for this caller.
    pub fn actor_type(&self) -> ActorType {
        if self.user.is_admin {
            ActorType::Admin
        } else {
            ActorType::User
        }
    }
}

/// Authenticate a user from their bearer token.
fn authenticate_user(state: &AppState, headers: &HeaderMap) -> Result<AppUser, StatusCode> {
    let token = extract_bearer_token(headers).ok_or(StatusCode::UNAUTHORIZED)?;
    let conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    queries::get_user_by_api_token(&conn, token)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)
}

pub async fn user_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let user = authenticate_user(&state, request.headers())?;
    request.extensions_mut().insert(UserContext { user });
    Ok(next.run(request).await)
}

pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let user = authenticate_user(&state, request.headers())?;
    if !user.is_admin {
        return Err(StatusCode::FORBIDDEN);
    }
    request.extensions_mut().insert(UserContext { user });
    Ok(next.run(request).await)
}
