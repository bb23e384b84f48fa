//! Shared request helpers and the audit log builder.

use axum::http::HeaderMap;
use rusqlite::Connection;
use unicode_normalization::UnicodeNormalization;

use crate::db::queries;
use crate::error::Result;
use crate::models::{ActorType, AuditAction, AuditLog};

/// Extract client IP address and user-agent from request headers.
///
/// Tries `x-forwarded-for` first (for proxied requests), then `x-real-ip`,
/// and extracts the `user-agent` header for audit logging.
pub fn extract_request_info(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let ip = headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or(v).trim().to_string());

    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    (ip, user_agent)
}

/// Extract a Bearer token from the Authorization header.
///
/// Returns the token string without the "Bearer " prefix, or None if
/// the header is missing, malformed, or empty after the prefix.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Append URL-encoded query parameters, respecting an existing `?`.
pub fn append_query_params(base: &str, params: &[(&str, &str)]) -> String {
    if params.is_empty() {
        return base.to_string();
    }
    let query: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect();
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{}{}{}", base, separator, query.join("&"))
}

/// URL-safe slug: accents folded, lowercase ASCII alphanumerics joined by `-`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.nfkd().filter(|c| c.is_ascii()) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(c.to_ascii_lowercase());
            pending_dash = false;
        } else {
            pending_dash = true;
        }
    }
    slug.truncate(48);
    slug.trim_end_matches('-').to_string()
}

/// Chainable audit log entry.
///
/// ```ignore
/// AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
///     .actor(ActorType::Admin, Some(&ctx.user.id))
///     .action(AuditAction::GrantCredits)
///     .resource("user", &user.id)
///     .save()?;
/// ```
pub struct AuditLogBuilder<'a> {
    conn: &'a Connection,
    enabled: bool,
    actor_type: ActorType,
    user_id: Option<String>,
    user_email: Option<String>,
    action: Option<AuditAction>,
    resource_type: String,
    resource_id: String,
    details: Option<serde_json::Value>,
    ip_address: Option<String>,
    user_agent: Option<String>,
}

impl<'a> AuditLogBuilder<'a> {
    pub fn new(conn: &'a Connection, enabled: bool, headers: &HeaderMap) -> Self {
        let (ip_address, user_agent) = extract_request_info(headers);
        Self {
            conn,
            enabled,
            actor_type: ActorType::System,
            user_id: None,
            user_email: None,
            action: None,
            resource_type: String::new(),
            resource_id: String::new(),
            details: None,
            ip_address,
            user_agent,
        }
    }

    /// For background jobs and the CLI, where there is no request.
    pub fn system(conn: &'a Connection, enabled: bool) -> Self {
        Self::new(conn, enabled, &HeaderMap::new())
    }

    pub fn actor(mut self, actor_type: ActorType, user_id: Option<&str>) -> Self {
        self.actor_type = actor_type;
        self.user_id = user_id.map(String::from);
        self
    }

    pub fn email(mut self, email: &str) -> Self {
        self.user_email = Some(email.to_string());
        self
    }

    pub fn action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn resource(mut self, resource_type: &str, resource_id: &str) -> Self {
        self.resource_type = resource_type.to_string();
        self.resource_id = resource_id.to_string();
        self
    }

    pub fn details(mut self, details: &serde_json::Value) -> Self {
        self.details = Some(details.clone());
        self
    }

    pub fn save(self) -> Result<AuditLog> {
        let action = self
            .action
            .map(|a| a.as_ref().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        queries::create_audit_log(
            self.conn,
            self.enabled,
            self.actor_type,
            self.user_id.as_deref(),
            self.user_email.as_deref(),
            &action,
            &self.resource_type,
            &self.resource_id,
            self.details.as_ref(),
            self.ip_address.as_deref(),
            self.user_agent.as_deref(),
        )
    }
}
