use axum::{Extension, extract::State, http::HeaderMap};
use serde::Deserialize;

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::middleware::UserContext;
use crate::models::{AuditAction, AuditLog, AuditLogQuery, HomepageConfig, Transaction, TransactionStatus};
use crate::pagination::{Paginated, PaginationQuery};
use crate::util::AuditLogBuilder;

#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub status: Option<TransactionStatus>,
}

pub async fn update_homepage_config(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    headers: HeaderMap,
    Json(config): Json<HomepageConfig>,
) -> Result<Json<HomepageConfig>> {
    {
        let conn = state.db.get()?;
        queries::save_homepage_config(&conn, &config)?;
    }

    let audit_conn = state.audit.get()?;
    AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
        .actor(ctx.actor_type(), Some(&ctx.user.id))
        .email(&ctx.user.email)
        .action(AuditAction::UpdateHomepage)
        .resource("homepage_config", "1")
        .save()?;

    Ok(Json(config))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Paginated<Transaction>>> {
    let conn = state.db.get()?;
    let page = PaginationQuery {
        limit: query.limit,
        offset: query.offset,
    };
    let (limit, offset) = (page.limit(), page.offset());
    let (items, total) = queries::list_transactions_paginated(&conn, query.status, limit, offset)?;
    Ok(Json(Paginated::new(items, total, limit, offset)))
}

pub async fn query_audit_logs(
    State(state): State<AppState>,
    Query(query): Query<AuditLogQuery>,
) -> Result<Json<Paginated<AuditLog>>> {
    let conn = state.audit.get()?;
    let (items, total) = queries::query_audit_logs(&conn, &query)?;
    Ok(Json(Paginated::new(items, total, query.limit(), query.offset())))
}
