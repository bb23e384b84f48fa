pub mod from_row;
pub mod queries;
mod schema;

pub use schema::{init_audit_db, init_db};

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::crypto::MasterKey;
use crate::email::EmailService;
use crate::middleware::PublicRateLimiter;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub audit: DbPool,
    pub base_url: String,
    /// Frontend page the billing callback redirects to
    pub success_page_url: String,
    pub audit_log_enabled: bool,
    pub master_key: MasterKey,
    /// Selects which gateway/email configuration rows are live
    pub payments_sandbox: bool,
    pub email: EmailService,
    pub rate_limiter: Arc<PublicRateLimiter>,
    /// Trust `x-forwarded-for` when keying the public rate limiter
    pub trust_proxy: bool,
}

/// Open a pooled SQLite database with WAL, foreign keys and a busy timeout
/// applied to every connection.
pub fn create_pool(path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
    });
    Pool::builder().max_size(8).build(manager)
}
