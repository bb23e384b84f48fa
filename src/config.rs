use std::env;

use crate::crypto::MasterKey;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub audit_database_path: String,
    pub base_url: String,
    pub dev_mode: bool,
    /// Enable/disable audit logging entirely
    pub audit_log_enabled: bool,
    /// Days to retain audit logs before purging (0 = never purge)
    pub audit_log_retention_days: i64,
    /// Base64-encoded 32-byte key for encrypting gateway and email secrets
    pub master_key: Option<String>,
    /// Which gateway configuration rows are live (sandbox vs production)
    pub payments_sandbox: bool,
    /// Frontend page the billing callback redirects to
    pub success_page_url: String,
    pub email_from: String,
    pub public_rate_limit_per_minute: u32,
    /// Key the public rate limiter on `x-forwarded-for` (only behind a proxy that sets it)
    pub trust_proxy: bool,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("APP_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url = env::var("BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let audit_log_enabled = env::var("AUDIT_LOG_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let audit_log_retention_days: i64 = env::var("AUDIT_LOG_RETENTION_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(90);

        // Sandbox unless explicitly switched to live
        let payments_sandbox = env::var("PAYMENTS_SANDBOX")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let success_page_url = env::var("SUCCESS_PAGE_URL")
            .unwrap_or_else(|_| format!("{}/billing/success", base_url));

        let public_rate_limit_per_minute = env::var("PUBLIC_RATE_LIMIT_PER_MINUTE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        let trust_proxy = env::var("TRUST_PROXY")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "prizewheel.db".to_string()),
            audit_database_path: env::var("AUDIT_DATABASE_PATH")
                .unwrap_or_else(|_| "prizewheel_audit.db".to_string()),
            base_url,
            dev_mode,
            audit_log_enabled,
            audit_log_retention_days,
            master_key: env::var("MASTER_KEY").ok(),
            payments_sandbox,
            success_page_url,
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "Prizewheel <no-reply@prizewheel.app>".to_string()),
            public_rate_limit_per_minute,
            trust_proxy,
            cors_origins,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolve the master key. Production requires `MASTER_KEY`; dev mode
    /// falls back to an ephemeral key (stored secrets won't survive a restart).
    pub fn resolve_master_key(&self) -> anyhow::Result<MasterKey> {
        match &self.master_key {
            Some(encoded) => Ok(MasterKey::from_base64(encoded)?),
            None if self.dev_mode => {
                tracing::warn!("MASTER_KEY not set, using an ephemeral dev key");
                Ok(MasterKey::generate())
            }
            None => anyhow::bail!("MASTER_KEY must be set outside dev mode"),
        }
    }
}
