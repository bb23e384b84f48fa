use rusqlite::Connection;

pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS billing_plans (
            id TEXT PRIMARY KEY,
            plan_type TEXT NOT NULL CHECK (plan_type IN ('subscription', 'campaign', 'leads')),
            name TEXT NOT NULL,
            description TEXT,
            currency TEXT NOT NULL CHECK (currency IN ('USD', 'KES')),
            amount TEXT NOT NULL,
            billing_interval TEXT CHECK (billing_interval IN ('weekly', 'monthly', 'yearly')),
            campaign_limit INTEGER,
            lead_limit INTEGER,
            features TEXT NOT NULL DEFAULT '[]',
            is_active INTEGER NOT NULL DEFAULT 1,
            display_order INTEGER NOT NULL DEFAULT 0,
            is_popular INTEGER NOT NULL DEFAULT 0,
            remove_watermark INTEGER NOT NULL DEFAULT 0,
            allow_background_image INTEGER NOT NULL DEFAULT 0,
            allow_logo_upload INTEGER NOT NULL DEFAULT 0,
            allow_external_border INTEGER NOT NULL DEFAULT 0,
            allow_qr_code INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_billing_plans_group
            ON billing_plans(currency, plan_type, display_order);

        CREATE TABLE IF NOT EXISTS app_users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            name TEXT NOT NULL,
            plan_type TEXT NOT NULL DEFAULT 'free',
            subscription_status TEXT,
            plan_expires_at INTEGER,
            active_plan_id TEXT REFERENCES billing_plans(id) ON DELETE SET NULL,
            campaign_credits INTEGER NOT NULL DEFAULT 0 CHECK (campaign_credits >= 0),
            lead_credits INTEGER NOT NULL DEFAULT 0 CHECK (lead_credits >= 0),
            currency TEXT NOT NULL DEFAULT 'USD',
            country TEXT,
            phone TEXT,
            business_name TEXT,
            is_admin INTEGER NOT NULL DEFAULT 0,
            stripe_customer_id TEXT,
            billing_cycle TEXT NOT NULL DEFAULT 'monthly',
            profile_completed INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_app_users_stripe_customer ON app_users(stripe_customer_id);
        CREATE INDEX IF NOT EXISTS idx_app_users_expiry
            ON app_users(subscription_status, plan_expires_at);

        CREATE TABLE IF NOT EXISTS api_tokens (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES app_users(id) ON DELETE CASCADE,
            token_hash TEXT NOT NULL UNIQUE,
            name TEXT,
            created_at INTEGER NOT NULL,
            last_used_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_api_tokens_user ON api_tokens(user_id);

        CREATE TABLE IF NOT EXISTS campaigns (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES app_users(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            public_slug TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL DEFAULT 'draft',
            campaign_type TEXT NOT NULL,
            wheel_segments TEXT NOT NULL DEFAULT '[]',
            wheel_colors TEXT NOT NULL DEFAULT '[]',
            lead_form_fields TEXT NOT NULL DEFAULT '[]',
            redemption_days INTEGER,
            spins_count INTEGER NOT NULL DEFAULT 0,
            leads_count INTEGER NOT NULL DEFAULT 0,
            template_id TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_campaigns_user ON campaigns(user_id);

        CREATE TABLE IF NOT EXISTS leads (
            id TEXT PRIMARY KEY,
            campaign_id TEXT NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
            name TEXT,
            email TEXT NOT NULL,
            phone TEXT,
            prize_won TEXT,
            reference_number TEXT,
            redemption_expires_at INTEGER,
            is_redeemed INTEGER NOT NULL DEFAULT 0,
            redeemed_at INTEGER,
            redeemed_by TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_leads_campaign ON leads(campaign_id, created_at);

        CREATE TABLE IF NOT EXISTS spins (
            id TEXT PRIMARY KEY,
            campaign_id TEXT NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
            prize_won TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_spins_campaign ON spins(campaign_id, created_at);

        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            user_id TEXT REFERENCES app_users(id) ON DELETE SET NULL,
            transaction_type TEXT NOT NULL,
            plan_id TEXT,
            plan_type TEXT NOT NULL,
            gateway_name TEXT NOT NULL,
            gateway_reference TEXT,
            amount TEXT NOT NULL,
            currency TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            description TEXT NOT NULL,
            billing_cycle TEXT,
            credits INTEGER,
            leads INTEGER,
            created_at INTEGER NOT NULL,
            completed_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions(user_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_transactions_reference
            ON transactions(gateway_name, gateway_reference);

        CREATE TABLE IF NOT EXISTS payment_gateways (
            name TEXT NOT NULL,
            sandbox INTEGER NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 0,
            display_name TEXT NOT NULL,
            public_key TEXT,
            encrypted_secret_key BLOB,
            encrypted_webhook_secret BLOB,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (name, sandbox)
        );

        CREATE TABLE IF NOT EXISTS email_settings (
            sandbox INTEGER PRIMARY KEY,
            domain TEXT NOT NULL,
            from_email TEXT,
            region TEXT NOT NULL DEFAULT 'us',
            encrypted_api_key BLOB NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS email_templates (
            id TEXT PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            subject TEXT NOT NULL,
            text_body TEXT NOT NULL,
            html_body TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS campaign_templates (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            campaign_type TEXT NOT NULL,
            wheel_segments TEXT NOT NULL,
            wheel_colors TEXT NOT NULL,
            lead_form_fields TEXT NOT NULL,
            is_builtin INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS homepage_config (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            config TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Replay protection for gateway webhooks
        CREATE TABLE IF NOT EXISTS webhook_events (
            id TEXT PRIMARY KEY,
            provider TEXT NOT NULL,
            event_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE (provider, event_id)
        );
        "#,
    )
}

/// Schema for the separate audit database.
pub fn init_audit_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS audit_logs (
            id TEXT PRIMARY KEY,
            timestamp INTEGER NOT NULL,
            actor_type TEXT NOT NULL,
            user_id TEXT,
            user_email TEXT,
            action TEXT NOT NULL,
            resource_type TEXT NOT NULL,
            resource_id TEXT NOT NULL,
            details TEXT,
            ip_address TEXT,
            user_agent TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_audit_logs_timestamp ON audit_logs(timestamp);
        CREATE INDEX IF NOT EXISTS idx_audit_logs_user ON audit_logs(user_id);
        CREATE INDEX IF NOT EXISTS idx_audit_logs_resource ON audit_logs(resource_type, resource_id);
        "#,
    )
}
