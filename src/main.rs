use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use prizewheel::billing::expire_subscriptions;
use prizewheel::config::Config;
use prizewheel::db::{AppState, DbPool, create_pool, init_audit_db, init_db, queries};
use prizewheel::email::EmailService;
use prizewheel::middleware::{prune_idle_clients, public_rate_limiter};
use prizewheel::models::CreateAppUser;
use prizewheel::templates::migrate_builtin_templates;

const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Parser)]
#[command(name = "prizewheel", version, about = "Prizewheel API server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create a user and print a fresh API token
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        admin: bool,
    },
    /// Copy the built-in campaign templates into the database
    MigrateTemplates,
    /// Mark subscriptions past their expiry as expired
    ExpireSubscriptions,
}

fn open_databases(config: &Config) -> anyhow::Result<(DbPool, DbPool)> {
    let db = create_pool(&config.database_path)
        .with_context(|| format!("opening {}", config.database_path))?;
    let audit = create_pool(&config.audit_database_path)
        .with_context(|| format!("opening {}", config.audit_database_path))?;
    init_db(&*db.get()?)?;
    init_audit_db(&*audit.get()?)?;
    Ok((db, audit))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("prizewheel=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::CreateUser { email, name, admin } => {
            let (db, _) = open_databases(&config)?;
            let conn = db.get()?;
            let input = CreateAppUser {
                email,
                name,
                is_admin: admin,
            };
            input.validate()?;
            let user = queries::create_user(&conn, &input)?;
            let token = queries::create_api_token(&conn, &user.id, Some("cli"))?;
            println!("Created user {} ({})", user.email, user.id);
            println!("API token: {}", token);
            Ok(())
        }
        Command::MigrateTemplates => {
            let (db, _) = open_databases(&config)?;
            let inserted = migrate_builtin_templates(&*db.get()?)?;
            println!("Inserted {} built-in templates", inserted);
            Ok(())
        }
        Command::ExpireSubscriptions => {
            let (db, audit) = open_databases(&config)?;
            let now = chrono::Utc::now().timestamp();
            let expired = expire_subscriptions(&db, &audit, config.audit_log_enabled, now)?;
            println!("Expired {} subscriptions", expired);
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let master_key = config.resolve_master_key()?;
    let (db, audit) = open_databases(&config)?;

    if config.audit_log_retention_days > 0 {
        let purged = queries::purge_old_audit_logs(&*audit.get()?, config.audit_log_retention_days)?;
        if purged > 0 {
            tracing::info!(purged, retention_days = config.audit_log_retention_days, "Purged old audit logs");
        }
    }

    let state = AppState {
        db,
        audit,
        base_url: config.base_url.clone(),
        success_page_url: config.success_page_url.clone(),
        audit_log_enabled: config.audit_log_enabled,
        master_key,
        payments_sandbox: config.payments_sandbox,
        email: EmailService::new(config.email_from.clone()),
        rate_limiter: Arc::new(public_rate_limiter(config.public_rate_limit_per_minute)),
        trust_proxy: config.trust_proxy,
    };

    spawn_hourly_sweep(state.clone());

    let app = prizewheel::app(state, &config.cors_origins);
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    tracing::info!(
        addr = %addr,
        sandbox = config.payments_sandbox,
        dev_mode = config.dev_mode,
        "Prizewheel listening"
    );

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

/// Sweep lapsed subscriptions and idle rate-limit entries now and then every hour.
fn spawn_hourly_sweep(state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(EXPIRY_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let now = chrono::Utc::now().timestamp();
            if let Err(e) = expire_subscriptions(&state.db, &state.audit, state.audit_log_enabled, now) {
                tracing::error!(error = %e, "Subscription expiry sweep failed");
            }
            prune_idle_clients(&state.rate_limiter);
        }
    });
}
