//! Fulfillment Reconciler service entry point.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use fulfillment_reconciler::adapters::http::{app, WebhookAppState};
use fulfillment_reconciler::adapters::postgres::{
    run_migrations, PostgresCatalog, PostgresCustomerDirectory, PostgresOrderLedger,
    PostgresSettingsSource,
};
use fulfillment_reconciler::adapters::{ChatWebhookNotifier, StripeConfig, StripePaymentAdapter};
use fulfillment_reconciler::application::{
    NotificationDispatcher, ReconcilePaymentEventHandler, ReconcilerPorts, RepairChainsCommand,
    RepairChainsHandler,
};
use fulfillment_reconciler::config::{AppConfig, ConfigError, SettingsSourceKind, ValidationError};
use fulfillment_reconciler::domain::foundation::DomainError;
use fulfillment_reconciler::domain::payments::StripeWebhookVerifier;
use fulfillment_reconciler::ports::{NotifyError, SettingsSource, StaticSettings};

#[derive(Parser, Debug)]
#[command(name = "fulfillment-reconciler")]
#[command(version)]
#[command(about = "Reconciles payment webhooks into the storefront order ledger")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the webhook endpoint (default)
    Serve,
    /// Restore missing forward links in renewal chains
    RepairChains {
        /// Report broken links without writing
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("Database unavailable: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Notifier setup failed: {0}")]
    Notifier(#[from] NotifyError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("fulfillment-reconciler: {}", e);
            std::process::exit(2);
        }
    };
    init_tracing(&config);

    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::RepairChains { dry_run } => repair_chains(config, dry_run).await,
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "Fatal error");
        std::process::exit(1);
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    if config.server.json_logs() {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn connect(config: &AppConfig) -> Result<PgPool, StartupError> {
    let pool = config.database.connect().await?;
    if config.database.run_migrations {
        run_migrations(&pool).await?;
        tracing::info!("Migrations applied");
    }
    Ok(pool)
}

async fn serve(config: AppConfig) -> Result<(), StartupError> {
    config.validate()?;
    let addr = config.server.listen_addr()?;
    let pool = connect(&config).await?;

    let provider = StripePaymentAdapter::new(
        StripeConfig::new(config.payment.stripe_api_key.expose_secret().clone())
            .with_base_url(config.payment.api_base_url.clone()),
    );

    let settings: Arc<dyn SettingsSource> = match config.reconciler.settings_source {
        SettingsSourceKind::Database => Arc::new(PostgresSettingsSource::new(pool.clone())),
        SettingsSourceKind::Static => Arc::new(StaticSettings(config.reconciler.static_settings())),
    };

    let ports = ReconcilerPorts {
        ledger: Arc::new(PostgresOrderLedger::new(pool.clone())),
        customers: Arc::new(PostgresCustomerDirectory::new(pool.clone())),
        catalog: Arc::new(PostgresCatalog::new(pool)),
        settings,
        provider: Arc::new(provider),
    };

    let notifier = ChatWebhookNotifier::new(
        config.notifications.channel_urls(),
        config.notifications.timeout(),
    )?;
    let notifications = NotificationDispatcher::new(
        Arc::new(notifier),
        config.notifications.timeout(),
        config.notifications.policy,
    );

    let verifier = StripeWebhookVerifier::new(config.payment.stripe_webhook_secret.expose_secret().clone())
        .with_tolerance(config.payment.signature_tolerance_secs);

    let handler = ReconcilePaymentEventHandler::new(
        ports,
        verifier,
        config.reconciler.settings(config.payment.require_livemode),
        notifications,
    );

    let router = app(WebhookAppState::new(handler), config.server.request_timeout());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        environment = ?config.server.environment,
        source_marker = %config.reconciler.source_marker,
        "Fulfillment reconciler listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shut down");
    Ok(())
}

async fn repair_chains(config: AppConfig, dry_run: bool) -> Result<(), StartupError> {
    config.database.validate()?;
    let pool = connect(&config).await?;

    let handler = RepairChainsHandler::new(Arc::new(PostgresOrderLedger::new(pool)));
    let result = handler.handle(RepairChainsCommand { dry_run }).await?;

    println!(
        "broken links: {}, repaired: {}, already linked: {}",
        result.found.len(),
        result.repaired,
        result.already_linked
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
