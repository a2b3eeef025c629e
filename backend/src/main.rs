//! Stock & Batch Management Platform - Sweeper
//!
//! Periodically recomputes every batch's status and raises the alerts the
//! catalog and batch state call for. Run with `--once` for an on-demand
//! sweep, otherwise it loops on the configured interval.

use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sbm_backend::services::AlertService;
use sbm_backend::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sbm_sweeper=debug,sbm_backend=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting Stock & Batch Management sweeper");
    tracing::info!("Environment: {}", config.environment);

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database.url)
        .await?;

    tracing::info!("Database connection established");

    // Run migrations in development
    if config.environment == "development" {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&db_pool).await?;
        tracing::info!("Migrations completed");
    }

    let alerts =
        AlertService::with_near_expiry_window(db_pool, config.sweep.near_expiry_days);

    let run_once = std::env::args().any(|arg| arg == "--once");
    let interval = Duration::from_secs(config.sweep.interval_secs);

    loop {
        match alerts.sweep().await {
            Ok(summary) => {
                tracing::info!(
                    "Sweep completed: {} status changes, {} new alerts",
                    summary.statuses_changed,
                    summary.alerts_created
                );
            }
            Err(e) => {
                tracing::error!("Sweep failed: {}", e);
            }
        }

        if run_once {
            break;
        }

        tokio::time::sleep(interval).await;
    }

    Ok(())
}
