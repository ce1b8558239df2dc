//! Investment Ledger Server - Main Application Entry Point
//!
//! REST API backend for an investment and referral platform: product
//! purchases paid through a payment gateway, daily returns, multi-level
//! referral bonuses and bank withdrawals.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries, row locks)
//! - **Authentication**: bearer tokens stored as SHA-256 hashes
//! - **Payments**: Kytapay or Pakasir behind one gateway trait
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build the configured payment gateway client
//! 5. Build HTTP router and start serving on the configured port

use std::sync::Arc;

use invest_ledger_server::{app, config, db, gateway, state::AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env()?;
    tracing::info!(gateway = config.payment_gateway.as_str(), "Configuration loaded");

    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let gateway = gateway::from_config(&config)?;
    tracing::info!(gateway = gateway.kind().as_str(), "Payment gateway client ready");

    let addr = format!("0.0.0.0:{}", config.server_port);
    let state = AppState {
        pool,
        config: Arc::new(config),
        gateway,
    };

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app::router(state)).await?;

    Ok(())
}
