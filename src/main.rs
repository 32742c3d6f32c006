//! Wallet Ledger Service - Main Application Entry Point
//!
//! A REST service that owns the wallet ledger: it records monetary
//! movements (deposits, withdrawals, payments, refunds, manual adjustments)
//! against per-user, per-currency balances, reconciles payment-gateway
//! webhooks exactly once, and drives the approval workflows for deposits
//! and withdrawals.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: API key with SHA-256 hashing; gateway webhooks are
//!   authenticated by HMAC signature instead
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build HTTP router with routes and middleware
//! 5. Start server on configured port
//!
//! # Utility Mode
//!
//! `wallet_ledger_server --rebuild-balances` replays the full ledger,
//! rewrites the cached wallet-account rows, and exits.

mod config;
mod db;
mod error;
mod gateways;
mod handlers;
mod middleware;
mod models;
mod services;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Shared application state: the connection pool and the loaded config,
/// injected into every handler (no module-level singletons).
#[derive(Clone)]
pub struct AppState {
    pub pool: db::DbPool,
    pub config: Arc<config::Config>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment
    // variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Create database pool
    let pool = db::create_pool(&config.database_url, config.max_db_connections).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    // One-shot utility mode: replay the ledger into wallet_accounts, exit.
    if std::env::args().any(|arg| arg == "--rebuild-balances") {
        let written = services::balance::rebuild_wallet_accounts(&pool).await?;
        tracing::info!("Rebuild complete: {} wallet account rows written", written);
        return Ok(());
    }

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
    };

    // Create authenticated routes (API endpoints)
    let authenticated_routes = Router::new()
        // Deposit workflow
        .route("/api/v1/deposits", post(handlers::deposits::create_deposit))
        .route(
            "/api/v1/deposits/{id}",
            get(handlers::deposits::get_deposit),
        )
        .route(
            "/api/v1/deposits/{id}/approve",
            post(handlers::deposits::approve_deposit),
        )
        .route(
            "/api/v1/deposits/{id}/reject",
            post(handlers::deposits::reject_deposit),
        )
        // Withdrawal workflow
        .route(
            "/api/v1/withdrawals",
            post(handlers::withdrawals::create_withdrawal),
        )
        .route(
            "/api/v1/withdrawals/{id}",
            get(handlers::withdrawals::get_withdrawal),
        )
        .route(
            "/api/v1/withdrawals/{id}/approve",
            post(handlers::withdrawals::approve_withdrawal),
        )
        .route(
            "/api/v1/withdrawals/{id}/reject",
            post(handlers::withdrawals::reject_withdrawal),
        )
        .route(
            "/api/v1/withdrawals/{id}/finalize",
            post(handlers::withdrawals::finalize_withdrawal),
        )
        // Ledger
        .route(
            "/api/v1/adjustments",
            post(handlers::transactions::create_adjustment),
        )
        .route(
            "/api/v1/transactions/{id}",
            get(handlers::transactions::get_transaction),
        )
        // Payment intents and refunds
        .route(
            "/api/v1/payment-intents",
            post(handlers::payments::create_payment_intent),
        )
        .route(
            "/api/v1/payment-intents/{id}",
            get(handlers::payments::get_payment_intent),
        )
        .route("/api/v1/refunds", post(handlers::payments::create_refund))
        .route(
            "/api/v1/refunds/{id}",
            get(handlers::payments::get_refund),
        )
        // Per-user reads
        .route(
            "/api/v1/users/{id}/balances",
            get(handlers::balances::get_user_balances),
        )
        .route(
            "/api/v1/users/{id}/wallet",
            get(handlers::balances::get_user_wallet),
        )
        .route(
            "/api/v1/users/{id}/transactions",
            get(handlers::transactions::list_user_transactions),
        )
        .route(
            "/api/v1/users/{id}/deposits",
            get(handlers::deposits::list_user_deposits),
        )
        .route(
            "/api/v1/users/{id}/withdrawals",
            get(handlers::withdrawals::list_user_withdrawals),
        )
        // Apply authentication middleware to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    // Combine authenticated routes with public routes
    let app = Router::new()
        // Public routes (no API key; webhooks are signature-verified)
        .route("/health", get(handlers::health::health_check))
        .route(
            "/webhooks/{gateway}",
            post(handlers::webhooks::gateway_webhook),
        )
        // Merge authenticated routes
        .merge(authenticated_routes)
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        // Share state with all handlers via State extraction
        .with_state(state);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Start serving HTTP requests
    axum::serve(listener, app).await?;

    Ok(())
}
