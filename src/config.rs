//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `MAX_DB_CONNECTIONS` (optional): connection pool size, defaults to 5
/// - `SYSTEM_ACTOR_ID` (optional): identity attributed to unattended
///   webhook-originated ledger writes
/// - `STRIPE_WEBHOOK_SECRET` / `IYZICO_WEBHOOK_SECRET` /
///   `BINANCE_PAY_WEBHOOK_SECRET` (optional): per-gateway signing secrets;
///   a gateway whose secret is unset rejects all of its webhooks
/// - `BINANCE_PAY_API_BASE` / `BINANCE_PAY_KEY` / `BINANCE_PAY_SECRET`
///   (optional): credentials for outbound Binance Pay order initiation
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_db_connections")]
    pub max_db_connections: u32,

    /// Actor attributed to system-originated writes (webhooks, gateway
    /// completions). Validated by the actor resolver at use time.
    pub system_actor_id: Option<String>,

    pub stripe_webhook_secret: Option<String>,
    pub iyzico_webhook_secret: Option<String>,
    pub binance_pay_webhook_secret: Option<String>,

    #[serde(default = "default_binance_pay_api_base")]
    pub binance_pay_api_base: String,
    pub binance_pay_key: Option<String>,
    pub binance_pay_secret: Option<String>,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_max_db_connections() -> u32 {
    5
}

fn default_binance_pay_api_base() -> String {
    "https://bpay.binanceapi.com".to_string()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Parse environment variables into Config struct
        // Field names are automatically converted: database_url -> DATABASE_URL
        envy::from_env::<Config>()
    }
}
