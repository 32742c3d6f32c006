//! Cached wallet aggregate models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// Cached projection of the ledger for one `(user, currency)` pair.
///
/// # Database Table
///
/// Maps to `wallet_accounts`. The row is updated in the same database
/// transaction as every completed ledger insert and is rebuildable by full
/// replay; the `transactions` table remains the source of truth.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct WalletAccount {
    pub user_id: Uuid,

    /// Currency code (ISO 4217)
    pub currency: String,

    /// Signed sum of all completed transactions
    pub balance: Decimal,

    /// Total the user has paid in (payments and manual credits)
    pub total_spend: Decimal,

    /// When the user last paid (or was refunded a positive amount)
    pub last_payment_at: Option<DateTime<Utc>>,

    pub updated_at: DateTime<Utc>,
}

/// One currency's derived balance, as reported by the balance calculator.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct CurrencyBalance {
    pub currency: String,
    pub balance: Decimal,
}
