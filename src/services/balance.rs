//! Balance calculator - derived balances and full-replay reconstruction.
//!
//! The derived balance is the signed sum of completed ledger rows, computed
//! per `(user, currency)`. The cached `wallet_accounts` projection is kept
//! consistent by the ledger engine and can be rebuilt from scratch here.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        transaction::Transaction,
        wallet::{CurrencyBalance, WalletAccount},
    },
    services::aggregate::{self, AccountAggregate},
};

/// Derived balance for one user and currency.
pub async fn balance_for(
    pool: &DbPool,
    user_id: Uuid,
    currency: &str,
) -> Result<Decimal, AppError> {
    let balance: Decimal = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0)
         FROM transactions
         WHERE user_id = $1 AND currency = $2 AND status = 'completed'",
    )
    .bind(user_id)
    .bind(currency)
    .fetch_one(pool)
    .await?;

    Ok(balance)
}

/// Derived balances for every currency a user has moved money in.
pub async fn balances_for_user(
    pool: &DbPool,
    user_id: Uuid,
) -> Result<Vec<CurrencyBalance>, AppError> {
    let balances = sqlx::query_as::<_, CurrencyBalance>(
        "SELECT currency, COALESCE(SUM(amount), 0) AS balance
         FROM transactions
         WHERE user_id = $1 AND status = 'completed'
         GROUP BY currency
         ORDER BY currency",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(balances)
}

/// Cached wallet-account rows for a user (balance, total spend, last payment).
pub async fn wallet_accounts_for_user(
    pool: &DbPool,
    user_id: Uuid,
) -> Result<Vec<WalletAccount>, AppError> {
    let accounts = sqlx::query_as::<_, WalletAccount>(
        "SELECT user_id, currency, balance, total_spend, last_payment_at, updated_at
         FROM wallet_accounts
         WHERE user_id = $1
         ORDER BY currency",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(accounts)
}

/// Rebuild every cached wallet-account row by replaying the ledger.
///
/// Replays each user's completed transactions in `(created_at, id)` order
/// through the same aggregation rules the live path uses, and upserts the
/// corrected rows. Used by the one-shot `--rebuild-balances` utility for
/// accounts whose cached projection is stale or missing.
///
/// Returns the number of `(user, currency)` rows written.
pub async fn rebuild_wallet_accounts(pool: &DbPool) -> Result<u64, AppError> {
    let mut tx = pool.begin().await?;

    let pairs: Vec<(Uuid, String)> =
        sqlx::query_as("SELECT DISTINCT user_id, currency FROM transactions")
            .fetch_all(&mut *tx)
            .await?;

    let mut written = 0u64;
    for (user_id, currency) in pairs {
        let transactions = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions
             WHERE user_id = $1 AND currency = $2 AND status = 'completed'
             ORDER BY created_at, id",
        )
        .bind(user_id)
        .bind(&currency)
        .fetch_all(&mut *tx)
        .await?;

        let folded = transactions
            .iter()
            .fold(AccountAggregate::default(), |agg, row| {
                aggregate::apply(agg, row.transaction_type, row.amount, row.created_at)
            });

        sqlx::query(
            "INSERT INTO wallet_accounts
                 (user_id, currency, balance, total_spend, last_payment_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, NOW())
             ON CONFLICT (user_id, currency) DO UPDATE
                 SET balance = EXCLUDED.balance,
                     total_spend = EXCLUDED.total_spend,
                     last_payment_at = EXCLUDED.last_payment_at,
                     updated_at = NOW()",
        )
        .bind(user_id)
        .bind(&currency)
        .bind(folded.balance)
        .bind(folded.total_spend)
        .bind(folded.last_payment_at)
        .execute(&mut *tx)
        .await?;

        written += 1;
    }

    tx.commit().await?;
    tracing::info!("Rebuilt {} wallet account rows from the ledger", written);
    Ok(written)
}
