//! Ledger engine - the append-only transaction store and its guards.
//!
//! This service handles:
//! - Recording transactions (the sole mutation primitive)
//! - Idempotency checking against `(reference_number, transaction_type)`
//! - The non-negative balance guard with its administrative escape hatch
//! - Reconciliation of gateway payments and refunds (exactly-once)
//!
//! # Atomicity Guarantees
//!
//! Workflow callers that must combine a status transition with a ledger
//! write run [`record_transaction_tx`] inside their own database
//! transaction; either everything commits or nothing does. The partial
//! unique index on `(reference_number, transaction_type)` turns a lost
//! idempotency race into a constraint violation mapped to `Conflict`.

use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::{AppError, is_unique_violation},
    models::{
        payment::{Gateway, PaymentIntent},
        transaction::{
            Direction, NewTransaction, Transaction, TransactionMetadata, TransactionStatus,
            TransactionType,
        },
        wallet::WalletAccount,
    },
    services::aggregate::{self, AccountAggregate},
};

/// Validate and round a caller-supplied magnitude.
///
/// Rejects non-positive input, rounds to 2 decimal places
/// (midpoint away from zero), and rejects amounts that round to zero.
pub fn normalize_amount(amount: Decimal) -> Result<Decimal, AppError> {
    if amount.is_sign_negative() {
        return Err(AppError::Validation(
            "amount must be a positive magnitude".to_string(),
        ));
    }
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_zero() {
        return Err(AppError::Validation("amount must not be zero".to_string()));
    }
    Ok(rounded)
}

/// Validate a currency code: three ASCII letters, normalized to uppercase.
pub fn normalize_currency(raw: &str) -> Result<String, AppError> {
    let code = raw.trim().to_ascii_uppercase();
    if code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase()) {
        Ok(code)
    } else {
        Err(AppError::Validation(format!(
            "invalid currency code: {raw:?}"
        )))
    }
}

/// Stored sign convention: credit positive, debit negative.
pub fn signed_amount(magnitude: Decimal, direction: Direction) -> Decimal {
    match direction {
        Direction::Credit => magnitude,
        Direction::Debit => -magnitude,
    }
}

/// Idempotency guard: does a ledger row with this correlation key already
/// exist?
pub async fn transaction_exists(
    conn: &mut PgConnection,
    reference_number: &str,
    transaction_type: TransactionType,
) -> Result<bool, AppError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(
            SELECT 1 FROM transactions
            WHERE reference_number = $1 AND transaction_type = $2
        )",
    )
    .bind(reference_number)
    .bind(transaction_type)
    .fetch_one(&mut *conn)
    .await?;

    Ok(exists)
}

/// Get a ledger row by ID.
pub async fn get_transaction(
    pool: &DbPool,
    transaction_id: Uuid,
) -> Result<Option<Transaction>, AppError> {
    let transaction = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
        .bind(transaction_id)
        .fetch_optional(pool)
        .await?;

    Ok(transaction)
}

/// Look up the original payment row a refund references.
pub async fn find_payment_by_reference(
    pool: &DbPool,
    reference_number: &str,
) -> Result<Option<Transaction>, AppError> {
    let transaction = sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions
         WHERE reference_number = $1 AND transaction_type = 'payment'",
    )
    .bind(reference_number)
    .fetch_optional(pool)
    .await?;

    Ok(transaction)
}

/// Record a transaction in its own database transaction.
///
/// Workflows that need the write to commit together with a request-status
/// transition call [`record_transaction_tx`] inside their own transaction
/// instead.
pub async fn record_transaction(
    pool: &DbPool,
    new: NewTransaction,
) -> Result<Transaction, AppError> {
    let mut tx = pool.begin().await?;
    let row = record_transaction_tx(&mut tx, new).await?;
    tx.commit().await?;
    Ok(row)
}

/// Record a transaction on an existing connection/transaction.
///
/// # Process
///
/// 1. Validate magnitude and currency
/// 2. Create the wallet-account row on first use, then lock it FOR UPDATE
/// 3. Enforce the non-negative balance guard (unless `allow_negative`)
/// 4. Insert the append-only row (unique violation -> `Conflict`)
/// 5. Fold the aggregation rules into the cached wallet account
///
/// # Errors
///
/// - `Validation`: zero/negative magnitude, bad currency code
/// - `InsufficientBalance`: completed debit would drive the balance negative
/// - `Conflict`: `(reference_number, transaction_type)` already recorded
pub async fn record_transaction_tx(
    conn: &mut PgConnection,
    new: NewTransaction,
) -> Result<Transaction, AppError> {
    let amount = normalize_amount(new.amount)?;
    let currency = normalize_currency(&new.currency)?;
    let signed = signed_amount(amount, new.direction);

    // First movement in this currency creates the cached account row; the
    // SELECT then holds the row lock until the enclosing transaction ends.
    sqlx::query(
        "INSERT INTO wallet_accounts (user_id, currency) VALUES ($1, $2)
         ON CONFLICT (user_id, currency) DO NOTHING",
    )
    .bind(new.user_id)
    .bind(&currency)
    .execute(&mut *conn)
    .await?;

    let account = sqlx::query_as::<_, WalletAccount>(
        "SELECT user_id, currency, balance, total_spend, last_payment_at, updated_at
         FROM wallet_accounts
         WHERE user_id = $1 AND currency = $2
         FOR UPDATE",
    )
    .bind(new.user_id)
    .bind(&currency)
    .fetch_one(&mut *conn)
    .await?;

    if new.status == TransactionStatus::Completed
        && account.balance + signed < Decimal::ZERO
        && !new.allow_negative
    {
        return Err(AppError::InsufficientBalance);
    }

    let row = sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            user_id,
            amount,
            currency,
            transaction_type,
            direction,
            status,
            description,
            reference_number,
            metadata,
            created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(new.user_id)
    .bind(signed)
    .bind(&currency)
    .bind(new.transaction_type)
    .bind(new.direction)
    .bind(new.status)
    .bind(&new.description)
    .bind(&new.reference_number)
    .bind(&new.metadata)
    .bind(new.created_by)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!(
                "transaction with reference {:?} and type {} already exists",
                new.reference_number.as_deref().unwrap_or(""),
                new.transaction_type.as_str()
            ))
        } else {
            AppError::from(e)
        }
    })?;

    // Only completed rows reach the cached projection; pending/failed rows
    // have no balance effect.
    if row.status == TransactionStatus::Completed {
        let folded = aggregate::apply(
            AccountAggregate {
                balance: account.balance,
                total_spend: account.total_spend,
                last_payment_at: account.last_payment_at,
            },
            row.transaction_type,
            row.amount,
            row.created_at,
        );

        sqlx::query(
            "UPDATE wallet_accounts
             SET balance = $1, total_spend = $2, last_payment_at = $3, updated_at = NOW()
             WHERE user_id = $4 AND currency = $5",
        )
        .bind(folded.balance)
        .bind(folded.total_spend)
        .bind(folded.last_payment_at)
        .bind(row.user_id)
        .bind(&row.currency)
        .execute(&mut *conn)
        .await?;
    }

    tracing::debug!(
        "Recorded {} {} {} {} for user {}",
        row.transaction_type.as_str(),
        row.amount,
        row.currency,
        row.id,
        row.user_id
    );

    Ok(row)
}

/// Reconcile a gateway payment against its payment intent, exactly once.
///
/// Returns `Ok(Some(row))` when the event was fresh, `Ok(None)` when an
/// equivalent transaction already existed (webhook retry, duplicate
/// confirmation call). Errors propagate to the caller so the gateway
/// retries; a silently-lost ledger entry is the worst-case outcome here.
pub async fn ensure_payment_transaction(
    pool: &DbPool,
    intent: &PaymentIntent,
    amount: Decimal,
    currency: &str,
    created_by: Option<Uuid>,
) -> Result<Option<Transaction>, AppError> {
    let mut tx = pool.begin().await?;

    if transaction_exists(&mut tx, &intent.gateway_payment_id, TransactionType::Payment).await? {
        tracing::info!(
            "Payment {} already recorded; treating as applied",
            intent.gateway_payment_id
        );
        tx.commit().await?;
        return Ok(None);
    }

    let metadata = TransactionMetadata::new()
        .gateway(intent.gateway)
        .gateway_payment_id(&intent.gateway_payment_id)
        .payment_intent_id(intent.id)
        .into_value();

    let row = record_transaction_tx(
        &mut tx,
        NewTransaction {
            user_id: intent.user_id,
            amount,
            currency: currency.to_string(),
            transaction_type: TransactionType::Payment,
            direction: Direction::Credit,
            status: TransactionStatus::Completed,
            description: Some(format!(
                "Payment {} via {}",
                intent.gateway_payment_id,
                intent.gateway.as_str()
            )),
            reference_number: Some(intent.gateway_payment_id.clone()),
            metadata: Some(metadata),
            created_by,
            allow_negative: false,
        },
    )
    .await?;

    // The dependent payment-status field gateway adapters keep in sync.
    sqlx::query(
        "UPDATE payment_intents SET status = 'succeeded', paid_at = NOW() WHERE id = $1",
    )
    .bind(intent.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(row))
}

/// Reconcile a gateway-confirmed refund against the original payment,
/// exactly once.
///
/// A fresh refund posts a completed debit (`allow_negative = true`: the
/// gateway already moved the money, the ledger must reflect it even if the
/// wallet was since spent), enriches the original payment's metadata with
/// the refund linkage, and marks the refund row succeeded. Re-submitting
/// the same `gateway_refund_id` is a no-op returning `Ok(None)`.
pub async fn record_gateway_refund(
    pool: &DbPool,
    original: &Transaction,
    gateway: Gateway,
    gateway_refund_id: &str,
    amount: Decimal,
    currency: &str,
    created_by: Option<Uuid>,
) -> Result<Option<Transaction>, AppError> {
    if original.transaction_type != TransactionType::Payment {
        return Err(AppError::Validation(
            "refunds must reference a payment transaction".to_string(),
        ));
    }

    let amount = normalize_amount(amount)?;
    let currency = normalize_currency(currency)?;
    if currency != original.currency {
        return Err(AppError::Validation(format!(
            "refund currency {} does not match payment currency {}",
            currency, original.currency
        )));
    }
    if amount > original.magnitude() {
        return Err(AppError::Validation(
            "refund exceeds the original payment".to_string(),
        ));
    }

    let transaction_type = match gateway {
        Gateway::Iyzico => TransactionType::IyzicoRefund,
        Gateway::Stripe | Gateway::BinancePay => TransactionType::Refund,
    };
    let is_partial = amount < original.magnitude();

    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO refunds (
            payment_transaction_id, gateway, gateway_refund_id, amount, currency, is_partial
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (gateway, gateway_refund_id) DO NOTHING",
    )
    .bind(original.id)
    .bind(gateway)
    .bind(gateway_refund_id)
    .bind(amount)
    .bind(&currency)
    .bind(is_partial)
    .execute(&mut *tx)
    .await?;

    if transaction_exists(&mut tx, gateway_refund_id, transaction_type).await? {
        tracing::info!(
            "Refund {} already recorded; treating as applied",
            gateway_refund_id
        );
        tx.commit().await?;
        return Ok(None);
    }

    let metadata = TransactionMetadata::new()
        .gateway(gateway)
        .gateway_refund_id(gateway_refund_id)
        .original_payment_id(original.id)
        .is_partial_refund(is_partial)
        .into_value();

    let row = record_transaction_tx(
        &mut tx,
        NewTransaction {
            user_id: original.user_id,
            amount,
            currency,
            transaction_type,
            direction: Direction::Debit,
            status: TransactionStatus::Completed,
            description: Some(format!(
                "Refund {} of payment {}",
                gateway_refund_id,
                original.reference_number.as_deref().unwrap_or("-")
            )),
            reference_number: Some(gateway_refund_id.to_string()),
            metadata: Some(metadata),
            created_by,
            allow_negative: true,
        },
    )
    .await?;

    // The one permitted mutation of a historical row: refund linkage.
    sqlx::query(
        "UPDATE transactions
         SET metadata = COALESCE(metadata, '{}'::jsonb) || $1
         WHERE id = $2",
    )
    .bind(serde_json::json!({ "refunded": true, "is_partial_refund": is_partial }))
    .bind(original.id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE refunds SET status = 'succeeded', is_partial = $1
         WHERE gateway = $2 AND gateway_refund_id = $3",
    )
    .bind(is_partial)
    .bind(gateway)
    .bind(gateway_refund_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(row))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn zero_amount_is_rejected() {
        assert!(matches!(
            normalize_amount(Decimal::ZERO),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn negative_amount_is_rejected() {
        assert!(matches!(
            normalize_amount(dec("-5.00")),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn amounts_round_to_two_decimals_midpoint_away_from_zero() {
        assert_eq!(normalize_amount(dec("10.005")).unwrap(), dec("10.01"));
        assert_eq!(normalize_amount(dec("10.004")).unwrap(), dec("10.00"));
        assert_eq!(normalize_amount(dec("100")).unwrap(), dec("100"));
    }

    #[test]
    fn amount_rounding_to_zero_is_rejected() {
        assert!(matches!(
            normalize_amount(dec("0.004")),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn currency_codes_are_normalized_and_validated() {
        assert_eq!(normalize_currency("eur").unwrap(), "EUR");
        assert_eq!(normalize_currency(" TRY ").unwrap(), "TRY");
        assert!(normalize_currency("EURO").is_err());
        assert!(normalize_currency("E1").is_err());
        assert!(normalize_currency("").is_err());
    }

    #[test]
    fn stored_sign_follows_direction() {
        assert_eq!(signed_amount(dec("10.00"), Direction::Credit), dec("10.00"));
        assert_eq!(signed_amount(dec("10.00"), Direction::Debit), dec("-10.00"));
    }
}
