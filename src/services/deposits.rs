//! Deposit workflow - request, review, completion.
//!
//! Lifecycle: `pending -> {approved, rejected}`, `approved -> {completed,
//! failed}`. Every mutation locks the request row (`SELECT ... FOR UPDATE`)
//! and runs the status transition together with the ledger credit in one
//! database transaction: a ledger failure rolls the request back to
//! `pending`, which keeps the partial-failure window observable and
//! retryable instead of silently double- or under-crediting.
//!
//! Gateway order initiation (Binance Pay) happens *before* the local
//! transaction, so a gateway failure never leaves a half-committed row.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    gateways::binance_pay,
    models::{
        deposit::{CreateDepositRequest, DepositMethod, DepositRequest, DepositStatus},
        payment::Gateway,
        transaction::{
            Direction, NewTransaction, TransactionMetadata, TransactionStatus, TransactionType,
        },
    },
    services::ledger,
};

/// Result of creating a deposit request.
///
/// `redirect_url` is only set for redirect gateways (Binance Pay).
#[derive(Debug)]
pub struct DepositOutcome {
    pub request: DepositRequest,
    pub redirect_url: Option<String>,
}

/// Create a deposit request.
///
/// # Method preconditions
///
/// - `bank_transfer`: requires an active `bank_account_id`; a reference code
///   is generated for the user to quote on the transfer
/// - `card`: requires `gateway_transaction_id` (the capture reference);
///   completes on creation
/// - `binance_pay`: initiates a checkout order at the gateway first, then
///   persists the pending request; the webhook completes it later
/// - `cash`: admin-entered; completes on creation
pub async fn create_deposit_request(
    pool: &DbPool,
    config: &Config,
    input: CreateDepositRequest,
    initiated_by: Option<Uuid>,
) -> Result<DepositOutcome, AppError> {
    let amount = ledger::normalize_amount(input.amount)?;
    let currency = ledger::normalize_currency(&input.currency)?;

    let mut gateway_transaction_id = input.gateway_transaction_id.clone();
    let mut reference_code = None;
    let mut redirect_url = None;
    let mut bank_account_id = None;

    match input.method {
        DepositMethod::BankTransfer => {
            let account_id = input.bank_account_id.ok_or_else(|| {
                AppError::Validation(
                    "bank_transfer deposits require bank_account_id".to_string(),
                )
            })?;
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM bank_accounts WHERE id = $1 AND is_active = true)",
            )
            .bind(account_id)
            .fetch_one(pool)
            .await?;
            if !exists {
                return Err(AppError::NotFound("bank account"));
            }
            bank_account_id = Some(account_id);
            reference_code = Some(generate_reference_code("DEP"));
        }
        DepositMethod::Card => {
            if gateway_transaction_id
                .as_deref()
                .is_none_or(|id| id.trim().is_empty())
            {
                return Err(AppError::Validation(
                    "card deposits require gateway_transaction_id".to_string(),
                ));
            }
        }
        DepositMethod::BinancePay => {
            // Gateway call first, before any local write; a timeout is an
            // unknown outcome and nothing is persisted.
            let trade_no = generate_reference_code("BNB");
            let order =
                binance_pay::create_order(config, &trade_no, amount, &currency).await?;
            gateway_transaction_id = Some(order.prepay_id);
            redirect_url = Some(order.checkout_url);
            reference_code = Some(trade_no);
        }
        DepositMethod::Cash => {
            reference_code = Some(generate_reference_code("CSH"));
        }
    }

    let mut tx = pool.begin().await?;

    let request = sqlx::query_as::<_, DepositRequest>(
        r#"
        INSERT INTO wallet_deposit_requests (
            user_id, amount, currency, method, gateway,
            gateway_transaction_id, bank_account_id, reference_code, initiated_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(input.user_id)
    .bind(amount)
    .bind(&currency)
    .bind(input.method)
    .bind(input.method.gateway())
    .bind(&gateway_transaction_id)
    .bind(bank_account_id)
    .bind(&reference_code)
    .bind(initiated_by)
    .fetch_one(&mut *tx)
    .await?;

    // Card and cash deposits complete synchronously, ledger credit included,
    // within the same database transaction as the insert.
    let request = if input.method.auto_completes() {
        complete_locked(&mut tx, request, initiated_by, None).await?
    } else {
        request
    };

    tx.commit().await?;

    Ok(DepositOutcome {
        request,
        redirect_url,
    })
}

/// Approve a pending deposit and credit the wallet.
///
/// Row-locked and atomic: approving a request that is not `pending` is a
/// `Conflict`, never a double credit.
pub async fn approve_deposit_request(
    pool: &DbPool,
    request_id: Uuid,
    processed_by: Option<Uuid>,
    verification: Option<String>,
) -> Result<DepositRequest, AppError> {
    let mut tx = pool.begin().await?;
    let request = lock_request(&mut tx, request_id).await?;
    let request = complete_locked(&mut tx, request, processed_by, verification).await?;
    tx.commit().await?;
    Ok(request)
}

/// Reject a pending deposit. Produces no ledger entry.
pub async fn reject_deposit_request(
    pool: &DbPool,
    request_id: Uuid,
    processed_by: Option<Uuid>,
    failure_reason: String,
) -> Result<DepositRequest, AppError> {
    let mut tx = pool.begin().await?;
    let request = lock_request(&mut tx, request_id).await?;

    if !request.status.can_transition(DepositStatus::Rejected) {
        return Err(AppError::Conflict(format!(
            "deposit request is {}, not pending",
            request.status.as_str()
        )));
    }

    let request = sqlx::query_as::<_, DepositRequest>(
        "UPDATE wallet_deposit_requests
         SET status = 'rejected', failure_reason = $1, processed_by = $2
         WHERE id = $3
         RETURNING *",
    )
    .bind(&failure_reason)
    .bind(processed_by)
    .bind(request_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!("Rejected deposit request {}: {}", request_id, failure_reason);
    Ok(request)
}

/// Complete a redirect-gateway deposit from its webhook.
///
/// Safe under at-least-once delivery: a request that is already `completed`
/// is a no-op; any other terminal state is a `Conflict`.
pub async fn complete_gateway_deposit(
    pool: &DbPool,
    gateway: Gateway,
    order_reference: &str,
    gateway_transaction_id: Option<&str>,
    processed_by: Option<Uuid>,
) -> Result<DepositRequest, AppError> {
    let mut tx = pool.begin().await?;

    let request = sqlx::query_as::<_, DepositRequest>(
        "SELECT * FROM wallet_deposit_requests
         WHERE reference_code = $1 AND gateway = $2
         FOR UPDATE",
    )
    .bind(order_reference)
    .bind(gateway)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("deposit request"))?;

    if request.status == DepositStatus::Completed {
        tracing::info!(
            "Deposit {} already completed; treating webhook as applied",
            request.id
        );
        tx.commit().await?;
        return Ok(request);
    }
    if request.status.is_terminal() {
        return Err(AppError::Conflict(format!(
            "deposit request is {} and cannot be completed",
            request.status.as_str()
        )));
    }

    // Late-arriving gateway id (set at order creation for Binance Pay, but
    // kept for gateways that only report it on completion).
    if let Some(gateway_id) = gateway_transaction_id {
        if request.gateway_transaction_id.is_none() {
            sqlx::query(
                "UPDATE wallet_deposit_requests SET gateway_transaction_id = $1 WHERE id = $2",
            )
            .bind(gateway_id)
            .bind(request.id)
            .execute(&mut *tx)
            .await?;
        }
    }

    let request = lock_request(&mut tx, request.id).await?;
    let request = complete_locked(&mut tx, request, processed_by, None).await?;
    tx.commit().await?;
    Ok(request)
}

/// Get a deposit request by ID.
pub async fn get_deposit_request(
    pool: &DbPool,
    request_id: Uuid,
) -> Result<Option<DepositRequest>, AppError> {
    let request = sqlx::query_as::<_, DepositRequest>(
        "SELECT * FROM wallet_deposit_requests WHERE id = $1",
    )
    .bind(request_id)
    .fetch_optional(pool)
    .await?;

    Ok(request)
}

/// List a user's deposit requests, newest first.
pub async fn list_deposit_requests(
    pool: &DbPool,
    user_id: Uuid,
) -> Result<Vec<DepositRequest>, AppError> {
    let requests = sqlx::query_as::<_, DepositRequest>(
        "SELECT * FROM wallet_deposit_requests
         WHERE user_id = $1
         ORDER BY created_at DESC
         LIMIT 100",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(requests)
}

async fn lock_request(
    conn: &mut PgConnection,
    request_id: Uuid,
) -> Result<DepositRequest, AppError> {
    sqlx::query_as::<_, DepositRequest>(
        "SELECT * FROM wallet_deposit_requests WHERE id = $1 FOR UPDATE",
    )
    .bind(request_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("deposit request"))
}

/// Walk a locked request through `pending -> approved -> completed`, posting
/// exactly one ledger credit in between. Runs on the caller's transaction.
async fn complete_locked(
    conn: &mut PgConnection,
    request: DepositRequest,
    processed_by: Option<Uuid>,
    verification: Option<String>,
) -> Result<DepositRequest, AppError> {
    if !request.status.can_transition(DepositStatus::Approved) {
        return Err(AppError::Conflict(format!(
            "deposit request is {}, not pending",
            request.status.as_str()
        )));
    }

    sqlx::query(
        "UPDATE wallet_deposit_requests
         SET status = 'approved', processed_by = $1,
             verification = COALESCE($2, verification)
         WHERE id = $3",
    )
    .bind(processed_by)
    .bind(&verification)
    .bind(request.id)
    .execute(&mut *conn)
    .await?;

    let mut metadata = TransactionMetadata::new()
        .deposit_request_id(request.id)
        .note("method", request.method.as_str().into());
    if let Some(gateway) = request.gateway {
        metadata = metadata.gateway(gateway);
    }

    ledger::record_transaction_tx(
        conn,
        NewTransaction {
            user_id: request.user_id,
            amount: request.amount,
            currency: request.currency.clone(),
            transaction_type: TransactionType::Deposit,
            direction: Direction::Credit,
            status: TransactionStatus::Completed,
            description: Some(format!("Wallet deposit via {}", request.method.as_str())),
            reference_number: Some(request.ledger_reference()),
            metadata: Some(metadata.into_value()),
            created_by: processed_by.or(request.initiated_by),
            allow_negative: false,
        },
    )
    .await?;

    let request = sqlx::query_as::<_, DepositRequest>(
        "UPDATE wallet_deposit_requests
         SET status = 'completed', completed_at = NOW()
         WHERE id = $1
         RETURNING *",
    )
    .bind(request.id)
    .fetch_one(&mut *conn)
    .await?;

    tracing::info!(
        "Completed deposit request {} for user {} ({} {})",
        request.id,
        request.user_id,
        request.amount,
        request.currency
    );

    Ok(request)
}

/// Random uppercase reference code, e.g. `DEP-9F3A01B2C4`.
fn generate_reference_code(prefix: &str) -> String {
    let bytes: [u8; 5] = rand::random();
    format!("{}-{}", prefix, hex::encode(bytes).to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_codes_are_prefixed_and_unique_enough() {
        let a = generate_reference_code("DEP");
        let b = generate_reference_code("DEP");
        assert!(a.starts_with("DEP-"));
        assert_eq!(a.len(), "DEP-".len() + 10);
        assert_ne!(a, b);
    }
}
