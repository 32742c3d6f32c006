//! Withdrawal workflow - request, approval, finalization.
//!
//! Lifecycle: `pending -> approved -> {completed, failed}`;
//! `pending -> rejected`. Funds leave the wallet only on successful
//! finalization, where the status transition and the ledger debit commit in
//! the same database transaction. A failed finalization posts nothing.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        transaction::{
            Direction, NewTransaction, TransactionMetadata, TransactionStatus, TransactionType,
        },
        withdrawal::{CreateWithdrawalRequest, WithdrawalRequest, WithdrawalStatus},
    },
    services::{balance, ledger},
};

/// Create a withdrawal request.
///
/// The balance check runs server-side against the derived balance; the
/// request never reaches `pending` if funds are insufficient. The final
/// guard at debit time catches balances that drop in between.
pub async fn request_withdrawal(
    pool: &DbPool,
    input: CreateWithdrawalRequest,
) -> Result<WithdrawalRequest, AppError> {
    let amount = ledger::normalize_amount(input.amount)?;
    let currency = ledger::normalize_currency(&input.currency)?;

    let owns_method: bool = sqlx::query_scalar(
        "SELECT EXISTS(
            SELECT 1 FROM payout_methods
            WHERE id = $1 AND user_id = $2 AND is_active = true
        )",
    )
    .bind(input.payout_method_id)
    .bind(input.user_id)
    .fetch_one(pool)
    .await?;
    if !owns_method {
        return Err(AppError::NotFound("payout method"));
    }

    let available = balance::balance_for(pool, input.user_id, &currency).await?;
    if available < amount {
        return Err(AppError::InsufficientBalance);
    }

    let request = sqlx::query_as::<_, WithdrawalRequest>(
        r#"
        INSERT INTO wallet_withdrawal_requests (user_id, amount, currency, payout_method_id)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(input.user_id)
    .bind(amount)
    .bind(&currency)
    .bind(input.payout_method_id)
    .fetch_one(pool)
    .await?;

    Ok(request)
}

/// Approve a pending withdrawal. Does not move funds.
pub async fn approve_withdrawal(
    pool: &DbPool,
    request_id: Uuid,
    approver_id: Option<Uuid>,
    auto_approved: bool,
) -> Result<WithdrawalRequest, AppError> {
    let mut tx = pool.begin().await?;
    let request = lock_request(&mut tx, request_id).await?;

    if !request.status.can_transition(WithdrawalStatus::Approved) {
        return Err(AppError::Conflict(format!(
            "withdrawal request is {}, not pending",
            request.status.as_str()
        )));
    }

    let request = sqlx::query_as::<_, WithdrawalRequest>(
        "UPDATE wallet_withdrawal_requests
         SET status = 'approved', approver_id = $1, auto_approved = $2
         WHERE id = $3
         RETURNING *",
    )
    .bind(approver_id)
    .bind(auto_approved)
    .bind(request_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(request)
}

/// Reject a pending withdrawal. Produces no ledger entry.
pub async fn reject_withdrawal(
    pool: &DbPool,
    request_id: Uuid,
    processor_id: Option<Uuid>,
    failure_reason: String,
) -> Result<WithdrawalRequest, AppError> {
    let mut tx = pool.begin().await?;
    let request = lock_request(&mut tx, request_id).await?;

    if !request.status.can_transition(WithdrawalStatus::Rejected) {
        return Err(AppError::Conflict(format!(
            "withdrawal request is {}, not pending",
            request.status.as_str()
        )));
    }

    let request = sqlx::query_as::<_, WithdrawalRequest>(
        "UPDATE wallet_withdrawal_requests
         SET status = 'rejected', failure_reason = $1, processor_id = $2
         WHERE id = $3
         RETURNING *",
    )
    .bind(&failure_reason)
    .bind(processor_id)
    .bind(request_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(request)
}

/// Finalize an approved withdrawal.
///
/// `success = true`: transition to `completed` and post the ledger debit in
/// one database transaction. An insufficient balance rolls everything back,
/// leaving the request `approved` and retryable after correction.
///
/// `success = false`: transition to `failed` with the given reason; no
/// ledger entry is ever produced on this path.
pub async fn finalize_withdrawal(
    pool: &DbPool,
    request_id: Uuid,
    processor_id: Option<Uuid>,
    success: bool,
    failure_reason: Option<String>,
    payout_metadata: Option<serde_json::Value>,
) -> Result<WithdrawalRequest, AppError> {
    let mut tx = pool.begin().await?;
    let request = lock_request(&mut tx, request_id).await?;

    let target = if success {
        WithdrawalStatus::Completed
    } else {
        WithdrawalStatus::Failed
    };
    if !request.status.can_transition(target) {
        let detail = if request.status.is_terminal() {
            "already finalized"
        } else {
            "not approved yet"
        };
        return Err(AppError::Conflict(format!(
            "withdrawal request is {}, {}",
            request.status.as_str(),
            detail
        )));
    }

    if !success {
        let request = sqlx::query_as::<_, WithdrawalRequest>(
            "UPDATE wallet_withdrawal_requests
             SET status = 'failed', failure_reason = $1, processor_id = $2,
                 metadata = COALESCE($3, metadata)
             WHERE id = $4
             RETURNING *",
        )
        .bind(&failure_reason)
        .bind(processor_id)
        .bind(&payout_metadata)
        .bind(request_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(
            "Withdrawal {} finalized as failed: {}",
            request_id,
            request.failure_reason.as_deref().unwrap_or("no reason given")
        );
        return Ok(request);
    }

    let mut metadata = TransactionMetadata::new()
        .withdrawal_request_id(request.id)
        .note("payout_method_id", request.payout_method_id.to_string().into());
    if let Some(ref payout) = payout_metadata {
        metadata = metadata.note("payout", payout.clone());
    }

    ledger::record_transaction_tx(
        &mut tx,
        NewTransaction {
            user_id: request.user_id,
            amount: request.amount,
            currency: request.currency.clone(),
            transaction_type: TransactionType::Withdrawal,
            direction: Direction::Debit,
            status: TransactionStatus::Completed,
            description: Some("Wallet withdrawal".to_string()),
            reference_number: Some(format!("withdrawal-{}", request.id)),
            metadata: Some(metadata.into_value()),
            created_by: processor_id,
            allow_negative: false,
        },
    )
    .await?;

    let request = sqlx::query_as::<_, WithdrawalRequest>(
        "UPDATE wallet_withdrawal_requests
         SET status = 'completed', processor_id = $1, completed_at = NOW(),
             metadata = COALESCE($2, metadata)
         WHERE id = $3
         RETURNING *",
    )
    .bind(processor_id)
    .bind(&payout_metadata)
    .bind(request_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!(
        "Completed withdrawal {} for user {} ({} {})",
        request.id,
        request.user_id,
        request.amount,
        request.currency
    );
    Ok(request)
}

/// Get a withdrawal request by ID.
pub async fn get_withdrawal_request(
    pool: &DbPool,
    request_id: Uuid,
) -> Result<Option<WithdrawalRequest>, AppError> {
    let request = sqlx::query_as::<_, WithdrawalRequest>(
        "SELECT * FROM wallet_withdrawal_requests WHERE id = $1",
    )
    .bind(request_id)
    .fetch_optional(pool)
    .await?;

    Ok(request)
}

/// List a user's withdrawal requests, newest first.
pub async fn list_withdrawal_requests(
    pool: &DbPool,
    user_id: Uuid,
) -> Result<Vec<WithdrawalRequest>, AppError> {
    let requests = sqlx::query_as::<_, WithdrawalRequest>(
        "SELECT * FROM wallet_withdrawal_requests
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
) -> Result<WithdrawalRequest, AppError> {
    sqlx::query_as::<_, WithdrawalRequest>(
        "SELECT * FROM wallet_withdrawal_requests WHERE id = $1 FOR UPDATE",
    )
    .bind(request_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("withdrawal request"))
}
