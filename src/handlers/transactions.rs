//! Ledger transaction HTTP handlers.
//!
//! - POST /api/v1/adjustments - admin manual credit/debit
//! - GET /api/v1/transactions/{id} - get a ledger row
//! - GET /api/v1/users/{id}/transactions - list a user's ledger rows

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    error::AppError,
    middleware::auth::{AuthContext, require_admin},
    models::transaction::{
        AdjustmentRequest, Direction, NewTransaction, Transaction, TransactionResponse,
        TransactionStatus, TransactionType,
    },
    services::{actor, ledger},
};

/// Record a manual adjustment (admin).
///
/// # Request Body
///
/// ```json
/// {
///   "user_id": "550e8400-...",
///   "amount": "25.00",
///   "currency": "EUR",
///   "direction": "credit",
///   "description": "Goodwill credit"
/// }
/// ```
///
/// A debit that would drive the balance negative is rejected with 422
/// unless `allow_negative` is set.
pub async fn create_adjustment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<AdjustmentRequest>,
) -> Result<(StatusCode, Json<TransactionResponse>), AppError> {
    require_admin(&auth)?;
    let created_by = actor::resolve_actor_id(&auth);

    let transaction_type = match request.direction {
        Direction::Credit => TransactionType::ManualCredit,
        Direction::Debit => TransactionType::ManualDebit,
    };

    let transaction = ledger::record_transaction(
        &state.pool,
        NewTransaction {
            user_id: request.user_id,
            amount: request.amount,
            currency: request.currency,
            transaction_type,
            direction: request.direction,
            status: TransactionStatus::Completed,
            description: request.description,
            reference_number: None,
            metadata: None,
            created_by,
            allow_negative: request.allow_negative,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(transaction.into())))
}

/// Get a ledger row by ID.
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<TransactionResponse>, AppError> {
    let transaction = ledger::get_transaction(&state.pool, transaction_id)
        .await?
        .ok_or(AppError::NotFound("transaction"))?;

    Ok(Json(transaction.into()))
}

/// List a user's ledger rows, newest first.
pub async fn list_user_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<TransactionResponse>>, AppError> {
    let transactions = sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions
         WHERE user_id = $1
         ORDER BY created_at DESC
         LIMIT 100",
    )
    .bind(user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(transactions.into_iter().map(Into::into).collect()))
}
