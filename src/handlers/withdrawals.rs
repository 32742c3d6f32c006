//! Withdrawal workflow HTTP handlers.
//!
//! - POST /api/v1/withdrawals - request a withdrawal
//! - POST /api/v1/withdrawals/{id}/approve - admin approval (no funds move)
//! - POST /api/v1/withdrawals/{id}/reject - admin rejection
//! - POST /api/v1/withdrawals/{id}/finalize - admin finalization
//! - GET /api/v1/withdrawals/{id} - get a withdrawal request
//! - GET /api/v1/users/{id}/withdrawals - list a user's withdrawal requests

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
    models::withdrawal::{
        ApproveWithdrawalRequest, CreateWithdrawalRequest, FinalizeWithdrawalRequest,
        RejectWithdrawalRequest, WithdrawalRequest,
    },
    services::{actor, withdrawals},
};

/// Request a withdrawal.
///
/// The available balance is checked server-side against the derived sum;
/// a request exceeding it is rejected with 422 and never reaches `pending`.
pub async fn create_withdrawal(
    State(state): State<AppState>,
    Json(request): Json<CreateWithdrawalRequest>,
) -> Result<(StatusCode, Json<WithdrawalRequest>), AppError> {
    let request = withdrawals::request_withdrawal(&state.pool, request).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// Approve a pending withdrawal (admin). Funds do not move yet.
pub async fn approve_withdrawal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(request_id): Path<Uuid>,
    Json(body): Json<ApproveWithdrawalRequest>,
) -> Result<Json<WithdrawalRequest>, AppError> {
    require_admin(&auth)?;
    let approver_id = actor::resolve_actor_id(&auth);

    let request = withdrawals::approve_withdrawal(
        &state.pool,
        request_id,
        approver_id,
        body.auto_approved,
    )
    .await?;

    Ok(Json(request))
}

/// Reject a pending withdrawal (admin). No ledger entry is produced.
pub async fn reject_withdrawal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(request_id): Path<Uuid>,
    Json(body): Json<RejectWithdrawalRequest>,
) -> Result<Json<WithdrawalRequest>, AppError> {
    require_admin(&auth)?;
    let processor_id = actor::resolve_actor_id(&auth);

    let request = withdrawals::reject_withdrawal(
        &state.pool,
        request_id,
        processor_id,
        body.failure_reason,
    )
    .await?;

    Ok(Json(request))
}

/// Finalize an approved withdrawal (admin).
///
/// `success = true` debits the wallet and completes the request in one
/// database transaction; `success = false` marks it failed and moves no
/// funds.
pub async fn finalize_withdrawal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(request_id): Path<Uuid>,
    Json(body): Json<FinalizeWithdrawalRequest>,
) -> Result<Json<WithdrawalRequest>, AppError> {
    require_admin(&auth)?;
    let processor_id = actor::resolve_actor_id(&auth);

    let request = withdrawals::finalize_withdrawal(
        &state.pool,
        request_id,
        processor_id,
        body.success,
        body.failure_reason,
        body.metadata,
    )
    .await?;

    Ok(Json(request))
}

/// Get a withdrawal request by ID.
pub async fn get_withdrawal(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<WithdrawalRequest>, AppError> {
    let request = withdrawals::get_withdrawal_request(&state.pool, request_id)
        .await?
        .ok_or(AppError::NotFound("withdrawal request"))?;

    Ok(Json(request))
}

/// List a user's withdrawal requests, newest first.
pub async fn list_user_withdrawals(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<WithdrawalRequest>>, AppError> {
    let requests = withdrawals::list_withdrawal_requests(&state.pool, user_id).await?;
    Ok(Json(requests))
}
