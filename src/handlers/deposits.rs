//! Deposit workflow HTTP handlers.
//!
//! - POST /api/v1/deposits - submit a deposit request
//! - POST /api/v1/deposits/{id}/approve - admin approval (credits the wallet)
//! - POST /api/v1/deposits/{id}/reject - admin rejection
//! - GET /api/v1/deposits/{id} - get a deposit request
//! - GET /api/v1/users/{id}/deposits - list a user's deposit requests

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
    models::deposit::{
        ApproveDepositRequest, CreateDepositRequest, DepositMethod, DepositResponse,
        RejectDepositRequest,
    },
    services::{actor, deposits},
};

/// Submit a deposit request.
///
/// # Request Body
///
/// ```json
/// {
///   "user_id": "550e8400-...",
///   "amount": "100.00",
///   "currency": "EUR",
///   "method": "bank_transfer",
///   "bank_account_id": "660e8400-..."
/// }
/// ```
///
/// # Response (201)
///
/// The persisted request; `redirect_url` is present for redirect gateways.
pub async fn create_deposit(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateDepositRequest>,
) -> Result<(StatusCode, Json<DepositResponse>), AppError> {
    // Cash deposits are entered by staff only.
    if request.method == DepositMethod::Cash {
        require_admin(&auth)?;
    }

    let initiated_by = actor::resolve_actor_id(&auth);
    let outcome =
        deposits::create_deposit_request(&state.pool, &state.config, request, initiated_by)
            .await?;

    Ok((
        StatusCode::CREATED,
        Json(DepositResponse {
            request: outcome.request,
            redirect_url: outcome.redirect_url,
        }),
    ))
}

/// Approve a pending deposit (admin).
///
/// Credits the wallet exactly once; approving a non-pending request
/// returns 409.
pub async fn approve_deposit(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(request_id): Path<Uuid>,
    Json(body): Json<ApproveDepositRequest>,
) -> Result<Json<DepositResponse>, AppError> {
    require_admin(&auth)?;
    let processed_by = actor::resolve_actor_id(&auth);

    let request =
        deposits::approve_deposit_request(&state.pool, request_id, processed_by, body.verification)
            .await?;

    Ok(Json(DepositResponse {
        request,
        redirect_url: None,
    }))
}

/// Reject a pending deposit (admin). No ledger entry is produced.
pub async fn reject_deposit(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(request_id): Path<Uuid>,
    Json(body): Json<RejectDepositRequest>,
) -> Result<Json<DepositResponse>, AppError> {
    require_admin(&auth)?;
    let processed_by = actor::resolve_actor_id(&auth);

    let request = deposits::reject_deposit_request(
        &state.pool,
        request_id,
        processed_by,
        body.failure_reason,
    )
    .await?;

    Ok(Json(DepositResponse {
        request,
        redirect_url: None,
    }))
}

/// Get a deposit request by ID.
pub async fn get_deposit(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<DepositResponse>, AppError> {
    let request = deposits::get_deposit_request(&state.pool, request_id)
        .await?
        .ok_or(AppError::NotFound("deposit request"))?;

    Ok(Json(DepositResponse {
        request,
        redirect_url: None,
    }))
}

/// List a user's deposit requests, newest first.
pub async fn list_user_deposits(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<DepositResponse>>, AppError> {
    let requests = deposits::list_deposit_requests(&state.pool, user_id).await?;

    Ok(Json(
        requests
            .into_iter()
            .map(|request| DepositResponse {
                request,
                redirect_url: None,
            })
            .collect(),
    ))
}
