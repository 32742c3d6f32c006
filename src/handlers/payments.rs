//! Payment intent and refund HTTP handlers.
//!
//! - POST /api/v1/payment-intents - register an intent to reconcile against
//! - GET /api/v1/payment-intents/{id} - get an intent
//! - POST /api/v1/refunds - record a gateway-confirmed refund (admin)
//! - GET /api/v1/refunds/{id} - get a refund record

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, is_unique_violation},
    middleware::auth::{AuthContext, require_admin},
    models::{
        api_key::ApiKeyRole,
        payment::{CreatePaymentIntentRequest, CreateRefundRequest, PaymentIntent, Refund},
        transaction::TransactionResponse,
    },
    services::{actor, ledger},
};

/// Register a payment intent.
///
/// The bookings/shop layer calls this before sending the user to the
/// gateway; the gateway's webhook later reconciles against it. Registering
/// the same `(gateway, gateway_payment_id)` twice is a 409.
pub async fn create_payment_intent(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreatePaymentIntentRequest>,
) -> Result<(StatusCode, Json<PaymentIntent>), AppError> {
    // Machine callers and admins only; user keys have no business here.
    if auth.role == ApiKeyRole::User {
        return Err(AppError::Forbidden);
    }

    let amount = ledger::normalize_amount(request.amount)?;
    let currency = ledger::normalize_currency(&request.currency)?;

    let intent = sqlx::query_as::<_, PaymentIntent>(
        r#"
        INSERT INTO payment_intents (
            user_id, gateway, gateway_payment_id, order_reference, amount, currency
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(request.user_id)
    .bind(request.gateway)
    .bind(&request.gateway_payment_id)
    .bind(&request.order_reference)
    .bind(amount)
    .bind(&currency)
    .fetch_one(&state.pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!(
                "payment intent {} already registered for {}",
                request.gateway_payment_id,
                request.gateway.as_str()
            ))
        } else {
            AppError::from(e)
        }
    })?;

    Ok((StatusCode::CREATED, Json(intent)))
}

/// Get a payment intent by ID.
pub async fn get_payment_intent(
    State(state): State<AppState>,
    Path(intent_id): Path<Uuid>,
) -> Result<Json<PaymentIntent>, AppError> {
    let intent =
        sqlx::query_as::<_, PaymentIntent>("SELECT * FROM payment_intents WHERE id = $1")
            .bind(intent_id)
            .fetch_optional(&state.pool)
            .await?
            .ok_or(AppError::NotFound("payment intent"))?;

    Ok(Json(intent))
}

/// Record a gateway-confirmed refund against a payment (admin).
///
/// The refund must already exist at the gateway (issuing it there is the
/// payments layer's job); this endpoint reconciles it into the ledger.
/// Re-submitting the same `gateway_refund_id` returns 409.
pub async fn create_refund(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateRefundRequest>,
) -> Result<(StatusCode, Json<TransactionResponse>), AppError> {
    require_admin(&auth)?;
    let created_by = actor::resolve_actor_id(&auth);

    let original = ledger::get_transaction(&state.pool, request.payment_transaction_id)
        .await?
        .ok_or(AppError::NotFound("payment transaction"))?;
    let currency = original.currency.clone();

    let recorded = ledger::record_gateway_refund(
        &state.pool,
        &original,
        request.gateway,
        &request.gateway_refund_id,
        request.amount,
        &currency,
        created_by,
    )
    .await?;

    match recorded {
        Some(transaction) => Ok((StatusCode::CREATED, Json(transaction.into()))),
        None => Err(AppError::Conflict(format!(
            "refund {} already recorded",
            request.gateway_refund_id
        ))),
    }
}

/// Get a refund record by ID.
pub async fn get_refund(
    State(state): State<AppState>,
    Path(refund_id): Path<Uuid>,
) -> Result<Json<Refund>, AppError> {
    let refund = sqlx::query_as::<_, Refund>("SELECT * FROM refunds WHERE id = $1")
        .bind(refund_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::NotFound("refund"))?;

    Ok(Json(refund))
}
