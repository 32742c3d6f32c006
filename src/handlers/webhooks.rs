//! Gateway webhook endpoint.
//!
//! POST /webhooks/{gateway} - public route authenticated by HMAC signature
//! over the raw body, not by API key. Safe under at-least-once delivery:
//! every dispatch path is guarded by the idempotency guard or a
//! terminal-state no-op, so a retried payload changes nothing.
//!
//! Reconciliation failures propagate as error responses so the gateway
//! retries; a silently-lost ledger entry is the worst-case outcome.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
};
use serde_json::json;

use crate::{
    AppState,
    error::AppError,
    gateways::{self, GatewayEvent},
    models::payment::{Gateway, PaymentIntent},
    services::{actor, deposits, ledger},
};

/// Receive and dispatch a gateway webhook.
///
/// # Flow
///
/// 1. Verify the provider's signature over the raw body
/// 2. Normalize the payload into [`GatewayEvent`]s via the adapter
/// 3. Dispatch each event into the ledger/workflow, exactly once
pub async fn gateway_webhook(
    State(state): State<AppState>,
    Path(gateway): Path<Gateway>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let events = verify_and_parse(&state, gateway, &headers, &body)?;

    let system_actor = actor::resolve_system_actor_id(&state.config);
    let total = events.len();
    let mut applied = 0usize;

    for event in events {
        match event {
            GatewayEvent::PaymentSucceeded {
                reference,
                amount,
                currency,
            } => {
                let intent = find_intent(&state, gateway, &reference)
                    .await?
                    .ok_or(AppError::NotFound("payment intent"))?;
                if ledger::ensure_payment_transaction(
                    &state.pool,
                    &intent,
                    amount,
                    &currency,
                    system_actor,
                )
                .await?
                .is_some()
                {
                    applied += 1;
                }
            }
            GatewayEvent::PaymentFailed { reference, reason } => {
                tracing::warn!(
                    "Payment {} via {} failed: {}",
                    reference,
                    gateway.as_str(),
                    reason.as_deref().unwrap_or("no reason given")
                );
                sqlx::query(
                    "UPDATE payment_intents SET status = 'failed'
                     WHERE gateway = $1 AND gateway_payment_id = $2 AND status = 'pending'",
                )
                .bind(gateway)
                .bind(&reference)
                .execute(&state.pool)
                .await?;
            }
            GatewayEvent::RefundSucceeded {
                reference,
                payment_reference,
                amount,
                currency,
            } => {
                let original = ledger::find_payment_by_reference(&state.pool, &payment_reference)
                    .await?
                    .ok_or(AppError::NotFound("original payment transaction"))?;
                if ledger::record_gateway_refund(
                    &state.pool,
                    &original,
                    gateway,
                    &reference,
                    amount,
                    &currency,
                    system_actor,
                )
                .await?
                .is_some()
                {
                    applied += 1;
                }
            }
            GatewayEvent::DepositCompleted {
                order_reference,
                gateway_transaction_id,
            } => {
                deposits::complete_gateway_deposit(
                    &state.pool,
                    gateway,
                    &order_reference,
                    gateway_transaction_id.as_deref(),
                    system_actor,
                )
                .await?;
                applied += 1;
            }
        }
    }

    Ok(Json(json!({
        "received": true,
        "events": total,
        "applied": applied
    })))
}

/// Signature verification + payload normalization, per gateway.
///
/// A gateway whose secret is not configured rejects all webhooks; an
/// unverifiable signature is rejected before any state is touched.
fn verify_and_parse(
    state: &AppState,
    gateway: Gateway,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Vec<GatewayEvent>, AppError> {
    match gateway {
        Gateway::Stripe => {
            let secret = state
                .config
                .stripe_webhook_secret
                .as_deref()
                .ok_or_else(|| {
                    AppError::Gateway("Stripe webhooks are not configured".to_string())
                })?;
            let signature = header(headers, "Stripe-Signature")?;
            gateways::stripe::verify_signature(secret, signature, body)?;
            gateways::stripe::parse_events(body)
        }
        Gateway::Iyzico => {
            let secret = state
                .config
                .iyzico_webhook_secret
                .as_deref()
                .ok_or_else(|| {
                    AppError::Gateway("Iyzico webhooks are not configured".to_string())
                })?;
            let signature = header(headers, "X-Iyz-Signature")?;
            gateways::iyzico::verify_signature(secret, signature, body)?;
            gateways::iyzico::parse_events(body)
        }
        Gateway::BinancePay => {
            let secret = state
                .config
                .binance_pay_webhook_secret
                .as_deref()
                .ok_or_else(|| {
                    AppError::Gateway("Binance Pay webhooks are not configured".to_string())
                })?;
            let timestamp = header(headers, "BinancePay-Timestamp")?;
            let nonce = header(headers, "BinancePay-Nonce")?;
            let signature = header(headers, "BinancePay-Signature")?;
            gateways::binance_pay::verify_signature(secret, timestamp, nonce, signature, body)?;
            gateways::binance_pay::parse_events(body)
        }
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, AppError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::InvalidSignature)
}

async fn find_intent(
    state: &AppState,
    gateway: Gateway,
    gateway_payment_id: &str,
) -> Result<Option<PaymentIntent>, AppError> {
    let intent = sqlx::query_as::<_, PaymentIntent>(
        "SELECT * FROM payment_intents WHERE gateway = $1 AND gateway_payment_id = $2",
    )
    .bind(gateway)
    .bind(gateway_payment_id)
    .fetch_optional(&state.pool)
    .await?;

    Ok(intent)
}
