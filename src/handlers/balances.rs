//! Balance HTTP handlers.
//!
//! - GET /api/v1/users/{id}/balances - derived balances per currency
//! - GET /api/v1/users/{id}/wallet - cached wallet aggregates

use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::{
    AppState,
    error::AppError,
    models::wallet::{CurrencyBalance, WalletAccount},
    services::balance,
};

/// Derived balances for a user, one entry per currency.
///
/// Computed as the signed sum over completed ledger rows - the
/// authoritative figure, independent of the cached projection.
pub async fn get_user_balances(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<CurrencyBalance>>, AppError> {
    let balances = balance::balances_for_user(&state.pool, user_id).await?;
    Ok(Json(balances))
}

/// Cached wallet aggregates for a user (balance, total spend, last payment).
pub async fn get_user_wallet(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<WalletAccount>>, AppError> {
    let accounts = balance::wallet_accounts_for_user(&state.pool, user_id).await?;
    Ok(Json(accounts))
}
