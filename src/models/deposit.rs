//! Deposit request models and API request/response types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::payment::Gateway;

/// How the money reaches us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "deposit_method", rename_all = "snake_case")]
pub enum DepositMethod {
    /// User wires money to one of our bank accounts and quotes a reference
    /// code; an admin approves once the transfer shows up.
    BankTransfer,
    /// Card already captured by the payments layer; completes on creation.
    Card,
    /// Redirect checkout; the gateway's webhook completes the request.
    BinancePay,
    /// Admin-entered cash deposit; completes on creation.
    Cash,
}

impl DepositMethod {
    /// Methods that transition straight to `completed` on creation, with the
    /// ledger credit in the same database transaction.
    pub fn auto_completes(self) -> bool {
        matches!(self, DepositMethod::Card | DepositMethod::Cash)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DepositMethod::BankTransfer => "bank_transfer",
            DepositMethod::Card => "card",
            DepositMethod::BinancePay => "binance_pay",
            DepositMethod::Cash => "cash",
        }
    }

    /// Gateway backing this method, when there is one.
    pub fn gateway(self) -> Option<Gateway> {
        match self {
            DepositMethod::Card => Some(Gateway::Stripe),
            DepositMethod::BinancePay => Some(Gateway::BinancePay),
            DepositMethod::BankTransfer | DepositMethod::Cash => None,
        }
    }
}

/// Deposit request lifecycle state.
///
/// `pending -> {approved, rejected}`, `approved -> {completed, failed}`.
/// Terminal states never regress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "deposit_status", rename_all = "snake_case")]
pub enum DepositStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Failed,
}

impl DepositStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DepositStatus::Pending => "pending",
            DepositStatus::Approved => "approved",
            DepositStatus::Rejected => "rejected",
            DepositStatus::Completed => "completed",
            DepositStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DepositStatus::Completed | DepositStatus::Rejected | DepositStatus::Failed
        )
    }

    /// Legality table consulted by every workflow mutation.
    pub fn can_transition(self, next: DepositStatus) -> bool {
        matches!(
            (self, next),
            (DepositStatus::Pending, DepositStatus::Approved)
                | (DepositStatus::Pending, DepositStatus::Rejected)
                | (DepositStatus::Approved, DepositStatus::Completed)
                | (DepositStatus::Approved, DepositStatus::Failed)
        )
    }
}

/// Represents a deposit request row from the database.
///
/// Maps to the `wallet_deposit_requests` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct DepositRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Positive magnitude in major units
    pub amount: Decimal,
    pub currency: String,
    pub method: DepositMethod,
    pub status: DepositStatus,
    pub gateway: Option<Gateway>,
    pub gateway_transaction_id: Option<String>,
    pub bank_account_id: Option<Uuid>,
    pub reference_code: Option<String>,
    /// Admin-entered proof (e.g. bank statement line)
    pub verification: Option<String>,
    pub failure_reason: Option<String>,
    pub initiated_by: Option<Uuid>,
    pub processed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DepositRequest {
    /// Correlation key for the ledger credit this request produces.
    ///
    /// Gateway-backed deposits use the gateway's transaction id; bank
    /// transfers and cash use the generated reference code.
    pub fn ledger_reference(&self) -> String {
        self.gateway_transaction_id
            .clone()
            .or_else(|| self.reference_code.clone())
            .unwrap_or_else(|| format!("deposit-{}", self.id))
    }
}

/// Request body for creating a deposit request.
///
/// # JSON Example
///
/// ```json
/// {
///   "user_id": "550e8400-e29b-41d4-a716-446655440000",
///   "amount": "100.00",
///   "currency": "EUR",
///   "method": "bank_transfer",
///   "bank_account_id": "660e8400-e29b-41d4-a716-446655440001"
/// }
/// ```
///
/// # Validation
///
/// - `bank_transfer` requires `bank_account_id`
/// - `card` requires `gateway_transaction_id` (the capture reference)
#[derive(Debug, Deserialize)]
pub struct CreateDepositRequest {
    pub user_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub method: DepositMethod,
    pub bank_account_id: Option<Uuid>,
    pub gateway_transaction_id: Option<String>,
    pub description: Option<String>,
}

/// Request body for approving a deposit.
#[derive(Debug, Default, Deserialize)]
pub struct ApproveDepositRequest {
    /// Admin-entered proof of receipt
    pub verification: Option<String>,
}

/// Request body for rejecting a deposit.
#[derive(Debug, Deserialize)]
pub struct RejectDepositRequest {
    pub failure_reason: String,
}

/// Response returned for deposit operations.
///
/// `redirect_url` is only present for redirect gateways (Binance Pay) right
/// after creation.
#[derive(Debug, Serialize)]
pub struct DepositResponse {
    #[serde(flatten)]
    pub request: DepositRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_never_regress() {
        let all = [
            DepositStatus::Pending,
            DepositStatus::Approved,
            DepositStatus::Rejected,
            DepositStatus::Completed,
            DepositStatus::Failed,
        ];
        for from in all.iter().copied().filter(|s| s.is_terminal()) {
            for to in all {
                assert!(
                    !from.can_transition(to),
                    "{from:?} must not transition to {to:?}"
                );
            }
        }
    }

    #[test]
    fn pending_splits_into_review_outcomes() {
        assert!(DepositStatus::Pending.can_transition(DepositStatus::Approved));
        assert!(DepositStatus::Pending.can_transition(DepositStatus::Rejected));
        assert!(!DepositStatus::Pending.can_transition(DepositStatus::Completed));
    }

    #[test]
    fn approved_resolves_to_completed_or_failed() {
        assert!(DepositStatus::Approved.can_transition(DepositStatus::Completed));
        assert!(DepositStatus::Approved.can_transition(DepositStatus::Failed));
        assert!(!DepositStatus::Approved.can_transition(DepositStatus::Pending));
        assert!(!DepositStatus::Approved.can_transition(DepositStatus::Rejected));
    }

    #[test]
    fn card_and_cash_auto_complete() {
        assert!(DepositMethod::Card.auto_completes());
        assert!(DepositMethod::Cash.auto_completes());
        assert!(!DepositMethod::BankTransfer.auto_completes());
        assert!(!DepositMethod::BinancePay.auto_completes());
    }
}
