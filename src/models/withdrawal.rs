//! Withdrawal request models and API request/response types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Withdrawal request lifecycle state.
///
/// `pending -> approved -> {completed, failed}`; `pending -> rejected`.
/// A ledger debit is posted only on the `completed` transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "withdrawal_status", rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Failed,
}

impl WithdrawalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Rejected => "rejected",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WithdrawalStatus::Completed | WithdrawalStatus::Rejected | WithdrawalStatus::Failed
        )
    }

    pub fn can_transition(self, next: WithdrawalStatus) -> bool {
        matches!(
            (self, next),
            (WithdrawalStatus::Pending, WithdrawalStatus::Approved)
                | (WithdrawalStatus::Pending, WithdrawalStatus::Rejected)
                | (WithdrawalStatus::Approved, WithdrawalStatus::Completed)
                | (WithdrawalStatus::Approved, WithdrawalStatus::Failed)
        )
    }
}

/// Represents a withdrawal request row from the database.
///
/// Maps to the `wallet_withdrawal_requests` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct WithdrawalRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Positive magnitude in major units
    pub amount: Decimal,
    pub currency: String,
    pub payout_method_id: Uuid,
    pub status: WithdrawalStatus,
    pub approver_id: Option<Uuid>,
    pub processor_id: Option<Uuid>,
    pub auto_approved: bool,
    pub failure_reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Request body for requesting a withdrawal.
///
/// The balance check happens server-side against the derived balance; the
/// client-supplied amount is only the magnitude to withdraw.
#[derive(Debug, Deserialize)]
pub struct CreateWithdrawalRequest {
    pub user_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub payout_method_id: Uuid,
}

/// Request body for approving a withdrawal.
#[derive(Debug, Default, Deserialize)]
pub struct ApproveWithdrawalRequest {
    #[serde(default)]
    pub auto_approved: bool,
}

/// Request body for rejecting a withdrawal.
#[derive(Debug, Deserialize)]
pub struct RejectWithdrawalRequest {
    pub failure_reason: String,
}

/// Request body for finalizing an approved withdrawal.
///
/// `success = true` posts the ledger debit and completes the request;
/// `success = false` marks it failed and moves no funds.
#[derive(Debug, Deserialize)]
pub struct FinalizeWithdrawalRequest {
    pub success: bool,
    pub failure_reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_never_regress() {
        let all = [
            WithdrawalStatus::Pending,
            WithdrawalStatus::Approved,
            WithdrawalStatus::Rejected,
            WithdrawalStatus::Completed,
            WithdrawalStatus::Failed,
        ];
        for from in all.iter().copied().filter(|s| s.is_terminal()) {
            for to in all {
                assert!(!from.can_transition(to));
            }
        }
    }

    #[test]
    fn funds_only_move_out_of_approved() {
        assert!(WithdrawalStatus::Approved.can_transition(WithdrawalStatus::Completed));
        assert!(!WithdrawalStatus::Pending.can_transition(WithdrawalStatus::Completed));
    }
}
