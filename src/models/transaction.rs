//! Ledger transaction models and API request/response types.
//!
//! This module defines:
//! - `Transaction`: the append-only ledger row
//! - The transaction type / direction / status vocabulary
//! - `TransactionMetadata`: typed builder over the free-form metadata column
//! - Request and response types for manual adjustments and reads

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of monetary movement a ledger row records.
///
/// The variant decides how the row folds into the cached wallet aggregate:
/// payments count toward spend, purchases and charges do not, refunds only
/// touch the last-payment timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "transaction_type", rename_all = "snake_case")]
pub enum TransactionType {
    Payment,
    Refund,
    IyzicoRefund,
    ManualCredit,
    ManualDebit,
    Deposit,
    Withdrawal,
    PackagePurchase,
    BookingCharge,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Payment => "payment",
            TransactionType::Refund => "refund",
            TransactionType::IyzicoRefund => "iyzico_refund",
            TransactionType::ManualCredit => "manual_credit",
            TransactionType::ManualDebit => "manual_debit",
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::PackagePurchase => "package_purchase",
            TransactionType::BookingCharge => "booking_charge",
        }
    }
}

/// Whether a row adds to or removes from the wallet balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "transaction_direction", rename_all = "snake_case")]
pub enum Direction {
    Credit,
    Debit,
}

/// Transaction status. Only `completed` rows count toward balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "transaction_status", rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

/// Represents a ledger row from the database.
///
/// # Database Table
///
/// Maps to the append-only `transactions` table. Each row:
/// - Stores a signed amount in major units (credit positive, debit negative)
/// - Carries an optional external correlation key (`reference_number`)
/// - Is never updated after insert, except metadata enrichment on refund
///   linkage
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Transaction {
    /// Unique identifier for this transaction
    pub id: Uuid,

    /// Wallet owner
    pub user_id: Uuid,

    /// Signed amount in major units (e.g. EUR, not cents), 2 decimal places.
    ///
    /// The sign matches `direction`, so `SUM(amount)` over completed rows is
    /// the balance.
    pub amount: Decimal,

    /// Currency code (ISO 4217)
    pub currency: String,

    pub transaction_type: TransactionType,

    pub direction: Direction,

    pub status: TransactionStatus,

    /// Human-readable description
    pub description: Option<String>,

    /// External correlation key (gateway payment/refund id, deposit
    /// reference). At most one row exists per
    /// `(reference_number, transaction_type)` pair.
    pub reference_number: Option<String>,

    /// Gateway-specific fields (JSON)
    pub metadata: Option<serde_json::Value>,

    /// Actor the write is attributed to, or NULL when attribution failed
    pub created_by: Option<Uuid>,

    /// When the row was created
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Unsigned magnitude of the movement.
    pub fn magnitude(&self) -> Decimal {
        self.amount.abs()
    }
}

/// Input to the ledger engine's sole mutation primitive.
///
/// `amount` is a positive magnitude; the engine derives the stored sign from
/// `direction`. `allow_negative` bypasses the non-negative balance guard for
/// administrative corrections and gateway-confirmed refunds only.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub transaction_type: TransactionType,
    pub direction: Direction,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub reference_number: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_by: Option<Uuid>,
    pub allow_negative: bool,
}

/// Typed builder over the JSONB metadata column.
///
/// Producers go through these constructors instead of assembling raw JSON,
/// which keeps gateway-specific fields inspectable without losing
/// extensibility. The stored form stays a plain JSON object.
#[derive(Debug, Clone, Default)]
pub struct TransactionMetadata(serde_json::Map<String, serde_json::Value>);

impl TransactionMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gateway(mut self, gateway: crate::models::payment::Gateway) -> Self {
        self.0
            .insert("gateway".into(), serde_json::json!(gateway.as_str()));
        self
    }

    pub fn gateway_payment_id(mut self, id: &str) -> Self {
        self.0.insert("gateway_payment_id".into(), id.into());
        self
    }

    pub fn gateway_refund_id(mut self, id: &str) -> Self {
        self.0.insert("gateway_refund_id".into(), id.into());
        self
    }

    pub fn payment_intent_id(mut self, id: Uuid) -> Self {
        self.0
            .insert("payment_intent_id".into(), id.to_string().into());
        self
    }

    pub fn deposit_request_id(mut self, id: Uuid) -> Self {
        self.0
            .insert("deposit_request_id".into(), id.to_string().into());
        self
    }

    pub fn withdrawal_request_id(mut self, id: Uuid) -> Self {
        self.0
            .insert("withdrawal_request_id".into(), id.to_string().into());
        self
    }

    pub fn original_payment_id(mut self, id: Uuid) -> Self {
        self.0
            .insert("original_payment_id".into(), id.to_string().into());
        self
    }

    pub fn is_partial_refund(mut self, partial: bool) -> Self {
        self.0.insert("is_partial_refund".into(), partial.into());
        self
    }

    pub fn note(mut self, key: &str, value: serde_json::Value) -> Self {
        self.0.insert(key.to_string(), value);
        self
    }

    pub fn into_value(self) -> serde_json::Value {
        serde_json::Value::Object(self.0)
    }
}

/// Request body for an admin manual adjustment.
///
/// # JSON Example
///
/// ```json
/// {
///   "user_id": "550e8400-e29b-41d4-a716-446655440000",
///   "amount": "25.00",
///   "currency": "EUR",
///   "direction": "credit",
///   "description": "Goodwill credit",
///   "allow_negative": false
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct AdjustmentRequest {
    pub user_id: Uuid,

    /// Positive magnitude in major units
    pub amount: Decimal,

    pub currency: String,

    pub direction: Direction,

    pub description: Option<String>,

    /// Escape hatch for administrative corrections that may drive the
    /// balance negative. Off by default.
    #[serde(default)]
    pub allow_negative: bool,
}

/// Response returned for transaction reads and adjustment creation.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub transaction_type: TransactionType,
    pub direction: Direction,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub reference_number: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionResponse {
    fn from(t: Transaction) -> Self {
        Self {
            id: t.id,
            user_id: t.user_id,
            amount: t.amount,
            currency: t.currency,
            transaction_type: t.transaction_type,
            direction: t.direction,
            status: t.status,
            description: t.description,
            reference_number: t.reference_number,
            created_by: t.created_by,
            created_at: t.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::payment::Gateway;

    #[test]
    fn metadata_builder_produces_flat_object() {
        let value = TransactionMetadata::new()
            .gateway(Gateway::Stripe)
            .gateway_refund_id("re_123")
            .is_partial_refund(true)
            .into_value();

        assert_eq!(value["gateway"], "stripe");
        assert_eq!(value["gateway_refund_id"], "re_123");
        assert_eq!(value["is_partial_refund"], true);
    }

    #[test]
    fn type_vocabulary_round_trips_through_serde() {
        let json = serde_json::to_string(&TransactionType::IyzicoRefund).unwrap();
        assert_eq!(json, "\"iyzico_refund\"");
        let back: TransactionType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TransactionType::IyzicoRefund);
    }
}
