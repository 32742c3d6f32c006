//! Payment intent and refund models, plus the gateway vocabulary.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Supported payment gateways.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "payment_gateway", rename_all = "snake_case")]
pub enum Gateway {
    Stripe,
    Iyzico,
    BinancePay,
}

impl Gateway {
    pub fn as_str(self) -> &'static str {
        match self {
            Gateway::Stripe => "stripe",
            Gateway::Iyzico => "iyzico",
            Gateway::BinancePay => "binance_pay",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "payment_intent_status", rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    Pending,
    Succeeded,
    Failed,
}

/// Application-level payment record a gateway webhook reconciles against.
///
/// # Database Table
///
/// Maps to `payment_intents`. The `(gateway, gateway_payment_id)` pair is
/// unique; webhook retries resolve to the same row.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct PaymentIntent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub gateway: Gateway,
    pub gateway_payment_id: String,
    /// Reference the bookings/shop side uses to find this intent
    pub order_reference: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentIntentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Request body for registering a payment intent.
///
/// The bookings/shop layer creates one of these before sending the user to
/// the gateway; the webhook later reconciles against it.
#[derive(Debug, Deserialize)]
pub struct CreatePaymentIntentRequest {
    pub user_id: Uuid,
    pub gateway: Gateway,
    pub gateway_payment_id: String,
    pub order_reference: Option<String>,
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "refund_status", rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Succeeded,
    Failed,
}

/// Refund record linked to the original payment transaction.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Refund {
    pub id: Uuid,
    pub payment_transaction_id: Uuid,
    pub gateway: Gateway,
    pub gateway_refund_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: RefundStatus,
    pub is_partial: bool,
    pub created_at: DateTime<Utc>,
}

/// Request body for recording a gateway-confirmed refund.
///
/// # JSON Example
///
/// ```json
/// {
///   "payment_transaction_id": "770e8400-e29b-41d4-a716-446655440002",
///   "gateway": "stripe",
///   "gateway_refund_id": "re_456",
///   "amount": "30.00"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateRefundRequest {
    /// Ledger row of the original payment being refunded
    pub payment_transaction_id: Uuid,

    /// Gateway that confirmed the refund
    pub gateway: Gateway,

    /// Gateway's refund id; re-submitting the same id is a no-op
    pub gateway_refund_id: String,

    /// Refunded magnitude in major units
    pub amount: Decimal,
}
