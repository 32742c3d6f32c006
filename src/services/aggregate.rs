//! The authoritative aggregation rules for wallet accounts.
//!
//! Both the live ledger path and full replay fold completed transactions
//! through [`apply`], so the cached `wallet_accounts` projection can never
//! follow different rules than reconstruction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::models::transaction::TransactionType;

/// Running aggregate for one `(user, currency)` pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountAggregate {
    pub balance: Decimal,
    pub total_spend: Decimal,
    pub last_payment_at: Option<DateTime<Utc>>,
}

/// Fold one completed transaction into the aggregate.
///
/// Rules:
/// - the signed amount always applies to `balance`
/// - `payment` and `manual_credit` add their magnitude to `total_spend` and
///   set `last_payment_at`
/// - `refund` / `iyzico_refund` set `last_payment_at` only when the refunded
///   magnitude is positive, and never touch `total_spend`
/// - `package_purchase` / `booking_charge` are excluded from `total_spend`
/// - `deposit` / `withdrawal` / `manual_debit` affect the balance only
pub fn apply(
    mut aggregate: AccountAggregate,
    transaction_type: TransactionType,
    signed_amount: Decimal,
    created_at: DateTime<Utc>,
) -> AccountAggregate {
    aggregate.balance += signed_amount;

    match transaction_type {
        TransactionType::Payment | TransactionType::ManualCredit => {
            aggregate.total_spend += signed_amount.abs();
            aggregate.last_payment_at = Some(created_at);
        }
        TransactionType::Refund | TransactionType::IyzicoRefund => {
            if !signed_amount.abs().is_zero() {
                aggregate.last_payment_at = Some(created_at);
            }
        }
        TransactionType::PackagePurchase
        | TransactionType::BookingCharge
        | TransactionType::Deposit
        | TransactionType::Withdrawal
        | TransactionType::ManualDebit => {}
    }

    aggregate
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn payment_adds_to_spend_and_stamps_last_payment() {
        let agg = apply(
            AccountAggregate::default(),
            TransactionType::Payment,
            dec("100.00"),
            at(9),
        );
        assert_eq!(agg.balance, dec("100.00"));
        assert_eq!(agg.total_spend, dec("100.00"));
        assert_eq!(agg.last_payment_at, Some(at(9)));
    }

    #[test]
    fn purchases_and_charges_are_excluded_from_spend() {
        let mut agg = apply(
            AccountAggregate::default(),
            TransactionType::PackagePurchase,
            dec("-40.00"),
            at(10),
        );
        agg = apply(agg, TransactionType::BookingCharge, dec("-15.00"), at(11));
        assert_eq!(agg.balance, dec("-55.00"));
        assert_eq!(agg.total_spend, Decimal::ZERO);
        assert_eq!(agg.last_payment_at, None);
    }

    #[test]
    fn refund_stamps_last_payment_without_touching_spend() {
        let paid = apply(
            AccountAggregate::default(),
            TransactionType::Payment,
            dec("100.00"),
            at(9),
        );
        let refunded = apply(paid, TransactionType::Refund, dec("-30.00"), at(12));
        assert_eq!(refunded.balance, dec("70.00"));
        assert_eq!(refunded.total_spend, dec("100.00"));
        assert_eq!(refunded.last_payment_at, Some(at(12)));
    }

    #[test]
    fn deposits_and_withdrawals_affect_balance_only() {
        let mut agg = apply(
            AccountAggregate::default(),
            TransactionType::Deposit,
            dec("50.00"),
            at(8),
        );
        agg = apply(agg, TransactionType::Withdrawal, dec("-20.00"), at(9));
        assert_eq!(agg.balance, dec("30.00"));
        assert_eq!(agg.total_spend, Decimal::ZERO);
        assert_eq!(agg.last_payment_at, None);
    }

    #[test]
    fn replay_order_gives_latest_payment_timestamp() {
        let mut agg = AccountAggregate::default();
        for hour in [9, 11, 14] {
            agg = apply(agg, TransactionType::Payment, dec("10.00"), at(hour));
        }
        assert_eq!(agg.last_payment_at, Some(at(14)));
        assert_eq!(agg.total_spend, dec("30.00"));
    }
}
