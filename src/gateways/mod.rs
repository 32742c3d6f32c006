//! Gateway reconciliation adapters.
//!
//! One adapter per provider. Each adapter verifies the provider's webhook
//! signature over the raw body and maps the payload into the normalized
//! [`GatewayEvent`] enum before anything reaches the ledger - no duck-typed
//! payload access past this boundary.

pub mod binance_pay;
pub mod iyzico;
pub mod stripe;

use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sha2::{Sha256, Sha512};

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Normalized internal event type every provider payload is mapped into.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    /// A payment was captured; reconciled against a payment intent.
    PaymentSucceeded {
        /// Gateway payment id (the ledger reference)
        reference: String,
        /// Major units, 2 decimals
        amount: Decimal,
        currency: String,
    },
    /// A payment attempt failed; the intent is marked failed, nothing else.
    PaymentFailed {
        reference: String,
        reason: Option<String>,
    },
    /// A refund was confirmed; reconciled against the original payment.
    RefundSucceeded {
        /// Gateway refund id (the ledger reference)
        reference: String,
        /// Gateway payment id of the refunded payment
        payment_reference: String,
        amount: Decimal,
        currency: String,
    },
    /// A redirect-gateway deposit finished; completes the deposit request.
    DepositCompleted {
        order_reference: String,
        gateway_transaction_id: Option<String>,
    },
}

/// Convert a minor-unit amount (cents) to major units with 2 decimals.
pub(crate) fn minor_to_major(minor: i64) -> Decimal {
    (Decimal::from(minor) / Decimal::ONE_HUNDRED).round_dp(2)
}

/// Test helper mirroring what the providers sign with.
#[cfg(test)]
pub(crate) fn sign_sha256(secret: &str, data: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key length is valid");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time HMAC-SHA256 check against a hex-encoded signature.
pub(crate) fn verify_sha256(secret: &str, data: &[u8], signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key length is valid");
    mac.update(data);
    mac.verify_slice(&signature).is_ok()
}

pub(crate) fn sign_sha512(secret: &str, data: &[u8]) -> String {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).expect("HMAC key length is valid");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time HMAC-SHA512 check against a hex-encoded signature.
pub(crate) fn verify_sha512(secret: &str, data: &[u8], signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).expect("HMAC key length is valid");
    mac.update(data);
    mac.verify_slice(&signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn minor_units_divide_by_one_hundred() {
        assert_eq!(minor_to_major(12345), dec("123.45"));
        assert_eq!(minor_to_major(100), dec("1.00"));
        assert_eq!(minor_to_major(1), dec("0.01"));
        assert_eq!(minor_to_major(0), dec("0.00"));
    }

    #[test]
    fn hmac_sign_verify_round_trip() {
        let body = br#"{"hello":"world"}"#;
        let signature = sign_sha256("whsec_test", body);
        assert!(verify_sha256("whsec_test", body, &signature));
        assert!(!verify_sha256("whsec_other", body, &signature));
        assert!(!verify_sha256("whsec_test", b"tampered", &signature));
        assert!(!verify_sha256("whsec_test", body, "not-hex"));
    }

    #[test]
    fn sha512_variant_round_trips_case_insensitively() {
        let body = b"payload";
        let signature = sign_sha512("secret", body).to_uppercase();
        assert!(verify_sha512("secret", body, &signature));
        assert!(!verify_sha512("wrong", body, &signature));
    }
}
