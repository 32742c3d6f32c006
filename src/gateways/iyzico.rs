//! Iyzico webhook adapter.
//!
//! Verifies the `X-Iyz-Signature` header (hex HMAC-SHA256 over the raw
//! body) and maps notifications into [`GatewayEvent`]. Iyzico reports
//! amounts as decimal strings in major units.

use rust_decimal::Decimal;
use serde::Deserialize;

use super::{GatewayEvent, verify_sha256};
use crate::error::AppError;

/// Verify the `X-Iyz-Signature` header against the raw request body.
pub fn verify_signature(secret: &str, header: &str, body: &[u8]) -> Result<(), AppError> {
    if verify_sha256(secret, body, header) {
        Ok(())
    } else {
        Err(AppError::InvalidSignature)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IyzicoNotification {
    iyzi_event_type: String,
    payment_id: Option<String>,
    refund_id: Option<String>,
    price: Option<Decimal>,
    refund_price: Option<Decimal>,
    currency: Option<String>,
    status: Option<String>,
}

/// Map an Iyzico notification into normalized events.
pub fn parse_events(body: &[u8]) -> Result<Vec<GatewayEvent>, AppError> {
    let notification: IyzicoNotification = serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("malformed Iyzico payload: {e}")))?;

    let events = match notification.iyzi_event_type.as_str() {
        "PAYMENT_SUCCESS" | "CREDIT_PAYMENT_SUCCESS" => {
            let reference = required(notification.payment_id, "paymentId")?;
            let amount = required(notification.price, "price")?;
            let currency = required(notification.currency, "currency")?;
            vec![GatewayEvent::PaymentSucceeded {
                reference,
                amount,
                currency: currency.to_ascii_uppercase(),
            }]
        }
        "PAYMENT_FAILURE" => {
            let reference = required(notification.payment_id, "paymentId")?;
            vec![GatewayEvent::PaymentFailed {
                reference,
                reason: notification.status,
            }]
        }
        "REFUND_SUCCESS" => {
            let reference = required(notification.refund_id, "refundId")?;
            let payment_reference = required(notification.payment_id, "paymentId")?;
            let amount = required(
                notification.refund_price.or(notification.price),
                "refundPrice",
            )?;
            let currency = required(notification.currency, "currency")?;
            vec![GatewayEvent::RefundSucceeded {
                reference,
                payment_reference,
                amount,
                currency: currency.to_ascii_uppercase(),
            }]
        }
        _ => vec![],
    };

    Ok(events)
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::Validation(format!("Iyzico notification missing {field}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateways::sign_sha256;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn signature_round_trip() {
        let body = br#"{"iyziEventType":"PAYMENT_SUCCESS"}"#;
        let signature = sign_sha256("iyz_secret", body);
        assert!(verify_signature("iyz_secret", &signature, body).is_ok());
        assert!(verify_signature("other", &signature, body).is_err());
    }

    #[test]
    fn payment_success_parses_major_unit_price() {
        let body = br#"{
            "iyziEventType": "PAYMENT_SUCCESS",
            "paymentId": "9001",
            "price": "150.50",
            "currency": "TRY",
            "status": "SUCCESS"
        }"#;
        let events = parse_events(body).unwrap();
        assert_eq!(
            events,
            vec![GatewayEvent::PaymentSucceeded {
                reference: "9001".to_string(),
                amount: dec("150.50"),
                currency: "TRY".to_string(),
            }]
        );
    }

    #[test]
    fn refund_success_links_payment_and_refund_ids() {
        let body = br#"{
            "iyziEventType": "REFUND_SUCCESS",
            "paymentId": "9001",
            "refundId": "r-77",
            "refundPrice": "40.00",
            "currency": "TRY"
        }"#;
        let events = parse_events(body).unwrap();
        assert_eq!(
            events,
            vec![GatewayEvent::RefundSucceeded {
                reference: "r-77".to_string(),
                payment_reference: "9001".to_string(),
                amount: dec("40.00"),
                currency: "TRY".to_string(),
            }]
        );
    }

    #[test]
    fn missing_required_field_is_a_validation_error() {
        let body = br#"{"iyziEventType": "PAYMENT_SUCCESS", "price": "10.00", "currency": "TRY"}"#;
        assert!(matches!(
            parse_events(body),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn unknown_event_types_are_ignored() {
        let body = br#"{"iyziEventType": "BALANCE_UPDATED"}"#;
        assert!(parse_events(body).unwrap().is_empty());
    }
}
