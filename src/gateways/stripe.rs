//! Stripe webhook adapter.
//!
//! Verifies the `Stripe-Signature` header (`t=<unix>,v1=<hex>` scheme,
//! HMAC-SHA256 over `"{t}.{body}"`) and maps events into [`GatewayEvent`].
//! Stripe reports amounts in minor units; they are divided by 100 and
//! rounded to 2 decimals during normalization.

use serde::Deserialize;

use super::{GatewayEvent, minor_to_major, verify_sha256};
use crate::error::AppError;

/// Reject events whose signature timestamp is further than this from now.
const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Verify the `Stripe-Signature` header against the raw request body.
pub fn verify_signature(secret: &str, header: &str, body: &[u8]) -> Result<(), AppError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();

    for part in header.split(',') {
        if let Some((key, value)) = part.trim().split_once('=') {
            match key {
                "t" => timestamp = Some(value),
                "v1" => candidates.push(value),
                _ => {}
            }
        }
    }

    let timestamp = timestamp.ok_or(AppError::InvalidSignature)?;
    let parsed: i64 = timestamp
        .parse()
        .map_err(|_| AppError::InvalidSignature)?;
    if (chrono::Utc::now().timestamp() - parsed).abs() > TIMESTAMP_TOLERANCE_SECS {
        return Err(AppError::InvalidSignature);
    }

    let payload = [timestamp.as_bytes(), b".".as_slice(), body].concat();
    if candidates
        .iter()
        .any(|candidate| verify_sha256(secret, &payload, candidate))
    {
        Ok(())
    } else {
        Err(AppError::InvalidSignature)
    }
}

#[derive(Debug, Deserialize)]
struct StripeEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct StripePaymentIntent {
    id: String,
    amount: i64,
    amount_received: Option<i64>,
    currency: String,
    last_payment_error: Option<StripeError>,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeRefund {
    id: String,
    amount: i64,
    currency: String,
    payment_intent: Option<String>,
    status: Option<String>,
}

/// Map a Stripe event payload into normalized events.
///
/// Unknown event types are ignored (empty vec); Stripe sends far more event
/// kinds than the ledger consumes.
pub fn parse_events(body: &[u8]) -> Result<Vec<GatewayEvent>, AppError> {
    let event: StripeEvent = serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("malformed Stripe payload: {e}")))?;

    let events = match event.event_type.as_str() {
        "payment_intent.succeeded" => {
            let intent: StripePaymentIntent = object(event.data.object)?;
            vec![GatewayEvent::PaymentSucceeded {
                reference: intent.id,
                amount: minor_to_major(intent.amount_received.unwrap_or(intent.amount)),
                currency: intent.currency.to_ascii_uppercase(),
            }]
        }
        "payment_intent.payment_failed" => {
            let intent: StripePaymentIntent = object(event.data.object)?;
            vec![GatewayEvent::PaymentFailed {
                reference: intent.id,
                reason: intent.last_payment_error.and_then(|e| e.message),
            }]
        }
        "refund.created" | "refund.updated" => {
            let refund: StripeRefund = object(event.data.object)?;
            if refund.status.as_deref() == Some("succeeded") {
                let payment_reference = refund.payment_intent.ok_or_else(|| {
                    AppError::Validation("Stripe refund without payment_intent".to_string())
                })?;
                vec![GatewayEvent::RefundSucceeded {
                    reference: refund.id,
                    payment_reference,
                    amount: minor_to_major(refund.amount),
                    currency: refund.currency.to_ascii_uppercase(),
                }]
            } else {
                vec![]
            }
        }
        _ => vec![],
    };

    Ok(events)
}

fn object<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, AppError> {
    serde_json::from_value(value)
        .map_err(|e| AppError::Validation(format!("malformed Stripe event object: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateways::sign_sha256;
    use rust_decimal::Decimal;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn signed_header(secret: &str, body: &[u8]) -> String {
        let timestamp = chrono::Utc::now().timestamp();
        let payload = [timestamp.to_string().as_bytes(), b".".as_slice(), body].concat();
        format!("t={},v1={}", timestamp, sign_sha256(secret, &payload))
    }

    #[test]
    fn accepts_freshly_signed_payload() {
        let body = br#"{"type":"payment_intent.succeeded"}"#;
        let header = signed_header("whsec_abc", body);
        assert!(verify_signature("whsec_abc", &header, body).is_ok());
    }

    #[test]
    fn rejects_wrong_secret_and_stale_timestamp() {
        let body = br#"{}"#;
        let header = signed_header("whsec_abc", body);
        assert!(verify_signature("whsec_other", &header, body).is_err());

        let stale_ts = chrono::Utc::now().timestamp() - 3600;
        let payload = [
            stale_ts.to_string().as_bytes(),
            b".".as_slice(),
            body.as_slice(),
        ]
        .concat();
        let stale = format!("t={},v1={}", stale_ts, sign_sha256("whsec_abc", &payload));
        assert!(verify_signature("whsec_abc", &stale, body).is_err());
    }

    #[test]
    fn payment_intent_succeeded_converts_minor_units() {
        let body = br#"{
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": { "object": { "id": "pi_123", "amount": 12345, "amount_received": 12345, "currency": "eur" } }
        }"#;
        let events = parse_events(body).unwrap();
        assert_eq!(
            events,
            vec![GatewayEvent::PaymentSucceeded {
                reference: "pi_123".to_string(),
                amount: dec("123.45"),
                currency: "EUR".to_string(),
            }]
        );
    }

    #[test]
    fn succeeded_refund_maps_to_refund_event() {
        let body = br#"{
            "id": "evt_2",
            "type": "refund.updated",
            "data": { "object": { "id": "re_456", "amount": 3000, "currency": "eur", "payment_intent": "pi_123", "status": "succeeded" } }
        }"#;
        let events = parse_events(body).unwrap();
        assert_eq!(
            events,
            vec![GatewayEvent::RefundSucceeded {
                reference: "re_456".to_string(),
                payment_reference: "pi_123".to_string(),
                amount: dec("30.00"),
                currency: "EUR".to_string(),
            }]
        );
    }

    #[test]
    fn non_succeeded_refund_and_unknown_events_are_ignored() {
        let pending = br#"{
            "type": "refund.created",
            "data": { "object": { "id": "re_1", "amount": 100, "currency": "eur", "payment_intent": "pi_1", "status": "pending" } }
        }"#;
        assert!(parse_events(pending).unwrap().is_empty());

        let unknown = br#"{"type": "customer.created", "data": {"object": {}}}"#;
        assert!(parse_events(unknown).unwrap().is_empty());
    }
}
