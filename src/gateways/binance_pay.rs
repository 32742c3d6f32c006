//! Binance Pay adapter: outbound order initiation and webhook handling.
//!
//! Both directions use the same signing scheme: HMAC-SHA512 over
//! `"{timestamp}\n{nonce}\n{body}\n"`, hex-encoded. The outbound order call
//! runs with a bounded timeout and happens *before* any local write; a
//! timeout is treated as unknown outcome.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

use super::{GatewayEvent, sign_sha512, verify_sha512};
use crate::{config::Config, error::AppError};

const ORDER_PATH: &str = "/binancepay/openapi/v3/order";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A checkout order created at the gateway.
#[derive(Debug)]
pub struct CreatedOrder {
    pub prepay_id: String,
    pub checkout_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    status: String,
    data: Option<OrderResponseData>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponseData {
    prepay_id: String,
    checkout_url: String,
}

/// Create a checkout order for a deposit.
///
/// Fails with `Gateway` when credentials are missing, the API base does not
/// parse, the call times out, or the gateway rejects the order. Nothing
/// local is written on any of those paths.
pub async fn create_order(
    config: &Config,
    merchant_trade_no: &str,
    amount: Decimal,
    currency: &str,
) -> Result<CreatedOrder, AppError> {
    let (Some(key), Some(secret)) = (&config.binance_pay_key, &config.binance_pay_secret) else {
        return Err(AppError::Gateway(
            "Binance Pay is not configured".to_string(),
        ));
    };

    let base = url::Url::parse(&config.binance_pay_api_base)
        .map_err(|e| AppError::Gateway(format!("invalid Binance Pay API base: {e}")))?;
    let endpoint = base
        .join(ORDER_PATH)
        .map_err(|e| AppError::Gateway(format!("invalid Binance Pay API base: {e}")))?;

    let body = serde_json::json!({
        "env": { "terminalType": "WEB" },
        "merchantTradeNo": merchant_trade_no,
        "orderAmount": amount,
        "currency": currency,
        "goods": {
            "goodsType": "02",
            "goodsCategory": "Z000",
            "referenceGoodsId": merchant_trade_no,
            "goodsName": "Wallet deposit"
        }
    })
    .to_string();

    let timestamp = chrono::Utc::now().timestamp_millis().to_string();
    let nonce = hex::encode(rand::random::<[u8; 16]>());
    let signature = sign_request(secret, &timestamp, &nonce, body.as_bytes());

    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| AppError::Gateway(format!("HTTP client error: {e}")))?;

    let response = client
        .post(endpoint)
        .header("Content-Type", "application/json")
        .header("BinancePay-Timestamp", &timestamp)
        .header("BinancePay-Nonce", &nonce)
        .header("BinancePay-Certificate-SN", key)
        .header("BinancePay-Signature", &signature)
        .body(body)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                AppError::Gateway(
                    "Binance Pay order request timed out; outcome unknown".to_string(),
                )
            } else {
                AppError::Gateway(format!("Binance Pay order request failed: {e}"))
            }
        })?;

    if !response.status().is_success() {
        return Err(AppError::Gateway(format!(
            "Binance Pay returned HTTP {}",
            response.status()
        )));
    }

    let parsed: OrderResponse = response
        .json()
        .await
        .map_err(|e| AppError::Gateway(format!("malformed Binance Pay response: {e}")))?;

    if parsed.status != "SUCCESS" {
        return Err(AppError::Gateway(format!(
            "Binance Pay rejected the order: {}",
            parsed.error_message.unwrap_or_else(|| "no detail".to_string())
        )));
    }

    let data = parsed
        .data
        .ok_or_else(|| AppError::Gateway("Binance Pay response missing data".to_string()))?;

    Ok(CreatedOrder {
        prepay_id: data.prepay_id,
        checkout_url: data.checkout_url,
    })
}

/// Verify a webhook signature (`BinancePay-Timestamp` / `-Nonce` /
/// `-Signature` headers) against the raw request body.
pub fn verify_signature(
    secret: &str,
    timestamp: &str,
    nonce: &str,
    signature: &str,
    body: &[u8],
) -> Result<(), AppError> {
    let payload = signing_payload(timestamp, nonce, body);
    if verify_sha512(secret, &payload, signature) {
        Ok(())
    } else {
        Err(AppError::InvalidSignature)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinancePayNotification {
    biz_type: String,
    biz_status: String,
    /// Sent as a nested object or a JSON-encoded string depending on the
    /// notification version; both are accepted.
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinancePayOrderData {
    merchant_trade_no: String,
    prepay_id: Option<String>,
}

/// Map a Binance Pay notification into normalized events.
pub fn parse_events(body: &[u8]) -> Result<Vec<GatewayEvent>, AppError> {
    let notification: BinancePayNotification = serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("malformed Binance Pay payload: {e}")))?;

    if notification.biz_type != "PAY" {
        return Ok(vec![]);
    }

    let data_value = match notification.data {
        serde_json::Value::String(inner) => serde_json::from_str(&inner)
            .map_err(|e| AppError::Validation(format!("malformed Binance Pay data: {e}")))?,
        value => value,
    };
    let data: BinancePayOrderData = serde_json::from_value(data_value)
        .map_err(|e| AppError::Validation(format!("malformed Binance Pay data: {e}")))?;

    let events = match notification.biz_status.as_str() {
        "PAY_SUCCESS" => vec![GatewayEvent::DepositCompleted {
            order_reference: data.merchant_trade_no,
            gateway_transaction_id: data.prepay_id,
        }],
        // Closed/expired checkouts leave the deposit request pending; it
        // ages out under admin review.
        _ => vec![],
    };

    Ok(events)
}

fn sign_request(secret: &str, timestamp: &str, nonce: &str, body: &[u8]) -> String {
    sign_sha512(secret, &signing_payload(timestamp, nonce, body)).to_uppercase()
}

fn signing_payload(timestamp: &str, nonce: &str, body: &[u8]) -> Vec<u8> {
    [
        timestamp.as_bytes(),
        b"\n".as_slice(),
        nonce.as_bytes(),
        b"\n".as_slice(),
        body,
        b"\n".as_slice(),
    ]
    .concat()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_signature_round_trip() {
        let body = br#"{"bizType":"PAY","bizStatus":"PAY_SUCCESS","data":{}}"#;
        let signature = sign_request("bp_secret", "1700000000000", "abcd1234", body);
        assert!(
            verify_signature("bp_secret", "1700000000000", "abcd1234", &signature, body).is_ok()
        );
        assert!(
            verify_signature("bp_secret", "1700000000001", "abcd1234", &signature, body).is_err()
        );
        assert!(
            verify_signature("wrong", "1700000000000", "abcd1234", &signature, body).is_err()
        );
    }

    #[test]
    fn pay_success_with_object_data_completes_deposit() {
        let body = br#"{
            "bizType": "PAY",
            "bizStatus": "PAY_SUCCESS",
            "data": { "merchantTradeNo": "BNB-AA11BB22CC", "prepayId": "98765" }
        }"#;
        let events = parse_events(body).unwrap();
        assert_eq!(
            events,
            vec![GatewayEvent::DepositCompleted {
                order_reference: "BNB-AA11BB22CC".to_string(),
                gateway_transaction_id: Some("98765".to_string()),
            }]
        );
    }

    #[test]
    fn pay_success_with_string_encoded_data_is_accepted() {
        let body = br#"{
            "bizType": "PAY",
            "bizStatus": "PAY_SUCCESS",
            "data": "{\"merchantTradeNo\":\"BNB-DD33EE44FF\"}"
        }"#;
        let events = parse_events(body).unwrap();
        assert_eq!(
            events,
            vec![GatewayEvent::DepositCompleted {
                order_reference: "BNB-DD33EE44FF".to_string(),
                gateway_transaction_id: None,
            }]
        );
    }

    #[test]
    fn closed_checkouts_and_other_biz_types_are_ignored() {
        let closed = br#"{"bizType": "PAY", "bizStatus": "PAY_CLOSED", "data": {"merchantTradeNo": "BNB-X"}}"#;
        assert!(parse_events(closed).unwrap().is_empty());

        let other = br#"{"bizType": "PAYOUT", "bizStatus": "SUCCESS", "data": {}}"#;
        assert!(parse_events(other).unwrap().is_empty());
    }
}
