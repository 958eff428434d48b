use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use storefront_api::courier::{CourierClient, CourierError};
use storefront_api::gateway::{GatewayClient, GatewayError};

#[tokio::test]
async fn charge_returns_instructions_on_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/charge"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status_code": "201",
            "status_message": "Success, Bank Transfer transaction is created",
            "transaction_id": "tx-1",
            "transaction_status": "pending",
            "payment_type": "bank_transfer",
            "va_numbers": [{"bank": "bca", "va_number": "812785002530231"}],
            "expiry_time": "2026-08-07 10:00:00"
        })))
        .mount(&server)
        .await;

    let client = GatewayClient::new(server.uri(), "server-key");
    let charge = client
        .charge("ORD-20260806-abcd1234", 225_000, "bank_transfer", None)
        .await
        .expect("charge should succeed");

    assert_eq!(charge.transaction_status, "pending");
    let va = charge.va_numbers.expect("va numbers");
    assert_eq!(va[0].bank, "bca");
    assert_eq!(va[0].va_number, "812785002530231");
    assert!(charge.expiry_time.is_some());
}

#[tokio::test]
async fn charge_maps_gateway_verdict_to_rejection() {
    let server = MockServer::start().await;
    // The gateway answers 200 and carries the rejection in status_code.
    Mock::given(method("POST"))
        .and(path("/v2/charge"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status_code": "406",
            "status_message": "duplicate order ID"
        })))
        .mount(&server)
        .await;

    let client = GatewayClient::new(server.uri(), "server-key");
    let err = client
        .charge("ORD-20260806-abcd1234", 225_000, "qris", None)
        .await
        .expect_err("charge should be rejected");

    match err {
        GatewayError::ChargeRejected(message) => assert!(message.contains("duplicate")),
        other => panic!("expected ChargeRejected, got {other:?}"),
    }
}

#[tokio::test]
async fn charge_with_missing_transaction_status_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/charge"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status_code": "201"
        })))
        .mount(&server)
        .await;

    let client = GatewayClient::new(server.uri(), "server-key");
    let err = client
        .charge("ORD-20260806-abcd1234", 225_000, "qris", None)
        .await
        .expect_err("missing transaction_status should fail");

    assert!(matches!(err, GatewayError::Malformed(_)));
}

#[tokio::test]
async fn status_poll_distinguishes_absent_transactions() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/ORD-known/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "transaction_status": "settlement"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/ORD-unknown/status"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "status_message": "transaction doesn't exist"
        })))
        .mount(&server)
        .await;

    let client = GatewayClient::new(server.uri(), "server-key");

    let known = client
        .transaction_status("ORD-known")
        .await
        .expect("status poll should succeed")
        .expect("transaction should exist");
    assert_eq!(known.transaction_status, "settlement");

    let unknown = client
        .transaction_status("ORD-unknown")
        .await
        .expect("404 is not an error");
    assert!(unknown.is_none());
}

#[tokio::test]
async fn courier_unknown_city_and_outage_are_distinct_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rates"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = CourierClient::new(server.uri(), "api-key");
    let err = client
        .fetch_rates("Atlantis", 1_000)
        .await
        .expect_err("unknown city");
    assert!(matches!(err, CourierError::UnknownCity));

    // Unreachable endpoint: connection refused maps to Unavailable.
    let dead = CourierClient::new("http://127.0.0.1:1", "api-key");
    let err = dead
        .fetch_rates("Jakarta", 1_000)
        .await
        .expect_err("unreachable courier");
    assert!(matches!(err, CourierError::Unavailable(_)));
}

#[tokio::test]
async fn courier_non_json_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rates"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = CourierClient::new(server.uri(), "api-key");
    let err = client
        .fetch_rates("Jakarta", 1_000)
        .await
        .expect_err("non-JSON body");
    assert!(matches!(err, CourierError::Malformed(_)));
}

#[tokio::test]
async fn courier_parses_option_list() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "options": [
                {"service": "REG", "courier": "JNE", "cost": 18000, "etd": "2-3"},
                {"service": "YES", "courier": "JNE", "cost": 30000, "etd": "1-1"}
            ]
        })))
        .mount(&server)
        .await;

    let client = CourierClient::new(server.uri(), "api-key");
    let rates = client
        .fetch_rates("Bandung", 2_000)
        .await
        .expect("rates should parse");
    assert_eq!(rates.len(), 2);
    assert_eq!(rates[0].service, "REG");
    assert_eq!(rates[1].cost, 30_000);
}
