//! Integration tests for the ETA client and its best-effort use

use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use dispatch::delay::announce_delay;
use dispatch::eta::EtaClient;
use dispatch::models::{AnnounceResponse, DeliveryStatus};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

#[tokio::test]
async fn test_request_estimate_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/estimate"))
        .and(query_param("order_id", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "eta_minutes": 30
        })))
        .mount(&mock_server)
        .await;

    let client = EtaClient::new(
        format!("{}/estimate", mock_server.uri()),
        StdDuration::from_secs(1),
    )
    .unwrap();
    let estimate = client.request_estimate(42).await.unwrap();

    assert_eq!(estimate.eta_minutes, Some(30));
}

#[tokio::test]
async fn test_request_estimate_error_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/estimate"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&mock_server)
        .await;

    let client = EtaClient::new(
        format!("{}/estimate", mock_server.uri()),
        StdDuration::from_secs(1),
    )
    .unwrap();

    assert!(client.request_estimate(1).await.is_err());
}

#[tokio::test]
async fn test_request_estimate_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/estimate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({}))
                .set_delay(StdDuration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let client = EtaClient::new(
        format!("{}/estimate", mock_server.uri()),
        StdDuration::from_millis(100),
    )
    .unwrap();

    let started = std::time::Instant::now();
    assert!(client.request_estimate(1).await.is_err());
    assert!(started.elapsed() < StdDuration::from_secs(5));
}

#[tokio::test]
async fn test_in_transit_announce_calls_estimate_service() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/estimate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = EtaClient::new(
        format!("{}/estimate", mock_server.uri()),
        StdDuration::from_secs(1),
    )
    .unwrap();
    let state = common::setup_state(Some(client)).await;
    let vendor = state.store.create_vendor("first_vendor").await.unwrap();
    let now = Utc::now();
    let order = state
        .store
        .create_order(vendor.id, now - Duration::minutes(5))
        .await
        .unwrap();
    state
        .store
        .create_trip(order.id, DeliveryStatus::Picked)
        .await
        .unwrap();

    announce_delay(&state, order.id, now).await.unwrap();

    mock_server.verify().await;
}

#[tokio::test]
async fn test_failing_estimate_service_does_not_fail_announce() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/estimate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let client = EtaClient::new(
        format!("{}/estimate", mock_server.uri()),
        StdDuration::from_secs(1),
    )
    .unwrap();
    let state = common::setup_state(Some(client)).await;
    let vendor = state.store.create_vendor("first_vendor").await.unwrap();
    let now = Utc::now();
    let order = state
        .store
        .create_order(vendor.id, now - Duration::minutes(5))
        .await
        .unwrap();
    state
        .store
        .create_trip(order.id, DeliveryStatus::Assigned)
        .await
        .unwrap();

    let response = announce_delay(&state, order.id, now).await.unwrap();

    assert_eq!(
        response,
        AnnounceResponse::Rescheduled {
            new_delivery_time: order.delivery_time + Duration::minutes(30)
        }
    );
}

#[tokio::test]
async fn test_unreachable_estimate_service_does_not_fail_announce() {
    // Nothing listens on port 9 locally
    let client = EtaClient::new("http://127.0.0.1:9/estimate", StdDuration::from_millis(200)).unwrap();
    let state = common::setup_state(Some(client)).await;
    let vendor = state.store.create_vendor("first_vendor").await.unwrap();
    let now = Utc::now();
    let order = state
        .store
        .create_order(vendor.id, now - Duration::minutes(5))
        .await
        .unwrap();
    state
        .store
        .create_trip(order.id, DeliveryStatus::Picked)
        .await
        .unwrap();

    let result = announce_delay(&state, order.id, now).await;

    assert!(result.is_ok());
    assert_eq!(
        state.store.get_order(order.id).await.unwrap().delivery_time,
        order.delivery_time + Duration::minutes(30)
    );
}
