//! In-process route tests: the router is driven with `oneshot`, and a queue
//! registered directly with the registry stands in for a kitchen display.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bytes::Bytes;
use gateway::catalog::InMemoryCatalog;
use gateway::config::GatewayConfig;
use gateway::rate_limit::RateLimitConfig;
use gateway::{create_router, AppState};
use http_body_util::BodyExt;
use kitchen_feed::backpressure::{outbound_queue, OutboundReceiver};
use tower::ServiceExt;
use types::order::parse_display_message;

fn make_state(config: GatewayConfig) -> AppState {
    AppState::new(config, Arc::new(InMemoryCatalog::demo()))
}

async fn call(state: &AppState, req: Request<Body>) -> (StatusCode, Bytes) {
    let router = create_router(state.clone());
    let resp = router.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

fn parse_json(b: &Bytes) -> serde_json::Value {
    serde_json::from_slice(b).unwrap()
}

fn post_order(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/order")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn attach_display(state: &AppState) -> OutboundReceiver {
    let (tx, rx) = outbound_queue(16);
    state.registry().register(tx).unwrap();
    rx
}

#[tokio::test]
async fn test_valid_order_is_acknowledged_and_published() {
    let state = make_state(GatewayConfig::default());
    let mut display = attach_display(&state);

    let (status, body) = call(
        &state,
        post_order(r#"{"store_id": 1, "product_id": 5, "quantity": 2}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let ack = parse_json(&body);
    assert_eq!(ack["status"], "ACCEPTED");
    assert_eq!(ack["product"], "Latte");
    assert_eq!(ack["delivered_to"], 1);
    assert!(ack["order_id"].as_str().is_some());

    let frame = display.try_recv().expect("display should have one frame");
    let raw: serde_json::Value = serde_json::from_str(frame.as_str()).unwrap();
    assert_eq!(raw.as_object().unwrap().len(), 5);
    assert_eq!(raw["type"], "NEW_ORDER");
    assert_eq!(raw["product"], "Latte");
    assert_eq!(raw["quantity"], 2);
    assert_eq!(raw["store"], "1");
    assert!(chrono::DateTime::parse_from_rfc3339(raw["time"].as_str().unwrap()).is_ok());

    assert!(display.try_recv().is_none());
}

#[tokio::test]
async fn test_order_without_displays_still_succeeds() {
    let state = make_state(GatewayConfig::default());

    let (status, body) = call(
        &state,
        post_order(r#"{"store_id": 1, "product_id": 1, "quantity": 1}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(&body)["delivered_to"], 0);
}

#[tokio::test]
async fn test_invalid_orders_publish_nothing() {
    let state = make_state(GatewayConfig::default());
    let mut display = attach_display(&state);

    let cases = [
        (r#"{"store_id": 1, "product_id": 5, "quantity": 0}"#, StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        (r#"{"store_id": 1, "product_id": 5, "quantity": -2}"#, StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        (r#"{"store_id": 1, "product_id": 5, "quantity": 1.5}"#, StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        (r#"{"store_id": 1, "product_id": 5, "quantity": "2"}"#, StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        (r#"{"store_id": 1, "product_id": 5}"#, StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        (r#"{"store_id": 1, "product_id": 5, "quantity": 5000}"#, StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        (r#"not json"#, StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        (r#"{"store_id": 1, "product_id": 999, "quantity": 1}"#, StatusCode::NOT_FOUND, "NOT_FOUND"),
        (r#"{"store_id": 77, "product_id": 5, "quantity": 1}"#, StatusCode::NOT_FOUND, "NOT_FOUND"),
        (r#"{"store_id": 1, "product_id": 7, "quantity": 1}"#, StatusCode::BAD_REQUEST, "INVENTORY_ERROR"),
        (r#"{"store_id": 2, "product_id": 4, "quantity": 1}"#, StatusCode::BAD_REQUEST, "INVENTORY_ERROR"),
    ];

    for (body, expected_status, expected_code) in cases {
        let (status, resp) = call(&state, post_order(body)).await;
        assert_eq!(status, expected_status, "body: {}", body);

        let json = parse_json(&resp);
        assert_eq!(json["error"], expected_code, "body: {}", body);
        assert_eq!(json["message"], json["detail"]);
    }

    assert!(display.try_recv().is_none());
    assert_eq!(state.broker.last_sequence(), 0);
}

#[tokio::test]
async fn test_missing_field_is_named() {
    let state = make_state(GatewayConfig::default());

    let (status, body) = call(&state, post_order(r#"{"product_id": 5, "quantity": 1}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(parse_json(&body)["message"]
        .as_str()
        .unwrap()
        .contains("store_id"));
}

#[tokio::test]
async fn test_unparseable_body_is_reported_as_malformed() {
    let state = make_state(GatewayConfig::default());

    for body in [r#"not json"#, r#"{"store_id": 1, "product_id": 5, "quantity": "2"}"#] {
        let (status, resp) = call(&state, post_order(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let json = parse_json(&resp);
        assert_eq!(json["error"], "VALIDATION_ERROR");
        assert!(
            json["message"]
                .as_str()
                .unwrap()
                .starts_with("Malformed request body"),
            "body: {}",
            body
        );
    }
}

#[tokio::test]
async fn test_unknown_stores_do_not_create_rate_buckets() {
    let config = GatewayConfig {
        order_rate: RateLimitConfig::new(1, 0.0),
        ..GatewayConfig::default()
    };
    let state = make_state(config);

    for store_id in 1000..1200 {
        let body = format!(
            r#"{{"store_id": {}, "product_id": 5, "quantity": 1}}"#,
            store_id
        );
        let (status, _) = call(&state, post_order(&body)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
    let (status, _) = call(&state, post_order(r#"{"product_id": 5, "quantity": 1}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(state.rate_limiter.bucket_count(), 0);
}

#[tokio::test]
async fn test_invalid_orders_do_not_spend_store_quota() {
    let config = GatewayConfig {
        order_rate: RateLimitConfig::new(1, 0.0),
        ..GatewayConfig::default()
    };
    let state = make_state(config);

    for body in [
        r#"{"store_id": 1, "product_id": 5, "quantity": 0}"#,
        r#"{"store_id": 1, "product_id": 5}"#,
        r#"not json"#,
    ] {
        let (status, _) = call(&state, post_order(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
    }

    let (status, _) = call(
        &state,
        post_order(r#"{"store_id": 1, "product_id": 5, "quantity": 1}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state.rate_limiter.bucket_count(), 1);
}

#[tokio::test]
async fn test_order_rate_limit_per_store() {
    let config = GatewayConfig {
        order_rate: RateLimitConfig::new(2, 0.0),
        ..GatewayConfig::default()
    };
    let state = make_state(config);
    let mut display = attach_display(&state);

    for _ in 0..2 {
        let (status, _) = call(
            &state,
            post_order(r#"{"store_id": 1, "product_id": 5, "quantity": 1}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = call(
        &state,
        post_order(r#"{"store_id": 1, "product_id": 5, "quantity": 1}"#),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(parse_json(&body)["error"], "RATE_LIMIT_EXCEEDED");

    // Another store has its own bucket.
    let (status, _) = call(
        &state,
        post_order(r#"{"store_id": 2, "product_id": 5, "quantity": 1}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let stores: Vec<String> = std::iter::from_fn(|| display.try_recv())
        .map(|f| parse_display_message(f.as_str()).unwrap().store().to_string())
        .collect();
    assert_eq!(stores, vec!["1", "1", "2"]);
}

#[tokio::test]
async fn test_menu_lists_active_products() {
    let state = make_state(GatewayConfig::default());

    let (status, body) = call(&state, get("/menu")).await;
    assert_eq!(status, StatusCode::OK);

    let menu = parse_json(&body);
    let items = menu.as_array().unwrap();
    assert!(items.iter().all(|p| p["is_active"] == true));
    assert!(items.iter().any(|p| p["id"] == 5 && p["name"] == "Latte"));

    let ids: Vec<u64> = items.iter().map(|p| p["id"].as_u64().unwrap()).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted);
}

#[tokio::test]
async fn test_health_reports_displays_and_metrics() {
    let state = make_state(GatewayConfig::default());
    let _display = attach_display(&state);

    let (status, body) = call(&state, get("/health")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(&body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "gateway");
    assert_eq!(json["displays"], 1);
    assert_eq!(json["metrics"]["events_published"], 0);
}

#[tokio::test]
async fn test_ws_route_requires_upgrade() {
    let state = make_state(GatewayConfig::default());

    let (status, _) = call(&state, get("/ws/kitchen")).await;
    assert!(status.is_client_error());
    assert!(state.registry().is_empty());
}
