use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use gesher_api::state::{AppState, Resiliency};
use gesher_api::app;
use gesher_catalog::pricing::{PriceTier, TierConfig};
use gesher_catalog::store::InMemoryCatalog;
use gesher_core::notify::LogNotifier;
use gesher_order::aggregate::CheckoutRules;
use gesher_order::coordinator::FulfillmentCoordinator;
use gesher_order::locks::OrderLocks;
use gesher_order::memory::InMemoryOrders;
use gesher_order::reconciler::{MockPaymentGateway, PaymentReconciler};
use gesher_store::{EventProducer, RedisClient};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

async fn test_app() -> Router {
    let orders = Arc::new(InMemoryOrders::new());
    let catalog = Arc::new(InMemoryCatalog::new());
    let locks = Arc::new(OrderLocks::new());
    let reconciler = Arc::new(PaymentReconciler::new(Arc::new(MockPaymentGateway)));

    let rules = CheckoutRules {
        tax_rate: 17.0,
        base_shipping_agorot: 3_000,
        free_shipping_enabled: false,
        free_shipping_threshold_agorot: 0,
        minimum_subtotal_agorot: 40_000,
        minimum_items: 1,
    };
    let coordinator = Arc::new(FulfillmentCoordinator::new(
        orders.clone(),
        catalog.clone(),
        reconciler.clone(),
        locks.clone(),
        rules.clone(),
    ));

    let state = AppState {
        orders,
        catalog,
        reconciler,
        coordinator,
        notifier: Arc::new(LogNotifier),
        // No broker/cache in tests: publishes are fire-and-forget and the
        // rate limiter fails open.
        events: Arc::new(EventProducer::new("localhost:9092").expect("producer")),
        redis: Arc::new(
            RedisClient::new("redis://127.0.0.1:6390")
                .await
                .expect("redis client"),
        ),
        locks,
        rules,
        tiers: TierConfig {
            tier1: PriceTier {
                max_usd_cents: 5_000,
                multiplier: 2.0,
            },
            tier2: PriceTier {
                max_usd_cents: 20_000,
                multiplier: 1.7,
            },
            tier3_multiplier: 1.5,
        },
        usd_to_ils: 3.2,
        resiliency: Arc::new(Resiliency::new()),
    };

    app(state)
}

async fn send(app: &Router, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    let request = match body {
        Some(body) => {
            builder = builder.header("content-type", "application/json");
            builder.body(Body::from(body.to_string())).unwrap()
        }
        None => builder.body(Body::empty()).unwrap(),
    };
    let mut request = request;
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_product(app: &Router, name: &str, usd_cost_cents: i64) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/v1/products",
        Some(json!({
            "name": name,
            "supplier_name": "us-gadget-depot",
            "usd_cost_cents": usd_cost_cents,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

async fn checkout(app: &Router, product_ids: &[&str]) -> Value {
    let items: Vec<Value> = product_ids
        .iter()
        .map(|id| json!({"product_id": id, "quantity": 1}))
        .collect();
    let (status, body) = send(
        app,
        Method::POST,
        "/v1/orders",
        Some(json!({
            "customer_email": "noa@example.com",
            "shipping_address": {
                "full_name": "Noa Levi",
                "street": "Herzl 12",
                "city": "Tel Aviv",
                "postal_code": "6688101",
                "country": "IL",
                "phone": "+972501234567"
            },
            "card": {"card_token": "tok_ok", "brand": "visa", "last4": "4242"},
            "items": items,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "checkout failed: {body}");
    body
}

#[tokio::test]
async fn checkout_prices_from_catalog_and_places_hold() {
    let app = test_app().await;

    let product = create_product(&app, "Wireless Earbuds", 4_000).await;
    // $40 cost doubles to $80.00, 256 ILS at 3.2.
    assert_eq!(product["recommendation"]["recommended_ils"], 256);
    assert_eq!(product["product"]["sell_price_agorot"], 25_600);

    let id = product["product"]["id"].as_str().unwrap().to_string();
    let envelope = checkout(&app, &[&id]).await;
    let order = &envelope["order"];

    assert_eq!(order["payment"]["state"], "HOLD");
    assert_eq!(order["status"], "PAYMENT_HOLD");
    assert_eq!(order["pricing"]["subtotal_agorot"], 25_600);
    assert_eq!(order["pricing"]["total_agorot"], 28_600);
    assert_eq!(order["payment"]["hold_agorot"], 28_600);
    assert_eq!(order["items"][0]["status"], "PENDING");
}

#[tokio::test]
async fn bulk_order_flow_captures_adjusted_total() {
    let app = test_app().await;

    let a = create_product(&app, "Earbuds", 4_000).await;
    let b = create_product(&app, "Phone Stand", 4_000).await;
    let a_id = a["product"]["id"].as_str().unwrap().to_string();
    let b_id = b["product"]["id"].as_str().unwrap().to_string();

    let envelope = checkout(&app, &[&a_id, &b_id]).await;
    let order_id = envelope["order"]["id"].as_str().unwrap().to_string();

    // Both pending items show up in one supplier batch.
    let (status, batches) = send(&app, Method::GET, "/v1/suppliers/pending", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(batches.as_array().unwrap().len(), 1);
    assert_eq!(batches[0]["supplier_name"], "us-gadget-depot");
    let batch_items = batches[0]["items"].as_array().unwrap();
    assert_eq!(batch_items.len(), 2);

    let item_a = batch_items
        .iter()
        .find(|i| i["product_id"] == a["product"]["id"])
        .unwrap()["item_id"]
        .as_str()
        .unwrap()
        .to_string();
    let item_b = batch_items
        .iter()
        .find(|i| i["product_id"] == b["product"]["id"])
        .unwrap()["item_id"]
        .as_str()
        .unwrap()
        .to_string();

    // One ordered, one unavailable.
    let (status, summary) = send(
        &app,
        Method::POST,
        "/v1/suppliers/us-gadget-depot/bulk-order",
        Some(json!({
            "ordered_item_ids": [item_a],
            "unavailable_item_ids": [item_b],
            "supplier_order_meta": {"supplier_order_number": "AMZ-113-556"}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["total_ordered"], 1);
    assert_eq!(summary["total_unavailable"], 1);
    assert_eq!(summary["total_failed"], 0);

    // Both decisions are in: the surviving line was captured at the
    // adjusted total (one line + shipping), and the unavailable product
    // is flagged in the catalog.
    let (status, envelope) = send(&app, Method::GET, &format!("/v1/orders/{order_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let order = &envelope["order"];
    assert_eq!(order["payment"]["state"], "CHARGED");
    assert_eq!(order["payment"]["charged_agorot"], 28_600);
    assert_eq!(order["pricing"]["adjusted_subtotal_agorot"], 25_600);
    assert_eq!(order["pricing"]["meets_minimum"], false);

    let cancelled = order["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|i| i["id"] == item_b.as_str())
        .unwrap();
    assert_eq!(cancelled["status"], "CANCELLED");
    assert_eq!(cancelled["cancellation"]["reason"], "supplier_unavailable");
}

#[tokio::test]
async fn item_transitions_suggest_order_status_and_cancel_refunds() {
    let app = test_app().await;

    let a = create_product(&app, "Earbuds", 4_000).await;
    let a_id = a["product"]["id"].as_str().unwrap().to_string();
    let envelope = checkout(&app, &[&a_id]).await;
    let order_id = envelope["order"]["id"].as_str().unwrap().to_string();
    let item_id = envelope["order"]["items"][0]["id"].as_str().unwrap().to_string();

    // Supplier order recorded; capture fires since no item is pending.
    let (status, envelope) = send(
        &app,
        Method::POST,
        &format!("/v1/orders/{order_id}/items/{item_id}/order-from-supplier"),
        Some(json!({"supplier_order_number": "AMZ-1", "tracking_number": "TRK-7"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(envelope["item"]["status"], "ORDERED");
    assert_eq!(envelope["order"]["payment"]["state"], "CHARGED");
    assert_eq!(
        envelope["order_status_suggestion"]["suggested"],
        "ORDERED"
    );

    // Replaying the same supplier order number is a no-op, not an error.
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/v1/orders/{order_id}/items/{item_id}/order-from-supplier"),
        Some(json!({"supplier_order_number": "AMZ-1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Forward skip to customs.
    let (status, envelope) = send(
        &app,
        Method::POST,
        &format!("/v1/orders/{order_id}/items/{item_id}/status"),
        Some(json!({"new_status": "CUSTOMS_ISRAEL", "notes": "cleared US side"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        envelope["order_status_suggestion"]["suggested"],
        "CUSTOMS_ISRAEL"
    );

    // Backward move is rejected and lists the valid targets.
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/v1/orders/{order_id}/items/{item_id}/status"),
        Some(json!({"new_status": "ORDERED"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let valid = body["valid_transitions"].as_array().unwrap();
    assert!(valid.iter().any(|s| s == "DELIVERED"));
    assert!(!valid.iter().any(|s| s == "CANCELLED"));

    // Operator accepts the suggestion.
    let (status, envelope) = send(
        &app,
        Method::POST,
        &format!("/v1/orders/{order_id}/status"),
        Some(json!({"new_status": "CUSTOMS_ISRAEL"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(envelope["order"]["status"], "CUSTOMS_ISRAEL");

    // Post-capture cancellation refunds the line; shipping stays charged.
    let (status, envelope) = send(
        &app,
        Method::POST,
        &format!("/v1/orders/{order_id}/items/{item_id}/cancel"),
        Some(json!({"reason": "damaged in transit"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(envelope["order_update"]["meets_minimum"], false);
    assert_eq!(envelope["refund"]["amount_agorot"], 25_600);
    assert_eq!(envelope["order"]["payment"]["state"], "PARTIAL_REFUND");
    assert_eq!(envelope["order"]["payment"]["refunded_agorot"], 25_600);

    // Cancelling again is a conflict, not a double refund.
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/v1/orders/{order_id}/items/{item_id}/cancel"),
        Some(json!({"reason": "again"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn bulk_order_rejects_overlapping_outcome_sets() {
    let app = test_app().await;
    let id = uuid::Uuid::new_v4();

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/suppliers/acme/bulk-order",
        Some(json!({
            "ordered_item_ids": [id],
            "unavailable_item_ids": [id],
            "supplier_order_meta": {"supplier_order_number": "X-1"}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("disjoint"));
}

#[tokio::test]
async fn price_check_confirm_only_keeps_stored_price() {
    let app = test_app().await;
    let product = create_product(&app, "Desk Lamp", 4_000).await;
    let id = product["product"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/v1/products/{id}/update-price"),
        Some(json!({"new_usd_cost_cents": 4_500, "confirm_only": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["price_changed"], true);
    assert_eq!(body["previous_cost_usd_cents"], 4_000);
    assert_eq!(body["new_sell_price_agorot"], 25_600); // unchanged

    let (_, body) = send(
        &app,
        Method::POST,
        &format!("/v1/products/{id}/update-price"),
        Some(json!({"new_usd_cost_cents": 4_500, "confirm_only": false})),
    )
    .await;
    // $45 doubles to $90.00 -> 288 ILS.
    assert_eq!(body["new_sell_price_agorot"], 28_800);
    assert_eq!(body["recommendation"]["recommended_ils"], 288);

    let (_, product) = send(&app, Method::GET, &format!("/v1/products/{id}"), None).await;
    assert_eq!(product["usd_cost_cents"], 4_500);
    assert_eq!(product["sell_price_agorot"], 28_800);
}

#[tokio::test]
async fn availability_patch_blocks_checkout() {
    let app = test_app().await;
    let product = create_product(&app, "Earbuds", 4_000).await;
    let id = product["product"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/v1/products/{id}/availability"),
        Some(json!({"available": false, "reason": "supplier stockout"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 1);

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/orders",
        Some(json!({
            "customer_email": "noa@example.com",
            "shipping_address": {
                "full_name": "Noa Levi",
                "street": "Herzl 12",
                "city": "Tel Aviv",
                "postal_code": "6688101",
                "country": "IL",
                "phone": "+972501234567"
            },
            "card": {"card_token": "tok_ok"},
            "items": [{"product_id": id, "quantity": 1}],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("unavailable"));
}

#[tokio::test]
async fn declined_checkout_records_failed_intent_and_retries() {
    let app = test_app().await;
    let product = create_product(&app, "Earbuds", 4_000).await;
    let id = product["product"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/orders",
        Some(json!({
            "customer_email": "noa@example.com",
            "shipping_address": {
                "full_name": "Noa Levi",
                "street": "Herzl 12",
                "city": "Tel Aviv",
                "postal_code": "6688101",
                "country": "IL",
                "phone": "+972501234567"
            },
            "card": {"card_token": "fail-declined"},
            "items": [{"product_id": id, "quantity": 1}],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["order"]["payment"]["state"], "FAILED");
    let order_id = body["order"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/v1/orders/{order_id}/payment/retry"),
        Some(json!({"card": {"card_token": "tok_ok"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["payment"]["state"], "HOLD");
}
