//! HTTP API tests
//!
//! Drives the full router (auth middleware, handlers, error mapping) over
//! the in-memory repository.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use ordering_backend::{
    config::StorageBackend,
    create_app,
    middleware::{auth::encode_jwt, AuthUser, Claims},
    repository::InMemoryRepository,
    AppState, Config,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use shared::{ActorRole, Order, OrderStatus, StockRecord};
use tower::ServiceExt;
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

struct TestApp {
    app: Router,
    config: Config,
    client_id: Uuid,
    store_id: Uuid,
    product_id: Uuid,
}

impl TestApp {
    async fn new() -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let (client_id, store_id, product_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        repo.put_stock_record(StockRecord::new(
            store_id,
            product_id,
            dec("100"),
            dec("95"),
            dec("200"),
            Utc::now(),
        ))
        .await;

        let mut config = Config::default();
        config.storage.backend = StorageBackend::Memory;
        let app = create_app(AppState::in_memory(repo, config.clone()));
        Self {
            app,
            config,
            client_id,
            store_id,
            product_id,
        }
    }

    fn token(&self, role: ActorRole) -> String {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            role,
            client_id: (role == ActorRole::Client).then_some(self.client_id),
            store_id: (role == ActorRole::Store).then_some(self.store_id),
        };
        encode_jwt(&Claims::new(&user, 3600), &self.config.jwt.secret)
            .unwrap()
    }

    async fn send(&self, method: Method, uri: &str, role: Option<ActorRole>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(role) = role {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(role)));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create_order(&self, quantity: &str) -> Order {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/orders",
                Some(ActorRole::Client),
                Some(json!({
                    "store_id": self.store_id,
                    "lines": [{
                        "product_id": self.product_id,
                        "unit": "kg",
                        "ordered_quantity": quantity,
                        "unit_price": "2.50"
                    }]
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        serde_json::from_value(body).unwrap()
    }

    async fn post_action(&self, order_id: Uuid, action: &str, role: ActorRole) -> (StatusCode, Value) {
        self.send(Method::POST, &format!("/api/v1/orders/{}/{}", order_id, action), Some(role), None)
            .await
    }
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

// ============================================================================
// Auth
// ============================================================================

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new().await;
    let (status, body) = app.send(Method::GET, "/api/v1/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "memory");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = TestApp::new().await;
    let (status, _) = app.send(Method::GET, "/api/v1/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_rejected() {
    let app = TestApp::new().await;
    let user = AuthUser {
        user_id: Uuid::new_v4(),
        role: ActorRole::Admin,
        client_id: None,
        store_id: None,
    };
    let token = encode_jwt(&Claims::new(&user, 3600), "another-secret").unwrap();

    let request = Request::builder()
        .uri("/api/v1/orders")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_role_is_forbidden() {
    let app = TestApp::new().await;
    let order = app.create_order("10").await;

    // Clients cannot confirm their own orders
    let (status, _) = app.post_action(order.id, "submit", ActorRole::Client).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.post_action(order.id, "confirm", ActorRole::Client).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_store_cannot_read_other_store_stock() {
    let app = TestApp::new().await;
    let uri = format!("/api/v1/stores/{}/stock", Uuid::new_v4());

    let (status, _) = app.send(Method::GET, &uri, Some(ActorRole::Store), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send(Method::GET, &uri, Some(ActorRole::Admin), None).await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// Order lifecycle over HTTP
// ============================================================================

#[tokio::test]
async fn test_full_flow_with_preparation_gap() {
    let app = TestApp::new().await;
    let order = app.create_order("10").await;
    assert_eq!(order.status, OrderStatus::Draft);
    assert_eq!(order.total_ht, dec("25.00"));

    for (action, role) in [
        ("submit", ActorRole::Client),
        ("confirm", ActorRole::Store),
        ("start-preparation", ActorRole::Store),
    ] {
        let (status, body) = app.post_action(order.id, action, role).await;
        assert_eq!(status, StatusCode::OK, "{}: {}", action, body);
    }

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/v1/orders/{}/preparation", order.id),
            Some(ActorRole::Store),
            Some(json!({
                "lines": [{
                    "product_id": app.product_id,
                    "prepared_quantity": "8",
                    "gap_reason": "short pallet"
                }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let adjusted: Order = serde_json::from_value(body).unwrap();
    assert_eq!(adjusted.lines[0].gap, Some(dec("2")));

    let (status, body) = app.post_action(order.id, "ready", ActorRole::Store).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let ready: Order = serde_json::from_value(body["order"].clone()).unwrap();
    assert_eq!(ready.status, OrderStatus::Ready);
    assert_eq!(body["stock"][0]["applied"], "8");

    let stock_uri = format!("/api/v1/stores/{}/stock/{}", app.store_id, app.product_id);
    let (_, body) = app.send(Method::GET, &stock_uri, Some(ActorRole::Store), None).await;
    let record: StockRecord = serde_json::from_value(body).unwrap();
    assert_eq!(record.quantity, dec("92"));

    for action in ["start-delivery", "complete-delivery"] {
        let (status, body) = app.post_action(order.id, action, ActorRole::Delivery).await;
        assert_eq!(status, StatusCode::OK, "{}: {}", action, body);
    }

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/v1/orders/{}/history", order.id),
            Some(ActorRole::Client),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(8));
}

#[tokio::test]
async fn test_illegal_transition_maps_to_conflict() {
    let app = TestApp::new().await;
    let order = app.create_order("4").await;

    let (status, body) = app.post_action(order.id, "start-preparation", ActorRole::Store).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "INVALID_TRANSITION");
}

#[tokio::test]
async fn test_cancel_after_preparation_is_refused() {
    let app = TestApp::new().await;
    let order = app.create_order("4").await;
    app.post_action(order.id, "submit", ActorRole::Client).await;
    app.post_action(order.id, "confirm", ActorRole::Store).await;
    app.post_action(order.id, "start-preparation", ActorRole::Store).await;

    let (status, body) = app.post_action(order.id, "cancel", ActorRole::Client).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "CANNOT_CANCEL_AFTER_PREPARATION");
}

#[tokio::test]
async fn test_cancel_with_reason() {
    let app = TestApp::new().await;
    let order = app.create_order("4").await;

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/v1/orders/{}/cancel", order.id),
            Some(ActorRole::Client),
            Some(json!({ "reason": "duplicate order" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    let cancelled: Order = serde_json::from_value(body).unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("duplicate order"));
}

#[tokio::test]
async fn test_blank_unit_is_rejected() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/orders",
            Some(ActorRole::Client),
            Some(json!({
                "store_id": app.store_id,
                "lines": [{
                    "product_id": app.product_id,
                    "unit": "   ",
                    "ordered_quantity": "1",
                    "unit_price": "2.50"
                }]
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_unrepresentable_total_is_rejected() {
    let app = TestApp::new().await;
    let huge_line = json!({
        "lines": [{
            "product_id": app.product_id,
            "unit": "kg",
            "ordered_quantity": "1000000000000000",
            "unit_price": "1000000000000000"
        }]
    });

    let mut create = huge_line.clone();
    create["store_id"] = json!(app.store_id);
    let (status, body) = app
        .send(Method::POST, "/api/v1/orders", Some(ActorRole::Client), Some(create))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    assert_eq!(error_code(&body), "INVALID_QUANTITY");

    let order = app.create_order("2").await;
    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/v1/orders/{}/lines", order.id),
            Some(ActorRole::Client),
            Some(huge_line),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    assert_eq!(error_code(&body), "INVALID_QUANTITY");

    let (_, body) = app
        .send(Method::GET, &format!("/api/v1/orders/{}", order.id), Some(ActorRole::Client), None)
        .await;
    let unchanged: Order = serde_json::from_value(body).unwrap();
    assert_eq!(unchanged.total_ht, dec("5.00"));
    assert_eq!(unchanged.lines[0].ordered_quantity, dec("2"));
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let app = TestApp::new().await;
    let (status, _) = app
        .send(
            Method::GET,
            &format!("/api/v1/orders/{}", Uuid::new_v4()),
            Some(ActorRole::Admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Stock views
// ============================================================================

#[tokio::test]
async fn test_consolidated_stock_for_admin() {
    let app = TestApp::new().await;
    let uri = format!("/api/v1/stock/consolidated?store_ids={}", app.store_id);

    let (status, body) = app.send(Method::GET, &uri, Some(ActorRole::Admin), None).await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    let entry = &body[app.product_id.to_string()];
    assert_eq!(entry["total_quantity"], "100");
    assert_eq!(entry["low_stock_store_count"], 0);
}

#[tokio::test]
async fn test_manual_decrement_rejects_negative_amount() {
    let app = TestApp::new().await;
    let uri = format!("/api/v1/stores/{}/stock/{}/decrement", app.store_id, app.product_id);

    let (status, _) = app
        .send(Method::POST, &uri, Some(ActorRole::Store), Some(json!({ "amount": "-1" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(Method::POST, &uri, Some(ActorRole::Store), Some(json!({ "amount": "10" })))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["quantity_after"], "90");

    let (_, body) = app
        .send(Method::GET, "/api/v1/stock/low", Some(ActorRole::Store), None)
        .await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));
}
