//! HTTP API tests
//!
//! Exercise the router end to end over the in-memory ledger: status codes,
//! permission checks and the `{ message, data }` / `{ error }` envelopes.

mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use common::{dec, test_config, Fixture, JWT_SECRET};
use jsonwebtoken::{encode, EncodingKey, Header};
use rim_backend::middleware::Claims;
use rim_backend::{create_app, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

const ALL_PERMISSIONS: &[&str] = &[
    "inventory_transfer:view",
    "inventory_transfer:edit",
    "inventory_transfer:delete",
    "purchase_invoice:view",
    "purchase_invoice:edit",
    "inventory:view",
];

fn token(permissions: &[&str]) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: Uuid::new_v4().to_string(),
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
        exp: now + 3600,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

fn app(fx: &Fixture) -> Router {
    create_app(AppState::new(Arc::clone(&fx.ledger), test_config()))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn seeded() -> (Fixture, Router, String) {
    let fx = Fixture::new().await;
    fx.store.set_stock(fx.shop_a.id, fx.product.id, 10, dec("100")).await;
    let app = app(&fx);
    (fx, app, token(ALL_PERMISSIONS))
}

async fn create_transfer(fx: &Fixture, app: &Router, token: &str, quantity: i32) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/transfers",
        Some(token),
        Some(json!({
            "sourceShopId": fx.shop_a.id,
            "destinationShopId": fx.shop_b.id,
            "items": [{"productId": fx.product.id, "quantity": quantity}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let (_fx, app, _) = seeded().await;
    let (status, body) = send(&app, Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let (_fx, app, _) = seeded().await;
    let (status, body) = send(&app, Method::GET, "/api/v1/transfers/1", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_bad_token_is_rejected() {
    let (_fx, app, _) = seeded().await;
    let (status, body) =
        send(&app, Method::GET, "/api/v1/transfers/1", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_permission_denied_before_mutation() {
    let (fx, app, admin) = seeded().await;
    let id = create_transfer(&fx, &app, &admin, 3).await;

    let viewer = token(&["inventory_transfer:view"]);
    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/api/v1/transfers/{}", id),
        Some(&viewer),
        Some(json!({"action": "complete"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_PERMISSIONS");
    assert_eq!(fx.stock(&fx.shop_b, &fx.product).await.0, 0);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/v1/transfers/{}", id),
        Some(&token(&["inventory_transfer:edit"])),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_invalid_and_unknown_ids() {
    let (_fx, app, admin) = seeded().await;

    let (status, body) = send(&app, Method::GET, "/api/v1/transfers/abc", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "id");

    let (status, body) = send(&app, Method::GET, "/api/v1/transfers/999", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_transfer_lifecycle_over_http() {
    let (fx, app, admin) = seeded().await;
    let id = create_transfer(&fx, &app, &admin, 4).await;
    let uri = format!("/api/v1/transfers/{}", id);

    let (status, detail) = send(&app, Method::GET, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["status"], "pending");
    assert_eq!(detail["source_shop_name"], "Main Street");
    assert_eq!(detail["destination_shop_name"], "Harbour");
    assert_eq!(detail["items"][0]["sku"], "ESP-1KG");
    assert_eq!(detail["items"][0]["quantity"], 4);

    let (status, body) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&admin),
        Some(json!({"action": "complete"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Transfer completed");
    assert_eq!(body["data"]["status"], "completed");

    let (status, body) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&admin),
        Some(json!({"action": "cancel"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_STATE_TRANSITION");

    let (_, detail) = send(&app, Method::GET, &uri, Some(&admin), None).await;
    assert_eq!(detail["status"], "completed");
    assert_eq!(fx.stock(&fx.shop_b, &fx.product).await.0, 4);
}

#[tokio::test]
async fn test_invalid_action_is_bad_request() {
    let (fx, app, admin) = seeded().await;
    let id = create_transfer(&fx, &app, &admin, 1).await;

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/api/v1/transfers/{}", id),
        Some(&admin),
        Some(json!({"action": "ship"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_insufficient_stock_is_unprocessable() {
    let (fx, app, admin) = seeded().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/transfers",
        Some(&admin),
        Some(json!({
            "sourceShopId": fx.shop_a.id,
            "destinationShopId": fx.shop_b.id,
            "items": [{"productId": fx.product.id, "quantity": 11}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_INVENTORY");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("available 10, requested 11"));
}

#[tokio::test]
async fn test_put_and_delete_pending_transfer() {
    let (fx, app, admin) = seeded().await;
    let id = create_transfer(&fx, &app, &admin, 2).await;
    let uri = format!("/api/v1/transfers/{}", id);

    let (status, body) = send(
        &app,
        Method::PUT,
        &uri,
        Some(&admin),
        Some(json!({
            "sourceShopId": fx.shop_a.id,
            "destinationShopId": fx.shop_a.id,
            "items": [{"productId": fx.product.id, "quantity": 1}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "destinationShopId");

    let (status, body) = send(
        &app,
        Method::PUT,
        &uri,
        Some(&admin),
        Some(json!({
            "sourceShopId": fx.shop_a.id,
            "destinationShopId": fx.shop_b.id,
            "items": [{"productId": fx.product.id, "quantity": 5}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Transfer updated");
    assert_eq!(body["data"]["id"], id);
    assert_eq!(fx.stock(&fx.shop_a, &fx.product).await.1, 5);

    let (status, body) = send(&app, Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Transfer deleted");
    assert!(body.get("data").is_none());
    assert_eq!(fx.stock(&fx.shop_a, &fx.product).await.1, 0);

    let (status, _) = send(&app, Method::GET, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invoice_mismatch_and_receive() {
    let (fx, app, admin) = seeded().await;

    let mut distribution = serde_json::Map::new();
    distribution.insert(
        "0".to_string(),
        json!({ fx.shop_a.id.to_string(): 6, fx.shop_b.id.to_string(): 5 }),
    );
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/purchase-invoices",
        Some(&admin),
        Some(json!({
            "supplierId": 1,
            "items": [{"productId": fx.product.id, "quantity": 10, "unitCost": "130"}],
            "distribution": distribution
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "DISTRIBUTION_MISMATCH");
    assert_eq!(
        body["error"]["message"],
        "Distributed quantity 11 exceeds item quantity 10 (item 0)"
    );

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/purchase-invoices",
        Some(&admin),
        Some(json!({
            "supplierId": 1,
            "items": [{"productId": fx.product.id, "quantity": 5, "unitCost": "130"}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let invoice_id = body["data"]["id"].as_i64().unwrap();
    let receive_uri = format!("/api/v1/purchase-invoices/{}/receive", invoice_id);

    let (status, body) = send(&app, Method::POST, &receive_uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "received");
    assert_eq!(fx.stock(&fx.shop_a, &fx.product).await, (15, 0, dec("110")));

    let (status, _) = send(&app, Method::POST, &receive_uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(fx.stock(&fx.shop_a, &fx.product).await.0, 15);
}

#[tokio::test]
async fn test_shop_inventory_listing() {
    let (fx, app, _) = seeded().await;
    let viewer = token(&["inventory:view"]);

    let (status, body) = send(&app, Method::GET, "/api/v1/shops", Some(&viewer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/shops/{}/inventory", fx.shop_a.id),
        Some(&viewer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["quantity"], 10);
    assert_eq!(body[0]["sku"], "ESP-1KG");

    let (status, _) = send(&app, Method::GET, "/api/v1/shops/999/inventory", Some(&viewer), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
