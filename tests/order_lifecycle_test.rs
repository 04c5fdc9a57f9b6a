mod common;

use axum::http::StatusCode;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use common::{decimal, id_of, TestApp, TestUser};

fn payment() -> Value {
    json!({
        "id": "PAY-123",
        "status": "COMPLETED",
        "updateTime": "2026-10-19T10:00:00Z",
        "emailAddress": "buyer@example.com"
    })
}

async fn place_order(app: &TestApp, buyer: &TestUser) -> Value {
    let reply = app
        .post(
            "/api/v1/orders",
            json!({ "paymentMethod": "card", "taxPrice": "1.50", "shippingPrice": "5.00" }),
            Some(&buyer.token),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    reply.body["data"]["order"].clone()
}

#[tokio::test]
async fn address_is_unique_per_user_and_owner_scoped() {
    let app = TestApp::new().await;
    let owner = app.signup().await;
    let stranger = app.signup().await;

    let none = app.get("/api/v1/address", Some(&owner.token)).await;
    assert_eq!(none.status, StatusCode::NOT_FOUND);
    assert_eq!(none.body["message"], "You have not added an address yet");

    let created = app.add_address(&owner, true).await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    let id = id_of(&created.body["data"]["address"]);

    let second = app.add_address(&owner, true).await;
    assert_eq!(second.status, StatusCode::CONFLICT);

    let peek = app
        .get(&format!("/api/v1/address/{}", id), Some(&stranger.token))
        .await;
    assert_eq!(peek.status, StatusCode::NOT_FOUND);

    let updated = app
        .patch(
            &format!("/api/v1/address/{}", id),
            json!({ "city": "Shelbyville" }),
            Some(&owner.token),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["data"]["address"]["city"], "Shelbyville");

    let deleted = app
        .delete(&format!("/api/v1/address/{}", id), Some(&owner.token))
        .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn ordering_requires_a_cart_and_an_address() {
    let app = TestApp::new().await;
    let (_, product) = app.seed_catalog("25.00", 5).await;
    let buyer = app.signup().await;

    let empty_cart = app
        .post(
            "/api/v1/orders",
            json!({ "paymentMethod": "card" }),
            Some(&buyer.token),
        )
        .await;
    assert_eq!(empty_cart.status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(empty_cart.body["message"], "Your cart is empty");

    app.add_to_cart(&buyer, product, 1).await;
    let no_address = app
        .post(
            "/api/v1/orders",
            json!({ "paymentMethod": "card" }),
            Some(&buyer.token),
        )
        .await;
    assert_eq!(no_address.status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(
        no_address.body["message"],
        "Please add a shipping address before ordering"
    );
}

#[tokio::test]
async fn order_snapshots_cart_lines_and_totals() {
    let app = TestApp::new().await;
    let (_, product) = app.seed_catalog("25.00", 5).await;
    let buyer = app.signup().await;
    app.add_to_cart(&buyer, product, 2).await;
    app.add_address(&buyer, true).await;

    let order = place_order(&app, &buyer).await;

    assert_eq!(order["isPaid"], false);
    assert_eq!(decimal(&order["itemsPrice"]), dec!(50.00));
    assert_eq!(decimal(&order["totalPrice"]), dec!(56.50));
    assert_eq!(order["items"][0]["quantity"], 2);
    assert!(order["shippingAddress"]
        .as_str()
        .unwrap()
        .contains("Springfield"));

    let mine = app.get("/api/v1/orders/myOrders", Some(&buyer.token)).await;
    assert_eq!(mine.status, StatusCode::OK);
    assert_eq!(mine.body["results"], 1);
}

#[tokio::test]
async fn paying_takes_stock_and_clears_cart_and_unsaved_address() {
    let app = TestApp::new().await;
    let (_, product) = app.seed_catalog("25.00", 5).await;
    let buyer = app.signup().await;
    app.add_to_cart(&buyer, product, 2).await;
    app.add_address(&buyer, false).await;
    let order = place_order(&app, &buyer).await;
    let order_id = id_of(&order);

    let paid = app
        .patch(
            &format!("/api/v1/orders/{}/pay", order_id),
            payment(),
            Some(&buyer.token),
        )
        .await;
    assert_eq!(paid.status, StatusCode::OK, "{}", paid.body);
    assert_eq!(paid.body["data"]["order"]["isPaid"], true);
    assert_eq!(paid.body["data"]["order"]["paymentResult"]["id"], "PAY-123");

    assert_eq!(app.stock_of(product).await, 3);

    let cart = app.get("/api/v1/cart", Some(&buyer.token)).await;
    assert_eq!(cart.body["results"], 0);

    let address = app.get("/api/v1/address", Some(&buyer.token)).await;
    assert_eq!(address.status, StatusCode::NOT_FOUND);

    let again = app
        .patch(
            &format!("/api/v1/orders/{}/pay", order_id),
            payment(),
            Some(&buyer.token),
        )
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn saved_address_survives_payment() {
    let app = TestApp::new().await;
    let (_, product) = app.seed_catalog("25.00", 5).await;
    let buyer = app.signup().await;
    app.add_to_cart(&buyer, product, 1).await;
    app.add_address(&buyer, true).await;
    let order_id = id_of(&place_order(&app, &buyer).await);

    let paid = app
        .patch(
            &format!("/api/v1/orders/{}/pay", order_id),
            payment(),
            Some(&buyer.token),
        )
        .await;
    assert_eq!(paid.status, StatusCode::OK);

    let address = app.get("/api/v1/address", Some(&buyer.token)).await;
    assert_eq!(address.status, StatusCode::OK);
}

#[tokio::test]
async fn insufficient_stock_rolls_payment_back() {
    let app = TestApp::new().await;
    let (admin, product) = app.seed_catalog("25.00", 5).await;
    let buyer = app.signup().await;
    app.add_to_cart(&buyer, product, 2).await;
    app.add_address(&buyer, false).await;
    let order_id = id_of(&place_order(&app, &buyer).await);

    let restocked = app
        .patch(
            &format!("/api/v1/products/{}", product),
            json!({
                "variants": [
                    { "size": "M", "colors": ["Blue"], "countInStock": 1, "price": "25.00" }
                ]
            }),
            Some(&admin.token),
        )
        .await;
    assert_eq!(restocked.status, StatusCode::OK, "{}", restocked.body);

    let paid = app
        .patch(
            &format!("/api/v1/orders/{}/pay", order_id),
            payment(),
            Some(&buyer.token),
        )
        .await;
    assert_eq!(paid.status, StatusCode::BAD_REQUEST);

    assert_eq!(app.stock_of(product).await, 1);
    let order = app
        .get(&format!("/api/v1/orders/{}", order_id), Some(&buyer.token))
        .await;
    assert_eq!(order.body["data"]["order"]["isPaid"], false);
    let cart = app.get("/api/v1/cart", Some(&buyer.token)).await;
    assert_eq!(cart.body["results"], serde_json::Value::Null);
    assert_eq!(cart.body["data"]["cart"]["items"].as_array().unwrap().len(), 1);
    let address = app.get("/api/v1/address", Some(&buyer.token)).await;
    assert_eq!(address.status, StatusCode::OK);
}

#[tokio::test]
async fn orders_are_visible_to_owner_and_admin_only() {
    let app = TestApp::new().await;
    let (admin, product) = app.seed_catalog("25.00", 5).await;
    let buyer = app.signup().await;
    let stranger = app.signup().await;
    app.add_to_cart(&buyer, product, 1).await;
    app.add_address(&buyer, true).await;
    let order_id = id_of(&place_order(&app, &buyer).await);
    let uri = format!("/api/v1/orders/{}", order_id);

    assert_eq!(app.get(&uri, Some(&buyer.token)).await.status, StatusCode::OK);
    assert_eq!(app.get(&uri, Some(&admin.token)).await.status, StatusCode::OK);
    assert_eq!(
        app.get(&uri, Some(&stranger.token)).await.status,
        StatusCode::FORBIDDEN
    );

    let all = app.get("/api/v1/orders", Some(&admin.token)).await;
    assert_eq!(all.status, StatusCode::OK);
    assert_eq!(all.body["results"], 1);

    let deleted = app.delete(&uri, Some(&buyer.token)).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get(&uri, Some(&admin.token)).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delivery_is_admin_only_and_allowed_before_payment() {
    let app = TestApp::new().await;
    let (admin, product) = app.seed_catalog("25.00", 5).await;
    let buyer = app.signup().await;
    app.add_to_cart(&buyer, product, 1).await;
    app.add_address(&buyer, true).await;
    let order_id = id_of(&place_order(&app, &buyer).await);
    let uri = format!("/api/v1/orders/{}/deliver", order_id);

    let by_buyer = app.patch(&uri, json!({}), Some(&buyer.token)).await;
    assert_eq!(by_buyer.status, StatusCode::FORBIDDEN);

    let delivered = app.patch(&uri, json!({}), Some(&admin.token)).await;
    assert_eq!(delivered.status, StatusCode::OK, "{}", delivered.body);
    assert_eq!(delivered.body["data"]["order"]["isDelivered"], true);
    assert_eq!(delivered.body["data"]["order"]["isPaid"], false);

    let twice = app.patch(&uri, json!({}), Some(&admin.token)).await;
    assert_eq!(twice.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn order_items_keep_cart_order() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let category = app.create_category(&admin, "ordered").await;
    let buyer = app.signup().await;
    let first = app.create_product(&admin, category, "9.00", 5).await;
    let second = app.create_product(&admin, category, "1.00", 5).await;
    app.add_to_cart(&buyer, first, 1).await;
    app.add_to_cart(&buyer, second, 1).await;
    app.add_address(&buyer, true).await;

    let order = place_order(&app, &buyer).await;

    assert_eq!(order["items"][0]["productId"], first.to_string());
    assert_eq!(order["items"][1]["productId"], second.to_string());
}
