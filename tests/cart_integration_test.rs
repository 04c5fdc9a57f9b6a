mod common;

use axum::http::StatusCode;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

use common::{decimal, id_of, TestApp};

#[tokio::test]
async fn adding_to_an_empty_cart_prices_the_line_from_the_variant() {
    let app = TestApp::new().await;
    let (_, product) = app.seed_catalog("25.00", 5).await;
    let shopper = app.signup().await;

    let empty = app.get("/api/v1/cart", Some(&shopper.token)).await;
    assert_eq!(empty.status, StatusCode::OK);
    assert_eq!(empty.body["results"], 0);
    assert_eq!(empty.body["message"], "There are not items in cart");

    let reply = app.add_to_cart(&shopper, product, 2).await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);

    let cart = &reply.body["data"]["cart"];
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(decimal(&cart["items"][0]["price"]), dec!(25.00));
    assert_eq!(decimal(&cart["totalPrice"]), dec!(50.00));
}

#[tokio::test]
async fn same_product_and_size_twice_is_a_conflict() {
    let app = TestApp::new().await;
    let (_, product) = app.seed_catalog("25.00", 5).await;
    let shopper = app.signup().await;

    let first = app.add_to_cart(&shopper, product, 2).await;
    assert_eq!(first.status, StatusCode::CREATED);

    let second = app.add_to_cart(&shopper, product, 1).await;
    assert_eq!(second.status, StatusCode::CONFLICT);
    assert_eq!(
        second.body["message"],
        "You already added this product to your cart!!"
    );

    let cart = app.get("/api/v1/cart", Some(&shopper.token)).await;
    let cart = &cart.body["data"]["cart"];
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(cart["items"][0]["quantity"], 2);
    assert_eq!(decimal(&cart["totalPrice"]), dec!(50.00));
}

#[tokio::test]
async fn unknown_product_or_option_is_not_found() {
    let app = TestApp::new().await;
    let (_, product) = app.seed_catalog("25.00", 5).await;
    let shopper = app.signup().await;

    let missing = app.add_to_cart(&shopper, Uuid::new_v4(), 1).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let wrong_color = app
        .post(
            "/api/v1/cart/add",
            json!({ "productId": product, "size": "M", "color": "Green" }),
            Some(&shopper.token),
        )
        .await;
    assert_eq!(wrong_color.status, StatusCode::NOT_FOUND);
    assert_eq!(wrong_color.body["message"], "No option available");
}

#[tokio::test]
async fn quantity_updates_and_removal_keep_total_in_sync() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let category = app.create_category(&admin, "shirts").await;
    let cheap = app.create_product(&admin, category, "10.00", 5).await;
    let pricey = app.create_product(&admin, category, "7.25", 5).await;
    let shopper = app.signup().await;

    app.add_to_cart(&shopper, cheap, 1).await;
    let before = app.get("/api/v1/cart", Some(&shopper.token)).await;
    let before_total = decimal(&before.body["data"]["cart"]["totalPrice"]);

    let added = app.add_to_cart(&shopper, pricey, 3).await;
    let cart = &added.body["data"]["cart"];
    assert_eq!(decimal(&cart["totalPrice"]), dec!(31.75));

    let item = cart["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|i| i["productId"] == pricey.to_string())
        .map(id_of)
        .expect("pricey line");

    let updated = app
        .patch(
            &format!("/api/v1/cart/updateQuantity/{}", item),
            json!({ "quantity": 4 }),
            Some(&shopper.token),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(
        decimal(&updated.body["data"]["cart"]["totalPrice"]),
        dec!(39.00)
    );

    let zero = app
        .patch(
            &format!("/api/v1/cart/updateQuantity/{}", item),
            json!({ "quantity": 0 }),
            Some(&shopper.token),
        )
        .await;
    assert_eq!(zero.status, StatusCode::BAD_REQUEST);

    let removed = app
        .delete(&format!("/api/v1/cart/delete/{}", item), Some(&shopper.token))
        .await;
    assert_eq!(removed.status, StatusCode::NO_CONTENT);

    let after = app.get("/api/v1/cart", Some(&shopper.token)).await;
    assert_eq!(decimal(&after.body["data"]["cart"]["totalPrice"]), before_total);
}

#[tokio::test]
async fn items_of_other_users_are_not_found() {
    let app = TestApp::new().await;
    let (_, product) = app.seed_catalog("25.00", 5).await;
    let owner = app.signup().await;
    let stranger = app.signup().await;

    let added = app.add_to_cart(&owner, product, 1).await;
    let item = id_of(&added.body["data"]["cart"]["items"][0]);

    let reply = app
        .delete(&format!("/api/v1/cart/delete/{}", item), Some(&stranger.token))
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["message"], "No item found with that ID");
}

#[tokio::test]
async fn clearing_the_cart_is_idempotent() {
    let app = TestApp::new().await;
    let (_, product) = app.seed_catalog("25.00", 5).await;
    let shopper = app.signup().await;
    app.add_to_cart(&shopper, product, 1).await;

    for _ in 0..2 {
        let reply = app.delete("/api/v1/cart/deleteAll", Some(&shopper.token)).await;
        assert_eq!(reply.status, StatusCode::NO_CONTENT);
    }

    let cart = app.get("/api/v1/cart", Some(&shopper.token)).await;
    assert_eq!(cart.body["results"], 0);
}

#[tokio::test]
async fn wishlist_rejects_the_same_product_twice() {
    let app = TestApp::new().await;
    let (_, product) = app.seed_catalog("25.00", 5).await;
    let shopper = app.signup().await;

    let empty = app.get("/api/v1/wishlist", Some(&shopper.token)).await;
    assert_eq!(empty.body["message"], "There are not items in wishlist");

    let first = app
        .post(
            "/api/v1/wishlist/add",
            json!({ "productId": product, "size": "M", "color": "Blue" }),
            Some(&shopper.token),
        )
        .await;
    assert_eq!(first.status, StatusCode::CREATED, "{}", first.body);
    let wishlist = &first.body["data"]["wishlist"];
    assert_eq!(wishlist["items"][0]["quantity"], 1);
    assert!(wishlist.get("totalPrice").is_none());

    let again = app
        .post(
            "/api/v1/wishlist/add",
            json!({ "productId": product, "size": "M", "color": "Blue", "quantity": 2 }),
            Some(&shopper.token),
        )
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);
    assert_eq!(
        again.body["message"],
        "You already added this product to your wishlist!!"
    );

    let item = id_of(&wishlist["items"][0]);
    let updated = app
        .patch(
            &format!("/api/v1/wishlist/updateQuantity/{}", item),
            json!({ "quantity": 3 }),
            Some(&shopper.token),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["data"]["wishlist"]["items"][0]["quantity"], 3);

    let cleared = app
        .delete("/api/v1/wishlist/deleteAll", Some(&shopper.token))
        .await;
    assert_eq!(cleared.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn cart_total_matches_sum_of_lines() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let category = app.create_category(&admin, "mixed").await;
    let shopper = app.signup().await;

    let lines = [("3.10", 3), ("12.99", 1), ("0.50", 7)];
    for (price, qty) in lines {
        let product = app.create_product(&admin, category, price, 10).await;
        let reply = app.add_to_cart(&shopper, product, qty).await;
        assert_eq!(reply.status, StatusCode::CREATED);
    }

    let cart = app.get("/api/v1/cart", Some(&shopper.token)).await;
    let cart = &cart.body["data"]["cart"];
    let expected: Decimal = cart["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| decimal(&item["price"]) * Decimal::from(item["quantity"].as_i64().unwrap()))
        .sum();
    assert_eq!(decimal(&cart["totalPrice"]), expected);
    assert_eq!(expected, dec!(25.79));
}

#[tokio::test]
async fn storage_rejects_duplicate_lines() {
    use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, Set};
    use shop_api::{
        entities::{cart_item, wishlist_item, VariantSize},
        errors::ServiceError,
    };

    let app = TestApp::new().await;
    let (_, product) = app.seed_catalog("25.00", 5).await;
    let shopper = app.signup().await;
    let db = &*app.state.db;

    app.add_to_cart(&shopper, product, 1).await;
    let line = cart_item::Entity::find().one(db).await.unwrap().unwrap();
    let mut copy = line.into_active_model();
    copy.id = Set(Uuid::new_v4());
    let err = copy.insert(db).await.expect_err("duplicate cart line");
    assert!(matches!(ServiceError::from(err), ServiceError::Conflict(_)));

    let listed = app
        .post(
            "/api/v1/wishlist/add",
            json!({ "productId": product, "size": "M", "color": "Blue" }),
            Some(&shopper.token),
        )
        .await;
    assert_eq!(listed.status, StatusCode::CREATED);
    let line = wishlist_item::Entity::find().one(db).await.unwrap().unwrap();
    let mut other_size = line.into_active_model();
    other_size.id = Set(Uuid::new_v4());
    other_size.size = Set(VariantSize::S);
    let err = other_size.insert(db).await.expect_err("duplicate wishlist line");
    assert!(matches!(ServiceError::from(err), ServiceError::Conflict(_)));
}

#[tokio::test]
async fn lines_are_listed_in_the_order_they_were_added() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let category = app.create_category(&admin, "ordered").await;
    let shopper = app.signup().await;

    let mut added = Vec::new();
    for price in ["1.00", "2.00", "3.00", "4.00", "5.00"] {
        let product = app.create_product(&admin, category, price, 10).await;
        app.add_to_cart(&shopper, product, 1).await;
        added.push(product.to_string());
    }

    let cart = app.get("/api/v1/cart", Some(&shopper.token)).await;
    let listed: Vec<String> = cart.body["data"]["cart"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["productId"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(listed, added);
}
