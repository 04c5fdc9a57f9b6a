mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;
use shop_api::entities::user;

use common::{TestApp, PASSWORD};

#[tokio::test]
async fn signup_returns_token_cookie_and_no_password_fields() {
    let app = TestApp::new().await;

    let reply = app
        .post(
            "/api/v1/users/signup",
            json!({
                "name": "Jane Doe",
                "email": "Jane@Example.com",
                "password": PASSWORD,
                "passwordConfirm": PASSWORD,
            }),
            None,
        )
        .await;

    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["status"], "success");
    assert!(reply.body["token"].as_str().is_some());
    let cookie = reply.set_cookie().expect("session cookie");
    assert!(cookie.starts_with("jwt="));
    assert!(cookie.contains("HttpOnly"));

    let created = &reply.body["data"]["user"];
    assert_eq!(created["role"], "user");
    assert!(created.get("password").is_none());
    assert!(created.get("passwordHash").is_none());

    let stored = user::Entity::find()
        .filter(user::Column::Name.eq("Jane Doe"))
        .one(app.state.db.as_ref())
        .await
        .unwrap()
        .expect("stored user");
    assert_ne!(stored.password_hash, PASSWORD);
    assert!(stored.password_hash.starts_with("$argon2"));
}

#[tokio::test]
async fn mismatched_confirmation_is_rejected_before_persistence() {
    let app = TestApp::new().await;

    let reply = app
        .post(
            "/api/v1/users/signup",
            json!({
                "name": "Mismatch",
                "email": "mismatch@example.com",
                "password": PASSWORD,
                "passwordConfirm": "secret124",
            }),
            None,
        )
        .await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["status"], "fail");
    let users = user::Entity::find()
        .count(app.state.db.as_ref())
        .await
        .unwrap();
    assert_eq!(users, 0);
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let app = TestApp::new().await;
    let first = app.signup().await;

    let reply = app
        .post(
            "/api/v1/users/signup",
            json!({
                "name": "Someone Else",
                "email": first.email,
                "password": PASSWORD,
                "passwordConfirm": PASSWORD,
            }),
            None,
        )
        .await;

    assert_eq!(reply.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn login_checks_credentials() {
    let app = TestApp::new().await;
    let account = app.signup().await;

    let ok = app
        .post(
            "/api/v1/users/login",
            json!({ "email": account.email, "password": PASSWORD }),
            None,
        )
        .await;
    assert_eq!(ok.status, StatusCode::OK);
    assert!(ok.body["token"].as_str().is_some());

    let wrong = app
        .post(
            "/api/v1/users/login",
            json!({ "email": account.email, "password": "not-the-password" }),
            None,
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.body["message"], "Incorrect email or password");

    let missing = app
        .post("/api/v1/users/login", json!({ "email": account.email }), None)
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.body["message"], "Please provide email and password!");
}

#[tokio::test]
async fn logout_overwrites_the_session_cookie() {
    let app = TestApp::new().await;

    let reply = app.get("/api/v1/users/logout", None).await;

    assert_eq!(reply.status, StatusCode::OK);
    let cookie = reply.set_cookie().expect("logout cookie");
    assert!(cookie.starts_with("jwt=loggedout"));
}

#[tokio::test]
async fn session_cookie_authenticates_requests() {
    let app = TestApp::new().await;
    let account = app.signup().await;

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/v1/users/yourProfile")
        .header(header::COOKIE, format!("theme=dark; jwt={}", account.token))
        .body(Body::empty())
        .unwrap();
    let reply = app.send(request).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["user"]["id"], account.id.to_string());
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = TestApp::new().await;

    let reply = app.get("/api/v1/users/yourProfile", None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        reply.body["message"],
        "You are not logged in! Please sign in to get access"
    );

    let garbage = app.get("/api/v1/users/yourProfile", Some("not.a.jwt")).await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_are_forbidden_to_users() {
    let app = TestApp::new().await;
    let account = app.signup().await;

    let users = app.get("/api/v1/users", Some(&account.token)).await;
    assert_eq!(users.status, StatusCode::FORBIDDEN);

    let category = app
        .post(
            "/api/v1/categories",
            json!({ "name": "shoes" }),
            Some(&account.token),
        )
        .await;
    assert_eq!(category.status, StatusCode::FORBIDDEN);

    let orders = app.get("/api/v1/orders", Some(&account.token)).await;
    assert_eq!(orders.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admins_can_manage_users() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let account = app.signup().await;

    let list = app.get("/api/v1/users", Some(&admin.token)).await;
    assert_eq!(list.status, StatusCode::OK);
    assert_eq!(list.body["results"], 2);

    let promoted = app
        .patch(
            &format!("/api/v1/users/{}", account.id),
            json!({ "role": "admin" }),
            Some(&admin.token),
        )
        .await;
    assert_eq!(promoted.status, StatusCode::OK);
    assert_eq!(promoted.body["data"]["user"]["role"], "admin");

    let removed = app
        .delete(&format!("/api/v1/users/{}", account.id), Some(&admin.token))
        .await;
    assert_eq!(removed.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn deleted_profile_cannot_log_in_or_use_old_token() {
    let app = TestApp::new().await;
    let account = app.signup().await;

    let reply = app
        .delete("/api/v1/users/deleteProfile", Some(&account.token))
        .await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
    assert_eq!(reply.body, serde_json::Value::Null);

    let login = app
        .post(
            "/api/v1/users/login",
            json!({ "email": account.email, "password": PASSWORD }),
            None,
        )
        .await;
    assert_eq!(login.status, StatusCode::UNAUTHORIZED);

    let profile = app
        .get("/api/v1/users/yourProfile", Some(&account.token))
        .await;
    assert_eq!(profile.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn update_profile_refuses_password_changes() {
    let app = TestApp::new().await;
    let account = app.signup().await;

    let reply = app
        .patch(
            "/api/v1/users/updateProfile",
            json!({ "password": "another-secret", "passwordConfirm": "another-secret" }),
            Some(&account.token),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let renamed = app
        .patch(
            "/api/v1/users/updateProfile",
            json!({ "name": "Renamed Person" }),
            Some(&account.token),
        )
        .await;
    assert_eq!(renamed.status, StatusCode::OK);
    assert_eq!(renamed.body["data"]["user"]["name"], "Renamed Person");
}

#[tokio::test]
async fn password_update_issues_a_new_session() {
    let app = TestApp::new().await;
    let account = app.signup().await;

    let wrong = app
        .patch(
            "/api/v1/users/updateMyPassword",
            json!({
                "passwordCurrent": "wrong-password",
                "password": "brand-new-secret",
                "passwordConfirm": "brand-new-secret",
            }),
            Some(&account.token),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let reply = app
        .patch(
            "/api/v1/users/updateMyPassword",
            json!({
                "passwordCurrent": PASSWORD,
                "password": "brand-new-secret",
                "passwordConfirm": "brand-new-secret",
            }),
            Some(&account.token),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body["token"].as_str().is_some());
    assert!(reply.set_cookie().is_some());

    let login = app
        .post(
            "/api/v1/users/login",
            json!({ "email": account.email, "password": "brand-new-secret" }),
            None,
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
}

#[tokio::test]
async fn tokens_issued_before_a_password_change_are_rejected() {
    let app = TestApp::new().await;
    let account = app.signup().await;

    // token timestamps have whole-second resolution and the change is backdated by one
    tokio::time::sleep(std::time::Duration::from_millis(2100)).await;

    let changed = app
        .patch(
            "/api/v1/users/updateMyPassword",
            json!({
                "passwordCurrent": PASSWORD,
                "password": "brand-new-secret",
                "passwordConfirm": "brand-new-secret",
            }),
            Some(&account.token),
        )
        .await;
    assert_eq!(changed.status, StatusCode::OK, "{}", changed.body);
    let fresh = changed.body["token"].as_str().unwrap().to_string();

    let stale = app.get("/api/v1/users/yourProfile", Some(&account.token)).await;
    assert_eq!(stale.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        stale.body["message"],
        "User recently changed password. Please sign in again"
    );

    let current = app.get("/api/v1/users/yourProfile", Some(&fresh)).await;
    assert_eq!(current.status, StatusCode::OK);
}
