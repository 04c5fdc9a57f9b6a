#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::{json, Value};
use shop_api::{
    config::{AppConfig, DEV_DEFAULT_JWT_SECRET},
    db,
    entities::{user, Role},
    events::{self, EventSender},
    rate_limiter::{RateLimitConfig, RateLimiter},
    AppState,
};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "secret123";

/// Full application over a throwaway SQLite file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _dir: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

/// A signed-up account and its session token.
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub token: String,
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_environment("test").await
    }

    pub async fn with_environment(environment: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let db_path = dir.path().join("shop.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            DEV_DEFAULT_JWT_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            environment.to_string(),
        );
        cfg.db_max_connections = 4;
        cfg.db_min_connections = 1;
        cfg.cookie_secure = false;
        cfg.upload_dir = dir.path().join("img").display().to_string();
        std::fs::create_dir_all(&cfg.upload_dir).expect("create upload dir");

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let limiter = RateLimiter::in_memory(RateLimitConfig {
            requests_per_window: 10_000,
            ..RateLimitConfig::default()
        });

        let state = AppState::new(Arc::new(pool), cfg, EventSender::new(event_tx));
        let router = shop_api::app_router(state.clone(), limiter);

        Self {
            router,
            state,
            _dir: dir,
            _event_task: event_task,
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub async fn send(&self, request: Request<Body>) -> Reply {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request");
        Reply::read(response).await
    }

    /// JSON request with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", tok));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize request body"))
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).expect("build request")).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Reply {
        self.request(Method::GET, uri, None, token).await
    }

    pub async fn post(&self, uri: &str, body: Value, token: Option<&str>) -> Reply {
        self.request(Method::POST, uri, Some(body), token).await
    }

    pub async fn patch(&self, uri: &str, body: Value, token: Option<&str>) -> Reply {
        self.request(Method::PATCH, uri, Some(body), token).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> Reply {
        self.request(Method::DELETE, uri, None, token).await
    }

    /// Signs up a fresh account with generated name and email.
    pub async fn signup(&self) -> TestUser {
        let name: String = Name().fake();
        let email: String = SafeEmail().fake();
        let name = format!("{} {}", name, &Uuid::new_v4().simple().to_string()[..6]);
        let email = format!("{}.{}", &Uuid::new_v4().simple().to_string()[..6], email);

        let reply = self
            .post(
                "/api/v1/users/signup",
                json!({
                    "name": name,
                    "email": email,
                    "password": PASSWORD,
                    "passwordConfirm": PASSWORD,
                }),
                None,
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "signup: {}", reply.body);

        TestUser {
            id: Uuid::parse_str(reply.body["data"]["user"]["id"].as_str().expect("user id"))
                .expect("uuid"),
            email,
            token: reply.body["token"].as_str().expect("token").to_string(),
        }
    }

    /// Signs up an account and promotes it directly in the database.
    pub async fn admin(&self) -> TestUser {
        let account = self.signup().await;
        let stored = user::Entity::find_by_id(account.id)
            .one(self.state.db.as_ref())
            .await
            .expect("load user")
            .expect("user exists");
        let mut active: user::ActiveModel = stored.into();
        active.role = Set(Role::Admin);
        active
            .update(self.state.db.as_ref())
            .await
            .expect("promote admin");
        account
    }

    pub async fn create_category(&self, admin: &TestUser, name: &str) -> Uuid {
        let reply = self
            .post(
                "/api/v1/categories",
                json!({ "name": name }),
                Some(&admin.token),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "category: {}", reply.body);
        id_of(&reply.body["data"]["category"])
    }

    /// Product with a single `M` / `Blue` variant.
    pub async fn create_product(
        &self,
        admin: &TestUser,
        category: Uuid,
        price: &str,
        stock: i32,
    ) -> Uuid {
        let reply = self
            .post(
                "/api/v1/products",
                json!({
                    "name": format!("Shirt {}", Uuid::new_v4().simple()),
                    "imageCover": "cover.jpeg",
                    "category": category,
                    "storeName": "Main Street",
                    "variants": [
                        { "size": "M", "colors": ["Blue", "Navy"], "countInStock": stock, "price": price }
                    ]
                }),
                Some(&admin.token),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "product: {}", reply.body);
        id_of(&reply.body["data"]["newProduct"])
    }

    /// Admin, category and one product in a single call.
    pub async fn seed_catalog(&self, price: &str, stock: i32) -> (TestUser, Uuid) {
        let admin = self.admin().await;
        let category = self
            .create_category(&admin, &format!("cat-{}", &Uuid::new_v4().simple().to_string()[..8]))
            .await;
        let product = self.create_product(&admin, category, price, stock).await;
        (admin, product)
    }

    pub async fn add_address(&self, account: &TestUser, is_saved: bool) -> Reply {
        self.post(
            "/api/v1/address",
            json!({
                "street": "1 Main St",
                "city": "Springfield",
                "state": "IL",
                "zipCode": "62701",
                "country": "US",
                "isSaved": is_saved,
            }),
            Some(&account.token),
        )
        .await
    }

    pub async fn add_to_cart(&self, account: &TestUser, product: Uuid, quantity: i32) -> Reply {
        self.post(
            "/api/v1/cart/add",
            json!({ "productId": product, "size": "M", "color": "Blue", "quantity": quantity }),
            Some(&account.token),
        )
        .await
    }

    /// Stock of the product's first variant, read from the API.
    pub async fn stock_of(&self, product: Uuid) -> i64 {
        let reply = self.get(&format!("/api/v1/products/{}", product), None).await;
        reply.body["data"]["product"]["variants"][0]["countInStock"]
            .as_i64()
            .expect("countInStock")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

impl Reply {
    async fn read(response: Response) -> Self {
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn set_cookie(&self) -> Option<&str> {
        self.headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
    }
}

pub fn id_of(value: &Value) -> Uuid {
    Uuid::parse_str(value["id"].as_str().expect("id field")).expect("uuid")
}

/// Decimals arrive as strings; accept numbers too.
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("not a decimal: {}", other),
    }
}
