//! Shop API library
//!
//! E-commerce REST backend: accounts, catalog, reviews, cart, wishlist,
//! shipping addresses and orders over axum and SeaORM.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod rate_limiter;
pub mod services;
pub mod tracing;

use axum::{
    extract::{DefaultBodyLimit, Extension},
    http::{HeaderValue, Uri},
    middleware,
    response::IntoResponse,
    Router,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
};
use utoipa::{IntoParams, ToSchema};

use crate::auth::{AuthConfig, AuthService};
use crate::config::AppConfig;
use crate::errors::{ApiError, ServiceError};
use crate::events::EventSender;
use crate::rate_limiter::{rate_limit_middleware, RateLimiter};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub event_sender: Arc<EventSender>,
    pub auth: Arc<AuthService>,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(db: Arc<DatabaseConnection>, config: AppConfig, event_sender: EventSender) -> Self {
        let event_sender = Arc::new(event_sender);
        let auth = Arc::new(AuthService::new(
            AuthConfig::from_app_config(&config),
            db.clone(),
        ));
        let services = handlers::AppServices::new(
            db.clone(),
            event_sender.clone(),
            auth.clone(),
            &config.upload_dir,
        );
        Self {
            db,
            config: Arc::new(config),
            event_sender,
            auth,
            services,
        }
    }
}

// Common query parameters for list endpoints
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

pub(crate) fn default_page() -> u64 {
    1
}
pub(crate) fn default_limit() -> u64 {
    100
}

/// Success envelope: `{status, results?, token?, data?: {<name>: ...}, message?}`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiResponse {
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
            results: None,
            token: None,
            data: None,
            message: None,
        }
    }

    /// Adds `value` under `data.<name>`; repeated calls add more keys.
    pub fn with_data<T: Serialize>(mut self, name: &str, value: T) -> Result<Self, ServiceError> {
        let value = serde_json::to_value(value)
            .map_err(|e| ServiceError::InternalError(format!("serialize {}: {}", name, e)))?;
        let data = self
            .data
            .get_or_insert_with(|| Value::Object(Default::default()));
        if let Value::Object(map) = data {
            map.insert(name.to_string(), value);
        }
        Ok(self)
    }

    pub fn with_results(mut self, results: usize) -> Self {
        self.results = Some(results as u64);
        self
    }

    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}


/// Every `/api/v1` route, with per-group permission gating.
pub fn api_v1_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .nest("/users", handlers::users::users_routes(max_upload_bytes))
        .nest("/categories", handlers::categories::categories_routes())
        .nest("/products", handlers::products::products_routes(max_upload_bytes))
        .nest("/reviews", handlers::reviews::reviews_routes())
        .nest("/cart", handlers::cart::cart_routes())
        .nest("/wishlist", handlers::wishlist::wishlist_routes())
        .nest("/address", handlers::addresses::address_routes())
        .nest("/orders", handlers::orders::orders_routes())
}

fn cors_layer(cfg: &AppConfig) -> CorsLayer {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    match configured_origins {
        // Cookie sessions need credentials, which rule out wildcard origins.
        Some(origins) => CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                http::Method::GET,
                http::Method::POST,
                http::Method::PATCH,
                http::Method::DELETE,
                http::Method::OPTIONS,
            ])
            .allow_headers([
                http::header::AUTHORIZATION,
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
            ])
            .allow_credentials(true),
        None if cfg.should_allow_permissive_cors() => CorsLayer::permissive(),
        None => CorsLayer::new().allow_methods(Any),
    }
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    ApiError::from(ServiceError::NotFound(format!(
        "Can't find {} on this server!",
        uri.path()
    )))
}

/// The complete application: API, health, static images, docs and the
/// middleware stack. Shared by the binary and the integration tests.
pub fn app_router(state: AppState, rate_limiter: RateLimiter) -> Router {
    let cfg = state.config.clone();
    let error_detail = crate::tracing::ErrorDetail::for_environment(&cfg.environment);

    let api = Router::new()
        .nest("/api/v1", api_v1_routes(cfg.max_upload_bytes))
        .layer(DefaultBodyLimit::max(cfg.max_body_bytes))
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    Router::new()
        .merge(api)
        .merge(handlers::health::health_routes())
        .merge(openapi::swagger_ui())
        .nest_service("/images", ServeDir::new(&cfg.upload_dir))
        .fallback(not_found)
        // Inject AuthService into request extensions for auth middleware
        .layer(Extension(state.auth.clone()))
        .layer(middleware::from_fn_with_state(
            error_detail,
            middleware_helpers::error_detail_middleware,
        ))
        .layer(middleware::from_fn(middleware_helpers::request_id_middleware))
        .layer(TimeoutLayer::new(cfg.request_timeout()))
        .layer(cors_layer(&cfg))
        .layer(CompressionLayer::new())
        .layer(crate::tracing::configure_http_tracing())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
