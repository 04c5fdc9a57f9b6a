/*!
 * # Authentication and Authorization Module
 *
 * Session tokens are HS256 JWTs carried either in an `Authorization: Bearer`
 * header or in the HTTP-only `jwt` cookie. Verification always reloads the
 * account so deactivated users and tokens issued before a password change
 * are rejected.
 */

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

pub mod cookie;
pub mod password;
mod rbac;

pub use password::{hash_password, verify_password};
pub use rbac::*;

use crate::config::AppConfig;
use crate::entities::{user, Role};
use crate::errors::{ApiError, ServiceError};

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // Subject (user ID)
    pub role: Role,   // Role at issue time; the stored role is authoritative
    pub jti: String,  // JWT ID
    pub iat: i64,     // Issued at time
    pub exp: i64,     // Expiration time
    pub nbf: i64,     // Not valid before time
    pub iss: String,  // Issuer
    pub aud: String,  // Audience
}

/// Authenticated caller, inserted into request extensions by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
    pub token_id: String,
    pub issued_at: i64,
}

impl AuthUser {
    pub fn has_permission(&self, permission: Permission) -> bool {
        role_has_permission(self.role, permission)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// True for the resource owner or an admin.
    pub fn can_access(&self, owner_id: Uuid) -> bool {
        self.user_id == owner_id || self.is_admin()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub token_expiration: Duration,
    pub cookie_expiration_days: i64,
    pub cookie_secure: bool,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_audience: String,
        jwt_issuer: String,
        token_expiration: Duration,
        cookie_expiration_days: i64,
        cookie_secure: bool,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_audience,
            jwt_issuer,
            token_expiration,
            cookie_expiration_days,
            cookie_secure,
        }
    }

    pub fn from_app_config(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            cfg.jwt_audience.clone(),
            cfg.jwt_issuer.clone(),
            cfg.jwt_ttl(),
            cfg.jwt_cookie_expiration_days,
            cfg.cookie_secure,
        )
    }
}

/// Issues and verifies session tokens.
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    pub db: Arc<DatabaseConnection>,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self { config, db }
    }

    /// Signs a new session token for `user`.
    pub fn issue_token(&self, user: &user::Model) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(self.config.token_expiration)
                .map_err(|_| AuthError::TokenCreation("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };
        self.encode_claims(&claims)
    }

    pub fn encode_claims(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Checks signature, expiry, issuer and audience.
    pub fn decode_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);
        validation.validate_nbf = true;

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }

    /// Decodes the token and reloads its account.
    pub async fn verify(&self, token: &str) -> Result<(AuthUser, user::Model), AuthError> {
        let claims = self.decode_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        let user = user::active_users()
            .filter(user::Column::Id.eq(user_id))
            .one(self.db.as_ref())
            .await?
            .ok_or(AuthError::UserGone)?;

        if user.changed_password_after(claims.iat) {
            return Err(AuthError::PasswordChanged);
        }

        let auth_user = AuthUser {
            user_id: user.id,
            role: user.role,
            token_id: claims.jti,
            issued_at: claims.iat,
        };
        Ok((auth_user, user))
    }

    pub fn session_cookie(&self, token: &str) -> String {
        cookie::session_cookie(
            token,
            self.config.cookie_expiration_days,
            self.config.cookie_secure,
        )
    }

    pub fn logout_cookie(&self) -> String {
        cookie::logout_cookie(self.config.cookie_secure)
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("You are not logged in! Please sign in to get access")]
    MissingToken,

    #[error("Invalid token. Please log in again!")]
    InvalidToken,

    #[error("Your token has expired! Please log in again")]
    TokenExpired,

    #[error("The user belonging to this token does no longer exists")]
    UserGone,

    #[error("User recently changed password. Please sign in again")]
    PasswordChanged,

    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("You do not have permission to perform this action")]
    InsufficientPermissions,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Authentication service not available")]
    ServiceUnavailable,

    #[error(transparent)]
    Database(#[from] DbErr),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InsufficientPermissions => ServiceError::Forbidden(err.to_string()),
            AuthError::TokenCreation(msg) => ServiceError::JwtError(msg),
            AuthError::Hashing(msg) => ServiceError::HashError(msg),
            AuthError::ServiceUnavailable => ServiceError::InternalError(err.to_string()),
            AuthError::Database(db) => ServiceError::from(db),
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::ServiceError(err.into())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

/// Bearer header first, then the `jwt` cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .or_else(|| cookie::token_from_cookies(headers))
}

/// Authentication middleware that validates the session token.
pub async fn auth_middleware(mut request: Request, next: Next) -> Result<Response, AuthError> {
    let auth_service = request
        .extensions()
        .get::<Arc<AuthService>>()
        .cloned()
        .ok_or(AuthError::ServiceUnavailable)?;

    let token = extract_token(request.headers()).ok_or(AuthError::MissingToken)?;
    let (auth_user, _) = auth_service.verify(&token).await?;
    debug!(user_id = %auth_user.user_id, role = %auth_user.role, "authenticated request");

    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

/// Permission middleware; must run after [`auth_middleware`].
pub async fn permission_middleware(
    State(required): State<Permission>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingToken)?;

    if !user.has_permission(required) {
        debug!(user_id = %user.user_id, permission = %required, "permission denied");
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_permission(self, permission: Permission) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_permission(self, permission: Permission) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            permission,
            permission_middleware,
        ))
        .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::HeaderValue;
    use sea_orm::Database;

    const SECRET: &str = "q8Zt3LmN0vX7bR2kW5yH9cJ4pF6sD1gA-uE8iO3nT7rV0xK2zM5wB9qY4hL6jC1f";

    async fn service() -> AuthService {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        AuthService::new(
            AuthConfig::new(
                SECRET.into(),
                "shop-api-clients".into(),
                "shop-api".into(),
                Duration::from_secs(3600),
                90,
                false,
            ),
            Arc::new(db),
        )
    }

    fn model() -> user::Model {
        let now = Utc::now();
        user::Model {
            id: Uuid::new_v4(),
            name: "ada".into(),
            email: "ada@example.com".into(),
            photo: "default.png".into(),
            role: Role::User,
            password_hash: String::new(),
            password_changed_at: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn issued_token_decodes_with_claims() {
        let svc = service().await;
        let user = model();
        let token = svc.issue_token(&user).unwrap();
        let claims = svc.decode_token(&token).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.iss, "shop-api");
        assert!(claims.exp > claims.iat);
    }

    #[tokio::test]
    async fn expired_token_is_reported_as_expired() {
        let svc = service().await;
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            role: Role::User,
            jti: "j".into(),
            iat: now - 7200,
            exp: now - 3600,
            nbf: now - 7200,
            iss: "shop-api".into(),
            aud: "shop-api-clients".into(),
        };
        let token = svc.encode_claims(&claims).unwrap();
        assert_matches!(svc.decode_token(&token), Err(AuthError::TokenExpired));
    }

    #[tokio::test]
    async fn wrong_audience_or_garbage_is_invalid() {
        let svc = service().await;
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            role: Role::Admin,
            jti: "j".into(),
            iat: now,
            exp: now + 600,
            nbf: now,
            iss: "shop-api".into(),
            aud: "someone-else".into(),
        };
        let token = svc.encode_claims(&claims).unwrap();
        assert_matches!(svc.decode_token(&token), Err(AuthError::InvalidToken));
        assert_matches!(svc.decode_token("abc"), Err(AuthError::InvalidToken));
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("jwt=from-cookie"));
        assert_eq!(extract_token(&headers).as_deref(), Some("from-cookie"));
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn auth_errors_map_to_status_and_message() {
        let err: ServiceError = AuthError::UserGone.into();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
        assert_eq!(
            err.response_message(),
            "The user belonging to this token does no longer exists"
        );
        let err: ServiceError = AuthError::InsufficientPermissions.into();
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
    }

    #[test]
    fn token_signing_failure_is_an_internal_fault() {
        let err: ServiceError = AuthError::TokenCreation("bad key".into()).into();
        assert_matches!(err, ServiceError::JwtError(_));
        assert_eq!(
            err.status_code(),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        );
        assert!(!err.is_operational());
    }
}
