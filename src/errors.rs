use axum::{
    extract::rejection::{JsonRejection, QueryRejection, RawPathParamsRejection},
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{error::DbErr, SqlErr};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::tracing::{current_error_detail, current_request_id, ErrorDetail};

/// Message used for every non-operational failure in production mode.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went very wrong!";

/// Error envelope returned on every failed request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "status": "fail",
    "message": "No product found with id 550e8400-e29b-41d4-a716-446655440000",
    "requestId": "req-abc123xyz"
}))]
pub struct ErrorResponse {
    /// `fail` for 4xx, `error` for 5xx
    pub status: String,
    pub message: String,
    /// Error kind, development mode only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Source chain, development mode only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("JWT error: {0}")]
    JwtError(String),

    #[error("Hash error: {0}")]
    HashError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<DbErr> for ServiceError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => ServiceError::Conflict(
                "Duplicate field value. Please use another value!".to_string(),
            ),
            _ => ServiceError::DatabaseError(err),
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::ValidationError(format!(
            "Invalid input data. {}",
            describe_validation_errors(&err)
        ))
    }
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            Self::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::DatabaseError(_)
            | Self::JwtError(_)
            | Self::HashError(_)
            | Self::IoError(_)
            | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Expected, user-facing failures; their message is safe to show.
    pub fn is_operational(&self) -> bool {
        self.status_code().is_client_error()
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "DatabaseError",
            Self::NotFound(_) => "NotFound",
            Self::ValidationError(_) => "ValidationError",
            Self::BadRequest(_) => "BadRequest",
            Self::Unauthorized(_) => "Unauthorized",
            Self::Forbidden(_) => "Forbidden",
            Self::Conflict(_) => "Conflict",
            Self::PreconditionFailed(_) => "PreconditionFailed",
            Self::RateLimitExceeded => "RateLimitExceeded",
            Self::JwtError(_) => "JwtError",
            Self::HashError(_) => "HashError",
            Self::IoError(_) => "IoError",
            Self::InternalError(_) => "InternalError",
        }
    }

    /// The bare message, without the variant prefix used by `Display`.
    pub fn response_message(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::ValidationError(msg)
            | Self::BadRequest(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::Conflict(msg)
            | Self::PreconditionFailed(msg)
            | Self::JwtError(msg)
            | Self::HashError(msg)
            | Self::InternalError(msg) => msg.clone(),
            Self::RateLimitExceeded => {
                "Too many requests from this IP, please try again in an hour!".to_string()
            }
            Self::DatabaseError(err) => err.to_string(),
            Self::IoError(err) => err.to_string(),
        }
    }

    /// Builds the envelope for the given detail mode.
    pub fn to_error_response(&self, detail: ErrorDetail) -> (StatusCode, ErrorResponse) {
        let request_id = current_request_id().map(|rid| rid.as_str().to_string());
        let status = self.status_code();
        let status_label = if status.is_server_error() {
            "error"
        } else {
            "fail"
        };

        let body = match detail {
            ErrorDetail::Development => ErrorResponse {
                status: status_label.to_string(),
                message: self.response_message(),
                error: Some(self.kind().to_string()),
                stack: Some(source_chain(self)),
                request_id,
            },
            ErrorDetail::Production if self.is_operational() => ErrorResponse {
                status: status_label.to_string(),
                message: self.response_message(),
                error: None,
                stack: None,
                request_id,
            },
            ErrorDetail::Production => ErrorResponse {
                status: "error".to_string(),
                message: GENERIC_FAILURE_MESSAGE.to_string(),
                error: None,
                stack: None,
                request_id,
            },
        };

        (status, body)
    }
}

fn source_chain(err: &(dyn std::error::Error + 'static)) -> Vec<String> {
    let mut chain = vec![err.to_string()];
    let mut current = err.source();
    while let Some(source) = current {
        chain.push(source.to_string());
        current = source.source();
    }
    chain
}

/// Flattens validator output into `field: message` fragments joined by `. `.
pub fn describe_validation_errors(errors: &ValidationErrors) -> String {
    let mut parts = Vec::new();
    collect_validation_messages(errors, None, &mut parts);
    parts.sort();
    parts.join(". ")
}

fn collect_validation_messages(
    errors: &ValidationErrors,
    prefix: Option<&str>,
    parts: &mut Vec<String>,
) {
    for (field, kind) in errors.errors() {
        let path = match prefix {
            Some(p) => format!("{}.{}", p, field),
            None => field.to_string(),
        };
        match kind {
            ValidationErrorsKind::Field(errs) => {
                for e in errs {
                    let msg = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("invalid ({})", e.code));
                    parts.push(format!("{}: {}", path, msg));
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                collect_validation_messages(inner, Some(&path), parts)
            }
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    collect_validation_messages(inner, Some(&format!("{}[{}]", path, idx)), parts);
                }
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        ApiError::ServiceError(self).into_response()
    }
}

/// Error type returned by every HTTP handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Service error: {0}")]
    ServiceError(#[from] ServiceError),
}

impl From<ValidationErrors> for ApiError {
    fn from(err: ValidationErrors) -> Self {
        ApiError::ServiceError(err.into())
    }
}

impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        ApiError::ServiceError(err.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::ServiceError(ServiceError::ValidationError(format!(
            "Invalid input data. {}",
            rejection.body_text()
        )))
    }
}

impl From<RawPathParamsRejection> for ApiError {
    fn from(rejection: RawPathParamsRejection) -> Self {
        ApiError::ServiceError(ServiceError::BadRequest(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::ServiceError(ServiceError::BadRequest(rejection.body_text()))
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::ServiceError(ServiceError::BadRequest(rejection.body_text()))
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::ServiceError(ServiceError::BadRequest(err.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::ServiceError(err) = self;
        let detail = current_error_detail();

        if !err.is_operational() {
            tracing::error!(error = %err, kind = err.kind(), "request failed");
        }

        let (status, body) = err.to_error_response(detail);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracing::{scope_error_detail, scope_request_id, RequestId};
    use axum::body::to_bytes;
    use rstest::rstest;

    async fn render(err: ServiceError, detail: ErrorDetail) -> (StatusCode, serde_json::Value) {
        let response = scope_request_id(
            RequestId::new("req-123"),
            scope_error_detail(detail, async move { ApiError::from(err).into_response() }),
        )
        .await;
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[rstest]
    #[case(ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND)]
    #[case(ServiceError::ValidationError("x".into()), StatusCode::BAD_REQUEST)]
    #[case(ServiceError::BadRequest("x".into()), StatusCode::BAD_REQUEST)]
    #[case(ServiceError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED)]
    #[case(ServiceError::JwtError("x".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(ServiceError::Forbidden("x".into()), StatusCode::FORBIDDEN)]
    #[case(ServiceError::Conflict("x".into()), StatusCode::CONFLICT)]
    #[case(ServiceError::PreconditionFailed("x".into()), StatusCode::PRECONDITION_FAILED)]
    #[case(ServiceError::RateLimitExceeded, StatusCode::TOO_MANY_REQUESTS)]
    #[case(ServiceError::HashError("x".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(ServiceError::InternalError("x".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    fn status_code_mapping(#[case] err: ServiceError, #[case] expected: StatusCode) {
        assert_eq!(err.status_code(), expected);
    }

    #[tokio::test]
    async fn operational_error_keeps_message_in_production() {
        let (status, body) = render(
            ServiceError::NotFound("No product found with that id".into()),
            ErrorDetail::Production,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "fail");
        assert_eq!(body["message"], "No product found with that id");
        assert_eq!(body["requestId"], "req-123");
        assert!(body.get("stack").is_none());
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn internal_error_is_hidden_in_production() {
        let (status, body) = render(
            ServiceError::HashError("argon2 blew up".into()),
            ErrorDetail::Production,
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], GENERIC_FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn development_mode_includes_kind_and_stack() {
        let (status, body) = render(
            ServiceError::InternalError("boom".into()),
            ErrorDetail::Development,
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "boom");
        assert_eq!(body["error"], "InternalError");
        assert_eq!(body["stack"][0], "Internal error: boom");
    }

    #[test]
    fn validation_errors_are_flattened() {
        let mut errors = ValidationErrors::new();
        let mut e = validator::ValidationError::new("length");
        e.message = Some("Password must be at least 8 characters".into());
        errors.add("password", e);
        let err = ServiceError::from(errors);
        assert_eq!(
            err.response_message(),
            "Invalid input data. password: Password must be at least 8 characters"
        );
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
