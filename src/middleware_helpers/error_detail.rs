use crate::tracing::{scope_error_detail, ErrorDetail};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

/// Scopes the configured error-detail mode around the rest of the stack so
/// `ApiError` can decide how much to render.
pub async fn error_detail_middleware(
    State(detail): State<ErrorDetail>,
    request: Request,
    next: Next,
) -> Response {
    scope_error_detail(detail, next.run(request)).await
}
