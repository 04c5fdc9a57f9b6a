use crate::tracing::{scope_request_id, RequestId};
use axum::{extract::Request, middleware::Next, response::Response};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Makes the id assigned by `SetRequestIdLayer` visible to error rendering
/// for the rest of the request.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map(RequestId::new)
        .unwrap_or_default();

    scope_request_id(request_id, next.run(request)).await
}
