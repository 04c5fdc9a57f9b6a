use axum::{
    extract::Multipart,
    http::{header, StatusCode},
    response::{AppendHeaders, IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::{ApiError, ServiceError};
use crate::services::uploads::ImageUpload;
use crate::ApiResponse;

/// 200 with `data: { name: value }`.
pub fn success_response<T: Serialize>(name: &str, value: T) -> Result<Response, ApiError> {
    let body = ApiResponse::success().with_data(name, value)?;
    Ok((StatusCode::OK, Json(body)).into_response())
}

/// 201 with `data: { name: value }`.
pub fn created_response<T: Serialize>(name: &str, value: T) -> Result<Response, ApiError> {
    let body = ApiResponse::success().with_data(name, value)?;
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

/// 200 with `results` and `data: { name: [...] }`.
pub fn list_response<T: Serialize>(name: &str, items: Vec<T>) -> Result<Response, ApiError> {
    let body = ApiResponse::success()
        .with_results(items.len())
        .with_data(name, items)?;
    Ok((StatusCode::OK, Json(body)).into_response())
}

pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Token in the body plus the `jwt` session cookie.
pub fn session_response<T: Serialize>(
    status: StatusCode,
    token: String,
    cookie: String,
    name: &str,
    value: T,
) -> Result<Response, ApiError> {
    let body = ApiResponse::success()
        .with_token(token)
        .with_data(name, value)?;
    Ok((
        status,
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(body),
    )
        .into_response())
}

/// Collects file parts by field name. Unknown fields are refused.
pub async fn collect_images(
    mut multipart: Multipart,
    allowed: &[(&str, usize)],
) -> Result<Vec<(String, ImageUpload)>, ApiError> {
    let mut parts: Vec<(String, ImageUpload)> = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let Some((_, max)) = allowed.iter().find(|(allowed_name, _)| *allowed_name == name) else {
            return Err(ServiceError::BadRequest(format!("Unexpected field: {}", name)).into());
        };
        if parts.iter().filter(|(n, _)| *n == name).count() >= *max {
            return Err(ServiceError::BadRequest(format!(
                "Too many files for {} (max {})",
                name, max
            ))
            .into());
        }

        let upload = ImageUpload {
            file_name: field.file_name().map(String::from),
            content_type: field.content_type().map(String::from),
            bytes: field.bytes().await?,
        };
        parts.push((name, upload));
    }

    Ok(parts)
}
