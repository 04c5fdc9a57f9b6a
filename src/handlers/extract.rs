//! Extractors whose rejections render through [`ApiError`], so malformed
//! bodies, ids and queries get the same envelope as every other failure.

use std::str::FromStr;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, RawPathParams},
    http::request::Parts,
};

use crate::errors::{ApiError, ServiceError};

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

/// Single path parameter parsed with [`FromStr`]. The raw segment is kept so a
/// bad value can be echoed back as `Invalid value (abc) in path`.
#[derive(Debug)]
pub struct AppPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for AppPath<T>
where
    T: FromStr + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let params = RawPathParams::from_request_parts(parts, state).await?;
        let value = params
            .iter()
            .next()
            .map(|(_, value)| value)
            .ok_or_else(|| ServiceError::BadRequest("Missing path parameter".to_string()))?;
        value.parse().map(AppPath).map_err(|_| {
            ServiceError::BadRequest(format!("Invalid value ({}) in path", value)).into()
        })
    }
}

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);
