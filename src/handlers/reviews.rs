use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::common::{created_response, list_response, no_content_response, success_response};
use super::extract::{AppJson, AppPath, AppQuery};
use crate::{
    auth::{AuthRouterExt, AuthUser, Permission},
    errors::ApiError,
    services::reviews::{CreateReviewInput, UpdateReviewInput},
    ApiResponse, AppState, ListQuery,
};

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(rename_all = "camelCase")]
pub struct ReviewQuery {
    #[serde(default = "crate::default_page")]
    pub page: u64,
    #[serde(default = "crate::default_limit")]
    pub limit: u64,
    pub product_id: Option<Uuid>,
}

pub fn reviews_routes() -> Router<AppState> {
    let public = Router::new()
        .route("/", get(list_reviews))
        .route("/:id", get(get_review));

    let authors = Router::new()
        .route("/", post(create_review))
        .route("/:id", patch(update_review).delete(delete_review))
        .with_permission(Permission::ReviewsWrite);

    public.merge(authors)
}

#[utoipa::path(
    get,
    path = "/api/v1/reviews",
    summary = "List reviews",
    params(ReviewQuery),
    responses((status = 200, description = "Reviews", body = ApiResponse)),
    tag = "reviews"
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ReviewQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .services
        .reviews
        .list(query.product_id, query.page, query.limit)
        .await?;
    list_response("reviews", page.items)
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}/reviews",
    summary = "List a product's reviews",
    params(("id" = Uuid, Path, description = "Product id"), ListQuery),
    responses((status = 200, description = "Reviews of the product", body = ApiResponse)),
    tag = "reviews"
)]
pub async fn list_product_reviews(
    State(state): State<AppState>,
    AppPath(product_id): AppPath<Uuid>,
    AppQuery(query): AppQuery<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .services
        .reviews
        .list(Some(product_id), query.page, query.limit)
        .await?;
    list_response("reviews", page.items)
}

#[utoipa::path(
    get,
    path = "/api/v1/reviews/{id}",
    summary = "Get a review",
    params(("id" = Uuid, Path, description = "Review id")),
    responses(
        (status = 200, description = "Review", body = ApiResponse),
        (status = 404, description = "No review found with that ID", body = crate::errors::ErrorResponse),
    ),
    tag = "reviews"
)]
pub async fn get_review(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let review = state.services.reviews.get(id).await?;
    success_response("review", review)
}

#[utoipa::path(
    post,
    path = "/api/v1/reviews",
    summary = "Review a product",
    request_body = CreateReviewInput,
    responses(
        (status = 201, description = "Review created", body = ApiResponse),
        (status = 400, description = "Invalid input data", body = crate::errors::ErrorResponse),
        (status = 404, description = "No product found with that ID", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "reviews"
)]
pub async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(input): AppJson<CreateReviewInput>,
) -> Result<impl IntoResponse, ApiError> {
    let review = state.services.reviews.create(&user, None, input).await?;
    created_response("review", review)
}

#[utoipa::path(
    post,
    path = "/api/v1/products/{id}/reviews",
    summary = "Review the product in the path",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = CreateReviewInput,
    responses(
        (status = 201, description = "Review created", body = ApiResponse),
        (status = 404, description = "No product found with that ID", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "reviews"
)]
pub async fn create_product_review(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(product_id): AppPath<Uuid>,
    AppJson(input): AppJson<CreateReviewInput>,
) -> Result<impl IntoResponse, ApiError> {
    let review = state
        .services
        .reviews
        .create(&user, Some(product_id), input)
        .await?;
    created_response("review", review)
}

#[utoipa::path(
    patch,
    path = "/api/v1/reviews/{id}",
    summary = "Edit a review",
    params(("id" = Uuid, Path, description = "Review id")),
    request_body = UpdateReviewInput,
    responses(
        (status = 200, description = "Updated review", body = ApiResponse),
        (status = 403, description = "Not the author", body = crate::errors::ErrorResponse),
        (status = 404, description = "No review found with that ID", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "reviews"
)]
pub async fn update_review(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<UpdateReviewInput>,
) -> Result<impl IntoResponse, ApiError> {
    let review = state.services.reviews.update(&user, id, input).await?;
    success_response("review", review)
}

#[utoipa::path(
    delete,
    path = "/api/v1/reviews/{id}",
    summary = "Delete a review",
    params(("id" = Uuid, Path, description = "Review id")),
    responses(
        (status = 204, description = "Review deleted"),
        (status = 403, description = "Not the author", body = crate::errors::ErrorResponse),
        (status = 404, description = "No review found with that ID", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "reviews"
)]
pub async fn delete_review(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.reviews.delete(&user, id).await?;
    Ok(no_content_response())
}
