use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::common::{
    collect_images, created_response, list_response, no_content_response, success_response,
};
use super::extract::{AppJson, AppPath, AppQuery};
use super::reviews;
use crate::{
    auth::{AuthRouterExt, Permission},
    errors::{ApiError, ServiceError},
    services::products::{CreateProductInput, ProductFilter, UpdateProductInput},
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct ProductQuery {
    #[serde(default = "crate::default_page")]
    pub page: u64,
    #[serde(default = "crate::default_limit")]
    pub limit: u64,
    /// Category id filter
    pub category: Option<Uuid>,
}

pub fn products_routes(max_upload_bytes: usize) -> Router<AppState> {
    let public = Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product))
        .route("/:id/reviews", get(reviews::list_product_reviews));

    let reviewers = Router::new()
        .route("/:id/reviews", post(reviews::create_product_review))
        .with_permission(Permission::ReviewsWrite);

    let admin = Router::new()
        .route("/", post(create_product))
        .route("/:id", patch(update_product).delete(delete_product))
        .route(
            "/:id/images",
            patch(upload_product_images).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .with_permission(Permission::CatalogWrite);

    public.merge(reviewers).merge(admin)
}

#[utoipa::path(
    get,
    path = "/api/v1/products",
    summary = "List products",
    params(ProductQuery),
    responses((status = 200, description = "Products with their variants", body = ApiResponse)),
    tag = "catalog"
)]
pub async fn list_products(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ProductQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = ProductFilter {
        category: query.category,
    };
    let page = state
        .services
        .products
        .list(filter, query.page, query.limit)
        .await?;
    list_response("products", page.items)
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    summary = "Get a product",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product with variants and reviews", body = ApiResponse),
        (status = 404, description = "No product found with that ID", body = crate::errors::ErrorResponse),
    ),
    tag = "catalog"
)]
pub async fn get_product(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state.services.products.get(id).await?;
    success_response("product", product)
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    summary = "Create a product",
    request_body = CreateProductInput,
    responses(
        (status = 201, description = "Product created", body = ApiResponse),
        (status = 400, description = "Invalid input data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admins only", body = crate::errors::ErrorResponse),
        (status = 404, description = "No category found with that ID", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "catalog"
)]
pub async fn create_product(
    State(state): State<AppState>,
    AppJson(input): AppJson<CreateProductInput>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state.services.products.create(input).await?;
    created_response("newProduct", product)
}

/// Supplying `variants` replaces the whole variant set.
#[utoipa::path(
    patch,
    path = "/api/v1/products/{id}",
    summary = "Update a product",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = UpdateProductInput,
    responses(
        (status = 200, description = "Updated product", body = ApiResponse),
        (status = 404, description = "No product found with that ID", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "catalog"
)]
pub async fn update_product(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<UpdateProductInput>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state.services.products.update(id, input).await?;
    success_response("product", product)
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    summary = "Delete a product",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 204, description = "Product, variants and reviews deleted"),
        (status = 404, description = "No product found with that ID", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "catalog"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.products.delete(id).await?;
    Ok(no_content_response())
}

/// Multipart: `imageCover` (max 1) and `images` (max 3).
#[utoipa::path(
    patch,
    path = "/api/v1/products/{id}/images",
    summary = "Upload product images",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body(content_type = "multipart/form-data", description = "`imageCover` and `images` parts"),
    responses(
        (status = 200, description = "Product with new image names", body = ApiResponse),
        (status = 400, description = "Not an image or too many files", body = crate::errors::ErrorResponse),
        (status = 404, description = "No product found with that ID", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "catalog"
)]
pub async fn upload_product_images(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    if !state.services.products.exists(id).await? {
        return Err(ServiceError::NotFound("No product found with that ID".to_string()).into());
    }

    let parts = collect_images(multipart, &[("imageCover", 1), ("images", 3)]).await?;
    let mut cover = None;
    let mut images = Vec::new();
    for (name, upload) in parts {
        if name == "imageCover" {
            cover = Some(upload);
        } else {
            images.push(upload);
        }
    }

    let stored = state
        .services
        .uploads
        .store_product_images(id, cover, images)
        .await?;
    let product = state
        .services
        .products
        .set_images(id, stored.image_cover, stored.images)
        .await?;
    success_response("product", product)
}
