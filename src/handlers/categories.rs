use axum::{
    extract::State,
    response::IntoResponse,
    routing::get,
    Router,
};
use uuid::Uuid;

use super::common::{created_response, list_response, no_content_response, success_response};
use super::extract::{AppJson, AppPath, AppQuery};
use crate::{
    auth::{AuthRouterExt, Permission},
    errors::ApiError,
    services::categories::{CreateCategoryInput, UpdateCategoryInput},
    ApiResponse, AppState, ListQuery,
};

pub fn categories_routes() -> Router<AppState> {
    let public = Router::new()
        .route("/", get(list_categories))
        .route("/:id", get(get_category));

    let admin = Router::new()
        .route("/", axum::routing::post(create_category))
        .route(
            "/:id",
            axum::routing::patch(update_category).delete(delete_category),
        )
        .with_permission(Permission::CatalogWrite);

    public.merge(admin)
}

#[utoipa::path(
    get,
    path = "/api/v1/categories",
    summary = "List categories",
    params(ListQuery),
    responses((status = 200, description = "Categories", body = ApiResponse)),
    tag = "catalog"
)]
pub async fn list_categories(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .services
        .categories
        .list(query.page, query.limit)
        .await?;
    list_response("categories", page.items)
}

/// Category with the products it owns.
#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}",
    summary = "Get a category",
    params(("id" = Uuid, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category and its products", body = ApiResponse),
        (status = 404, description = "No category found with that ID", body = crate::errors::ErrorResponse),
    ),
    tag = "catalog"
)]
pub async fn get_category(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state.services.categories.get(id).await?;
    success_response("category", category)
}

#[utoipa::path(
    post,
    path = "/api/v1/categories",
    summary = "Create a category",
    request_body = CreateCategoryInput,
    responses(
        (status = 201, description = "Category created", body = ApiResponse),
        (status = 403, description = "Admins only", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name already used", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "catalog"
)]
pub async fn create_category(
    State(state): State<AppState>,
    AppJson(input): AppJson<CreateCategoryInput>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state.services.categories.create(input).await?;
    created_response("category", category)
}

#[utoipa::path(
    patch,
    path = "/api/v1/categories/{id}",
    summary = "Rename a category",
    params(("id" = Uuid, Path, description = "Category id")),
    request_body = UpdateCategoryInput,
    responses(
        (status = 200, description = "Updated category", body = ApiResponse),
        (status = 404, description = "No category found with that ID", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "catalog"
)]
pub async fn update_category(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<UpdateCategoryInput>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state.services.categories.update(id, input).await?;
    success_response("category", category)
}

#[utoipa::path(
    delete,
    path = "/api/v1/categories/{id}",
    summary = "Delete an empty category",
    params(("id" = Uuid, Path, description = "Category id")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 404, description = "No category found with that ID", body = crate::errors::ErrorResponse),
        (status = 409, description = "Category still owns products", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "catalog"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.categories.delete(id).await?;
    Ok(no_content_response())
}
