use axum::{
    extract::State,
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Router,
};
use uuid::Uuid;

use super::cart::empty_response;
use super::common::{created_response, no_content_response, success_response};
use super::extract::{AppJson, AppPath};
use crate::{
    auth::{AuthRouterExt, AuthUser, Permission},
    errors::ApiError,
    services::cart::{AddItemInput, UpdateQuantityInput},
    ApiResponse, AppState,
};

pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_wishlist))
        .route("/add", post(add_to_wishlist))
        .route("/deleteAll", delete(clear_wishlist))
        .route("/delete/:item_id", delete(remove_wishlist_item))
        .route("/updateQuantity/:item_id", patch(update_wishlist_item))
        .with_permission(Permission::WishlistManage)
}

#[utoipa::path(
    get,
    path = "/api/v1/wishlist",
    summary = "Current user's wishlist",
    responses((status = 200, description = "Wishlist, or an empty message", body = ApiResponse)),
    security(("Bearer" = [])),
    tag = "wishlist"
)]
pub async fn get_wishlist(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    match state.services.wishlist.get_wishlist(user.user_id).await? {
        Some(wishlist) if !wishlist.is_empty() => success_response("wishlist", wishlist),
        _ => Ok(empty_response("wishlist")),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/wishlist/add",
    summary = "Add a product to the wishlist",
    request_body = AddItemInput,
    responses(
        (status = 201, description = "Updated wishlist", body = ApiResponse),
        (status = 404, description = "Product or option not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product already listed", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "wishlist"
)]
pub async fn add_to_wishlist(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(input): AppJson<AddItemInput>,
) -> Result<impl IntoResponse, ApiError> {
    let wishlist = state.services.wishlist.add_item(user.user_id, input).await?;
    created_response("wishlist", wishlist)
}

#[utoipa::path(
    patch,
    path = "/api/v1/wishlist/updateQuantity/{item_id}",
    summary = "Change a wishlist line's quantity",
    params(("item_id" = Uuid, Path, description = "Wishlist line id")),
    request_body = UpdateQuantityInput,
    responses(
        (status = 200, description = "Updated wishlist", body = ApiResponse),
        (status = 404, description = "No item found with that ID", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "wishlist"
)]
pub async fn update_wishlist_item(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(item_id): AppPath<Uuid>,
    AppJson(input): AppJson<UpdateQuantityInput>,
) -> Result<impl IntoResponse, ApiError> {
    let wishlist = state
        .services
        .wishlist
        .update_quantity(user.user_id, item_id, input)
        .await?;
    success_response("wishlist", wishlist)
}

#[utoipa::path(
    delete,
    path = "/api/v1/wishlist/delete/{item_id}",
    summary = "Remove a wishlist line",
    params(("item_id" = Uuid, Path, description = "Wishlist line id")),
    responses(
        (status = 204, description = "Line removed"),
        (status = 404, description = "No item found with that ID", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "wishlist"
)]
pub async fn remove_wishlist_item(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(item_id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .wishlist
        .remove_item(user.user_id, item_id)
        .await?;
    Ok(no_content_response())
}

#[utoipa::path(
    delete,
    path = "/api/v1/wishlist/deleteAll",
    summary = "Empty the wishlist",
    responses((status = 204, description = "Wishlist deleted")),
    security(("Bearer" = [])),
    tag = "wishlist"
)]
pub async fn clear_wishlist(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    state.services.wishlist.clear(user.user_id).await?;
    Ok(no_content_response())
}
