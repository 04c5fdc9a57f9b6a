use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use uuid::Uuid;

use super::common::{created_response, no_content_response, success_response};
use super::extract::{AppJson, AppPath};
use crate::{
    auth::{AuthRouterExt, AuthUser, Permission},
    errors::ApiError,
    services::cart::{AddItemInput, UpdateQuantityInput},
    ApiResponse, AppState,
};

pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart))
        .route("/add", post(add_to_cart))
        .route("/deleteAll", delete(clear_cart))
        .route("/delete/:item_id", delete(remove_cart_item))
        .route("/updateQuantity/:item_id", patch(update_cart_item))
        .with_permission(Permission::CartManage)
}

/// 200 with no data when there is nothing to show.
pub(crate) fn empty_response(what: &str) -> Response {
    let body = ApiResponse::success()
        .with_results(0)
        .with_message(format!("There are not items in {}", what));
    (StatusCode::OK, Json(body)).into_response()
}

#[utoipa::path(
    get,
    path = "/api/v1/cart",
    summary = "Current user's cart",
    responses(
        (status = 200, description = "Cart with lines, or an empty-cart message", body = ApiResponse),
        (status = 401, description = "Not logged in", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    match state.services.cart.get_cart(user.user_id).await? {
        Some(cart) if !cart.is_empty() => success_response("cart", cart),
        _ => Ok(empty_response("cart")),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/cart/add",
    summary = "Add a product variant to the cart",
    request_body = AddItemInput,
    responses(
        (status = 201, description = "Updated cart", body = ApiResponse),
        (status = 404, description = "Product or option not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product and size already in cart", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(input): AppJson<AddItemInput>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state.services.cart.add_item(user.user_id, input).await?;
    created_response("cart", cart)
}

#[utoipa::path(
    patch,
    path = "/api/v1/cart/updateQuantity/{item_id}",
    summary = "Change a line's quantity",
    params(("item_id" = Uuid, Path, description = "Cart line id")),
    request_body = UpdateQuantityInput,
    responses(
        (status = 200, description = "Updated cart", body = ApiResponse),
        (status = 404, description = "No item found with that ID", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(item_id): AppPath<Uuid>,
    AppJson(input): AppJson<UpdateQuantityInput>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .cart
        .update_quantity(user.user_id, item_id, input)
        .await?;
    success_response("cart", cart)
}

#[utoipa::path(
    delete,
    path = "/api/v1/cart/delete/{item_id}",
    summary = "Remove a line",
    params(("item_id" = Uuid, Path, description = "Cart line id")),
    responses(
        (status = 204, description = "Line removed"),
        (status = 404, description = "No item found with that ID", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn remove_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(item_id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .cart
        .remove_item(user.user_id, item_id)
        .await?;
    Ok(no_content_response())
}

#[utoipa::path(
    delete,
    path = "/api/v1/cart/deleteAll",
    summary = "Empty the cart",
    responses((status = 204, description = "Cart deleted")),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    state.services.cart.clear(user.user_id).await?;
    Ok(no_content_response())
}
