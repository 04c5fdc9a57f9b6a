use axum::{
    extract::State,
    response::IntoResponse,
    routing::get,
    Router,
};
use uuid::Uuid;

use super::common::{created_response, no_content_response, success_response};
use super::extract::{AppJson, AppPath};
use crate::{
    auth::{AuthRouterExt, AuthUser, Permission},
    errors::ApiError,
    services::addresses::{AddressInput, UpdateAddressInput},
    ApiResponse, AppState,
};

pub fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_my_address).post(create_address))
        .route(
            "/:id",
            get(get_address).patch(update_address).delete(delete_address),
        )
        .with_permission(Permission::AddressManage)
}

#[utoipa::path(
    post,
    path = "/api/v1/address",
    summary = "Add a shipping address",
    request_body = AddressInput,
    responses(
        (status = 201, description = "Address created", body = ApiResponse),
        (status = 409, description = "User already has an address", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "address"
)]
pub async fn create_address(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(input): AppJson<AddressInput>,
) -> Result<impl IntoResponse, ApiError> {
    let address = state.services.addresses.create(user.user_id, input).await?;
    created_response("address", address)
}

#[utoipa::path(
    get,
    path = "/api/v1/address",
    summary = "Current user's address",
    responses(
        (status = 200, description = "Address", body = ApiResponse),
        (status = 404, description = "No address yet", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "address"
)]
pub async fn get_my_address(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let address = state.services.addresses.get_mine(user.user_id).await?;
    success_response("address", address)
}

#[utoipa::path(
    get,
    path = "/api/v1/address/{id}",
    summary = "Get an address",
    params(("id" = Uuid, Path, description = "Address id")),
    responses(
        (status = 200, description = "Address", body = ApiResponse),
        (status = 404, description = "No address found with that ID", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "address"
)]
pub async fn get_address(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let address = state.services.addresses.get(user.user_id, id).await?;
    success_response("address", address)
}

#[utoipa::path(
    patch,
    path = "/api/v1/address/{id}",
    summary = "Update an address",
    params(("id" = Uuid, Path, description = "Address id")),
    request_body = UpdateAddressInput,
    responses(
        (status = 200, description = "Updated address", body = ApiResponse),
        (status = 404, description = "No address found with that ID", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "address"
)]
pub async fn update_address(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<UpdateAddressInput>,
) -> Result<impl IntoResponse, ApiError> {
    let address = state
        .services
        .addresses
        .update(user.user_id, id, input)
        .await?;
    success_response("address", address)
}

#[utoipa::path(
    delete,
    path = "/api/v1/address/{id}",
    summary = "Delete an address",
    params(("id" = Uuid, Path, description = "Address id")),
    responses(
        (status = 204, description = "Address deleted"),
        (status = 404, description = "No address found with that ID", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "address"
)]
pub async fn delete_address(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.addresses.delete(user.user_id, id).await?;
    Ok(no_content_response())
}
