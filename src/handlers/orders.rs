use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};
use uuid::Uuid;

use super::common::{created_response, list_response, no_content_response, success_response};
use super::extract::{AppJson, AppPath, AppQuery};
use crate::{
    auth::{AuthRouterExt, AuthUser, Permission},
    errors::ApiError,
    services::orders::{CreateOrderInput, PaymentResult},
    ApiResponse, AppState, ListQuery,
};

pub fn orders_routes() -> Router<AppState> {
    let customers = Router::new()
        .route("/", post(create_order))
        .route("/myOrders", get(my_orders))
        .route("/:id", get(get_order).delete(delete_order))
        .route("/:id/pay", patch(mark_paid))
        .with_permission(Permission::OrdersPlace);

    let admin = Router::new()
        .route("/", get(list_orders))
        .route("/:id/deliver", patch(mark_delivered))
        .with_permission(Permission::OrdersManage);

    customers.merge(admin)
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List all orders",
    params(ListQuery),
    responses(
        (status = 200, description = "Orders", body = ApiResponse),
        (status = 403, description = "Admins only", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .services
        .orders
        .list_all(query.page, query.limit)
        .await?;
    list_response("orders", page.items)
}

/// Builds the order from the caller's cart and address.
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Place an order",
    request_body = CreateOrderInput,
    responses(
        (status = 201, description = "Order created", body = ApiResponse),
        (status = 400, description = "Invalid input data", body = crate::errors::ErrorResponse),
        (status = 412, description = "Cart or address missing", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(input): AppJson<CreateOrderInput>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.services.orders.create(user.user_id, input).await?;
    created_response("order", order)
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/myOrders",
    summary = "Current user's orders",
    responses((status = 200, description = "Orders", body = ApiResponse)),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn my_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let orders = state.services.orders.my_orders(user.user_id).await?;
    list_response("orders", orders)
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get an order",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with items", body = ApiResponse),
        (status = 403, description = "Not the owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "No order found with that ID", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.services.orders.get(&user, id).await?;
    success_response("order", order)
}

#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}",
    summary = "Delete an order",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 403, description = "Not the owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "No order found with that ID", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.orders.delete(&user, id).await?;
    Ok(no_content_response())
}

/// Records the payment result and fulfils stock in one transaction.
#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/pay",
    summary = "Mark an order paid",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = PaymentResult,
    responses(
        (status = 200, description = "Paid order", body = ApiResponse),
        (status = 400, description = "Insufficient stock", body = crate::errors::ErrorResponse),
        (status = 404, description = "No order found with that ID", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already paid", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn mark_paid(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payment): AppJson<PaymentResult>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.services.orders.mark_paid(&user, id, payment).await?;
    success_response("order", order)
}

#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/deliver",
    summary = "Mark an order delivered",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Delivered order", body = ApiResponse),
        (status = 404, description = "No order found with that ID", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already delivered", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn mark_delivered(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.services.orders.mark_delivered(id).await?;
    success_response("order", order)
}
