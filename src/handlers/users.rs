use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{AppendHeaders, IntoResponse},
    routing::{delete, get, patch, post},
    Json, Router,
};
use uuid::Uuid;

use super::common::{
    collect_images, created_response, list_response, no_content_response, session_response,
    success_response,
};
use super::extract::{AppJson, AppPath, AppQuery};
use crate::{
    auth::{AuthRouterExt, AuthUser, Permission},
    errors::{ApiError, ServiceError},
    services::users::{
        CreateUserInput, LoginInput, SignupInput, UpdatePasswordInput, UpdateProfileInput,
        UpdateUserInput, UserProfile,
    },
    ApiResponse, AppState, ListQuery,
};

pub fn users_routes(max_upload_bytes: usize) -> Router<AppState> {
    let public = Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", get(logout));

    let account = Router::new()
        .route("/yourProfile", get(your_profile))
        .route("/updateProfile", patch(update_profile))
        .route(
            "/updateMyPhoto",
            patch(update_my_photo).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/updateMyPassword", patch(update_my_password))
        .route("/deleteProfile", delete(delete_profile))
        .with_permission(Permission::ProfileManage);

    let admin = Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).patch(update_user).delete(delete_user))
        .with_permission(Permission::UsersManage);

    public.merge(account).merge(admin)
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/api/v1/users/signup",
    summary = "Sign up",
    request_body = SignupInput,
    responses(
        (status = 201, description = "Account created, token issued", body = ApiResponse,
            headers(("Set-Cookie" = String, description = "jwt session cookie"))),
        (status = 400, description = "Invalid input data", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email or name already taken", body = crate::errors::ErrorResponse),
    ),
    tag = "users"
)]
pub async fn signup(
    State(state): State<AppState>,
    AppJson(input): AppJson<SignupInput>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.services.users.signup(input).await?;
    session_response(
        StatusCode::CREATED,
        session.token,
        session.cookie,
        "user",
        &session.user,
    )
}

#[utoipa::path(
    post,
    path = "/api/v1/users/login",
    summary = "Log in",
    request_body = LoginInput,
    responses(
        (status = 200, description = "Logged in", body = ApiResponse),
        (status = 400, description = "Missing email or password", body = crate::errors::ErrorResponse),
        (status = 401, description = "Incorrect email or password", body = crate::errors::ErrorResponse),
    ),
    tag = "users"
)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(input): AppJson<LoginInput>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.services.users.login(input).await?;
    session_response(
        StatusCode::OK,
        session.token,
        session.cookie,
        "user",
        &session.user,
    )
}

/// Overwrites the session cookie with a short-lived placeholder.
#[utoipa::path(
    get,
    path = "/api/v1/users/logout",
    summary = "Log out",
    responses((status = 200, description = "Session cookie cleared", body = ApiResponse)),
    tag = "users"
)]
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        AppendHeaders([(header::SET_COOKIE, state.services.users.logout_cookie())]),
        Json(ApiResponse::success()),
    )
}

#[utoipa::path(
    get,
    path = "/api/v1/users/yourProfile",
    summary = "Current user's profile",
    responses(
        (status = 200, description = "Profile", body = ApiResponse),
        (status = 401, description = "Not logged in", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn your_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state.services.users.get_profile(user.user_id).await?;
    success_response("user", profile)
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/updateProfile",
    summary = "Update name or email",
    request_body = UpdateProfileInput,
    responses(
        (status = 200, description = "Updated profile", body = ApiResponse),
        (status = 400, description = "Password fields present or invalid data", body = crate::errors::ErrorResponse),
        (status = 401, description = "Not logged in", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(input): AppJson<UpdateProfileInput>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .services
        .users
        .update_profile(user.user_id, input)
        .await?;
    success_response("user", profile)
}

/// Multipart with a single `photo` file part.
#[utoipa::path(
    patch,
    path = "/api/v1/users/updateMyPhoto",
    summary = "Upload a profile photo",
    request_body(content_type = "multipart/form-data", description = "`photo` image part"),
    responses(
        (status = 200, description = "Updated profile", body = ApiResponse),
        (status = 400, description = "Not an image", body = crate::errors::ErrorResponse),
        (status = 401, description = "Not logged in", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn update_my_photo(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let parts = collect_images(multipart, &[("photo", 1)]).await?;
    let (_, photo) = parts
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::BadRequest("Please upload a photo".to_string()))?;

    let file_name = state
        .services
        .uploads
        .store_user_photo(user.user_id, photo)
        .await?;
    let profile = state
        .services
        .users
        .update_photo(user.user_id, file_name)
        .await?;
    success_response("user", profile)
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/updateMyPassword",
    summary = "Change password",
    request_body = UpdatePasswordInput,
    responses(
        (status = 200, description = "Password changed, new token issued", body = ApiResponse),
        (status = 400, description = "Invalid input data", body = crate::errors::ErrorResponse),
        (status = 401, description = "Current password is wrong", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn update_my_password(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(input): AppJson<UpdatePasswordInput>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .services
        .users
        .update_password(user.user_id, input)
        .await?;
    session_response(
        StatusCode::OK,
        session.token,
        session.cookie,
        "user",
        &session.user,
    )
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/deleteProfile",
    summary = "Deactivate own account",
    responses(
        (status = 204, description = "Account deactivated"),
        (status = 401, description = "Not logged in", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn delete_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    state.services.users.deactivate(user.user_id).await?;
    Ok(no_content_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    summary = "List users",
    params(ListQuery),
    responses(
        (status = 200, description = "Users", body = ApiResponse),
        (status = 403, description = "Admins only", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .services
        .users
        .list_users(query.page, query.limit)
        .await?;
    list_response("users", page.items)
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    summary = "Create a user",
    request_body = CreateUserInput,
    responses(
        (status = 201, description = "User created", body = ApiResponse),
        (status = 400, description = "Invalid input data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admins only", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    AppJson(input): AppJson<CreateUserInput>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.services.users.create_user(input).await?;
    created_response("user", user)
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    summary = "Get a user",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = UserProfile),
        (status = 404, description = "No user found with that ID", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.services.users.get_user(id).await?;
    success_response("user", user)
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}",
    summary = "Update a user",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UpdateUserInput,
    responses(
        (status = 200, description = "Updated user", body = ApiResponse),
        (status = 404, description = "No user found with that ID", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<UpdateUserInput>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.services.users.update_user(id, input).await?;
    success_response("user", user)
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    summary = "Deactivate a user",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "User deactivated"),
        (status = 404, description = "No user found with that ID", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.users.delete_user(id).await?;
    Ok(no_content_response())
}
