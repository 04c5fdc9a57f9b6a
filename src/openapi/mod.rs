use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

pub const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Shop API",
        version = "1.0.0",
        description = r#"
# Shop API

REST backend for an online store: accounts, catalog, reviews, cart, wishlist,
shipping addresses and orders.

## Authentication

Log in or sign up to receive a token. Send it as a bearer token:

```
Authorization: Bearer <token>
```

or rely on the `jwt` cookie set by the same responses.

## Rate Limiting

Requests under `/api` are limited per client IP. See the headers:
- `X-RateLimit-Limit`
- `X-RateLimit-Remaining`
- `X-RateLimit-Reset`

## Responses

Success: `{"status": "success", "results"?: n, "token"?: "...", "data"?: {"<name>": ...}}`

Failure: `{"status": "fail" | "error", "message": "..."}`
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers((url = "http://localhost:8080", description = "Local development")),
    tags(
        (name = "users", description = "Signup, login and account management"),
        (name = "catalog", description = "Categories and products"),
        (name = "reviews", description = "Product reviews"),
        (name = "cart", description = "Shopping cart"),
        (name = "wishlist", description = "Wishlist"),
        (name = "address", description = "Shipping address"),
        (name = "orders", description = "Orders and fulfilment"),
        (name = "health", description = "Health check")
    ),
    paths(
        // Users
        crate::handlers::users::signup,
        crate::handlers::users::login,
        crate::handlers::users::logout,
        crate::handlers::users::your_profile,
        crate::handlers::users::update_profile,
        crate::handlers::users::update_my_photo,
        crate::handlers::users::update_my_password,
        crate::handlers::users::delete_profile,
        crate::handlers::users::list_users,
        crate::handlers::users::create_user,
        crate::handlers::users::get_user,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,

        // Catalog
        crate::handlers::categories::list_categories,
        crate::handlers::categories::get_category,
        crate::handlers::categories::create_category,
        crate::handlers::categories::update_category,
        crate::handlers::categories::delete_category,
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,
        crate::handlers::products::upload_product_images,

        // Reviews
        crate::handlers::reviews::list_reviews,
        crate::handlers::reviews::list_product_reviews,
        crate::handlers::reviews::get_review,
        crate::handlers::reviews::create_review,
        crate::handlers::reviews::create_product_review,
        crate::handlers::reviews::update_review,
        crate::handlers::reviews::delete_review,

        // Cart and wishlist
        crate::handlers::cart::get_cart,
        crate::handlers::cart::add_to_cart,
        crate::handlers::cart::update_cart_item,
        crate::handlers::cart::remove_cart_item,
        crate::handlers::cart::clear_cart,
        crate::handlers::wishlist::get_wishlist,
        crate::handlers::wishlist::add_to_wishlist,
        crate::handlers::wishlist::update_wishlist_item,
        crate::handlers::wishlist::remove_wishlist_item,
        crate::handlers::wishlist::clear_wishlist,

        // Address
        crate::handlers::addresses::create_address,
        crate::handlers::addresses::get_my_address,
        crate::handlers::addresses::get_address,
        crate::handlers::addresses::update_address,
        crate::handlers::addresses::delete_address,

        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::create_order,
        crate::handlers::orders::my_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::delete_order,
        crate::handlers::orders::mark_paid,
        crate::handlers::orders::mark_delivered,

        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            crate::ApiResponse,
            crate::errors::ErrorResponse,
            crate::entities::Role,
            crate::entities::VariantSize,
            crate::services::users::UserProfile,
            crate::services::products::VariantInput,
            crate::entities::order::PaymentResult,
            crate::handlers::health::HealthResponse,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Registers the bearer token and `jwt` cookie schemes referenced by handlers.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        components.add_security_scheme(
            "Cookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(
                crate::auth::cookie::COOKIE_NAME,
            ))),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs")
        .url(OPENAPI_JSON_PATH, ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from(OPENAPI_JSON_PATH).try_it_out_enabled(true))
}
