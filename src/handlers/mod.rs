pub mod addresses;
pub mod cart;
pub mod categories;
pub mod common;
pub mod extract;
pub mod health;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod users;
pub mod wishlist;

use crate::auth::AuthService;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    addresses::AddressService, cart::CartService, categories::CategoryService,
    orders::OrderService, products::ProductService, reviews::ReviewService,
    uploads::UploadService, users::UserService, wishlist::WishlistService,
};
use std::sync::Arc;

pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub users: Arc<UserService>,
    pub categories: Arc<CategoryService>,
    pub products: Arc<ProductService>,
    pub reviews: Arc<ReviewService>,
    pub cart: Arc<CartService>,
    pub wishlist: Arc<WishlistService>,
    pub addresses: Arc<AddressService>,
    pub orders: Arc<OrderService>,
    pub uploads: Arc<UploadService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        auth_service: Arc<AuthService>,
        upload_dir: &str,
    ) -> Self {
        Self {
            users: Arc::new(UserService::new(
                db_pool.clone(),
                event_sender.clone(),
                auth_service,
            )),
            categories: Arc::new(CategoryService::new(db_pool.clone(), event_sender.clone())),
            products: Arc::new(ProductService::new(db_pool.clone(), event_sender.clone())),
            reviews: Arc::new(ReviewService::new(db_pool.clone(), event_sender.clone())),
            cart: Arc::new(CartService::new(db_pool.clone(), event_sender.clone())),
            wishlist: Arc::new(WishlistService::new(db_pool.clone(), event_sender.clone())),
            addresses: Arc::new(AddressService::new(db_pool.clone(), event_sender.clone())),
            orders: Arc::new(OrderService::new(db_pool, event_sender)),
            uploads: Arc::new(UploadService::new(upload_dir)),
        }
    }
}
