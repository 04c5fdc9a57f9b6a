//! SeaORM entities for the shop schema.
//!
//! Every model serializes with camelCase keys; that is the shape clients see.

pub mod address;
pub mod cart;
pub mod cart_item;
pub mod category;
pub mod order;
pub mod order_item;
pub mod product;
pub mod product_variant;
pub mod review;
pub mod user;
pub mod wishlist;
pub mod wishlist_item;

pub use product_variant::VariantSize;
pub use user::Role;
