//! Business logic. Handlers stay thin and call into these services, which
//! own transactions, derived-field recomputation and event emission.

pub mod addresses;
pub mod aggregates;
pub mod cart;
pub mod categories;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod uploads;
pub mod users;
pub mod wishlist;

/// Page of rows plus the total row count across all pages.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// Clamps client paging input to `page >= 1` and `1 <= limit <= 100`.
pub fn normalize_paging(page: u64, limit: u64) -> (u64, u64) {
    (page.max(1), limit.clamp(1, 100))
}
