//! Derived fields recomputed from their source rows.
//!
//! Every function here runs on the caller's connection, so when given a
//! transaction the recomputation commits or rolls back with the write that
//! triggered it. Each one is a full recount, which makes repeated calls
//! idempotent.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QuerySelect,
};
use uuid::Uuid;

use crate::entities::{cart, cart_item, category, product, review};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewStats {
    pub quantity: i32,
    pub average: f64,
}

/// Mean rating rounded to one decimal; no ratings gives zero for both fields.
pub fn summarize_ratings(ratings: &[i32]) -> ReviewStats {
    if ratings.is_empty() {
        return ReviewStats {
            quantity: 0,
            average: 0.0,
        };
    }
    let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    let mean = sum as f64 / ratings.len() as f64;
    ReviewStats {
        quantity: ratings.len() as i32,
        average: (mean * 10.0).round() / 10.0,
    }
}

/// Sum of `price × quantity` over the given lines.
pub fn lines_total<'a>(lines: impl IntoIterator<Item = (&'a Decimal, i32)>) -> Decimal {
    lines
        .into_iter()
        .map(|(price, quantity)| *price * Decimal::from(quantity))
        .sum()
}

pub async fn recompute_category_product_count<C>(
    conn: &C,
    category_id: Uuid,
) -> Result<i32, ServiceError>
where
    C: ConnectionTrait,
{
    let count = product::Entity::find()
        .filter(product::Column::CategoryId.eq(category_id))
        .count(conn)
        .await? as i32;

    category::Entity::update_many()
        .col_expr(category::Column::ProductsQuantity, Expr::value(count))
        .col_expr(category::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(category::Column::Id.eq(category_id))
        .exec(conn)
        .await?;

    Ok(count)
}

pub async fn recompute_product_review_stats<C>(
    conn: &C,
    product_id: Uuid,
) -> Result<ReviewStats, ServiceError>
where
    C: ConnectionTrait,
{
    let ratings: Vec<i32> = review::Entity::find()
        .select_only()
        .column(review::Column::Rating)
        .filter(review::Column::ProductId.eq(product_id))
        .into_tuple()
        .all(conn)
        .await?;

    let stats = summarize_ratings(&ratings);

    product::Entity::update_many()
        .col_expr(product::Column::ReviewsQuantity, Expr::value(stats.quantity))
        .col_expr(product::Column::RatingAverage, Expr::value(stats.average))
        .filter(product::Column::Id.eq(product_id))
        .exec(conn)
        .await?;

    Ok(stats)
}

pub async fn recompute_cart_total<C>(conn: &C, cart_id: Uuid) -> Result<Decimal, ServiceError>
where
    C: ConnectionTrait,
{
    let items = cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .all(conn)
        .await?;

    let total = lines_total(items.iter().map(|i| (&i.price, i.quantity)));

    cart::Entity::update_many()
        .col_expr(cart::Column::TotalPrice, Expr::value(total))
        .col_expr(cart::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(cart::Column::Id.eq(cart_id))
        .exec(conn)
        .await?;

    Ok(total)
}
