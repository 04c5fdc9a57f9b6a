use crate::{
    entities::{cart, cart_item, VariantSize},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{aggregates, products::resolve_variant};

#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddItemInput {
    pub product_id: Uuid,
    pub size: VariantSize,
    #[validate(length(min = 1, message = "Please choose a color"))]
    pub color: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: Option<i32>,
}

impl AddItemInput {
    pub fn quantity(&self) -> i32 {
        self.quantity.unwrap_or(1)
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateQuantityInput {
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

/// Cart with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    #[serde(flatten)]
    pub cart: cart::Model,
    pub items: Vec<cart_item::Model>,
}

impl CartView {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

const DUPLICATE_CART_LINE: &str = "You already added this product to your cart!!";

fn item_not_found() -> ServiceError {
    ServiceError::NotFound("No item found with that ID".to_string())
}

async fn find_cart<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> Result<Option<cart::Model>, ServiceError> {
    Ok(cart::Entity::find()
        .filter(cart::Column::UserId.eq(user_id))
        .one(conn)
        .await?)
}

async fn load_view<C: ConnectionTrait>(conn: &C, cart_id: Uuid) -> Result<CartView, ServiceError> {
    let cart = cart::Entity::find_by_id(cart_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Cart not found".to_string()))?;
    let items = cart
        .find_related(cart_item::Entity)
        .order_by_asc(cart_item::Column::CreatedAt)
        .order_by_asc(cart_item::Column::Id)
        .all(conn)
        .await?;
    Ok(CartView { cart, items })
}

/// The caller's line, or NotFound when it belongs to someone else.
async fn owned_item<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    item_id: Uuid,
) -> Result<(cart::Model, cart_item::Model), ServiceError> {
    let cart = find_cart(conn, user_id).await?.ok_or_else(item_not_found)?;
    let item = cart_item::Entity::find_by_id(item_id)
        .filter(cart_item::Column::CartId.eq(cart.id))
        .one(conn)
        .await?
        .ok_or_else(item_not_found)?;
    Ok((cart, item))
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// `None` when the user has never added anything.
    pub async fn get_cart(&self, user_id: Uuid) -> Result<Option<CartView>, ServiceError> {
        match find_cart(&*self.db, user_id).await? {
            Some(cart) => Ok(Some(load_view(&*self.db, cart.id).await?)),
            None => Ok(None),
        }
    }

    /// Adds a line priced from the matching variant, creating the cart on first use.
    #[instrument(skip(self, input), fields(product_id = %input.product_id))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        input: AddItemInput,
    ) -> Result<CartView, ServiceError> {
        input.validate()?;
        let quantity = input.quantity();
        let txn = self.db.begin().await?;

        let (_, variant) = resolve_variant(&txn, input.product_id, input.size, &input.color).await?;

        let cart = match find_cart(&txn, user_id).await? {
            Some(cart) => cart,
            None => {
                let now = Utc::now();
                cart::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    total_price: Set(Decimal::ZERO),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?
            }
        };

        let duplicate = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(input.product_id))
            .filter(cart_item::Column::Size.eq(input.size))
            .one(&txn)
            .await?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict(DUPLICATE_CART_LINE.to_string()));
        }

        let item = cart_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            cart_id: Set(cart.id),
            product_id: Set(input.product_id),
            size: Set(input.size),
            color: Set(input.color),
            quantity: Set(quantity),
            price: Set(variant.price),
            total_price: Set(variant.price * Decimal::from(quantity)),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await
        // a concurrent add can slip past the lookup above; the unique index catches it
        .map_err(|err| match ServiceError::from(err) {
            ServiceError::Conflict(_) => ServiceError::Conflict(DUPLICATE_CART_LINE.to_string()),
            other => other,
        })?;

        aggregates::recompute_cart_total(&txn, cart.id).await?;
        let view = load_view(&txn, cart.id).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: cart.id,
                item_id: item.id,
            })
            .await;
        info!(cart_id = %cart.id, item_id = %item.id, "Added item to cart");
        Ok(view)
    }

    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        input: UpdateQuantityInput,
    ) -> Result<CartView, ServiceError> {
        input.validate()?;
        let txn = self.db.begin().await?;

        let (cart, item) = owned_item(&txn, user_id, item_id).await?;
        let price = item.price;
        let mut model: cart_item::ActiveModel = item.into();
        model.quantity = Set(input.quantity);
        model.total_price = Set(price * Decimal::from(input.quantity));
        model.update(&txn).await?;

        aggregates::recompute_cart_total(&txn, cart.id).await?;
        let view = load_view(&txn, cart.id).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemUpdated {
                cart_id: cart.id,
                item_id,
            })
            .await;
        Ok(view)
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: Uuid, item_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let (cart, item) = owned_item(&txn, user_id, item_id).await?;
        item.delete(&txn).await?;
        aggregates::recompute_cart_total(&txn, cart.id).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                cart_id: cart.id,
                item_id,
            })
            .await;
        Ok(())
    }

    /// Deletes the whole cart. Succeeds when there is none.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let Some(cart) = find_cart(&*self.db, user_id).await? else {
            return Ok(());
        };
        let cart_id = cart.id;
        let txn = self.db.begin().await?;
        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .exec(&txn)
            .await?;
        cart.delete(&txn).await?;
        txn.commit().await?;

        self.event_sender.send_or_log(Event::CartCleared(cart_id)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_defaults_to_one() {
        let input: AddItemInput = serde_json::from_value(serde_json::json!({
            "productId": Uuid::nil(),
            "size": "M",
            "color": "Blue"
        }))
        .unwrap();
        assert_eq!(input.quantity(), 1);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn zero_quantity_is_invalid() {
        assert!(UpdateQuantityInput { quantity: 0 }.validate().is_err());
        let input = AddItemInput {
            product_id: Uuid::nil(),
            size: VariantSize::S,
            color: "Red".into(),
            quantity: Some(0),
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn unknown_size_is_rejected_by_the_parser() {
        let parsed = serde_json::from_value::<AddItemInput>(serde_json::json!({
            "productId": Uuid::nil(),
            "size": "XL",
            "color": "Blue"
        }));
        assert!(parsed.is_err());
    }
}
