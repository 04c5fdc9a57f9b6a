use crate::{
    entities::{wishlist, wishlist_item},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use super::cart::{AddItemInput, UpdateQuantityInput};
use super::products::resolve_variant;

/// Saved-for-later list. Same line shape as the cart but without a running total.
#[derive(Clone)]
pub struct WishlistService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WishlistView {
    #[serde(flatten)]
    pub wishlist: wishlist::Model,
    pub items: Vec<wishlist_item::Model>,
}

impl WishlistView {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

const DUPLICATE_WISHLIST_LINE: &str = "You already added this product to your wishlist!!";

fn item_not_found() -> ServiceError {
    ServiceError::NotFound("No item found with that ID".to_string())
}

async fn find_wishlist<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> Result<Option<wishlist::Model>, ServiceError> {
    Ok(wishlist::Entity::find()
        .filter(wishlist::Column::UserId.eq(user_id))
        .one(conn)
        .await?)
}

async fn load_view<C: ConnectionTrait>(
    conn: &C,
    wishlist: wishlist::Model,
) -> Result<WishlistView, ServiceError> {
    let items = wishlist
        .find_related(wishlist_item::Entity)
        .order_by_asc(wishlist_item::Column::CreatedAt)
        .order_by_asc(wishlist_item::Column::Id)
        .all(conn)
        .await?;
    Ok(WishlistView { wishlist, items })
}

async fn owned_item<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    item_id: Uuid,
) -> Result<(wishlist::Model, wishlist_item::Model), ServiceError> {
    let wishlist = find_wishlist(conn, user_id)
        .await?
        .ok_or_else(item_not_found)?;
    let item = wishlist_item::Entity::find_by_id(item_id)
        .filter(wishlist_item::Column::WishlistId.eq(wishlist.id))
        .one(conn)
        .await?
        .ok_or_else(item_not_found)?;
    Ok((wishlist, item))
}

impl WishlistService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    pub async fn get_wishlist(&self, user_id: Uuid) -> Result<Option<WishlistView>, ServiceError> {
        match find_wishlist(&*self.db, user_id).await? {
            Some(wishlist) => Ok(Some(load_view(&*self.db, wishlist).await?)),
            None => Ok(None),
        }
    }

    /// Any size of an already listed product counts as a duplicate.
    #[instrument(skip(self, input), fields(product_id = %input.product_id))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        input: AddItemInput,
    ) -> Result<WishlistView, ServiceError> {
        input.validate()?;
        let quantity = input.quantity();
        let txn = self.db.begin().await?;

        let (_, variant) = resolve_variant(&txn, input.product_id, input.size, &input.color).await?;

        let wishlist = match find_wishlist(&txn, user_id).await? {
            Some(wishlist) => wishlist,
            None => {
                let now = Utc::now();
                wishlist::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?
            }
        };

        let duplicate = wishlist_item::Entity::find()
            .filter(wishlist_item::Column::WishlistId.eq(wishlist.id))
            .filter(wishlist_item::Column::ProductId.eq(input.product_id))
            .one(&txn)
            .await?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict(DUPLICATE_WISHLIST_LINE.to_string()));
        }

        let item = wishlist_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            wishlist_id: Set(wishlist.id),
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
            ServiceError::Conflict(_) => ServiceError::Conflict(DUPLICATE_WISHLIST_LINE.to_string()),
            other => other,
        })?;

        let wishlist_id = wishlist.id;
        let view = load_view(&txn, wishlist).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::WishlistItemAdded {
                wishlist_id,
                item_id: item.id,
            })
            .await;
        Ok(view)
    }

    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        input: UpdateQuantityInput,
    ) -> Result<WishlistView, ServiceError> {
        input.validate()?;
        let (wishlist, item) = owned_item(&*self.db, user_id, item_id).await?;

        let price = item.price;
        let mut model: wishlist_item::ActiveModel = item.into();
        model.quantity = Set(input.quantity);
        model.total_price = Set(price * Decimal::from(input.quantity));
        model.update(&*self.db).await?;

        let wishlist_id = wishlist.id;
        let view = load_view(&*self.db, wishlist).await?;
        self.event_sender
            .send_or_log(Event::WishlistItemUpdated {
                wishlist_id,
                item_id,
            })
            .await;
        Ok(view)
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: Uuid, item_id: Uuid) -> Result<(), ServiceError> {
        let (wishlist, item) = owned_item(&*self.db, user_id, item_id).await?;
        item.delete(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::WishlistItemRemoved {
                wishlist_id: wishlist.id,
                item_id,
            })
            .await;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let Some(wishlist) = find_wishlist(&*self.db, user_id).await? else {
            return Ok(());
        };
        let wishlist_id = wishlist.id;
        let txn = self.db.begin().await?;
        wishlist_item::Entity::delete_many()
            .filter(wishlist_item::Column::WishlistId.eq(wishlist_id))
            .exec(&txn)
            .await?;
        wishlist.delete(&txn).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::WishlistCleared(wishlist_id))
            .await;
        Ok(())
    }
}
