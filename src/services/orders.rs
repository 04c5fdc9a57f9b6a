use crate::{
    auth::AuthUser,
    entities::{address, cart, cart_item, order, order_item, product, product_variant, VariantSize},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{aggregates::lines_total, normalize_paging, products::load_variants, Page};

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

fn non_negative(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        let mut err = ValidationError::new("range");
        err.message = Some("Amount can not be negative".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderInput {
    #[validate(length(min = 1, message = "Please choose a payment method"))]
    pub payment_method: String,
    #[validate(custom = "non_negative")]
    #[schema(value_type = Option<String>, example = "0")]
    pub tax_price: Option<Decimal>,
    #[validate(custom = "non_negative")]
    #[schema(value_type = Option<String>, example = "0")]
    pub shipping_price: Option<Decimal>,
}

pub use crate::entities::order::PaymentResult;

/// Order with its frozen lines.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// One stock change applied while paying an order.
#[derive(Debug, Clone, PartialEq)]
pub struct StockChange {
    pub product_id: Uuid,
    pub size: VariantSize,
    pub color: String,
    pub remaining: i32,
}

fn not_found() -> ServiceError {
    ServiceError::NotFound("No order found with that ID".to_string())
}

fn ensure_owner_or_admin(actor: &AuthUser, order: &order::Model) -> Result<(), ServiceError> {
    if actor.can_access(order.user_id) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(
            "You do not have permission to perform this action".to_string(),
        ))
    }
}

/// `items + tax + shipping`.
pub fn order_total(items_price: Decimal, tax: Decimal, shipping: Decimal) -> Decimal {
    items_price + tax + shipping
}

async fn load_items<C: ConnectionTrait>(
    conn: &C,
    order: &order::Model,
) -> Result<Vec<order_item::Model>, ServiceError> {
    Ok(order
        .find_related(order_item::Entity)
        .order_by_asc(order_item::Column::Position)
        .all(conn)
        .await?)
}

/// Decrements the variant matched by size and first colour for one line.
/// Returns `None` when the product or variant no longer exists.
async fn decrement_stock<C: ConnectionTrait>(
    conn: &C,
    line: &order_item::Model,
) -> Result<Option<StockChange>, ServiceError> {
    if product::Entity::find_by_id(line.product_id)
        .one(conn)
        .await?
        .is_none()
    {
        warn!(product_id = %line.product_id, "Ordered product no longer exists, skipping stock update");
        return Ok(None);
    }

    let variants = load_variants(conn, line.product_id).await?;
    let Some(variant) = product_variant::find_matching(&variants, line.size, &line.color) else {
        warn!(
            product_id = %line.product_id,
            size = %line.size,
            color = %line.color,
            "Ordered variant no longer exists, skipping stock update"
        );
        return Ok(None);
    };

    let result = product_variant::Entity::update_many()
        .col_expr(
            product_variant::Column::CountInStock,
            Expr::col(product_variant::Column::CountInStock).sub(line.quantity),
        )
        .filter(product_variant::Column::Id.eq(variant.id))
        .filter(product_variant::Column::CountInStock.gte(line.quantity))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(ServiceError::BadRequest(format!(
            "Not enough stock for {} ({} / {}): {} left, {} ordered",
            line.product_name, line.size, line.color, variant.count_in_stock, line.quantity
        )));
    }

    Ok(Some(StockChange {
        product_id: line.product_id,
        size: line.size,
        color: line.color.clone(),
        remaining: variant.count_in_stock - line.quantity,
    }))
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Turns the caller's cart into an order shipped to their address.
    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn create(
        &self,
        user_id: Uuid,
        input: CreateOrderInput,
    ) -> Result<OrderDetails, ServiceError> {
        input.validate()?;
        let txn = self.db.begin().await?;

        let cart = cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::PreconditionFailed("Your cart is empty".to_string())
            })?;
        let lines = cart
            .find_related(cart_item::Entity)
            .order_by_asc(cart_item::Column::CreatedAt)
            .order_by_asc(cart_item::Column::Id)
            .all(&txn)
            .await?;
        if lines.is_empty() {
            return Err(ServiceError::PreconditionFailed(
                "Your cart is empty".to_string(),
            ));
        }

        let address = address::Entity::find()
            .filter(address::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::PreconditionFailed(
                    "Please add a shipping address before ordering".to_string(),
                )
            })?;

        let tax = input.tax_price.unwrap_or(Decimal::ZERO);
        let shipping = input.shipping_price.unwrap_or(Decimal::ZERO);
        let items_price = lines_total(lines.iter().map(|l| (&l.price, l.quantity)));

        let order = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            shipping_address: Set(address.shipping_line()),
            payment_method: Set(input.payment_method),
            payment_result: Set(None),
            items_price: Set(items_price),
            tax_price: Set(tax),
            shipping_price: Set(shipping),
            total_price: Set(order_total(items_price, tax, shipping)),
            is_paid: Set(false),
            paid_at: Set(None),
            is_delivered: Set(false),
            delivered_at: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for (position, line) in lines.into_iter().enumerate() {
            let product = product::Entity::find_by_id(line.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound("No product found with that ID".to_string())
                })?;
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                position: Set(position as i32),
                product_id: Set(line.product_id),
                product_name: Set(product.name),
                image_cover: Set(product.image_cover),
                size: Set(line.size),
                color: Set(line.color),
                quantity: Set(line.quantity),
                price: Set(line.price),
                total_price: Set(line.total_price),
            }
            .insert(&txn)
            .await?;
            items.push(item);
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCreated(order.id))
            .await;
        info!(order_id = %order.id, total = %order.total_price, "Order created");
        Ok(OrderDetails { order, items })
    }

    pub async fn list_all(&self, page: u64, limit: u64) -> Result<Page<order::Model>, ServiceError> {
        let (page, limit) = normalize_paging(page, limit);
        let paginator = order::Entity::find()
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;
        Ok(Page { items, total })
    }

    pub async fn my_orders(&self, user_id: Uuid) -> Result<Vec<order::Model>, ServiceError> {
        Ok(order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    pub async fn get(&self, actor: &AuthUser, id: Uuid) -> Result<OrderDetails, ServiceError> {
        let order = order::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(not_found)?;
        ensure_owner_or_admin(actor, &order)?;
        let items = load_items(&*self.db, &order).await?;
        Ok(OrderDetails { order, items })
    }

    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn delete(&self, actor: &AuthUser, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        let order = order::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(not_found)?;
        ensure_owner_or_admin(actor, &order)?;

        order_item::Entity::delete_many()
            .filter(order_item::Column::OrderId.eq(id))
            .exec(&txn)
            .await?;
        order.delete(&txn).await?;
        txn.commit().await?;

        self.event_sender.send_or_log(Event::OrderDeleted(id)).await;
        Ok(())
    }

    /// Records payment, takes stock and clears the owner's cart and unsaved
    /// address. Any failure rolls the whole step back.
    #[instrument(skip(self, payment), fields(user_id = %actor.user_id))]
    pub async fn mark_paid(
        &self,
        actor: &AuthUser,
        id: Uuid,
        payment: PaymentResult,
    ) -> Result<OrderDetails, ServiceError> {
        let txn = self.db.begin().await?;

        let existing = order::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(not_found)?;
        ensure_owner_or_admin(actor, &existing)?;
        if existing.is_paid {
            return Err(ServiceError::Conflict(
                "This order has already been paid".to_string(),
            ));
        }

        let owner_id = existing.user_id;
        let paid_at = Utc::now();
        let payment_json = serde_json::to_value(&payment)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;

        let mut model: order::ActiveModel = existing.into();
        model.is_paid = Set(true);
        model.paid_at = Set(Some(paid_at));
        model.payment_result = Set(Some(payment_json));
        let order = model.update(&txn).await?;

        let items = load_items(&txn, &order).await?;
        let mut changes = Vec::new();
        for line in &items {
            if let Some(change) = decrement_stock(&txn, line).await? {
                changes.push(change);
            }
        }

        if let Some(cart) = cart::Entity::find()
            .filter(cart::Column::UserId.eq(owner_id))
            .one(&txn)
            .await?
        {
            cart_item::Entity::delete_many()
                .filter(cart_item::Column::CartId.eq(cart.id))
                .exec(&txn)
                .await?;
            cart.delete(&txn).await?;
        }

        address::Entity::delete_many()
            .filter(address::Column::UserId.eq(owner_id))
            .filter(address::Column::IsSaved.eq(false))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderPaid {
                order_id: order.id,
                paid_at,
            })
            .await;
        for change in changes {
            self.event_sender
                .send_or_log(Event::StockDecremented {
                    product_id: change.product_id,
                    size: change.size,
                    color: change.color,
                    remaining: change.remaining,
                })
                .await;
        }
        info!(order_id = %order.id, "Order paid");
        Ok(OrderDetails { order, items })
    }

    /// Allowed before payment, which is logged.
    #[instrument(skip(self))]
    pub async fn mark_delivered(&self, id: Uuid) -> Result<OrderDetails, ServiceError> {
        let existing = order::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(not_found)?;
        if existing.is_delivered {
            return Err(ServiceError::Conflict(
                "This order has already been delivered".to_string(),
            ));
        }
        if !existing.is_paid {
            warn!(order_id = %id, "Marking an unpaid order as delivered");
        }

        let delivered_at = Utc::now();
        let mut model: order::ActiveModel = existing.into();
        model.is_delivered = Set(true);
        model.delivered_at = Set(Some(delivered_at));
        let order = model.update(&*self.db).await?;
        let items = load_items(&*self.db, &order).await?;

        self.event_sender
            .send_or_log(Event::OrderDelivered {
                order_id: id,
                delivered_at,
            })
            .await;
        Ok(OrderDetails { order, items })
    }
}
