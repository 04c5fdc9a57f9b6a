use crate::{
    entities::{cart_item, category, product, product_variant, review, wishlist_item, VariantSize},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{aggregates, normalize_paging, Page};

#[derive(Clone)]
pub struct ProductService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

fn non_negative_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() {
        let mut err = ValidationError::new("range");
        err.message = Some("Price can not be negative".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VariantInput {
    pub size: VariantSize,
    #[validate(length(min = 1, message = "A variant must have at least one color"))]
    pub colors: Vec<String>,
    #[validate(range(min = 0, message = "Stock can not be negative"))]
    pub count_in_stock: i32,
    #[validate(custom = "non_negative_price")]
    #[schema(value_type = String, example = "19.99")]
    pub price: Decimal,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductInput {
    #[validate(length(min = 1, message = "A product must have a name"))]
    pub name: String,
    #[validate(length(min = 1, message = "A product must have an image cover"))]
    pub image_cover: String,
    #[serde(default)]
    pub images: Vec<String>,
    /// Category id
    pub category: Uuid,
    #[validate(length(min = 1, message = "A product must have a store creator"))]
    pub store_name: String,
    #[validate(length(min = 1, message = "A product must have at least one variant"))]
    #[validate]
    pub variants: Vec<VariantInput>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductInput {
    #[validate(length(min = 1, message = "A product must have a name"))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "A product must have an image cover"))]
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub category: Option<Uuid>,
    #[validate(length(min = 1, message = "A product must have a store creator"))]
    pub store_name: Option<String>,
    /// Replaces the whole variant set when present.
    #[validate(length(min = 1, message = "A product must have at least one variant"))]
    #[validate]
    pub variants: Option<Vec<VariantInput>>,
}

#[derive(Debug, Default, Clone)]
pub struct ProductFilter {
    pub category: Option<Uuid>,
}

/// Product with its variants in submission order.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetails {
    #[serde(flatten)]
    pub product: product::Model,
    pub variants: Vec<product_variant::Model>,
}

/// Product detail view including its reviews.
#[derive(Debug, Serialize)]
pub struct ProductWithReviews {
    #[serde(flatten)]
    pub details: ProductDetails,
    pub reviews: Vec<review::Model>,
}

fn not_found() -> ServiceError {
    ServiceError::NotFound("No product found with that ID".to_string())
}

async fn ensure_category<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<(), ServiceError> {
    category::Entity::find_by_id(id)
        .one(conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| ServiceError::NotFound("No category found with that ID".to_string()))
}

async fn insert_variants<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    variants: Vec<VariantInput>,
) -> Result<Vec<product_variant::Model>, ServiceError> {
    let mut saved = Vec::with_capacity(variants.len());
    for (position, variant) in variants.into_iter().enumerate() {
        let model = product_variant::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            position: Set(position as i32),
            size: Set(variant.size),
            colors: Set(serde_json::json!(variant.colors)),
            count_in_stock: Set(variant.count_in_stock),
            price: Set(variant.price),
        }
        .insert(conn)
        .await?;
        saved.push(model);
    }
    Ok(saved)
}

pub(crate) async fn load_variants<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<Vec<product_variant::Model>, ServiceError> {
    Ok(product_variant::Entity::find()
        .filter(product_variant::Column::ProductId.eq(product_id))
        .order_by_asc(product_variant::Column::Position)
        .all(conn)
        .await?)
}

/// Product plus the variant matching `size` and the first colour `color`.
pub(crate) async fn resolve_variant<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    size: VariantSize,
    color: &str,
) -> Result<(product::Model, product_variant::Model), ServiceError> {
    let product = product::Entity::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(not_found)?;
    let variants = load_variants(conn, product_id).await?;
    let variant = product_variant::find_matching(&variants, size, color)
        .ok_or_else(|| ServiceError::NotFound("No option available".to_string()))?;
    Ok((product, variant))
}

impl ProductService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    pub async fn list(
        &self,
        filter: ProductFilter,
        page: u64,
        limit: u64,
    ) -> Result<Page<ProductDetails>, ServiceError> {
        let (page, limit) = normalize_paging(page, limit);
        let mut query = product::Entity::find().order_by_asc(product::Column::CreatedAt);
        if let Some(category_id) = filter.category {
            query = query.filter(product::Column::CategoryId.eq(category_id));
        }

        let paginator = query.paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page - 1).await?;

        let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
        let mut by_product: HashMap<Uuid, Vec<product_variant::Model>> = HashMap::new();
        if !ids.is_empty() {
            let variants = product_variant::Entity::find()
                .filter(product_variant::Column::ProductId.is_in(ids))
                .order_by_asc(product_variant::Column::Position)
                .all(&*self.db)
                .await?;
            for variant in variants {
                by_product.entry(variant.product_id).or_default().push(variant);
            }
        }

        let items = products
            .into_iter()
            .map(|product| {
                let variants = by_product.remove(&product.id).unwrap_or_default();
                ProductDetails { product, variants }
            })
            .collect();
        Ok(Page { items, total })
    }

    pub async fn get(&self, id: Uuid) -> Result<ProductWithReviews, ServiceError> {
        let product = product::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(not_found)?;
        let variants = load_variants(&*self.db, id).await?;
        let reviews = review::Entity::find()
            .filter(review::Column::ProductId.eq(id))
            .order_by_desc(review::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(ProductWithReviews {
            details: ProductDetails { product, variants },
            reviews,
        })
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: CreateProductInput) -> Result<ProductDetails, ServiceError> {
        input.validate()?;
        let txn = self.db.begin().await?;

        ensure_category(&txn, input.category).await?;

        let now = Utc::now();
        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            image_cover: Set(input.image_cover),
            images: Set(serde_json::json!(input.images)),
            category_id: Set(input.category),
            store_name: Set(input.store_name),
            rating_average: Set(0.0),
            reviews_quantity: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let variants = insert_variants(&txn, product.id, input.variants).await?;
        aggregates::recompute_category_product_count(&txn, product.category_id).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ProductCreated(product.id))
            .await;
        info!(product_id = %product.id, "Created product");
        Ok(ProductDetails { product, variants })
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateProductInput,
    ) -> Result<ProductDetails, ServiceError> {
        input.validate()?;
        let txn = self.db.begin().await?;

        let existing = product::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(not_found)?;
        let old_category = existing.category_id;

        let mut model: product::ActiveModel = existing.into();
        if let Some(name) = input.name {
            model.name = Set(name.trim().to_string());
        }
        if let Some(cover) = input.image_cover {
            model.image_cover = Set(cover);
        }
        if let Some(images) = input.images {
            model.images = Set(serde_json::json!(images));
        }
        if let Some(store_name) = input.store_name {
            model.store_name = Set(store_name);
        }
        if let Some(category_id) = input.category {
            ensure_category(&txn, category_id).await?;
            model.category_id = Set(category_id);
        }
        model.updated_at = Set(Utc::now());
        let product = model.update(&txn).await?;

        let variants = match input.variants {
            Some(replacement) => {
                product_variant::Entity::delete_many()
                    .filter(product_variant::Column::ProductId.eq(id))
                    .exec(&txn)
                    .await?;
                insert_variants(&txn, id, replacement).await?
            }
            None => load_variants(&txn, id).await?,
        };

        let touched: BTreeSet<Uuid> = [old_category, product.category_id].into_iter().collect();
        for category_id in touched {
            aggregates::recompute_category_product_count(&txn, category_id).await?;
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ProductUpdated(product.id))
            .await;
        Ok(ProductDetails { product, variants })
    }

    /// Removes the product with its variants, reviews and cart/wishlist lines.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let product = product::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(not_found)?;

        let affected_carts: Vec<Uuid> = cart_item::Entity::find()
            .select_only()
            .column(cart_item::Column::CartId)
            .filter(cart_item::Column::ProductId.eq(id))
            .distinct()
            .into_tuple()
            .all(&txn)
            .await?;

        cart_item::Entity::delete_many()
            .filter(cart_item::Column::ProductId.eq(id))
            .exec(&txn)
            .await?;
        wishlist_item::Entity::delete_many()
            .filter(wishlist_item::Column::ProductId.eq(id))
            .exec(&txn)
            .await?;
        review::Entity::delete_many()
            .filter(review::Column::ProductId.eq(id))
            .exec(&txn)
            .await?;
        product_variant::Entity::delete_many()
            .filter(product_variant::Column::ProductId.eq(id))
            .exec(&txn)
            .await?;
        product::Entity::delete_by_id(id).exec(&txn).await?;

        aggregates::recompute_category_product_count(&txn, product.category_id).await?;
        for cart_id in affected_carts {
            aggregates::recompute_cart_total(&txn, cart_id).await?;
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ProductDeleted(id))
            .await;
        info!(product_id = %id, "Deleted product");
        Ok(())
    }

    /// Stores uploaded image names; absent parts leave the current value.
    #[instrument(skip(self))]
    pub async fn set_images(
        &self,
        id: Uuid,
        image_cover: Option<String>,
        images: Option<Vec<String>>,
    ) -> Result<ProductDetails, ServiceError> {
        let existing = product::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(not_found)?;

        let mut model: product::ActiveModel = existing.into();
        if let Some(cover) = image_cover {
            model.image_cover = Set(cover);
        }
        if let Some(images) = images {
            model.images = Set(serde_json::json!(images));
        }
        model.updated_at = Set(Utc::now());
        let product = model.update(&*self.db).await?;
        let variants = load_variants(&*self.db, id).await?;

        self.event_sender
            .send_or_log(Event::ProductImagesUpdated(id))
            .await;
        Ok(ProductDetails { product, variants })
    }

    /// Checks existence without loading variants.
    pub async fn exists(&self, id: Uuid) -> Result<bool, ServiceError> {
        Ok(product::Entity::find_by_id(id)
            .count(&*self.db)
            .await?
            > 0)
    }
}
