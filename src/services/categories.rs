use crate::{
    entities::{category, product},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{normalize_paging, Page};

#[derive(Clone)]
pub struct CategoryService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCategoryInput {
    #[validate(length(
        min = 1,
        max = 32,
        message = "A category name must have between 1 and 32 characters"
    ))]
    pub name: String,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateCategoryInput {
    #[validate(length(
        min = 1,
        max = 32,
        message = "A category name must have between 1 and 32 characters"
    ))]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CategoryWithProducts {
    #[serde(flatten)]
    pub category: category::Model,
    pub products: Vec<product::Model>,
}

fn not_found() -> ServiceError {
    ServiceError::NotFound("No category found with that ID".to_string())
}

impl CategoryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    pub async fn list(&self, page: u64, limit: u64) -> Result<Page<category::Model>, ServiceError> {
        let (page, limit) = normalize_paging(page, limit);
        let paginator = category::Entity::find()
            .order_by_asc(category::Column::Name)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;
        Ok(Page { items, total })
    }

    pub async fn get(&self, id: Uuid) -> Result<CategoryWithProducts, ServiceError> {
        let category = category::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(not_found)?;
        let products = category
            .find_related(product::Entity)
            .order_by_asc(product::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(CategoryWithProducts { category, products })
    }

    #[instrument(skip(self))]
    pub async fn create(&self, input: CreateCategoryInput) -> Result<category::Model, ServiceError> {
        input.validate()?;
        let now = Utc::now();
        let category = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            products_quantity: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        self.event_sender
            .send_or_log(Event::CategoryCreated(category.id))
            .await;
        info!(category_id = %category.id, "Created category");
        Ok(category)
    }

    #[instrument(skip(self))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateCategoryInput,
    ) -> Result<category::Model, ServiceError> {
        input.validate()?;
        let category = category::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(not_found)?;

        let mut model: category::ActiveModel = category.into();
        if let Some(name) = input.name {
            model.name = Set(name.trim().to_string());
        }
        model.updated_at = Set(Utc::now());
        let category = model.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CategoryUpdated(category.id))
            .await;
        Ok(category)
    }

    /// Refuses while any product still references the category.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let category = category::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(not_found)?;

        let owned = product::Entity::find()
            .filter(product::Column::CategoryId.eq(id))
            .count(&txn)
            .await?;
        if owned > 0 {
            return Err(ServiceError::Conflict(format!(
                "Category still has {} product(s). Move or delete them first",
                owned
            )));
        }

        category.delete(&txn).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CategoryDeleted(id))
            .await;
        info!(category_id = %id, "Deleted category");
        Ok(())
    }
}
