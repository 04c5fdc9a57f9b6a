use crate::{
    auth::AuthUser,
    entities::{product, review},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{aggregates, normalize_paging, Page};

#[derive(Clone)]
pub struct ReviewService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateReviewInput {
    #[validate(length(min = 1, message = "Review can not be empty!"))]
    pub review: String,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    /// Product id; taken from the path on nested routes.
    pub product: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateReviewInput {
    #[validate(length(min = 1, message = "Review can not be empty!"))]
    pub review: Option<String>,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: Option<i32>,
}

fn not_found() -> ServiceError {
    ServiceError::NotFound("No review found with that ID".to_string())
}

fn ensure_author_or_admin(actor: &AuthUser, review: &review::Model) -> Result<(), ServiceError> {
    if actor.can_access(review.user_id) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(
            "You can only change your own reviews".to_string(),
        ))
    }
}

impl ReviewService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    pub async fn list(
        &self,
        product_id: Option<Uuid>,
        page: u64,
        limit: u64,
    ) -> Result<Page<review::Model>, ServiceError> {
        let (page, limit) = normalize_paging(page, limit);
        let mut query = review::Entity::find().order_by_desc(review::Column::CreatedAt);
        if let Some(product_id) = product_id {
            query = query.filter(review::Column::ProductId.eq(product_id));
        }
        let paginator = query.paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;
        Ok(Page { items, total })
    }

    pub async fn get(&self, id: Uuid) -> Result<review::Model, ServiceError> {
        review::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(not_found)
    }

    /// `product_id` from the route wins over the body field.
    #[instrument(skip(self, input), fields(user_id = %actor.user_id))]
    pub async fn create(
        &self,
        actor: &AuthUser,
        product_id: Option<Uuid>,
        input: CreateReviewInput,
    ) -> Result<review::Model, ServiceError> {
        input.validate()?;
        let product_id = product_id.or(input.product).ok_or_else(|| {
            ServiceError::ValidationError("Review must belong to a product.".to_string())
        })?;

        let txn = self.db.begin().await?;

        product::Entity::find_by_id(product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("No product found with that ID".to_string()))?;

        let now = Utc::now();
        let review = review::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            user_id: Set(actor.user_id),
            rating: Set(input.rating),
            review: Set(input.review),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        aggregates::recompute_product_review_stats(&txn, product_id).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ReviewCreated {
                product_id,
                review_id: review.id,
            })
            .await;
        info!(review_id = %review.id, %product_id, "Review created");
        Ok(review)
    }

    #[instrument(skip(self, input), fields(user_id = %actor.user_id))]
    pub async fn update(
        &self,
        actor: &AuthUser,
        id: Uuid,
        input: UpdateReviewInput,
    ) -> Result<review::Model, ServiceError> {
        input.validate()?;
        let txn = self.db.begin().await?;

        let existing = review::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(not_found)?;
        ensure_author_or_admin(actor, &existing)?;

        let mut model: review::ActiveModel = existing.into();
        if let Some(text) = input.review {
            model.review = Set(text);
        }
        if let Some(rating) = input.rating {
            model.rating = Set(rating);
        }
        model.updated_at = Set(Utc::now());
        let review = model.update(&txn).await?;

        aggregates::recompute_product_review_stats(&txn, review.product_id).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ReviewUpdated {
                product_id: review.product_id,
                review_id: review.id,
            })
            .await;
        Ok(review)
    }

    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn delete(&self, actor: &AuthUser, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let existing = review::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(not_found)?;
        ensure_author_or_admin(actor, &existing)?;

        let product_id = existing.product_id;
        existing.delete(&txn).await?;
        aggregates::recompute_product_review_stats(&txn, product_id).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ReviewDeleted {
                product_id,
                review_id: id,
            })
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Role;
    use rstest::rstest;

    fn actor(role: Role) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            role,
            token_id: "t".into(),
            issued_at: 0,
        }
    }

    fn review_by(user_id: Uuid) -> review::Model {
        let now = Utc::now();
        review::Model {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            user_id,
            rating: 4,
            review: "Nice".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn author_and_admin_may_change_a_review() {
        let author = actor(Role::User);
        assert!(ensure_author_or_admin(&author, &review_by(author.user_id)).is_ok());
        assert!(ensure_author_or_admin(&actor(Role::Admin), &review_by(author.user_id)).is_ok());
    }

    #[test]
    fn other_users_are_forbidden() {
        let err = ensure_author_or_admin(&actor(Role::User), &review_by(Uuid::new_v4()))
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
    }

    #[rstest]
    #[case(0, false)]
    #[case(1, true)]
    #[case(5, true)]
    #[case(6, false)]
    fn rating_bounds(#[case] rating: i32, #[case] valid: bool) {
        let input = CreateReviewInput {
            review: "ok".into(),
            rating,
            product: None,
        };
        assert_eq!(input.validate().is_ok(), valid);
    }
}
