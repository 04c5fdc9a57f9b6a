use crate::{
    entities::address,
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct AddressService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    #[validate(length(min = 1, message = "Address must have a street"))]
    pub street: String,
    #[validate(length(min = 1, message = "Address must have a city"))]
    pub city: String,
    #[validate(length(min = 1, message = "Address must have a state"))]
    pub state: String,
    #[validate(length(min = 1, message = "Address must have a zip code"))]
    pub zip_code: String,
    #[validate(length(min = 1, message = "Address must have a country"))]
    pub country: String,
    pub is_saved: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAddressInput {
    #[validate(length(min = 1))]
    pub street: Option<String>,
    #[validate(length(min = 1))]
    pub city: Option<String>,
    #[validate(length(min = 1))]
    pub state: Option<String>,
    #[validate(length(min = 1))]
    pub zip_code: Option<String>,
    #[validate(length(min = 1))]
    pub country: Option<String>,
    pub is_saved: Option<bool>,
}

fn not_found() -> ServiceError {
    ServiceError::NotFound("No address found with that ID".to_string())
}

impl AddressService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    async fn owned(&self, user_id: Uuid, id: Uuid) -> Result<address::Model, ServiceError> {
        address::Entity::find_by_id(id)
            .filter(address::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(not_found)
    }

    #[instrument(skip(self, input))]
    pub async fn create(
        &self,
        user_id: Uuid,
        input: AddressInput,
    ) -> Result<address::Model, ServiceError> {
        input.validate()?;

        let existing = address::Entity::find()
            .filter(address::Column::UserId.eq(user_id))
            .count(&*self.db)
            .await?;
        if existing > 0 {
            return Err(ServiceError::Conflict(
                "You already have an address. Update it instead".to_string(),
            ));
        }

        let now = Utc::now();
        let address = address::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            street: Set(input.street),
            city: Set(input.city),
            state: Set(input.state),
            zip_code: Set(input.zip_code),
            country: Set(input.country),
            is_saved: Set(input.is_saved.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        self.event_sender
            .send_or_log(Event::AddressCreated(address.id))
            .await;
        info!(address_id = %address.id, "Address created");
        Ok(address)
    }

    pub async fn get_mine(&self, user_id: Uuid) -> Result<address::Model, ServiceError> {
        address::Entity::find()
            .filter(address::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("You have not added an address yet".to_string()))
    }

    pub async fn get(&self, user_id: Uuid, id: Uuid) -> Result<address::Model, ServiceError> {
        self.owned(user_id, id).await
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        input: UpdateAddressInput,
    ) -> Result<address::Model, ServiceError> {
        input.validate()?;
        let existing = self.owned(user_id, id).await?;

        let mut model: address::ActiveModel = existing.into();
        if let Some(street) = input.street {
            model.street = Set(street);
        }
        if let Some(city) = input.city {
            model.city = Set(city);
        }
        if let Some(state) = input.state {
            model.state = Set(state);
        }
        if let Some(zip_code) = input.zip_code {
            model.zip_code = Set(zip_code);
        }
        if let Some(country) = input.country {
            model.country = Set(country);
        }
        if let Some(is_saved) = input.is_saved {
            model.is_saved = Set(is_saved);
        }
        model.updated_at = Set(Utc::now());
        let address = model.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::AddressUpdated(address.id))
            .await;
        Ok(address)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.owned(user_id, id).await?;
        existing.delete(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::AddressDeleted(id))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_payload_is_camel_case_with_optional_saved_flag() {
        let input: AddressInput = serde_json::from_value(serde_json::json!({
            "street": "1 Main St",
            "city": "Springfield",
            "state": "IL",
            "zipCode": "62701",
            "country": "US"
        }))
        .unwrap();
        assert_eq!(input.zip_code, "62701");
        assert!(input.is_saved.is_none());
        assert!(input.validate().is_ok());
    }

    #[test]
    fn blank_city_is_invalid() {
        let input = AddressInput {
            street: "1 Main St".into(),
            city: String::new(),
            state: "IL".into(),
            zip_code: "62701".into(),
            country: "US".into(),
            is_saved: Some(false),
        };
        assert!(input.validate().is_err());
    }
}
