use crate::{
    auth::{hash_password, verify_password, AuthError, AuthService},
    entities::{user, Role},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, PaginatorTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{normalize_paging, Page};

pub const DEFAULT_PHOTO: &str = "default.png";

/// Account management: signup, login, password changes and admin CRUD.
#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    auth: Arc<AuthService>,
}

/// A user with a fresh session token and its `Set-Cookie` value.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: user::Model,
    pub token: String,
    pub cookie: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupInput {
    #[validate(length(min = 1, message = "Please tell us your name!"))]
    pub name: String,
    #[validate(email(message = "Please provide a valid email!"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub password_confirm: String,
    pub photo: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LoginInput {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordInput {
    pub password_current: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileInput {
    #[validate(length(min = 1, message = "Please tell us your name!"))]
    pub name: Option<String>,
    #[validate(email(message = "Please provide a valid email!"))]
    pub email: Option<String>,
    /// Rejected when present; passwords change through `updateMyPassword`.
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserInput {
    #[validate(length(min = 1, message = "Please tell us your name!"))]
    pub name: String,
    #[validate(email(message = "Please provide a valid email!"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub password_confirm: String,
    pub role: Option<Role>,
    pub photo: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserInput {
    #[validate(length(min = 1, message = "Please tell us your name!"))]
    pub name: Option<String>,
    #[validate(email(message = "Please provide a valid email!"))]
    pub email: Option<String>,
    pub role: Option<Role>,
    pub photo: Option<String>,
}

/// Public view of a user for API documentation.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: String,
    pub role: Role,
}

impl From<&user::Model> for UserProfile {
    fn from(model: &user::Model) -> Self {
        Self {
            id: model.id,
            name: model.name.clone(),
            email: model.email.clone(),
            photo: model.photo.clone(),
            role: model.role,
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn ensure_passwords_match(password: &str, confirm: &str) -> Result<(), ServiceError> {
    if password != confirm {
        return Err(ServiceError::ValidationError(
            "Invalid input data. passwordConfirm: Passwords are not the same!".to_string(),
        ));
    }
    Ok(())
}

impl UserService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        auth: Arc<AuthService>,
    ) -> Self {
        Self {
            db,
            event_sender,
            auth,
        }
    }

    fn session_for(&self, user: user::Model) -> Result<Session, ServiceError> {
        let token = self.auth.issue_token(&user)?;
        let cookie = self.auth.session_cookie(&token);
        Ok(Session {
            user,
            token,
            cookie,
        })
    }

    pub fn logout_cookie(&self) -> String {
        self.auth.logout_cookie()
    }

    async fn insert_user(
        &self,
        name: String,
        email: &str,
        password: &str,
        role: Role,
        photo: Option<String>,
    ) -> Result<user::Model, ServiceError> {
        let now = Utc::now();
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.trim().to_string()),
            email: Set(normalize_email(email)),
            photo: Set(photo.unwrap_or_else(|| DEFAULT_PHOTO.to_string())),
            role: Set(role),
            password_hash: Set(hash_password(password)?),
            password_changed_at: Set(None),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(model.insert(&*self.db).await?)
    }

    /// Registers a plain user account and opens a session for it.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn signup(&self, input: SignupInput) -> Result<Session, ServiceError> {
        input.validate()?;
        ensure_passwords_match(&input.password, &input.password_confirm)?;

        let user = self
            .insert_user(
                input.name,
                &input.email,
                &input.password,
                Role::User,
                input.photo,
            )
            .await?;

        self.event_sender
            .send_or_log(Event::UserSignedUp(user.id))
            .await;
        info!(user_id = %user.id, "User signed up");
        self.session_for(user)
    }

    #[instrument(skip(self, input))]
    pub async fn login(&self, input: LoginInput) -> Result<Session, ServiceError> {
        let (email, password) = match (input.email, input.password) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                (email, password)
            }
            _ => {
                return Err(ServiceError::BadRequest(
                    "Please provide email and password!".to_string(),
                ))
            }
        };

        let user = user::active_users()
            .filter(user::Column::Email.eq(normalize_email(&email)))
            .one(&*self.db)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials.into());
        }

        self.event_sender
            .send_or_log(Event::UserLoggedIn(user.id))
            .await;
        self.session_for(user)
    }

    /// Changes the password and reissues a token; older tokens stop verifying.
    #[instrument(skip(self, input))]
    pub async fn update_password(
        &self,
        user_id: Uuid,
        input: UpdatePasswordInput,
    ) -> Result<Session, ServiceError> {
        input.validate()?;
        let user = self.find_active(user_id).await?;

        if !verify_password(&input.password_current, &user.password_hash)? {
            return Err(ServiceError::Unauthorized(
                "Your current password is wrong.".to_string(),
            ));
        }
        ensure_passwords_match(&input.password, &input.password_confirm)?;

        let now = Utc::now();
        let mut model: user::ActiveModel = user.into();
        model.password_hash = Set(hash_password(&input.password)?);
        // Backdated so the token issued below is not older than the change.
        model.password_changed_at = Set(Some(now - Duration::seconds(1)));
        model.updated_at = Set(now);
        let user = model.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::PasswordChanged(user.id))
            .await;
        self.session_for(user)
    }

    async fn find_active(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        user::active_users()
            .filter(user::Column::Id.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("No user found with that ID".to_string()))
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        self.find_active(user_id).await
    }

    #[instrument(skip(self, input))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        input: UpdateProfileInput,
    ) -> Result<user::Model, ServiceError> {
        if input.password.is_some() || input.password_confirm.is_some() {
            return Err(ServiceError::BadRequest(
                "This route is not for password updates. Please use /updateMyPassword"
                    .to_string(),
            ));
        }
        input.validate()?;

        let user = self.find_active(user_id).await?;
        let mut model: user::ActiveModel = user.into();
        if let Some(name) = input.name {
            model.name = Set(name.trim().to_string());
        }
        if let Some(email) = input.email {
            model.email = Set(normalize_email(&email));
        }
        model.updated_at = Set(Utc::now());
        let user = model.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::UserUpdated(user.id))
            .await;
        Ok(user)
    }

    pub async fn update_photo(
        &self,
        user_id: Uuid,
        photo: String,
    ) -> Result<user::Model, ServiceError> {
        let user = self.find_active(user_id).await?;
        let mut model: user::ActiveModel = user.into();
        model.photo = Set(photo);
        model.updated_at = Set(Utc::now());
        let user = model.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::UserUpdated(user.id))
            .await;
        Ok(user)
    }

    /// Soft delete: the row stays but every lookup skips it.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let user = self.find_active(user_id).await?;
        let mut model: user::ActiveModel = user.into();
        model.active = Set(false);
        model.updated_at = Set(Utc::now());
        model.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::UserDeactivated(user_id))
            .await;
        info!(%user_id, "User deactivated");
        Ok(())
    }

    pub async fn list_users(&self, page: u64, limit: u64) -> Result<Page<user::Model>, ServiceError> {
        let (page, limit) = normalize_paging(page, limit);
        let paginator = user::active_users()
            .order_by_asc(user::Column::CreatedAt)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;
        Ok(Page { items, total })
    }

    /// Admin-side creation; unlike signup the role may be chosen.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create_user(&self, input: CreateUserInput) -> Result<user::Model, ServiceError> {
        input.validate()?;
        ensure_passwords_match(&input.password, &input.password_confirm)?;

        let user = self
            .insert_user(
                input.name,
                &input.email,
                &input.password,
                input.role.unwrap_or_default(),
                input.photo,
            )
            .await?;

        self.event_sender
            .send_or_log(Event::UserSignedUp(user.id))
            .await;
        Ok(user)
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        self.find_active(user_id).await
    }

    #[instrument(skip(self, input))]
    pub async fn update_user(
        &self,
        user_id: Uuid,
        input: UpdateUserInput,
    ) -> Result<user::Model, ServiceError> {
        input.validate()?;
        let user = self.find_active(user_id).await?;

        let mut model: user::ActiveModel = user.into();
        if let Some(name) = input.name {
            model.name = Set(name.trim().to_string());
        }
        if let Some(email) = input.email {
            model.email = Set(normalize_email(&email));
        }
        if let Some(role) = input.role {
            model.role = Set(role);
        }
        if let Some(photo) = input.photo {
            model.photo = Set(photo);
        }
        model.updated_at = Set(Utc::now());
        let user = model.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::UserUpdated(user.id))
            .await;
        Ok(user)
    }

    pub async fn delete_user(&self, user_id: Uuid) -> Result<(), ServiceError> {
        self.deactivate(user_id).await
    }
}
