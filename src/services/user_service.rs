// src/services/user_service.rs
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use crate::{
    errors::{HaulwayError as AppError, HaulwayResult, Validator},
    models::user::{User, UserFilter, UserRegistration, UserRole, UserStatus, UserUpdate},
    services::{
        messaging_service::{NotificationMessage, NotificationPriority, NotificationService},
        store_service::{StoreKeys, StoreService},
    },
    utils::id_generator::{IdGenerator, IdType, generate_token},
};

#[async_trait]
pub trait UserOperations: Send + Sync {
    async fn register(&self, registration: UserRegistration) -> HaulwayResult<(User, String)>; // User + bearer token
    async fn issue_token(&self, user_id: &str) -> HaulwayResult<String>;
    async fn revoke_token(&self, token: &str) -> HaulwayResult<()>;
    async fn resolve_token(&self, token: &str) -> HaulwayResult<User>;
    async fn get_user(&self, user_id: &str) -> HaulwayResult<User>;
    async fn update_profile(&self, user_id: &str, update: UserUpdate) -> HaulwayResult<User>;
    async fn add_device_token(&self, user_id: &str, device_token: String) -> HaulwayResult<User>;
    async fn list_users(&self, filter: UserFilter) -> HaulwayResult<Vec<User>>;
    async fn set_status(&self, user_id: &str, status: UserStatus) -> HaulwayResult<User>;
}

pub struct UserService {
    store: Arc<StoreService>,
    notification_service: Arc<dyn NotificationService>,
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

fn looks_like_phone(phone: &str) -> bool {
    let digits = phone.trim_start_matches('+');
    (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

impl UserService {
    pub fn new(store: Arc<StoreService>, notification_service: Arc<dyn NotificationService>) -> Self {
        Self {
            store,
            notification_service,
        }
    }

    async fn save(&self, user: &User) -> HaulwayResult<()> {
        self.store.put(&StoreKeys::user_by_id(&user.id), user).await
    }

    async fn id_by_email(&self, email: &str) -> HaulwayResult<Option<String>> {
        self.store.get(&StoreKeys::user_by_email(email)).await
    }

    async fn id_by_phone(&self, phone: &str) -> HaulwayResult<Option<String>> {
        self.store.get(&StoreKeys::user_by_phone(phone)).await
    }

    /// Bind the configured bootstrap token to an admin account.
    pub async fn ensure_admin(&self, token: &str) -> HaulwayResult<User> {
        if let Some(user_id) = self.store.get::<String>(&StoreKeys::token(token)).await? {
            let user = self.get_user(&user_id).await?;
            if user.is_admin() {
                return Ok(user);
            }
            return Err(AppError::ConfigurationError(
                "HAULWAY_ADMIN_TOKEN is already bound to a non-admin user".to_string(),
            ));
        }

        let now = Utc::now();
        let admin = User {
            id: IdGenerator::generate(IdType::User),
            role: UserRole::Admin,
            status: UserStatus::Active,
            email: "admin@haulway.local".to_string(),
            phone_number: String::new(),
            first_name: "Platform".to_string(),
            last_name: "Admin".to_string(),
            device_tokens: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        self.save(&admin).await?;
        self.store.sadd(&StoreKeys::all_users(), &admin.id).await?;
        self.store.put(&StoreKeys::token(token), &admin.id).await?;

        tracing::info!("Bootstrap admin ensured: {}", admin.id);
        Ok(admin)
    }
}

#[async_trait]
impl UserOperations for UserService {
    async fn register(&self, registration: UserRegistration) -> HaulwayResult<(User, String)> {
        tracing::info!("Registering {:?} user: {}", registration.role, registration.email);

        if !registration.role.is_self_registrable() {
            return Err(AppError::forbidden("Admin accounts cannot be self-registered"));
        }

        let email = registration.email.trim().to_lowercase();
        let phone = registration.phone_number.trim().to_string();

        Validator::new()
            .check(looks_like_email(&email), "email", "Invalid email format")
            .check(looks_like_phone(&phone), "phone_number", "Invalid phone number")
            .require_text(&registration.first_name, "first_name")
            .require_text(&registration.last_name, "last_name")
            .finish()?;

        if self.id_by_email(&email).await?.is_some() {
            return Err(AppError::conflict("A user with this email already exists"));
        }
        if self.id_by_phone(&phone).await?.is_some() {
            return Err(AppError::conflict("A user with this phone number already exists"));
        }

        let now = Utc::now();
        let user = User {
            id: IdGenerator::generate(IdType::User),
            role: registration.role,
            status: UserStatus::Active,
            email,
            phone_number: phone,
            first_name: registration.first_name.trim().to_string(),
            last_name: registration.last_name.trim().to_string(),
            device_tokens: registration.device_token.into_iter().filter(|t| !t.is_empty()).collect(),
            created_at: now,
            updated_at: now,
        };

        self.save(&user).await?;
        self.store.put(&StoreKeys::user_by_email(&user.email), &user.id).await?;
        self.store.put(&StoreKeys::user_by_phone(&user.phone_number), &user.id).await?;
        self.store.sadd(&StoreKeys::all_users(), &user.id).await?;

        let token = self.issue_token(&user.id).await?;

        if !user.device_tokens.is_empty() {
            let welcome = NotificationMessage::new("Welcome to Haulway", "Your account is ready")
                .with_data(serde_json::json!({ "type": "welcome", "user_id": user.id }))
                .with_priority(NotificationPriority::Normal);
            if let Err(e) = self.notification_service.send_to_user(&user.id, welcome).await {
                tracing::warn!("Welcome push for {} failed: {}", user.id, e);
            }
        }

        tracing::info!("User registered successfully: {}", user.id);
        Ok((user, token))
    }

    async fn issue_token(&self, user_id: &str) -> HaulwayResult<String> {
        let user = self.get_user(user_id).await?;
        let token = generate_token();
        self.store.put(&StoreKeys::token(&token), &user.id).await?;
        tracing::info!("Issued access token for {}", user.id);
        Ok(token)
    }

    async fn revoke_token(&self, token: &str) -> HaulwayResult<()> {
        self.store.delete(&StoreKeys::token(token)).await?;
        tracing::debug!("Access token revoked");
        Ok(())
    }

    async fn resolve_token(&self, token: &str) -> HaulwayResult<User> {
        if token.is_empty() {
            return Err(AppError::TokenInvalid);
        }

        let user_id: String = self
            .store
            .get(&StoreKeys::token(token))
            .await?
            .ok_or(AppError::TokenInvalid)?;

        let user = match self.get_user(&user_id).await {
            Ok(user) => user,
            Err(AppError::UserNotFound(_)) => return Err(AppError::TokenInvalid),
            Err(e) => return Err(e),
        };

        if user.status == UserStatus::Suspended {
            return Err(AppError::AccountSuspended);
        }
        Ok(user)
    }

    async fn get_user(&self, user_id: &str) -> HaulwayResult<User> {
        if !IdGenerator::validate_id(user_id, Some(IdType::User)) {
            tracing::warn!("Invalid user ID format: {}", user_id);
            return Err(AppError::UserNotFound(user_id.to_string()));
        }

        tracing::debug!("Getting user: {}", user_id);
        self.store
            .get(&StoreKeys::user_by_id(user_id))
            .await?
            .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))
    }

    async fn update_profile(&self, user_id: &str, update: UserUpdate) -> HaulwayResult<User> {
        let mut user = self.get_user(user_id).await?;
        tracing::info!("Updating user: {}", user_id);

        let email = update.email.map(|e| e.trim().to_lowercase());
        let phone = update.phone_number.map(|p| p.trim().to_string());

        let mut validator = Validator::new();
        if let Some(email) = &email {
            validator.check(looks_like_email(email), "email", "Invalid email format");
        }
        if let Some(phone) = &phone {
            validator.check(looks_like_phone(phone), "phone_number", "Invalid phone number");
        }
        if let Some(first) = &update.first_name {
            validator.require_text(first, "first_name");
        }
        if let Some(last) = &update.last_name {
            validator.require_text(last, "last_name");
        }
        validator.finish()?;

        if let Some(email) = email.filter(|e| *e != user.email) {
            if self.id_by_email(&email).await?.is_some() {
                return Err(AppError::conflict("A user with this email already exists"));
            }
            self.store.delete(&StoreKeys::user_by_email(&user.email)).await?;
            self.store.put(&StoreKeys::user_by_email(&email), &user.id).await?;
            user.email = email;
        }
        if let Some(phone) = phone.filter(|p| *p != user.phone_number) {
            if self.id_by_phone(&phone).await?.is_some() {
                return Err(AppError::conflict("A user with this phone number already exists"));
            }
            self.store.delete(&StoreKeys::user_by_phone(&user.phone_number)).await?;
            self.store.put(&StoreKeys::user_by_phone(&phone), &user.id).await?;
            user.phone_number = phone;
        }
        if let Some(first_name) = update.first_name {
            user.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = update.last_name {
            user.last_name = last_name.trim().to_string();
        }

        user.updated_at = Utc::now();
        self.save(&user).await?;
        Ok(user)
    }

    async fn add_device_token(&self, user_id: &str, device_token: String) -> HaulwayResult<User> {
        if device_token.trim().is_empty() {
            return Err(AppError::validation_error("device_token", "must not be empty"));
        }

        let mut user = self.get_user(user_id).await?;
        if !user.device_tokens.contains(&device_token) {
            user.device_tokens.push(device_token);
            user.updated_at = Utc::now();
            self.save(&user).await?;
            tracing::debug!("Device token added for {}", user_id);
        }
        Ok(user)
    }

    async fn list_users(&self, filter: UserFilter) -> HaulwayResult<Vec<User>> {
        let mut users: Vec<User> = self
            .store
            .load_all(&StoreKeys::all_users(), StoreKeys::user_by_id)
            .await?;
        users.retain(|u| filter.role.is_none_or(|role| u.role == role));
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn set_status(&self, user_id: &str, status: UserStatus) -> HaulwayResult<User> {
        let mut user = self.get_user(user_id).await?;
        if user.is_admin() && status == UserStatus::Suspended {
            return Err(AppError::forbidden("Admin accounts cannot be suspended"));
        }

        user.status = status;
        user.updated_at = Utc::now();
        self.save(&user).await?;

        tracing::info!("User {} is now {:?}", user.id, status);
        Ok(user)
    }
}
