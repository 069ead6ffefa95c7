use bcrypt::{hash, verify};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::config::AppConfig;
use crate::database::entities::{user_sessions, users, UserRole};
use crate::errors::{CoreError, CoreResult};
use crate::services::login_limiter::LoginRateLimiter;
use crate::services::validation::ValidationService;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Freshly opened session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
    pub user: users::Model,
}

/// Service for handling authentication operations
#[derive(Clone)]
pub struct AuthService {
    db: DatabaseConnection,
    config: AppConfig,
}

impl AuthService {
    pub fn new(db: DatabaseConnection, config: AppConfig) -> Self {
        Self { db, config }
    }

    /// Hash a password using bcrypt
    pub fn hash_password(password: &str, cost: u32) -> CoreResult<String> {
        ValidationService::validate_password(password)?;
        hash(password, cost)
            .map_err(|e| CoreError::internal("Failed to hash password").with_source(e))
    }

    /// Verify a password against a hash
    pub fn verify_password(password: &str, hash: &str) -> CoreResult<bool> {
        verify(password, hash)
            .map_err(|e| CoreError::internal("Failed to verify password").with_source(e))
    }

    /// Create a login. The account has no company until onboarding.
    pub async fn register(&self, request: RegisterRequest) -> CoreResult<users::Model> {
        let user = create_user(
            &self.db,
            &self.config,
            NewUser {
                email: request.email,
                password: request.password,
                first_name: request.first_name,
                last_name: request.last_name,
                company_id: None,
                role: UserRole::Member,
            },
        )
        .await?;

        info!("Registered user {} ({})", user.id, user.email);
        Ok(user)
    }

    pub async fn login(
        &self,
        limiter: &LoginRateLimiter,
        request: LoginRequest,
    ) -> CoreResult<AuthSession> {
        let key = request.email.trim().to_lowercase();

        if let Some(remaining) = limiter.locked_for(&key) {
            warn!("Login for {} rejected while locked out", key);
            return Err(CoreError::too_many_requests(format!(
                "Too many failed login attempts, try again in {} minutes",
                remaining.as_secs().div_ceil(60).max(1)
            )));
        }

        let user = users::Entity::find()
            .filter(users::Column::Email.eq(key.as_str()))
            .one(&self.db)
            .await?;

        let user = match user {
            Some(user) if Self::verify_password(&request.password, &user.password_hash)? => user,
            _ => {
                limiter.record_failure(&key);
                return Err(CoreError::unauthorized("Invalid email or password"));
            }
        };

        if !user.is_active {
            return Err(CoreError::forbidden("Account is deactivated"));
        }

        limiter.record_success(&key);

        let mut active: users::ActiveModel = user.into();
        active.last_login_at = Set(Some(Utc::now()));
        let user = active.update(&self.db).await?;

        let session = user_sessions::ActiveModel::new(user.id, self.config.session_ttl_hours)
            .insert(&self.db)
            .await?;

        info!("User {} logged in", user.id);
        Ok(AuthSession {
            session_id: session.session_id,
            expires_at: session.expires_at,
            user,
        })
    }

    pub async fn logout(&self, session_id: &str) -> CoreResult<()> {
        let session = user_sessions::Entity::find()
            .filter(user_sessions::Column::SessionId.eq(session_id))
            .filter(user_sessions::Column::IsActive.eq(true))
            .one(&self.db)
            .await?;

        if let Some(session) = session {
            let user_id = session.user_id;
            let active: user_sessions::ActiveModel = session.into();
            active.deactivate().update(&self.db).await?;
            info!("User {} logged out", user_id);
        }

        Ok(())
    }
}

pub(crate) struct NewUser {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company_id: Option<i32>,
    pub role: UserRole,
}

pub(crate) async fn create_user<C: ConnectionTrait>(
    db: &C,
    config: &AppConfig,
    new_user: NewUser,
) -> CoreResult<users::Model> {
    let email = ValidationService::validate_email(&new_user.email)?;
    let password_hash = AuthService::hash_password(&new_user.password, config.bcrypt_cost)?;

    let taken = users::Entity::find()
        .filter(users::Column::Email.eq(email.as_str()))
        .one(db)
        .await?
        .is_some();
    if taken {
        return Err(CoreError::conflict("Email is already registered"));
    }

    let mut user = users::ActiveModel::new();
    user.email = Set(email);
    user.password_hash = Set(password_hash);
    user.first_name = Set(ValidationService::optional_text(new_user.first_name));
    user.last_name = Set(ValidationService::optional_text(new_user.last_name));
    user.company_id = Set(new_user.company_id);
    user.role = Set(new_user.role);

    Ok(user.insert(db).await?)
}
