//! Authentication and user management service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{CreateUser, RegisterUser, Role, UpdateUser, User, UserClaims, UserQuery, UserShort},
    repository::UsersRepository,
};

#[derive(Clone)]
pub struct UsersService {
    users: UsersRepository,
    config: AuthConfig,
}

impl UsersService {
    pub fn new(users: UsersRepository, config: AuthConfig) -> Self {
        Self { users, config }
    }

    /// Authenticate user by login and return (token, user)
    pub async fn authenticate(&self, login: &str, password: &str) -> AppResult<(String, User)> {
        let user = match self.users.get_by_login(login).await? {
            Some(user) if verify_password(&user.password, password)? => user,
            _ => {
                tracing::warn!(login = %login, "Failed login attempt");
                return Err(AppError::Authentication("Invalid login or password".to_string()));
            }
        };

        let token = self.create_token_for_user(&user)?;
        tracing::info!(user_id = %user.id, role = %user.role, "User logged in");

        Ok((token, user))
    }

    fn create_token_for_user(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let claims = UserClaims {
            sub: user.login.clone(),
            user_id: user.id,
            role: user.role,
            exp: now + (self.config.jwt_expiration_hours as i64 * 3600),
            iat: now,
        };

        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Self-service sign up; always creates a member
    pub async fn register(&self, user: RegisterUser) -> AppResult<User> {
        user.validate()?;
        self.ensure_login_free(&user.login, None).await?;

        let hash = hash_password(&user.password)?;
        let created = self
            .users
            .create(&user.login, &hash, user.name.as_deref(), user.email.as_deref(), Role::Member)
            .await?;

        tracing::info!(user_id = %created.id, "Member registered");
        Ok(created)
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<User> {
        self.users.get_by_id(id).await
    }

    /// Search users
    pub async fn search_users(&self, query: &UserQuery) -> AppResult<(Vec<UserShort>, i64)> {
        self.users.search(query).await
    }

    /// Create a new user with any role
    pub async fn create_user(&self, user: CreateUser) -> AppResult<User> {
        user.validate()?;
        self.ensure_login_free(&user.login, None).await?;

        let hash = hash_password(&user.password)?;
        let role = user.role.unwrap_or(Role::Member);

        self.users
            .create(&user.login, &hash, user.name.as_deref(), user.email.as_deref(), role)
            .await
    }

    /// Update an existing user
    pub async fn update_user(&self, id: Uuid, user: UpdateUser) -> AppResult<User> {
        user.validate()?;

        if let Some(ref login) = user.login {
            self.ensure_login_free(login, Some(id)).await?;
        }

        let hash = user.password.as_deref().map(hash_password).transpose()?;

        self.users.update(id, &user, hash).await
    }

    /// Delete a user, refused while they hold a borrowed book unless forced
    pub async fn delete_user(&self, claims: &UserClaims, id: Uuid, force: bool) -> AppResult<()> {
        if claims.user_id == id {
            return Err(AppError::BadRequest("You cannot delete your own account".to_string()));
        }

        self.users.delete(id, force).await?;
        tracing::info!(user_id = %id, force, by = %claims.user_id, "User deleted");
        Ok(())
    }

    /// Create the configured admin account if there is no admin yet
    pub async fn ensure_admin(&self) -> AppResult<()> {
        let (login, password) = match (&self.config.admin_login, &self.config.admin_password) {
            (Some(login), Some(password)) => (login, password),
            _ => return Ok(()),
        };

        if self.users.admin_exists().await? {
            return Ok(());
        }

        if password.len() < 8 {
            return Err(AppError::Validation(
                "Admin password must be at least 8 characters".to_string(),
            ));
        }

        let hash = hash_password(password)?;
        let admin = self.users.create(login, &hash, None, None, Role::Admin).await?;
        tracing::warn!(user_id = %admin.id, login = %admin.login, "Bootstrap admin account created");

        Ok(())
    }

    async fn ensure_login_free(&self, login: &str, exclude_id: Option<Uuid>) -> AppResult<()> {
        if self.users.login_exists(login, exclude_id).await? {
            return Err(AppError::Conflict(format!("Login '{}' is already taken", login)));
        }
        Ok(())
    }
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Check a password against a stored Argon2 hash
pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
