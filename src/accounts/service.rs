use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::db::models::User;

use super::{
    is_valid_password, normalize_email, normalize_name,
    password::{hash_password, verify_password},
    AccountError, DEFAULT_ROLE,
};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at, updated_at";

/// Fields accepted when creating an account.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Partial profile edit; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AccountService {
    pool: PgPool,
}

impl AccountService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn register(&self, input: Registration) -> Result<User, AccountError> {
        let name = normalize_name(&input.name).ok_or(AccountError::InvalidInput)?;
        let email = normalize_email(&input.email).ok_or(AccountError::InvalidInput)?;
        if !is_valid_password(&input.password) {
            return Err(AccountError::InvalidInput);
        }

        if self.find_by_email(&email).await?.is_some() {
            return Err(AccountError::EmailInUse);
        }

        let password_hash = hash_password(&input.password)?;
        let sql = format!(
            "INSERT INTO users (name, email, password_hash, role) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(&name)
            .bind(&email)
            .bind(&password_hash)
            .bind(DEFAULT_ROLE)
            .fetch_one(&self.pool)
            .await
            .map_err(email_conflict)?;

        info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Check an email/password pair. Unknown email, a provider-only account and
    /// a wrong password are indistinguishable to the caller.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AccountError> {
        let email = normalize_email(email).ok_or(AccountError::InvalidCredentials)?;
        let user = self
            .find_by_email(&email)
            .await?
            .ok_or(AccountError::InvalidCredentials)?;

        match user.password_hash.as_deref() {
            Some(hash) if verify_password(password, hash) => Ok(user),
            _ => Err(AccountError::InvalidCredentials),
        }
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<User, AccountError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AccountError::NotFound)
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> Result<User, AccountError> {
        let name = update
            .name
            .as_deref()
            .map(|n| normalize_name(n).ok_or(AccountError::InvalidInput))
            .transpose()?;
        let email = update
            .email
            .as_deref()
            .map(|e| normalize_email(e).ok_or(AccountError::InvalidInput))
            .transpose()?;

        if let Some(email) = email.as_deref() {
            if let Some(other) = self.find_by_email(email).await? {
                if other.id != user_id {
                    return Err(AccountError::EmailInUse);
                }
            }
        }

        let sql = format!(
            "UPDATE users \
             SET name       = COALESCE($2, name), \
                 email      = COALESCE($3, email), \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .bind(name)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(email_conflict)?
            .ok_or(AccountError::NotFound)?;

        info!(user_id = %user.id, "Profile updated");
        Ok(user)
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        current: &str,
        new: &str,
    ) -> Result<(), AccountError> {
        let user = self.profile(user_id).await?;
        match user.password_hash.as_deref() {
            Some(hash) if verify_password(current, hash) => {}
            _ => return Err(AccountError::InvalidCredentials),
        }
        if !is_valid_password(new) {
            return Err(AccountError::InvalidInput);
        }

        let password_hash = hash_password(new)?;
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .bind(&password_hash)
            .execute(&self.pool)
            .await?;

        info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AccountError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }
}

/// A concurrent insert can still trip the unique index after the pre-check.
fn email_conflict(e: sqlx::Error) -> AccountError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => AccountError::EmailInUse,
        _ => AccountError::Database(e),
    }
}
