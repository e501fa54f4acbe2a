use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use super::{generate_token, password};
use crate::db::{self, DbPool, User};
use crate::store::{get_json, set_json_ex, KeyValueStore, StoreError};

const RESET_PREFIX: &str = "reset:";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    WeakPassword(String),

    #[error("Invalid credentials")]
    InvalidCredential,

    #[error("Reset token is invalid or has expired")]
    TokenNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AuthError::Hash(err.to_string())
    }
}

/// Value stored under `reset:{token}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetRecord {
    pub user_id: String,
    pub email: String,
}

/// Password verification, password changes and one-time reset tokens.
#[derive(Clone)]
pub struct CredentialManager {
    pool: DbPool,
    store: Arc<dyn KeyValueStore>,
    reset_ttl: Duration,
    min_password_length: usize,
}

impl CredentialManager {
    pub fn new(
        pool: DbPool,
        store: Arc<dyn KeyValueStore>,
        reset_ttl: Duration,
        min_password_length: usize,
    ) -> Self {
        Self {
            pool,
            store,
            reset_ttl,
            min_password_length,
        }
    }

    fn reset_key(token: &str) -> String {
        format!("{}{}", RESET_PREFIX, token)
    }

    pub fn check_policy(&self, plain: &str) -> Result<(), AuthError> {
        match password::check_password_policy(plain, self.min_password_length) {
            Some(reason) => Err(AuthError::WeakPassword(reason)),
            None => Ok(()),
        }
    }

    /// Hash after enforcing the password policy
    pub fn hash_password(&self, plain: &str) -> Result<String, AuthError> {
        self.check_policy(plain)?;
        Ok(password::hash_password(plain)?)
    }

    pub fn verify_password(&self, plain: &str, hash: &str) -> Result<bool, AuthError> {
        Ok(password::verify_password(plain, hash)?)
    }

    /// Look up a user by email and check the password.
    ///
    /// Unknown email and wrong password are the same error.
    pub async fn authenticate(&self, email: &str, plain: &str) -> Result<User, AuthError> {
        let user = db::users::find_by_email(&self.pool, email)
            .await?
            .ok_or(AuthError::InvalidCredential)?;

        if !self.verify_password(plain, &user.password_hash)? {
            return Err(AuthError::InvalidCredential);
        }
        Ok(user)
    }

    /// Issue a reset token for `email`.
    ///
    /// For an unknown email a token of the same shape is returned but never
    /// stored, so it can not be redeemed.
    pub async fn request_reset(&self, email: &str) -> Result<String, AuthError> {
        let token = generate_token();

        let Some(user) = db::users::find_by_email(&self.pool, email).await? else {
            debug!("Password reset requested for unknown email");
            return Ok(token);
        };

        let record = ResetRecord {
            user_id: user.id,
            email: user.email,
        };
        set_json_ex(
            self.store.as_ref(),
            &Self::reset_key(&token),
            &record,
            self.reset_ttl,
        )
        .await?;

        Ok(token)
    }

    /// Redeem a reset token. The token is consumed on success.
    pub async fn confirm_reset(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        self.check_policy(new_password)?;

        let key = Self::reset_key(token);
        let record: ResetRecord = get_json(self.store.as_ref(), &key)
            .await?
            .ok_or(AuthError::TokenNotFound)?;

        if db::users::find_by_id(&self.pool, &record.user_id)
            .await?
            .is_none()
        {
            return Err(AuthError::UserNotFound);
        }

        let hash = self.hash_password(new_password)?;

        // Claiming the token by deleting it keeps it single-use under concurrent confirms
        if !self.store.delete(&key).await? {
            return Err(AuthError::TokenNotFound);
        }

        if !db::users::update_password(&self.pool, &record.user_id, &hash).await? {
            return Err(AuthError::UserNotFound);
        }

        info!(user_id = %record.user_id, "Password reset completed");
        Ok(())
    }

    /// Change a password after checking the current one.
    /// Nothing is written when the current password does not match.
    pub async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        self.check_policy(new_password)?;

        let user = db::users::find_by_id(&self.pool, user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !self.verify_password(current_password, &user.password_hash)? {
            return Err(AuthError::InvalidCredential);
        }

        let hash = self.hash_password(new_password)?;
        db::users::update_password(&self.pool, &user.id, &hash).await?;

        info!(user_id = %user.id, "Password changed");
        Ok(())
    }
}
