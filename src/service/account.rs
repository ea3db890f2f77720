//! Account service
//!
//! Thin CRUD over user profiles: registration, profile edits, and
//! deactivation. Credential handling lives with the external identity
//! directory; this service only manages the profile rows.

use std::sync::Arc;

use crate::data::{Database, EntityId, User};
use crate::error::AppError;

const MAX_USERNAME_CHARS: usize = 30;
const MAX_BIO_CHARS: usize = 500;

fn normalize_optional_text(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Account service
pub struct AccountService {
    db: Arc<Database>,
}

impl AccountService {
    /// Create new account service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Register a new user.
    ///
    /// # Errors
    /// `Validation` when the username is malformed or already taken.
    pub async fn register(
        &self,
        username: &str,
        display_name: Option<String>,
    ) -> Result<User, AppError> {
        let username = username.trim().to_ascii_lowercase();
        if username.is_empty() || username.chars().count() > MAX_USERNAME_CHARS {
            return Err(AppError::Validation(format!(
                "username must be 1 to {} characters",
                MAX_USERNAME_CHARS
            )));
        }
        if !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(AppError::Validation(
                "username may only contain letters, digits, and underscores".to_string(),
            ));
        }

        let now = chrono::Utc::now();
        let user = User {
            id: EntityId::new().0,
            username,
            display_name: display_name
                .and_then(normalize_optional_text)
                .map(|text| html_escape::encode_text(&text).to_string()),
            bio: None,
            avatar_url: None,
            post_count: 0,
            follower_count: 0,
            following_count: 0,
            is_deactivated: false,
            created_at: now,
            updated_at: now,
        };

        if !self.db.insert_user(&user).await? {
            return Err(AppError::Validation("username is already taken".to_string()));
        }

        tracing::info!(user = %user.id, username = %user.username, "user registered");
        Ok(user)
    }

    /// Get a user's profile
    pub async fn get_profile(&self, user_id: &str) -> Result<User, AppError> {
        self.db
            .get_user(user_id)
            .await?
            .ok_or(AppError::NotFound("user"))
    }

    /// Update the caller's own profile fields.
    ///
    /// Absent fields are left unchanged.
    pub async fn update_profile(
        &self,
        actor: &str,
        display_name: Option<String>,
        bio: Option<String>,
        avatar_url: Option<String>,
    ) -> Result<User, AppError> {
        let display_name = display_name
            .and_then(normalize_optional_text)
            .map(|text| html_escape::encode_text(&text).to_string());
        let bio = bio.and_then(normalize_optional_text);
        if let Some(text) = &bio {
            if text.chars().count() > MAX_BIO_CHARS {
                return Err(AppError::Validation(format!(
                    "bio exceeds {} characters",
                    MAX_BIO_CHARS
                )));
            }
        }
        let bio = bio.map(|text| html_escape::encode_text(&text).to_string());

        let updated = self
            .db
            .update_user_profile(
                actor,
                display_name.as_deref(),
                bio.as_deref(),
                avatar_url.as_deref(),
                chrono::Utc::now(),
            )
            .await?;
        if !updated {
            return Err(AppError::NotFound("user"));
        }

        self.get_profile(actor).await
    }

    /// Deactivate the caller's account.
    ///
    /// Users are never hard-deleted; their posts and edges keep valid
    /// references.
    pub async fn deactivate(&self, actor: &str) -> Result<(), AppError> {
        if !self.db.deactivate_user(actor, chrono::Utc::now()).await? {
            return Err(AppError::NotFound("user"));
        }
        tracing::info!(user = %actor, "user deactivated");
        Ok(())
    }
}
