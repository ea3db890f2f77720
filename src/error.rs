//! Error types for Rookery
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.
//!
//! Domain precondition violations (already-friends, group-disbanded,
//! depth-exceeded, ...) get their own variants: they are detected before
//! any mutation and reported synchronously, never leaving partial state.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404); the argument names the resource kind
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Caller identity missing or invalid (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Caller identity known but not permitted to act (403)
    #[error("Access denied")]
    Forbidden,

    /// An accepted friendship edge already exists (409)
    #[error("Already friends")]
    AlreadyFriends,

    /// A pending request from this caller already exists (409)
    #[error("Friend request already sent")]
    RequestAlreadySent,

    /// The request or invitation is no longer pending (409)
    #[error("Request was already processed")]
    AlreadyProcessed,

    /// The group is disbanded and accepts no further writes (409)
    #[error("Group has been disbanded")]
    GroupDisbanded,

    /// The user is already a member of the group (409)
    #[error("Already a member of this group")]
    AlreadyMember,

    /// The acting or target user is not a member of the group (403)
    #[error("Not a member of this group")]
    NotAMember,

    /// The leader tried to kick themselves (422)
    #[error("The leader cannot kick themselves; transfer leadership or disband")]
    CannotKickSelf,

    /// The leader tried to leave without transferring first (422)
    #[error("The leader cannot leave the group; transfer leadership or disband")]
    LeaderCannotLeave,

    /// Leadership transfer target is not a current member (422)
    #[error("New leader must be a current member")]
    TargetNotMember,

    /// Repost chain would exceed the depth bound (422)
    #[error("Repost chain depth limit exceeded")]
    DepthExceeded,

    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// Stable machine-readable code included in error responses
    /// and used as the metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden => "forbidden",
            AppError::AlreadyFriends => "already_friends",
            AppError::RequestAlreadySent => "request_already_sent",
            AppError::AlreadyProcessed => "already_processed",
            AppError::GroupDisbanded => "group_disbanded",
            AppError::AlreadyMember => "already_member",
            AppError::NotAMember => "not_a_member",
            AppError::CannotKickSelf => "cannot_kick_self",
            AppError::LeaderCannotLeave => "leader_cannot_leave",
            AppError::TargetNotMember => "target_not_member",
            AppError::DepthExceeded => "depth_exceeded",
            AppError::Validation(_) => "validation",
            AppError::Database(_) => "database",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden | AppError::NotAMember => StatusCode::FORBIDDEN,
            AppError::AlreadyFriends
            | AppError::RequestAlreadySent
            | AppError::AlreadyProcessed
            | AppError::GroupDisbanded
            | AppError::AlreadyMember => StatusCode::CONFLICT,
            AppError::CannotKickSelf
            | AppError::LeaderCannotLeave
            | AppError::TargetNotMember
            | AppError::DepthExceeded => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to an HTTP status code and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let status = self.status();
        let message = match &self {
            // Never leak internals to the caller.
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                "Internal server error".to_string()
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[self.kind()]).inc();

        let body = Json(serde_json::json!({
            "error": message,
            "code": self.kind(),
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
