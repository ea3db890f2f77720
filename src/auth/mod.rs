//! Caller identity extraction
//!
//! Credential verification is the job of the external identity
//! directory fronting this service; the gateway asserts the caller's
//! user ID in the `X-User-Id` header. These extractors resolve that
//! assertion to an active user row and hand the ID to handlers, which
//! pass it down as an explicit parameter on every service call. No
//! service ever reads ambient session state.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};

use crate::AppState;
use crate::data::User;
use crate::error::AppError;

/// Header carrying the gateway-asserted caller ID.
pub const USER_ID_HEADER: &str = "x-user-id";

fn extract_user_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

/// Extractor for the authenticated caller.
///
/// Rejects with 401 when the header is missing, or when it names a
/// user that does not exist or is deactivated.
///
/// # Usage
/// ```ignore
/// async fn handler(
///     CurrentUser(user): CurrentUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}", user.username)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let user_id = extract_user_id(&parts.headers).ok_or(AppError::Unauthorized)?;

        let user = state
            .db
            .get_active_user(&user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        Ok(CurrentUser(user))
    }
}

/// Optional viewer extractor for read endpoints.
///
/// Anonymous requests resolve to `None` and see only public content.
/// A header that names an unknown or deactivated user is still an
/// error; a bad assertion is not the same as no assertion.
#[derive(Debug, Clone)]
pub struct MaybeViewer(pub Option<User>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeViewer
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(user_id) = extract_user_id(&parts.headers) else {
            return Ok(MaybeViewer(None));
        };

        let state = AppState::from_ref(state);
        let user = state
            .db
            .get_active_user(&user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        Ok(MaybeViewer(Some(user)))
    }
}

impl MaybeViewer {
    /// The viewer's ID, if any.
    pub fn id(&self) -> Option<&str> {
        self.0.as_ref().map(|user| user.id.as_str())
    }
}
