//! Account endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

use crate::AppState;
use crate::auth::{CurrentUser, MaybeViewer};
use crate::error::AppError;
use crate::metrics::{HTTP_REQUEST_DURATION_SECONDS, HTTP_REQUESTS_TOTAL};
use crate::service::{AccountService, FeedService};

use super::dto::{
    CreateAccountRequest, PaginationParams, PostResponse, UpdateProfileRequest, UserResponse,
};

/// POST /api/v1/accounts
pub async fn create_account(
    State(state): State<AppState>,
    Json(payload): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["POST", "/api/v1/accounts"])
        .start_timer();

    let service = AccountService::new(state.db.clone());
    let user = service
        .register(&payload.username, payload.display_name)
        .await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["POST", "/api/v1/accounts", "201"])
        .inc();
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// GET /api/v1/accounts/:id
pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/api/v1/accounts/:id"])
        .start_timer();

    let service = AccountService::new(state.db.clone());
    let user = service.get_profile(&id).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/api/v1/accounts/:id", "200"])
        .inc();
    Ok(Json(user.into()))
}

/// PATCH /api/v1/accounts/me
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["PATCH", "/api/v1/accounts/me"])
        .start_timer();

    let service = AccountService::new(state.db.clone());
    let updated = service
        .update_profile(
            &user.id,
            payload.display_name,
            payload.bio,
            payload.avatar_url,
        )
        .await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["PATCH", "/api/v1/accounts/me", "200"])
        .inc();
    Ok(Json(updated.into()))
}

/// DELETE /api/v1/accounts/me
pub async fn deactivate_account(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<StatusCode, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["DELETE", "/api/v1/accounts/me"])
        .start_timer();

    let service = AccountService::new(state.db.clone());
    service.deactivate(&user.id).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["DELETE", "/api/v1/accounts/me", "204"])
        .inc();
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/accounts/:id/posts
///
/// The author's posts as the viewer is allowed to see them; anonymous
/// viewers get only public posts.
pub async fn account_posts(
    State(state): State<AppState>,
    viewer: MaybeViewer,
    Path(id): Path<String>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Vec<PostResponse>>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/api/v1/accounts/:id/posts"])
        .start_timer();

    let service = FeedService::new(state.db.clone());
    let limit = params.limit.or(Some(state.config.limits.default_page_size));
    let posts = service
        .profile_posts(viewer.id(), &id, limit, params.max_id.as_deref())
        .await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/api/v1/accounts/:id/posts", "200"])
        .inc();
    Ok(Json(posts.into_iter().map(PostResponse::from).collect()))
}
