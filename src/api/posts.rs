//! Post endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use crate::AppState;
use crate::auth::{CurrentUser, MaybeViewer};
use crate::error::AppError;
use crate::metrics::{HTTP_REQUEST_DURATION_SECONDS, HTTP_REQUESTS_TOTAL};
use crate::service::{FeedService, PostService};

use super::dto::{CreatePostRequest, PostResponse, RepostRequest};

/// POST /api/v1/posts
pub async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostResponse>), AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["POST", "/api/v1/posts"])
        .start_timer();

    let service = PostService::new(state.db.clone());
    let post = service
        .create(
            &user.id,
            payload.content,
            payload.images,
            &payload.visibility,
        )
        .await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["POST", "/api/v1/posts", "201"])
        .inc();
    Ok((StatusCode::CREATED, Json(post.into())))
}

/// GET /api/v1/posts/:id
///
/// Applies the visibility predicate; hidden posts read as 404.
pub async fn get_post(
    State(state): State<AppState>,
    viewer: MaybeViewer,
    Path(id): Path<String>,
) -> Result<Json<PostResponse>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/api/v1/posts/:id"])
        .start_timer();

    let service = FeedService::new(state.db.clone());
    let post = service.get_post(viewer.id(), &id).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/api/v1/posts/:id", "200"])
        .inc();
    Ok(Json(post.into()))
}

/// DELETE /api/v1/posts/:id
///
/// Soft delete; the row survives as a repost-lineage ancestor.
pub async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["DELETE", "/api/v1/posts/:id"])
        .start_timer();

    let service = PostService::new(state.db.clone());
    service.delete(&id, &user.id).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["DELETE", "/api/v1/posts/:id", "204"])
        .inc();
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/posts/:id/repost
pub async fn repost(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<RepostRequest>,
) -> Result<(StatusCode, Json<PostResponse>), AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["POST", "/api/v1/posts/:id/repost"])
        .start_timer();

    let service = PostService::new(state.db.clone());
    let post = service
        .repost(
            &id,
            &user.id,
            payload.content,
            payload.images,
            &payload.visibility,
        )
        .await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["POST", "/api/v1/posts/:id/repost", "201"])
        .inc();
    Ok((StatusCode::CREATED, Json(post.into())))
}
