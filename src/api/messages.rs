//! Messaging endpoints
//!
//! Group message writes pass the membership gate before anything is
//! persisted; disbanded groups admit nothing.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::metrics::{HTTP_REQUEST_DURATION_SECONDS, HTTP_REQUESTS_TOTAL};
use crate::service::MessagingService;

use super::dto::{
    DirectMessageResponse, GroupMessageResponse, PaginationParams, SendDirectMessageRequest,
    SendGroupMessageRequest,
};

/// POST /api/v1/messages
pub async fn send_direct_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<SendDirectMessageRequest>,
) -> Result<(StatusCode, Json<DirectMessageResponse>), AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["POST", "/api/v1/messages"])
        .start_timer();

    let service = MessagingService::new(state.db.clone());
    let message = service
        .send_direct(&user.id, &payload.recipient_id, payload.content)
        .await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["POST", "/api/v1/messages", "201"])
        .inc();
    Ok((StatusCode::CREATED, Json(message.into())))
}

/// GET /api/v1/messages/:user_id
///
/// The caller's conversation with another user, newest first.
pub async fn conversation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(user_id): Path<String>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Vec<DirectMessageResponse>>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/api/v1/messages/:user_id"])
        .start_timer();

    let service = MessagingService::new(state.db.clone());
    let limit = params.limit.or(Some(state.config.limits.default_page_size));
    let messages = service
        .conversation(&user.id, &user_id, limit, params.max_id.as_deref())
        .await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/api/v1/messages/:user_id", "200"])
        .inc();
    Ok(Json(
        messages
            .into_iter()
            .map(DirectMessageResponse::from)
            .collect(),
    ))
}

/// POST /api/v1/groups/:id/messages
pub async fn send_group_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<SendGroupMessageRequest>,
) -> Result<(StatusCode, Json<GroupMessageResponse>), AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["POST", "/api/v1/groups/:id/messages"])
        .start_timer();

    let service = MessagingService::new(state.db.clone());
    let message = service
        .send_group_message(&id, &user.id, payload.content)
        .await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["POST", "/api/v1/groups/:id/messages", "201"])
        .inc();
    Ok((StatusCode::CREATED, Json(message.into())))
}

/// GET /api/v1/groups/:id/messages
pub async fn group_messages(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Vec<GroupMessageResponse>>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/api/v1/groups/:id/messages"])
        .start_timer();

    let service = MessagingService::new(state.db.clone());
    let limit = params.limit.or(Some(state.config.limits.default_page_size));
    let messages = service
        .group_messages(&id, &user.id, limit, params.max_id.as_deref())
        .await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/api/v1/groups/:id/messages", "200"])
        .inc();
    Ok(Json(
        messages
            .into_iter()
            .map(GroupMessageResponse::from)
            .collect(),
    ))
}
