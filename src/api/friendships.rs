//! Friendship endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use crate::AppState;
use crate::auth::CurrentUser;
use crate::data::ResponseAction;
use crate::error::AppError;
use crate::metrics::{HTTP_REQUEST_DURATION_SECONDS, HTTP_REQUESTS_TOTAL};
use crate::service::FriendshipService;

use super::dto::{FriendshipResponse, FriendshipStatusResponse, UserResponse};

/// POST /api/v1/friendships/:user_id
///
/// Sends a friend request. When the other side had already asked, the
/// edge comes back `accepted` (auto-accept); otherwise `pending`.
pub async fn request_friendship(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(user_id): Path<String>,
) -> Result<Json<FriendshipResponse>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["POST", "/api/v1/friendships/:user_id"])
        .start_timer();

    let service = FriendshipService::new(state.db.clone());
    let outcome = service.request(&user.id, &user_id).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["POST", "/api/v1/friendships/:user_id", "200"])
        .inc();
    Ok(Json(outcome.edge().clone().into()))
}

/// GET /api/v1/friendships/:user_id
pub async fn friendship_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(user_id): Path<String>,
) -> Result<Json<FriendshipStatusResponse>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/api/v1/friendships/:user_id"])
        .start_timer();

    let service = FriendshipService::new(state.db.clone());
    let standing = service.status(&user.id, &user_id).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/api/v1/friendships/:user_id", "200"])
        .inc();
    Ok(Json(FriendshipStatusResponse {
        status: standing.as_str().to_string(),
    }))
}

/// DELETE /api/v1/friendships/:user_id
///
/// Removes the friendship outright; no history survives.
pub async fn remove_friendship(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["DELETE", "/api/v1/friendships/:user_id"])
        .start_timer();

    let service = FriendshipService::new(state.db.clone());
    service.remove(&user.id, &user_id).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["DELETE", "/api/v1/friendships/:user_id", "204"])
        .inc();
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/friendships
pub async fn list_friends(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/api/v1/friendships"])
        .start_timer();

    let service = FriendshipService::new(state.db.clone());
    let friends = service.friends(&user.id).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/api/v1/friendships", "200"])
        .inc();
    Ok(Json(friends.into_iter().map(UserResponse::from).collect()))
}

/// GET /api/v1/friendship_requests
///
/// Requests awaiting the caller's response.
pub async fn list_friendship_requests(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<FriendshipResponse>>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/api/v1/friendship_requests"])
        .start_timer();

    let service = FriendshipService::new(state.db.clone());
    let requests = service.pending_received(&user.id).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/api/v1/friendship_requests", "200"])
        .inc();
    Ok(Json(
        requests.into_iter().map(FriendshipResponse::from).collect(),
    ))
}

/// POST /api/v1/friendship_requests/:id/accept
pub async fn accept_friendship_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<FriendshipResponse>, AppError> {
    respond(state, user.id, id, ResponseAction::Accept).await
}

/// POST /api/v1/friendship_requests/:id/reject
pub async fn reject_friendship_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<FriendshipResponse>, AppError> {
    respond(state, user.id, id, ResponseAction::Reject).await
}

async fn respond(
    state: AppState,
    responder: String,
    request_id: String,
    action: ResponseAction,
) -> Result<Json<FriendshipResponse>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["POST", "/api/v1/friendship_requests/:id/respond"])
        .start_timer();

    let service = FriendshipService::new(state.db.clone());
    let edge = service.respond(&request_id, &responder, action).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["POST", "/api/v1/friendship_requests/:id/respond", "200"])
        .inc();
    Ok(Json(edge.into()))
}
