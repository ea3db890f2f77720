//! Group endpoints

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
use crate::service::GroupService;

use super::dto::{
    CreateGroupRequest, GroupResponse, InvitationResponse, InviteRequest, KickRequest,
    KickResponse, TransferLeadershipRequest, UpdateGroupRequest, UserResponse,
};

/// POST /api/v1/groups
pub async fn create_group(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<GroupResponse>), AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["POST", "/api/v1/groups"])
        .start_timer();

    let service = GroupService::new(state.db.clone());
    let group = service
        .create(&user.id, payload.name, payload.description, payload.tags)
        .await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["POST", "/api/v1/groups", "201"])
        .inc();
    Ok((StatusCode::CREATED, Json(GroupResponse::from_group(group, 1))))
}

/// GET /api/v1/groups/:id
pub async fn get_group(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<GroupResponse>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/api/v1/groups/:id"])
        .start_timer();

    let service = GroupService::new(state.db.clone());
    let group = service.get(&id).await?;
    let member_count = service.member_count(&id).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/api/v1/groups/:id", "200"])
        .inc();
    Ok(Json(GroupResponse::from_group(group, member_count)))
}

/// PATCH /api/v1/groups/:id
///
/// Leader-only rename / description / tags / portrait update.
pub async fn update_group(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateGroupRequest>,
) -> Result<Json<GroupResponse>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["PATCH", "/api/v1/groups/:id"])
        .start_timer();

    let service = GroupService::new(state.db.clone());
    let group = service
        .update_profile(
            &id,
            &user.id,
            payload.name,
            payload.description,
            payload.tags,
            payload.portrait_url,
        )
        .await?;
    let member_count = service.member_count(&id).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["PATCH", "/api/v1/groups/:id", "200"])
        .inc();
    Ok(Json(GroupResponse::from_group(group, member_count)))
}

/// GET /api/v1/groups/:id/members
pub async fn list_members(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/api/v1/groups/:id/members"])
        .start_timer();

    let service = GroupService::new(state.db.clone());
    let members = service.members(&id).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/api/v1/groups/:id/members", "200"])
        .inc();
    Ok(Json(members.into_iter().map(UserResponse::from).collect()))
}

/// POST /api/v1/groups/:id/join
pub async fn join_group(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["POST", "/api/v1/groups/:id/join"])
        .start_timer();

    let service = GroupService::new(state.db.clone());
    service.join(&id, &user.id).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["POST", "/api/v1/groups/:id/join", "204"])
        .inc();
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/groups/:id/leave
pub async fn leave_group(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["POST", "/api/v1/groups/:id/leave"])
        .start_timer();

    let service = GroupService::new(state.db.clone());
    service.leave(&id, &user.id).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["POST", "/api/v1/groups/:id/leave", "204"])
        .inc();
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/groups/:id/invitations
pub async fn invite_member(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<InviteRequest>,
) -> Result<(StatusCode, Json<InvitationResponse>), AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["POST", "/api/v1/groups/:id/invitations"])
        .start_timer();

    let service = GroupService::new(state.db.clone());
    let invitation = service.invite(&id, &user.id, &payload.invitee_id).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["POST", "/api/v1/groups/:id/invitations", "201"])
        .inc();
    Ok((StatusCode::CREATED, Json(invitation.into())))
}

/// GET /api/v1/invitations
///
/// Pending invitations addressed to the caller.
pub async fn list_invitations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<InvitationResponse>>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/api/v1/invitations"])
        .start_timer();

    let service = GroupService::new(state.db.clone());
    let invitations = service.pending_invitations(&user.id).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/api/v1/invitations", "200"])
        .inc();
    Ok(Json(
        invitations
            .into_iter()
            .map(InvitationResponse::from)
            .collect(),
    ))
}

/// POST /api/v1/invitations/:id/accept
pub async fn accept_invitation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<InvitationResponse>, AppError> {
    respond(state, user.id, id, ResponseAction::Accept).await
}

/// POST /api/v1/invitations/:id/reject
pub async fn reject_invitation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<InvitationResponse>, AppError> {
    respond(state, user.id, id, ResponseAction::Reject).await
}

async fn respond(
    state: AppState,
    responder: String,
    invitation_id: String,
    action: ResponseAction,
) -> Result<Json<InvitationResponse>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["POST", "/api/v1/invitations/:id/respond"])
        .start_timer();

    let service = GroupService::new(state.db.clone());
    let invitation = service
        .respond_to_invitation(&invitation_id, &responder, action)
        .await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["POST", "/api/v1/invitations/:id/respond", "200"])
        .inc();
    Ok(Json(invitation.into()))
}

/// POST /api/v1/groups/:id/kick
///
/// Leader-only batch removal; responds with the count actually removed.
pub async fn kick_members(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<KickRequest>,
) -> Result<Json<KickResponse>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["POST", "/api/v1/groups/:id/kick"])
        .start_timer();

    let service = GroupService::new(state.db.clone());
    let removed = service.kick_members(&id, &user.id, &payload.user_ids).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["POST", "/api/v1/groups/:id/kick", "200"])
        .inc();
    Ok(Json(KickResponse { removed }))
}

/// POST /api/v1/groups/:id/transfer
pub async fn transfer_leadership(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<TransferLeadershipRequest>,
) -> Result<StatusCode, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["POST", "/api/v1/groups/:id/transfer"])
        .start_timer();

    let service = GroupService::new(state.db.clone());
    service
        .transfer_leadership(&id, &user.id, &payload.new_leader_id)
        .await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["POST", "/api/v1/groups/:id/transfer", "204"])
        .inc();
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/groups/:id/disband
pub async fn disband_group(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["POST", "/api/v1/groups/:id/disband"])
        .start_timer();

    let service = GroupService::new(state.db.clone());
    service.disband(&id, &user.id).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["POST", "/api/v1/groups/:id/disband", "204"])
        .inc();
    Ok(StatusCode::NO_CONTENT)
}
