//! API layer
//!
//! HTTP handlers, one module per resource:
//! - accounts: registration and profiles
//! - friendships: the relationship ledger
//! - groups: roster, invitations, leadership
//! - posts / timelines: the content store
//! - messages: direct and group messaging
//!
//! Plus the Prometheus `/metrics` endpoint.

mod accounts;
mod dto;
mod friendships;
mod groups;
mod messages;
mod posts;
mod timelines;

pub use dto::*;

use axum::{
    Router,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use prometheus::{Encoder, TextEncoder};

use crate::AppState;
use crate::metrics::REGISTRY;

/// Create the versioned API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        // Accounts
        .route("/v1/accounts", post(accounts::create_account))
        .route(
            "/v1/accounts/me",
            patch(accounts::update_profile).delete(accounts::deactivate_account),
        )
        .route("/v1/accounts/:id", get(accounts::get_account))
        .route("/v1/accounts/:id/posts", get(accounts::account_posts))
        // Friendships
        .route("/v1/friendships", get(friendships::list_friends))
        .route(
            "/v1/friendships/:user_id",
            post(friendships::request_friendship)
                .get(friendships::friendship_status)
                .delete(friendships::remove_friendship),
        )
        .route(
            "/v1/friendship_requests",
            get(friendships::list_friendship_requests),
        )
        .route(
            "/v1/friendship_requests/:id/accept",
            post(friendships::accept_friendship_request),
        )
        .route(
            "/v1/friendship_requests/:id/reject",
            post(friendships::reject_friendship_request),
        )
        // Groups
        .route("/v1/groups", post(groups::create_group))
        .route(
            "/v1/groups/:id",
            get(groups::get_group).patch(groups::update_group),
        )
        .route("/v1/groups/:id/members", get(groups::list_members))
        .route("/v1/groups/:id/join", post(groups::join_group))
        .route("/v1/groups/:id/leave", post(groups::leave_group))
        .route("/v1/groups/:id/invitations", post(groups::invite_member))
        .route("/v1/groups/:id/kick", post(groups::kick_members))
        .route("/v1/groups/:id/transfer", post(groups::transfer_leadership))
        .route("/v1/groups/:id/disband", post(groups::disband_group))
        .route(
            "/v1/groups/:id/messages",
            post(messages::send_group_message).get(messages::group_messages),
        )
        // Invitations
        .route("/v1/invitations", get(groups::list_invitations))
        .route("/v1/invitations/:id/accept", post(groups::accept_invitation))
        .route("/v1/invitations/:id/reject", post(groups::reject_invitation))
        // Posts and timelines
        .route("/v1/posts", post(posts::create_post))
        .route(
            "/v1/posts/:id",
            get(posts::get_post).delete(posts::delete_post),
        )
        .route("/v1/posts/:id/repost", post(posts::repost))
        .route("/v1/timelines/feed", get(timelines::feed))
        // Direct messages
        .route("/v1/messages", post(messages::send_direct_message))
        .route("/v1/messages/:user_id", get(messages::conversation))
}

/// Metrics endpoint handler
///
/// Returns all metrics in Prometheus text format.
async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    match encoder.encode_to_string(&metric_families) {
        Ok(metrics_text) => (
            axum::http::StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, encoder.format_type())],
            metrics_text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics",
            )
                .into_response()
        }
    }
}

/// Create metrics router
///
/// Exposes the `/metrics` endpoint.
pub fn metrics_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/metrics", get(metrics_handler))
}
