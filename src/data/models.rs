//! Data models
//!
//! Rust structs representing database rows, plus the typed state
//! machines behind the friendship and invitation ledgers.
//! All models use ULID for IDs and chrono for timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use crate::error::AppError;

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// ULIDs sort lexicographically in creation order, which the keyset
/// pagination in the data layer relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// Create from existing string
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// Order a pair of user IDs so the smaller one comes first.
///
/// Friendship rows store the pair normalized this way; every lookup
/// must go through the same ordering.
pub fn ordered_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b { (a, b) } else { (b, a) }
}

// =============================================================================
// User
// =============================================================================

/// A user profile.
///
/// Users are never hard-deleted; `is_deactivated` retires them while
/// keeping their rows referenceable from posts and edges.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub post_count: i64,
    pub follower_count: i64,
    pub following_count: i64,
    pub is_deactivated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Friendship ledger
// =============================================================================

/// The single friendship edge between two users.
///
/// `(user_lo, user_hi)` is the normalized unordered pair; `requester_id`
/// only matters while the edge is pending.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Friendship {
    pub id: String,
    pub user_lo: String,
    pub user_hi: String,
    pub requester_id: String,
    /// Status: pending, accepted, rejected
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

impl Friendship {
    /// Decode the row's status columns into the typed state.
    pub fn state(&self) -> Result<FriendshipState, AppError> {
        FriendshipState::from_columns(&self.status, &self.requester_id)
    }

    /// The other end of the edge, from `user`'s perspective.
    pub fn other_party(&self, user: &str) -> &str {
        if self.user_lo == user {
            &self.user_hi
        } else {
            &self.user_lo
        }
    }

    /// How the edge reads for `viewer`.
    pub fn standing_for(&self, viewer: &str) -> FriendshipStanding {
        match self.status.as_str() {
            "accepted" => FriendshipStanding::Friends,
            "pending" if self.requester_id == viewer => FriendshipStanding::PendingSent,
            "pending" => FriendshipStanding::PendingReceived,
            // A rejected edge reads as no relationship until someone re-sends.
            _ => FriendshipStanding::None,
        }
    }
}

/// Typed friendship edge state.
///
/// The allowed transitions are encoded in [`FriendshipState::on_request`]
/// and [`FriendshipState::on_response`]; everything else is a typed error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FriendshipState {
    /// A request is awaiting the other party's response.
    Pending { requester_id: String },
    Accepted,
    Rejected,
}

/// What a new request against an existing edge should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestTransition {
    /// The other side asked first; flip the edge to accepted.
    AutoAccept,
    /// The edge was rejected earlier; reuse the row as a fresh pending.
    Resend,
}

/// Accept or reject, shared by friendship requests and group invitations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseAction {
    Accept,
    Reject,
}

impl FriendshipState {
    /// Decode from the row's `status` + `requester_id` columns.
    pub fn from_columns(status: &str, requester_id: &str) -> Result<Self, AppError> {
        match status {
            "pending" => Ok(Self::Pending {
                requester_id: requester_id.to_string(),
            }),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(AppError::Internal(anyhow::anyhow!(
                "invalid friendship status in storage: {other}"
            ))),
        }
    }

    pub fn status_str(&self) -> &'static str {
        match self {
            Self::Pending { .. } => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    /// Transition for a new request from `from` landing on this edge.
    pub fn on_request(&self, from: &str) -> Result<RequestTransition, AppError> {
        match self {
            Self::Accepted => Err(AppError::AlreadyFriends),
            Self::Pending { requester_id } if requester_id == from => {
                Err(AppError::RequestAlreadySent)
            }
            Self::Pending { .. } => Ok(RequestTransition::AutoAccept),
            Self::Rejected => Ok(RequestTransition::Resend),
        }
    }

    /// Transition for an accept/reject response.
    ///
    /// Only a pending edge can be responded to; responding to anything
    /// else reports the request as already processed.
    pub fn on_response(&self, action: ResponseAction) -> Result<Self, AppError> {
        match self {
            Self::Pending { .. } => Ok(match action {
                ResponseAction::Accept => Self::Accepted,
                ResponseAction::Reject => Self::Rejected,
            }),
            _ => Err(AppError::AlreadyProcessed),
        }
    }
}

/// Friendship standing between a viewer and a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendshipStanding {
    None,
    PendingSent,
    PendingReceived,
    Friends,
}

impl FriendshipStanding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::PendingSent => "pending_sent",
            Self::PendingReceived => "pending_received",
            Self::Friends => "friends",
        }
    }
}

// =============================================================================
// Groups
// =============================================================================

/// An interest group.
///
/// Exactly one leader at any time, and the leader is always a member.
/// `is_disbanded` is terminal.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub tags: Json<Vec<String>>,
    pub portrait_url: Option<String>,
    pub leader_id: String,
    pub is_disbanded: bool,
    pub created_at: DateTime<Utc>,
}

/// Membership row, unique per (group, user).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GroupMember {
    pub group_id: String,
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
}

/// Group invitation, one row per (group, invitee).
///
/// A re-invite overwrites the row back to pending rather than creating
/// a duplicate, mirroring the friendship ledger's re-send pattern.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GroupInvitation {
    pub id: String,
    pub group_id: String,
    pub inviter_id: String,
    pub invitee_id: String,
    /// Status: pending, accepted, rejected
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Invitation status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(AppError::Internal(anyhow::anyhow!(
                "invalid invitation status in storage: {other}"
            ))),
        }
    }
}

// =============================================================================
// Posts
// =============================================================================

/// A post or repost.
///
/// `original_post_id` is the immediate repost parent (NULL for original
/// posts); `root_post_id` is the non-repost ancestor, denormalized so
/// lineage reads are O(1) instead of walking the chain.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub content: Option<String>,
    /// Image URLs; upload itself belongs to the external media store.
    pub images: Json<Vec<String>>,
    /// Visibility: public, friends, private
    pub visibility: String,
    pub original_post_id: Option<String>,
    pub root_post_id: Option<String>,
    pub depth: i64,
    pub repost_count: i64,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn is_repost(&self) -> bool {
        self.original_post_id.is_some()
    }
}

/// Post visibility scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Friends,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Friends => "friends",
            Self::Private => "private",
        }
    }

    /// Parse user-supplied visibility, rejecting anything unknown.
    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "friends" => Ok(Self::Friends),
            "private" => Ok(Self::Private),
            _ => Err(AppError::Validation(
                "visibility must be one of: public, friends, private".to_string(),
            )),
        }
    }
}

// =============================================================================
// Messaging
// =============================================================================

/// Direct message between two users.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DirectMessage {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Message posted to a group.
///
/// Deleted wholesale when the group is disbanded.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GroupMessage {
    pub id: String,
    pub group_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_pair_is_symmetric() {
        assert_eq!(ordered_pair("a", "b"), ("a", "b"));
        assert_eq!(ordered_pair("b", "a"), ("a", "b"));
        assert_eq!(ordered_pair("x", "x"), ("x", "x"));
    }

    #[test]
    fn request_on_accepted_edge_is_already_friends() {
        let state = FriendshipState::Accepted;
        assert!(matches!(
            state.on_request("alice"),
            Err(AppError::AlreadyFriends)
        ));
    }

    #[test]
    fn duplicate_request_from_same_requester_is_rejected() {
        let state = FriendshipState::Pending {
            requester_id: "alice".to_string(),
        };
        assert!(matches!(
            state.on_request("alice"),
            Err(AppError::RequestAlreadySent)
        ));
    }

    #[test]
    fn counter_request_auto_accepts() {
        let state = FriendshipState::Pending {
            requester_id: "alice".to_string(),
        };
        assert_eq!(
            state.on_request("bob").unwrap(),
            RequestTransition::AutoAccept
        );
    }

    #[test]
    fn request_on_rejected_edge_resends() {
        assert_eq!(
            FriendshipState::Rejected.on_request("bob").unwrap(),
            RequestTransition::Resend
        );
    }

    #[test]
    fn response_requires_pending_state() {
        let pending = FriendshipState::Pending {
            requester_id: "alice".to_string(),
        };
        assert_eq!(
            pending.on_response(ResponseAction::Accept).unwrap(),
            FriendshipState::Accepted
        );
        assert_eq!(
            pending.on_response(ResponseAction::Reject).unwrap(),
            FriendshipState::Rejected
        );

        assert!(matches!(
            FriendshipState::Accepted.on_response(ResponseAction::Reject),
            Err(AppError::AlreadyProcessed)
        ));
        assert!(matches!(
            FriendshipState::Rejected.on_response(ResponseAction::Accept),
            Err(AppError::AlreadyProcessed)
        ));
    }

    #[test]
    fn standing_reflects_direction_while_pending() {
        let edge = Friendship {
            id: "01".to_string(),
            user_lo: "alice".to_string(),
            user_hi: "bob".to_string(),
            requester_id: "bob".to_string(),
            status: "pending".to_string(),
            created_at: chrono::Utc::now(),
            accepted_at: None,
        };
        assert_eq!(edge.standing_for("bob"), FriendshipStanding::PendingSent);
        assert_eq!(
            edge.standing_for("alice"),
            FriendshipStanding::PendingReceived
        );
    }

    #[test]
    fn visibility_parse_normalizes_case() {
        assert_eq!(Visibility::parse(" Public ").unwrap(), Visibility::Public);
        assert!(Visibility::parse("followers").is_err());
    }
}
