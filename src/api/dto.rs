//! API request and response DTOs
//!
//! Data Transfer Objects for the JSON API. Row models never cross the
//! HTTP boundary directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{DirectMessage, Friendship, Group, GroupInvitation, GroupMessage, Post, User};

// =============================================================================
// Responses
// =============================================================================

/// User profile response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
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
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            bio: user.bio,
            avatar_url: user.avatar_url,
            post_count: user.post_count,
            follower_count: user.follower_count,
            following_count: user.following_count,
            is_deactivated: user.is_deactivated,
            created_at: user.created_at,
        }
    }
}

/// Friendship edge response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendshipResponse {
    pub id: String,
    pub requester_id: String,
    pub recipient_id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

impl From<Friendship> for FriendshipResponse {
    fn from(edge: Friendship) -> Self {
        let recipient_id = edge.other_party(&edge.requester_id).to_string();
        Self {
            id: edge.id,
            requester_id: edge.requester_id,
            recipient_id,
            status: edge.status,
            created_at: edge.created_at,
            accepted_at: edge.accepted_at,
        }
    }
}

/// Friendship standing relative to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendshipStatusResponse {
    pub status: String,
}

/// Group response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub portrait_url: Option<String>,
    pub leader_id: String,
    pub is_disbanded: bool,
    pub member_count: i64,
    pub created_at: DateTime<Utc>,
}

impl GroupResponse {
    pub fn from_group(group: Group, member_count: i64) -> Self {
        Self {
            id: group.id,
            name: group.name,
            description: group.description,
            tags: group.tags.0,
            portrait_url: group.portrait_url,
            leader_id: group.leader_id,
            is_disbanded: group.is_disbanded,
            member_count,
            created_at: group.created_at,
        }
    }
}

/// Group invitation response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationResponse {
    pub id: String,
    pub group_id: String,
    pub inviter_id: String,
    pub invitee_id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<GroupInvitation> for InvitationResponse {
    fn from(invitation: GroupInvitation) -> Self {
        Self {
            id: invitation.id,
            group_id: invitation.group_id,
            inviter_id: invitation.inviter_id,
            invitee_id: invitation.invitee_id,
            status: invitation.status,
            created_at: invitation.created_at,
        }
    }
}

/// Kick outcome: how many members were actually removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KickResponse {
    pub removed: u64,
}

/// Post response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: String,
    pub author_id: String,
    pub content: Option<String>,
    pub images: Vec<String>,
    pub visibility: String,
    pub original_post_id: Option<String>,
    pub root_post_id: Option<String>,
    pub depth: i64,
    pub repost_count: i64,
    pub created_at: DateTime<Utc>,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            author_id: post.author_id,
            content: post.content,
            images: post.images.0,
            visibility: post.visibility,
            original_post_id: post.original_post_id,
            root_post_id: post.root_post_id,
            depth: post.depth,
            repost_count: post.repost_count,
            created_at: post.created_at,
        }
    }
}

/// Direct message response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectMessageResponse {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<DirectMessage> for DirectMessageResponse {
    fn from(message: DirectMessage) -> Self {
        Self {
            id: message.id,
            sender_id: message.sender_id,
            recipient_id: message.recipient_id,
            content: message.content,
            created_at: message.created_at,
        }
    }
}

/// Group message response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMessageResponse {
    pub id: String,
    pub group_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<GroupMessage> for GroupMessageResponse {
    fn from(message: GroupMessage) -> Self {
        Self {
            id: message.id,
            group_id: message.group_id,
            sender_id: message.sender_id,
            content: message.content,
            created_at: message.created_at,
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub username: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateGroupRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub portrait_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub invitee_id: String,
}

#[derive(Debug, Deserialize)]
pub struct KickRequest {
    pub user_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferLeadershipRequest {
    pub new_leader_id: String,
}

fn default_visibility() -> String {
    "public".to_string()
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub content: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default = "default_visibility")]
    pub visibility: String,
}

#[derive(Debug, Deserialize)]
pub struct RepostRequest {
    pub content: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default = "default_visibility")]
    pub visibility: String,
}

#[derive(Debug, Deserialize)]
pub struct SendDirectMessageRequest {
    pub recipient_id: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct SendGroupMessageRequest {
    pub content: String,
}

/// Keyset pagination query parameters
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    /// Maximum results per page
    pub limit: Option<i64>,
    /// Return items with IDs strictly below this cursor
    pub max_id: Option<String>,
}
