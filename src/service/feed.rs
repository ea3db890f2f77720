//! Feed service
//!
//! Resolves what a viewer may see: the visibility predicate for single
//! posts, the feed, and profile timelines. Visibility is evaluated per
//! post at read time against the current friendship ledger; it is never
//! cached or denormalized, so revoking a friendship immediately hides
//! previously visible friends-scoped posts.

use std::sync::Arc;

use crate::data::{Database, FriendshipStanding, Post, Visibility};
use crate::error::AppError;
use crate::service::FriendshipService;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 40;

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

/// Feed service
pub struct FeedService {
    db: Arc<Database>,
    /// The one cross-component read dependency: friends-scoped
    /// visibility delegates to the relationship ledger's status query.
    friendships: FriendshipService,
}

impl FeedService {
    /// Create new feed service
    pub fn new(db: Arc<Database>) -> Self {
        let friendships = FriendshipService::new(db.clone());
        Self { db, friendships }
    }

    /// Whether `viewer` may see `post`.
    ///
    /// Author and public posts are always visible; friends-scoped posts
    /// require a current accepted edge; everything else (including all
    /// private posts for non-authors, and any anonymous read of
    /// non-public posts) is hidden.
    pub async fn can_see(&self, viewer: Option<&str>, post: &Post) -> Result<bool, AppError> {
        if post.is_deleted {
            return Ok(false);
        }
        if viewer == Some(post.author_id.as_str()) {
            return Ok(true);
        }
        match Visibility::parse(&post.visibility)? {
            Visibility::Public => Ok(true),
            Visibility::Friends => match viewer {
                Some(viewer) => {
                    let standing = self.friendships.status(viewer, &post.author_id).await?;
                    Ok(standing == FriendshipStanding::Friends)
                }
                None => Ok(false),
            },
            Visibility::Private => Ok(false),
        }
    }

    /// Fetch one post under the visibility predicate.
    ///
    /// A hidden post reads as not-found rather than forbidden, so
    /// private posts do not leak their existence.
    pub async fn get_post(&self, viewer: Option<&str>, post_id: &str) -> Result<Post, AppError> {
        let post = self
            .db
            .get_post(post_id)
            .await?
            .ok_or(AppError::NotFound("post"))?;

        if !self.can_see(viewer, &post).await? {
            return Err(AppError::NotFound("post"));
        }
        Ok(post)
    }

    /// The feed: every non-deleted post the viewer may see, newest
    /// first, keyset-paginated by post ID.
    pub async fn feed(
        &self,
        viewer: Option<&str>,
        limit: Option<i64>,
        before_id: Option<&str>,
    ) -> Result<Vec<Post>, AppError> {
        self.db
            .list_feed_posts(viewer, clamp_limit(limit), before_id)
            .await
    }

    /// One author's posts under the same predicate.
    pub async fn profile_posts(
        &self,
        viewer: Option<&str>,
        author_id: &str,
        limit: Option<i64>,
        before_id: Option<&str>,
    ) -> Result<Vec<Post>, AppError> {
        self.db
            .get_user(author_id)
            .await?
            .ok_or(AppError::NotFound("user"))?;

        self.db
            .list_author_posts(viewer, author_id, clamp_limit(limit), before_id)
            .await
    }
}
