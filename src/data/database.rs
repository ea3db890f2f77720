//! SQLite database operations
//!
//! All database access goes through this module.
//! Queries are runtime-checked sqlx calls; the schema lives in
//! `migrations/` and is applied at connect time.
//!
//! Multi-row invariants are enforced here structurally: the friendship
//! pair UNIQUE constraint, conflict-skipping membership inserts, and the
//! transactional disband cascade.

use std::path::Path;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::models::*;
use crate::error::AppError;
use crate::metrics::DB_QUERIES_TOTAL;

/// Database connection pool wrapper.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if necessary) the SQLite database at `path`
    /// and run pending migrations.
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            tracing::error!("Migration failed: {}", e);
            AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
        })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert a new user.
    ///
    /// # Returns
    /// `false` when the username is already taken.
    pub async fn insert_user(&self, user: &User) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO users (
                id, username, display_name, bio, avatar_url,
                post_count, follower_count, following_count,
                is_deactivated, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.display_name)
        .bind(&user.bio)
        .bind(&user.avatar_url)
        .bind(user.post_count)
        .bind(user.follower_count)
        .bind(user.following_count)
        .bind(user.is_deactivated)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Get a user by ID
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Get a user by ID, excluding deactivated accounts.
    pub async fn get_active_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let user =
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ? AND is_deactivated = 0")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(user)
    }

    /// Patch profile fields; absent fields are left unchanged.
    ///
    /// # Returns
    /// `true` if a row was updated.
    pub async fn update_user_profile(
        &self,
        id: &str,
        display_name: Option<&str>,
        bio: Option<&str>,
        avatar_url: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET display_name = COALESCE(?, display_name),
                bio = COALESCE(?, bio),
                avatar_url = COALESCE(?, avatar_url),
                updated_at = ?
            WHERE id = ? AND is_deactivated = 0
            "#,
        )
        .bind(display_name)
        .bind(bio)
        .bind(avatar_url)
        .bind(updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Deactivate a user. Users are never hard-deleted.
    pub async fn deactivate_user(
        &self,
        id: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE users SET is_deactivated = 1, updated_at = ? WHERE id = ? AND is_deactivated = 0",
        )
        .bind(updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // Friendship ledger
    // =========================================================================

    /// Get the single edge between two users, if any.
    pub async fn get_friendship_between(
        &self,
        a: &str,
        b: &str,
    ) -> Result<Option<Friendship>, AppError> {
        DB_QUERIES_TOTAL
            .with_label_values(&["SELECT", "friendships"])
            .inc();
        let (lo, hi) = ordered_pair(a, b);
        let edge = sqlx::query_as::<_, Friendship>(
            "SELECT * FROM friendships WHERE user_lo = ? AND user_hi = ?",
        )
        .bind(lo)
        .bind(hi)
        .fetch_optional(&self.pool)
        .await?;

        Ok(edge)
    }

    /// Get a friendship edge by row ID
    pub async fn get_friendship(&self, id: &str) -> Result<Option<Friendship>, AppError> {
        let edge = sqlx::query_as::<_, Friendship>("SELECT * FROM friendships WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(edge)
    }

    /// Insert a fresh pending edge for the pair.
    ///
    /// The pair UNIQUE constraint backstops concurrent inserts: the loser
    /// sees `false` and must re-read the edge.
    pub async fn insert_pending_friendship(
        &self,
        id: &str,
        a: &str,
        b: &str,
        requester_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let (lo, hi) = ordered_pair(a, b);
        let result = sqlx::query(
            r#"
            INSERT INTO friendships (id, user_lo, user_hi, requester_id, status, created_at)
            VALUES (?, ?, ?, ?, 'pending', ?)
            ON CONFLICT (user_lo, user_hi) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(lo)
        .bind(hi)
        .bind(requester_id)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Flip a pending edge to accepted.
    ///
    /// The status guard makes this a compare-and-set, so two overlapping
    /// responses (or an auto-accept racing a response) resolve to exactly
    /// one winner.
    pub async fn accept_friendship_if_pending(
        &self,
        id: &str,
        accepted_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE friendships SET status = 'accepted', accepted_at = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(accepted_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Flip a pending edge to rejected.
    pub async fn reject_friendship_if_pending(&self, id: &str) -> Result<bool, AppError> {
        let result =
            sqlx::query("UPDATE friendships SET status = 'rejected' WHERE id = ? AND status = 'pending'")
                .bind(id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Reuse a rejected edge as a fresh pending request from `requester_id`.
    ///
    /// Updates the same row rather than inserting, preserving the
    /// one-edge-per-pair invariant.
    pub async fn resend_friendship_if_rejected(
        &self,
        id: &str,
        requester_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE friendships
            SET status = 'pending', requester_id = ?, created_at = ?, accepted_at = NULL
            WHERE id = ? AND status = 'rejected'
            "#,
        )
        .bind(requester_id)
        .bind(created_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Delete the edge between two users outright, regardless of status.
    pub async fn delete_friendship_between(&self, a: &str, b: &str) -> Result<bool, AppError> {
        let (lo, hi) = ordered_pair(a, b);
        let result = sqlx::query("DELETE FROM friendships WHERE user_lo = ? AND user_hi = ?")
            .bind(lo)
            .bind(hi)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// List a user's friends (accepted edges), joined to their profiles.
    pub async fn list_friends(&self, user_id: &str) -> Result<Vec<User>, AppError> {
        let friends = sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            JOIN friendships f
              ON (f.user_lo = ? AND f.user_hi = u.id)
              OR (f.user_hi = ? AND f.user_lo = u.id)
            WHERE f.status = 'accepted'
            ORDER BY u.username
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(friends)
    }

    /// List pending requests awaiting this user's response.
    pub async fn list_pending_received(&self, user_id: &str) -> Result<Vec<Friendship>, AppError> {
        let edges = sqlx::query_as::<_, Friendship>(
            r#"
            SELECT * FROM friendships
            WHERE status = 'pending'
              AND requester_id != ?
              AND (user_lo = ? OR user_hi = ?)
            ORDER BY id DESC
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(edges)
    }

    // =========================================================================
    // Groups
    // =========================================================================

    /// Insert a group and its founder's membership atomically.
    ///
    /// The founder is the first leader; the single-leader invariant holds
    /// from the first observable state.
    pub async fn insert_group_with_founder(&self, group: &Group) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO groups (
                id, name, description, tags, portrait_url,
                leader_id, is_disbanded, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(&group.id)
        .bind(&group.name)
        .bind(&group.description)
        .bind(&group.tags)
        .bind(&group.portrait_url)
        .bind(&group.leader_id)
        .bind(group.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO group_members (group_id, user_id, joined_at) VALUES (?, ?, ?)")
            .bind(&group.id)
            .bind(&group.leader_id)
            .bind(group.created_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Get a group by ID
    pub async fn get_group(&self, id: &str) -> Result<Option<Group>, AppError> {
        let group = sqlx::query_as::<_, Group>("SELECT * FROM groups WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(group)
    }

    /// Patch group profile fields; absent fields are left unchanged.
    pub async fn update_group_profile(
        &self,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
        tags: Option<&str>,
        portrait_url: Option<&str>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE groups
            SET name = COALESCE(?, name),
                description = COALESCE(?, description),
                tags = COALESCE(?, tags),
                portrait_url = COALESCE(?, portrait_url)
            WHERE id = ? AND is_disbanded = 0
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(tags)
        .bind(portrait_url)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Hand leadership to another member. Updates `leader_id` only.
    pub async fn set_group_leader(&self, id: &str, leader_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE groups SET leader_id = ? WHERE id = ? AND is_disbanded = 0")
            .bind(leader_id)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Check active membership; the predicate the messaging gate calls.
    pub async fn is_group_member(&self, group_id: &str, user_id: &str) -> Result<bool, AppError> {
        let row =
            sqlx::query("SELECT 1 FROM group_members WHERE group_id = ? AND user_id = ? LIMIT 1")
                .bind(group_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.is_some())
    }

    /// Insert a membership row unless one already exists.
    ///
    /// # Returns
    /// `false` when the user was already a member.
    pub async fn insert_group_member_if_absent(
        &self,
        group_id: &str,
        user_id: &str,
        joined_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO group_members (group_id, user_id, joined_at)
            VALUES (?, ?, ?)
            ON CONFLICT (group_id, user_id) DO NOTHING
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .bind(joined_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Remove a single member.
    pub async fn delete_group_member(&self, group_id: &str, user_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM group_members WHERE group_id = ? AND user_id = ?")
            .bind(group_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Remove a batch of members in one statement.
    ///
    /// # Returns
    /// The number of rows actually removed, which may be less than
    /// requested if some targets were not members.
    pub async fn delete_group_members(
        &self,
        group_id: &str,
        user_ids: &[String],
    ) -> Result<u64, AppError> {
        if user_ids.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM group_members WHERE group_id = ");
        builder.push_bind(group_id);
        builder.push(" AND user_id IN (");
        let mut separated = builder.separated(", ");
        for user_id in user_ids {
            separated.push_bind(user_id);
        }
        builder.push(")");

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// List group members joined to their profiles, leader first.
    pub async fn list_group_members(&self, group_id: &str) -> Result<Vec<User>, AppError> {
        let members = sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            JOIN group_members m ON m.user_id = u.id
            JOIN groups g ON g.id = m.group_id
            WHERE m.group_id = ?
            ORDER BY (u.id = g.leader_id) DESC, m.joined_at
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }

    /// Count current members
    pub async fn count_group_members(&self, group_id: &str) -> Result<i64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM group_members WHERE group_id = ?")
                .bind(group_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Disband a group: terminal flag plus cascading cleanup of
    /// invitations, memberships, and message history, all-or-nothing.
    ///
    /// # Returns
    /// `false` when the group was already disbanded.
    pub async fn disband_group(&self, group_id: &str) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let flagged =
            sqlx::query("UPDATE groups SET is_disbanded = 1 WHERE id = ? AND is_disbanded = 0")
                .bind(group_id)
                .execute(&mut *tx)
                .await?;

        if flagged.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM group_invitations WHERE group_id = ?")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM group_members WHERE group_id = ?")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM group_messages WHERE group_id = ?")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    // =========================================================================
    // Group invitations
    // =========================================================================

    /// Create or refresh the invitation for (group, invitee).
    ///
    /// One row per pair: a re-invite overwrites the previous resolution
    /// back to pending instead of inserting a duplicate.
    pub async fn upsert_invitation(
        &self,
        id: &str,
        group_id: &str,
        inviter_id: &str,
        invitee_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<GroupInvitation, AppError> {
        sqlx::query(
            r#"
            INSERT INTO group_invitations (id, group_id, inviter_id, invitee_id, status, created_at)
            VALUES (?, ?, ?, ?, 'pending', ?)
            ON CONFLICT (group_id, invitee_id) DO UPDATE
            SET inviter_id = excluded.inviter_id,
                status = 'pending',
                created_at = excluded.created_at
            "#,
        )
        .bind(id)
        .bind(group_id)
        .bind(inviter_id)
        .bind(invitee_id)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        // The row keeps its original ID when the upsert hit an existing pair.
        let invitation = sqlx::query_as::<_, GroupInvitation>(
            "SELECT * FROM group_invitations WHERE group_id = ? AND invitee_id = ?",
        )
        .bind(group_id)
        .bind(invitee_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(invitation)
    }

    /// Get an invitation by ID
    pub async fn get_invitation(&self, id: &str) -> Result<Option<GroupInvitation>, AppError> {
        let invitation =
            sqlx::query_as::<_, GroupInvitation>("SELECT * FROM group_invitations WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(invitation)
    }

    /// List pending invitations addressed to a user.
    pub async fn list_pending_invitations(
        &self,
        invitee_id: &str,
    ) -> Result<Vec<GroupInvitation>, AppError> {
        let invitations = sqlx::query_as::<_, GroupInvitation>(
            "SELECT * FROM group_invitations WHERE invitee_id = ? AND status = 'pending' ORDER BY id DESC",
        )
        .bind(invitee_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(invitations)
    }

    /// Accept a pending invitation and insert membership in one transaction.
    ///
    /// The membership insert skips on conflict: the invitee may have joined
    /// directly while the invitation sat pending, and the two paths must
    /// converge on one membership row without erroring.
    ///
    /// # Returns
    /// `false` when the invitation was no longer pending.
    pub async fn accept_invitation_if_pending(
        &self,
        id: &str,
        joined_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let flipped = sqlx::query(
            "UPDATE group_invitations SET status = 'accepted' WHERE id = ? AND status = 'pending'",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if flipped.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO group_members (group_id, user_id, joined_at)
            SELECT group_id, invitee_id, ? FROM group_invitations WHERE id = ?
            ON CONFLICT (group_id, user_id) DO NOTHING
            "#,
        )
        .bind(joined_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Reject a pending invitation.
    pub async fn reject_invitation_if_pending(&self, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE group_invitations SET status = 'rejected' WHERE id = ? AND status = 'pending'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // Posts
    // =========================================================================

    /// Get a post by ID
    pub async fn get_post(&self, id: &str) -> Result<Option<Post>, AppError> {
        let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(post)
    }

    /// Insert an original post and bump the author's post counter
    /// in one transaction.
    pub async fn insert_post(&self, post: &Post) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        Self::insert_post_row(&mut tx, post).await?;

        sqlx::query("UPDATE users SET post_count = post_count + 1 WHERE id = ?")
            .bind(&post.author_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Insert a repost, bump the immediate parent's repost counter
    /// (never the root's) and the author's post counter, atomically.
    pub async fn insert_repost(&self, post: &Post, parent_id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        Self::insert_post_row(&mut tx, post).await?;

        sqlx::query("UPDATE posts SET repost_count = repost_count + 1 WHERE id = ?")
            .bind(parent_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE users SET post_count = post_count + 1 WHERE id = ?")
            .bind(&post.author_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn insert_post_row(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        post: &Post,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO posts (
                id, author_id, content, images, visibility,
                original_post_id, root_post_id, depth,
                repost_count, is_deleted, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.author_id)
        .bind(&post.content)
        .bind(&post.images)
        .bind(&post.visibility)
        .bind(&post.original_post_id)
        .bind(&post.root_post_id)
        .bind(post.depth)
        .bind(post.repost_count)
        .bind(post.is_deleted)
        .bind(post.created_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Soft-delete a post. The row stays valid as a lineage ancestor.
    ///
    /// # Returns
    /// `true` if the post existed, belonged to `author_id`, and was live.
    pub async fn soft_delete_post(&self, id: &str, author_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE posts SET is_deleted = 1 WHERE id = ? AND author_id = ? AND is_deleted = 0",
        )
        .bind(id)
        .bind(author_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Feed page: non-deleted posts the viewer may see, newest first.
    ///
    /// The visibility predicate is evaluated per row at read time against
    /// the current friendship ledger; nothing is cached or denormalized,
    /// so a revoked friendship hides `friends`-scoped posts immediately.
    /// An anonymous viewer (`None`) sees only public posts.
    pub async fn list_feed_posts(
        &self,
        viewer_id: Option<&str>,
        limit: i64,
        before_id: Option<&str>,
    ) -> Result<Vec<Post>, AppError> {
        DB_QUERIES_TOTAL
            .with_label_values(&["SELECT", "posts"])
            .inc();
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT p.* FROM posts p
            WHERE p.is_deleted = 0
              AND (
                p.visibility = 'public'
                OR p.author_id = ?
                OR (p.visibility = 'friends' AND EXISTS (
                    SELECT 1 FROM friendships f
                    WHERE f.status = 'accepted'
                      AND f.user_lo = MIN(?, p.author_id)
                      AND f.user_hi = MAX(?, p.author_id)
                ))
              )
              AND (? IS NULL OR p.id < ?)
            ORDER BY p.id DESC
            LIMIT ?
            "#,
        )
        .bind(viewer_id)
        .bind(viewer_id)
        .bind(viewer_id)
        .bind(before_id)
        .bind(before_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    /// Profile page: one author's posts under the same predicate.
    pub async fn list_author_posts(
        &self,
        viewer_id: Option<&str>,
        author_id: &str,
        limit: i64,
        before_id: Option<&str>,
    ) -> Result<Vec<Post>, AppError> {
        DB_QUERIES_TOTAL
            .with_label_values(&["SELECT", "posts"])
            .inc();
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT p.* FROM posts p
            WHERE p.is_deleted = 0
              AND p.author_id = ?
              AND (
                p.visibility = 'public'
                OR p.author_id = ?
                OR (p.visibility = 'friends' AND EXISTS (
                    SELECT 1 FROM friendships f
                    WHERE f.status = 'accepted'
                      AND f.user_lo = MIN(?, p.author_id)
                      AND f.user_hi = MAX(?, p.author_id)
                ))
              )
              AND (? IS NULL OR p.id < ?)
            ORDER BY p.id DESC
            LIMIT ?
            "#,
        )
        .bind(author_id)
        .bind(viewer_id)
        .bind(viewer_id)
        .bind(viewer_id)
        .bind(before_id)
        .bind(before_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    // =========================================================================
    // Messaging
    // =========================================================================

    /// Insert a direct message
    pub async fn insert_direct_message(&self, message: &DirectMessage) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO direct_messages (id, sender_id, recipient_id, content, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(&message.sender_id)
        .bind(&message.recipient_id)
        .bind(&message.content)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Conversation between two users, both directions, newest first.
    pub async fn list_conversation(
        &self,
        a: &str,
        b: &str,
        limit: i64,
        before_id: Option<&str>,
    ) -> Result<Vec<DirectMessage>, AppError> {
        let messages = sqlx::query_as::<_, DirectMessage>(
            r#"
            SELECT * FROM direct_messages
            WHERE ((sender_id = ? AND recipient_id = ?) OR (sender_id = ? AND recipient_id = ?))
              AND (? IS NULL OR id < ?)
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .bind(before_id)
        .bind(before_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    /// Insert a group message
    pub async fn insert_group_message(&self, message: &GroupMessage) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO group_messages (id, group_id, sender_id, content, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(&message.group_id)
        .bind(&message.sender_id)
        .bind(&message.content)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// A group's message history, newest first.
    pub async fn list_group_messages(
        &self,
        group_id: &str,
        limit: i64,
        before_id: Option<&str>,
    ) -> Result<Vec<GroupMessage>, AppError> {
        let messages = sqlx::query_as::<_, GroupMessage>(
            r#"
            SELECT * FROM group_messages
            WHERE group_id = ?
              AND (? IS NULL OR id < ?)
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(group_id)
        .bind(before_id)
        .bind(before_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    /// Count of messages retained for a group; disband must leave zero.
    pub async fn count_group_messages(&self, group_id: &str) -> Result<i64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM group_messages WHERE group_id = ?")
                .bind(group_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}
