//! Post service
//!
//! Handles post and repost creation, counter increments, and soft
//! deletion. Repost lineage is a depth-bounded tree flattened through a
//! denormalized root pointer, so lineage reads never walk the chain.

use std::sync::Arc;

use sqlx::types::Json;

use crate::data::{Database, EntityId, Post, Visibility};
use crate::error::AppError;

/// Upper bound on the repost chain length.
pub const MAX_REPOST_DEPTH: i64 = 10;

const MAX_CONTENT_CHARS: usize = 5000;
const MAX_IMAGES_PER_POST: usize = 9;

/// Post service
pub struct PostService {
    db: Arc<Database>,
}

impl PostService {
    /// Create new post service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Trim, length-check, and escape optional post text.
    fn sanitize_content(content: Option<String>) -> Result<Option<String>, AppError> {
        let content = content
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        if let Some(text) = &content {
            if text.chars().count() > MAX_CONTENT_CHARS {
                return Err(AppError::Validation(format!(
                    "post content exceeds {} characters",
                    MAX_CONTENT_CHARS
                )));
            }
        }
        Ok(content.map(|text| html_escape::encode_text(&text).to_string()))
    }

    fn validate_images(images: &[String]) -> Result<(), AppError> {
        if images.len() > MAX_IMAGES_PER_POST {
            return Err(AppError::Validation(format!(
                "a post can carry at most {} images",
                MAX_IMAGES_PER_POST
            )));
        }
        Ok(())
    }

    /// Create an original post.
    ///
    /// The insert and the author's post-counter increment commit
    /// together.
    pub async fn create(
        &self,
        author_id: &str,
        content: Option<String>,
        images: Vec<String>,
        visibility: &str,
    ) -> Result<Post, AppError> {
        let visibility = Visibility::parse(visibility)?;
        Self::validate_images(&images)?;
        let content = Self::sanitize_content(content)?;
        if content.is_none() && images.is_empty() {
            return Err(AppError::Validation(
                "post content or images are required".to_string(),
            ));
        }

        let post = Post {
            id: EntityId::new().0,
            author_id: author_id.to_string(),
            content,
            images: Json(images),
            visibility: visibility.as_str().to_string(),
            original_post_id: None,
            root_post_id: None,
            depth: 0,
            repost_count: 0,
            is_deleted: false,
            created_at: chrono::Utc::now(),
        };

        self.db.insert_post(&post).await?;
        tracing::info!(post = %post.id, author = %author_id, visibility = %post.visibility, "post created");
        Ok(post)
    }

    /// Repost an existing post.
    ///
    /// The root pointer flattens to the true original (never an
    /// intermediate repost) and depth is bounded by
    /// [`MAX_REPOST_DEPTH`]. Only the immediate parent's repost counter
    /// is incremented; reposts-of-reposts do not touch the root's.
    pub async fn repost(
        &self,
        original_id: &str,
        author_id: &str,
        content: Option<String>,
        images: Vec<String>,
        visibility: &str,
    ) -> Result<Post, AppError> {
        let visibility = Visibility::parse(visibility)?;
        Self::validate_images(&images)?;
        // A repost may be bare; caption and images are optional.
        let content = Self::sanitize_content(content)?;

        let original = self
            .db
            .get_post(original_id)
            .await?
            .filter(|post| !post.is_deleted)
            .ok_or(AppError::NotFound("post"))?;

        let root_post_id = original
            .root_post_id
            .clone()
            .unwrap_or_else(|| original.id.clone());
        let depth = original.depth + 1;
        if depth > MAX_REPOST_DEPTH {
            return Err(AppError::DepthExceeded);
        }

        let post = Post {
            id: EntityId::new().0,
            author_id: author_id.to_string(),
            content,
            images: Json(images),
            visibility: visibility.as_str().to_string(),
            original_post_id: Some(original.id.clone()),
            root_post_id: Some(root_post_id),
            depth,
            repost_count: 0,
            is_deleted: false,
            created_at: chrono::Utc::now(),
        };

        self.db.insert_repost(&post, &original.id).await?;
        tracing::info!(post = %post.id, original = %original.id, depth, "repost created");
        Ok(post)
    }

    /// Soft-delete a post.
    ///
    /// The row stays behind as a valid lineage ancestor; reposts of a
    /// deleted post keep rendering their own captured pointers.
    pub async fn delete(&self, post_id: &str, actor: &str) -> Result<(), AppError> {
        let post = self
            .db
            .get_post(post_id)
            .await?
            .filter(|post| !post.is_deleted)
            .ok_or(AppError::NotFound("post"))?;

        if post.author_id != actor {
            return Err(AppError::Forbidden);
        }

        if !self.db.soft_delete_post(post_id, actor).await? {
            return Err(AppError::NotFound("post"));
        }
        tracing::info!(post = %post_id, "post deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    use crate::data::User;

    async fn create_test_db() -> (Arc<Database>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("service-post.db");
        let db = Database::connect(&db_path).await.unwrap();
        (Arc::new(db), temp_dir)
    }

    async fn seed_user(db: &Database, username: &str) -> User {
        let user = User {
            id: EntityId::new().0,
            username: username.to_string(),
            display_name: None,
            bio: None,
            avatar_url: None,
            post_count: 0,
            follower_count: 0,
            following_count: 0,
            is_deactivated: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(db.insert_user(&user).await.unwrap());
        user
    }

    #[tokio::test]
    async fn create_escapes_content_and_bumps_post_count() {
        let (db, _temp_dir) = create_test_db().await;
        let service = PostService::new(db.clone());
        let author = seed_user(&db, "author").await;

        let post = service
            .create(&author.id, Some("<b>hi</b>".to_string()), vec![], "public")
            .await
            .unwrap();
        assert_eq!(post.content.as_deref(), Some("&lt;b&gt;hi&lt;/b&gt;"));
        assert_eq!(post.depth, 0);
        assert!(post.original_post_id.is_none());

        let author_row = db.get_user(&author.id).await.unwrap().unwrap();
        assert_eq!(author_row.post_count, 1);
    }

    #[tokio::test]
    async fn create_requires_content_or_images() {
        let (db, _temp_dir) = create_test_db().await;
        let service = PostService::new(db.clone());
        let author = seed_user(&db, "author").await;

        let err = service
            .create(&author.id, Some("   ".to_string()), vec![], "public")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // Images alone are enough.
        service
            .create(
                &author.id,
                None,
                vec!["https://cdn.example.com/a.webp".to_string()],
                "public",
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn repost_chain_flattens_root_and_bounds_depth() {
        let (db, _temp_dir) = create_test_db().await;
        let service = PostService::new(db.clone());
        let author = seed_user(&db, "author").await;

        let root = service
            .create(&author.id, Some("p0".to_string()), vec![], "public")
            .await
            .unwrap();

        let mut parent = root.clone();
        for expected_depth in 1..=MAX_REPOST_DEPTH {
            let repost = service
                .repost(&parent.id, &author.id, None, vec![], "public")
                .await
                .unwrap();
            assert_eq!(repost.depth, expected_depth);
            // Every repost points at the true root, never the chain.
            assert_eq!(repost.root_post_id.as_deref(), Some(root.id.as_str()));
            assert_eq!(repost.original_post_id.as_deref(), Some(parent.id.as_str()));
            parent = repost;
        }

        let err = service
            .repost(&parent.id, &author.id, None, vec![], "public")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DepthExceeded));
    }

    #[tokio::test]
    async fn repost_of_missing_or_deleted_post_is_not_found() {
        let (db, _temp_dir) = create_test_db().await;
        let service = PostService::new(db.clone());
        let author = seed_user(&db, "author").await;

        let err = service
            .repost(&EntityId::new().0, &author.id, None, vec![], "public")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("post")));

        let post = service
            .create(&author.id, Some("soon gone".to_string()), vec![], "public")
            .await
            .unwrap();
        service.delete(&post.id, &author.id).await.unwrap();

        let err = service
            .repost(&post.id, &author.id, None, vec![], "public")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("post")));
    }

    #[tokio::test]
    async fn reposts_survive_ancestor_deletion() {
        let (db, _temp_dir) = create_test_db().await;
        let service = PostService::new(db.clone());
        let author = seed_user(&db, "author").await;
        let reposter = seed_user(&db, "reposter").await;

        let original = service
            .create(&author.id, Some("p0".to_string()), vec![], "public")
            .await
            .unwrap();
        let repost = service
            .repost(&original.id, &reposter.id, Some("nice".to_string()), vec![], "public")
            .await
            .unwrap();

        service.delete(&original.id, &author.id).await.unwrap();

        // The repost keeps its captured pointers even though the
        // ancestor row is now soft-deleted.
        let row = db.get_post(&repost.id).await.unwrap().unwrap();
        assert_eq!(row.original_post_id.as_deref(), Some(original.id.as_str()));
        assert_eq!(row.root_post_id.as_deref(), Some(original.id.as_str()));
    }

    #[tokio::test]
    async fn only_the_author_may_delete() {
        let (db, _temp_dir) = create_test_db().await;
        let service = PostService::new(db.clone());
        let author = seed_user(&db, "author").await;
        let other = seed_user(&db, "other").await;

        let post = service
            .create(&author.id, Some("mine".to_string()), vec![], "public")
            .await
            .unwrap();

        let err = service.delete(&post.id, &other.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        service.delete(&post.id, &author.id).await.unwrap();
        let err = service.delete(&post.id, &author.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("post")));
    }
}
