//! Messaging service
//!
//! Direct messages between users and group-scoped messages. Group
//! writes pass through the membership gate: the group must not be
//! disbanded and the sender must be an active member. Group message
//! history is deleted wholesale by the disband cascade.

use std::sync::Arc;

use crate::data::{Database, DirectMessage, EntityId, GroupMessage};
use crate::error::AppError;

const MAX_MESSAGE_CHARS: usize = 2000;

/// Messaging service
pub struct MessagingService {
    db: Arc<Database>,
}

impl MessagingService {
    /// Create new messaging service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn sanitize_message(content: String) -> Result<String, AppError> {
        let content = content.trim().to_string();
        if content.is_empty() {
            return Err(AppError::Validation("message content is required".to_string()));
        }
        if content.chars().count() > MAX_MESSAGE_CHARS {
            return Err(AppError::Validation(format!(
                "message exceeds {} characters",
                MAX_MESSAGE_CHARS
            )));
        }
        Ok(html_escape::encode_text(&content).to_string())
    }

    /// Send a direct message.
    pub async fn send_direct(
        &self,
        sender_id: &str,
        recipient_id: &str,
        content: String,
    ) -> Result<DirectMessage, AppError> {
        if sender_id == recipient_id {
            return Err(AppError::Validation(
                "cannot send a message to yourself".to_string(),
            ));
        }
        self.db
            .get_active_user(recipient_id)
            .await?
            .ok_or(AppError::NotFound("user"))?;
        let content = Self::sanitize_message(content)?;

        let message = DirectMessage {
            id: EntityId::new().0,
            sender_id: sender_id.to_string(),
            recipient_id: recipient_id.to_string(),
            content,
            created_at: chrono::Utc::now(),
        };
        self.db.insert_direct_message(&message).await?;
        Ok(message)
    }

    /// Conversation between the caller and another user, newest first.
    pub async fn conversation(
        &self,
        user_id: &str,
        other_id: &str,
        limit: Option<i64>,
        before_id: Option<&str>,
    ) -> Result<Vec<DirectMessage>, AppError> {
        let limit = limit.unwrap_or(40).clamp(1, 100);
        self.db
            .list_conversation(user_id, other_id, limit, before_id)
            .await
    }

    /// Post a message to a group.
    ///
    /// The gate checks exactly two predicates before admitting the
    /// write: the group is not disbanded, and the sender is an active
    /// member.
    pub async fn send_group_message(
        &self,
        group_id: &str,
        sender_id: &str,
        content: String,
    ) -> Result<GroupMessage, AppError> {
        let group = self
            .db
            .get_group(group_id)
            .await?
            .ok_or(AppError::NotFound("group"))?;
        if group.is_disbanded {
            return Err(AppError::GroupDisbanded);
        }
        if !self.db.is_group_member(group_id, sender_id).await? {
            return Err(AppError::NotAMember);
        }
        let content = Self::sanitize_message(content)?;

        let message = GroupMessage {
            id: EntityId::new().0,
            group_id: group_id.to_string(),
            sender_id: sender_id.to_string(),
            content,
            created_at: chrono::Utc::now(),
        };
        self.db.insert_group_message(&message).await?;
        Ok(message)
    }

    /// A group's message history, members only, newest first.
    pub async fn group_messages(
        &self,
        group_id: &str,
        requester_id: &str,
        limit: Option<i64>,
        before_id: Option<&str>,
    ) -> Result<Vec<GroupMessage>, AppError> {
        self.db
            .get_group(group_id)
            .await?
            .ok_or(AppError::NotFound("group"))?;
        if !self.db.is_group_member(group_id, requester_id).await? {
            return Err(AppError::NotAMember);
        }

        let limit = limit.unwrap_or(40).clamp(1, 100);
        self.db.list_group_messages(group_id, limit, before_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    use crate::data::User;
    use crate::service::GroupService;

    async fn create_test_db() -> (Arc<Database>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("service-messaging.db");
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
    async fn direct_messages_round_trip_and_escape() {
        let (db, _temp_dir) = create_test_db().await;
        let service = MessagingService::new(db.clone());
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;

        let sent = service
            .send_direct(&alice.id, &bob.id, "<script>hi</script>".to_string())
            .await
            .unwrap();
        assert!(!sent.content.contains('<'));

        let conversation = service
            .conversation(&bob.id, &alice.id, None, None)
            .await
            .unwrap();
        assert_eq!(conversation.len(), 1);

        let err = service
            .send_direct(&alice.id, &alice.id, "hi me".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn group_gate_requires_live_group_and_membership() {
        let (db, _temp_dir) = create_test_db().await;
        let service = MessagingService::new(db.clone());
        let groups = GroupService::new(db.clone());
        let leader = seed_user(&db, "leader").await;
        let member = seed_user(&db, "member").await;
        let outsider = seed_user(&db, "outsider").await;

        let group = groups
            .create(&leader.id, "birders".to_string(), None, vec![])
            .await
            .unwrap();
        groups.join(&group.id, &member.id).await.unwrap();

        service
            .send_group_message(&group.id, &member.id, "hello".to_string())
            .await
            .unwrap();

        let err = service
            .send_group_message(&group.id, &outsider.id, "hello".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotAMember));

        let err = service
            .group_messages(&group.id, &outsider.id, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotAMember));

        let history = service
            .group_messages(&group.id, &member.id, None, None)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);

        // Disband closes the gate and clears the history.
        groups.disband(&group.id, &leader.id).await.unwrap();
        let err = service
            .send_group_message(&group.id, &member.id, "too late".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::GroupDisbanded));
        assert_eq!(db.count_group_messages(&group.id).await.unwrap(), 0);
    }
}
