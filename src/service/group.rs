//! Group service
//!
//! Owns group founding, the roster, the invitation lifecycle, leadership
//! transfer, and disbanding. Every mutation re-checks the standing
//! invariants in order: disbanded groups accept no writes, the group has
//! exactly one leader, and the leader is always a current member.

use std::sync::Arc;

use sqlx::types::Json;

use crate::data::{Database, EntityId, Group, GroupInvitation, InvitationStatus, ResponseAction, User};
use crate::error::AppError;

fn normalize_optional_text(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Group service
pub struct GroupService {
    db: Arc<Database>,
}

impl GroupService {
    /// Create new group service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    // =========================================================================
    // Lookup helpers
    // =========================================================================

    async fn require_group(&self, group_id: &str) -> Result<Group, AppError> {
        self.db
            .get_group(group_id)
            .await?
            .ok_or(AppError::NotFound("group"))
    }

    /// Load the group and short-circuit when it is disbanded.
    ///
    /// Disbanded is checked before anything else on every mutating path.
    async fn require_live_group(&self, group_id: &str) -> Result<Group, AppError> {
        let group = self.require_group(group_id).await?;
        if group.is_disbanded {
            return Err(AppError::GroupDisbanded);
        }
        Ok(group)
    }

    async fn require_active_user(&self, id: &str) -> Result<User, AppError> {
        self.db
            .get_active_user(id)
            .await?
            .ok_or(AppError::NotFound("user"))
    }

    // =========================================================================
    // Founding and profile
    // =========================================================================

    /// Found a group.
    ///
    /// The founder becomes leader and first member in one transaction, so
    /// the single-leader invariant holds from the first observable state.
    pub async fn create(
        &self,
        founder: &str,
        name: String,
        description: Option<String>,
        tags: Vec<String>,
    ) -> Result<Group, AppError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("group name is required".to_string()));
        }

        let group = Group {
            id: EntityId::new().0,
            name: html_escape::encode_text(&name).to_string(),
            description: description
                .and_then(normalize_optional_text)
                .map(|text| html_escape::encode_text(&text).to_string()),
            tags: Json(tags),
            portrait_url: None,
            leader_id: founder.to_string(),
            is_disbanded: false,
            created_at: chrono::Utc::now(),
        };

        self.db.insert_group_with_founder(&group).await?;
        tracing::info!(group = %group.id, leader = %founder, "group founded");
        Ok(group)
    }

    /// Get a group by ID
    pub async fn get(&self, group_id: &str) -> Result<Group, AppError> {
        self.require_group(group_id).await
    }

    /// Leader-only profile edit: rename, description, tags, portrait.
    pub async fn update_profile(
        &self,
        group_id: &str,
        actor: &str,
        name: Option<String>,
        description: Option<String>,
        tags: Option<Vec<String>>,
        portrait_url: Option<String>,
    ) -> Result<Group, AppError> {
        let group = self.require_live_group(group_id).await?;
        if group.leader_id != actor {
            return Err(AppError::Forbidden);
        }

        let name = name.and_then(normalize_optional_text);
        let name = name
            .as_deref()
            .map(|text| html_escape::encode_text(text).to_string());
        let description = description
            .and_then(normalize_optional_text)
            .map(|text| html_escape::encode_text(&text).to_string());
        let tags_json = match &tags {
            Some(tags) => Some(
                serde_json::to_string(tags)
                    .map_err(|e| AppError::Internal(anyhow::anyhow!("tag encoding failed: {e}")))?,
            ),
            None => None,
        };

        self.db
            .update_group_profile(
                group_id,
                name.as_deref(),
                description.as_deref(),
                tags_json.as_deref(),
                portrait_url.as_deref(),
            )
            .await?;

        self.require_group(group_id).await
    }

    // =========================================================================
    // Roster
    // =========================================================================

    /// Join a group directly.
    pub async fn join(&self, group_id: &str, user_id: &str) -> Result<(), AppError> {
        self.require_live_group(group_id).await?;

        let inserted = self
            .db
            .insert_group_member_if_absent(group_id, user_id, chrono::Utc::now())
            .await?;
        if !inserted {
            return Err(AppError::AlreadyMember);
        }
        tracing::info!(group = %group_id, user = %user_id, "member joined");
        Ok(())
    }

    /// Leave a group.
    ///
    /// The leader cannot leave; they must transfer leadership or disband,
    /// which keeps the leader-is-a-member invariant intact.
    pub async fn leave(&self, group_id: &str, user_id: &str) -> Result<(), AppError> {
        let group = self.require_live_group(group_id).await?;
        if group.leader_id == user_id {
            return Err(AppError::LeaderCannotLeave);
        }

        if !self.db.delete_group_member(group_id, user_id).await? {
            return Err(AppError::NotAMember);
        }
        tracing::info!(group = %group_id, user = %user_id, "member left");
        Ok(())
    }

    /// Leader-only batch kick.
    ///
    /// A self-kick is rejected before any removal happens. The returned
    /// count may be less than requested when some targets were already
    /// non-members; that is reflected, not treated as an error.
    pub async fn kick_members(
        &self,
        group_id: &str,
        actor: &str,
        targets: &[String],
    ) -> Result<u64, AppError> {
        let group = self.require_live_group(group_id).await?;
        if group.leader_id != actor {
            return Err(AppError::Forbidden);
        }
        if targets.iter().any(|target| target == actor) {
            return Err(AppError::CannotKickSelf);
        }

        let removed = self.db.delete_group_members(group_id, targets).await?;
        tracing::info!(group = %group_id, requested = targets.len(), removed, "members kicked");
        Ok(removed)
    }

    /// Leader-only leadership transfer. Updates `leader_id` only; the
    /// former leader stays an ordinary member.
    pub async fn transfer_leadership(
        &self,
        group_id: &str,
        actor: &str,
        new_leader: &str,
    ) -> Result<(), AppError> {
        let group = self.require_live_group(group_id).await?;
        if group.leader_id != actor {
            return Err(AppError::Forbidden);
        }
        if !self.db.is_group_member(group_id, new_leader).await? {
            return Err(AppError::TargetNotMember);
        }

        self.db.set_group_leader(group_id, new_leader).await?;
        tracing::info!(group = %group_id, from = %actor, to = %new_leader, "leadership transferred");
        Ok(())
    }

    /// Leader-only disband: terminal, and cascades removal of
    /// invitations, memberships, and message history all-or-nothing.
    pub async fn disband(&self, group_id: &str, actor: &str) -> Result<(), AppError> {
        let group = self.require_group(group_id).await?;
        if group.leader_id != actor {
            return Err(AppError::Forbidden);
        }

        if !self.db.disband_group(group_id).await? {
            return Err(AppError::GroupDisbanded);
        }
        tracing::info!(group = %group_id, "group disbanded");
        Ok(())
    }

    /// Current members, leader first. Disbanded groups read as empty.
    pub async fn members(&self, group_id: &str) -> Result<Vec<User>, AppError> {
        self.require_group(group_id).await?;
        self.db.list_group_members(group_id).await
    }

    /// Current member count
    pub async fn member_count(&self, group_id: &str) -> Result<i64, AppError> {
        self.db.count_group_members(group_id).await
    }

    /// Active-membership predicate; one of the two checks the messaging
    /// gate performs before admitting a group write.
    pub async fn is_active_member(&self, group_id: &str, user_id: &str) -> Result<bool, AppError> {
        self.db.is_group_member(group_id, user_id).await
    }

    // =========================================================================
    // Invitations
    // =========================================================================

    /// Invite a user into the group.
    ///
    /// Upserts the single invitation row for (group, invitee) back to
    /// pending, so re-inviting after a rejection never duplicates.
    pub async fn invite(
        &self,
        group_id: &str,
        inviter: &str,
        invitee: &str,
    ) -> Result<GroupInvitation, AppError> {
        self.require_live_group(group_id).await?;
        if !self.db.is_group_member(group_id, inviter).await? {
            return Err(AppError::NotAMember);
        }
        self.require_active_user(invitee).await?;
        if self.db.is_group_member(group_id, invitee).await? {
            return Err(AppError::AlreadyMember);
        }

        let invitation = self
            .db
            .upsert_invitation(
                &EntityId::new().0,
                group_id,
                inviter,
                invitee,
                chrono::Utc::now(),
            )
            .await?;
        tracing::info!(group = %group_id, inviter = %inviter, invitee = %invitee, "invitation sent");
        Ok(invitation)
    }

    /// Accept or reject an invitation.
    ///
    /// Only the invitee may respond, and only while pending. Accepting
    /// inserts membership with a conflict-skipping insert in the same
    /// transaction, because the invitee may have joined directly in the
    /// interim.
    pub async fn respond_to_invitation(
        &self,
        invitation_id: &str,
        responder: &str,
        action: ResponseAction,
    ) -> Result<GroupInvitation, AppError> {
        let invitation = self
            .db
            .get_invitation(invitation_id)
            .await?
            .ok_or(AppError::NotFound("invitation"))?;

        if invitation.invitee_id != responder {
            return Err(AppError::Forbidden);
        }
        if InvitationStatus::parse(&invitation.status)? != InvitationStatus::Pending {
            return Err(AppError::AlreadyProcessed);
        }
        // Disband deletes its invitations, but re-check in case the row
        // was read just before the cascade committed.
        self.require_live_group(&invitation.group_id).await?;

        let applied = match action {
            ResponseAction::Accept => {
                self.db
                    .accept_invitation_if_pending(invitation_id, chrono::Utc::now())
                    .await?
            }
            ResponseAction::Reject => self.db.reject_invitation_if_pending(invitation_id).await?,
        };
        if !applied {
            return Err(AppError::AlreadyProcessed);
        }

        self.db
            .get_invitation(invitation_id)
            .await?
            .ok_or(AppError::NotFound("invitation"))
    }

    /// Pending invitations addressed to a user.
    pub async fn pending_invitations(&self, user_id: &str) -> Result<Vec<GroupInvitation>, AppError> {
        self.db.list_pending_invitations(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    async fn create_test_db() -> (Arc<Database>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("service-group.db");
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
    async fn founder_is_leader_and_first_member() {
        let (db, _temp_dir) = create_test_db().await;
        let service = GroupService::new(db.clone());
        let founder = seed_user(&db, "founder").await;

        let group = service
            .create(&founder.id, "birders".to_string(), None, vec![])
            .await
            .unwrap();

        assert_eq!(group.leader_id, founder.id);
        let members = service.members(&group.id).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, founder.id);
    }

    #[tokio::test]
    async fn join_is_rejected_for_members_and_disbanded_groups() {
        let (db, _temp_dir) = create_test_db().await;
        let service = GroupService::new(db.clone());
        let founder = seed_user(&db, "founder").await;
        let user = seed_user(&db, "user").await;

        let group = service
            .create(&founder.id, "birders".to_string(), None, vec![])
            .await
            .unwrap();

        service.join(&group.id, &user.id).await.unwrap();
        let err = service.join(&group.id, &user.id).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyMember));

        service.disband(&group.id, &founder.id).await.unwrap();
        let err = service.join(&group.id, &user.id).await.unwrap_err();
        assert!(matches!(err, AppError::GroupDisbanded));
    }

    #[tokio::test]
    async fn members_can_rejoin_after_leaving() {
        let (db, _temp_dir) = create_test_db().await;
        let service = GroupService::new(db.clone());
        let founder = seed_user(&db, "founder").await;
        let user = seed_user(&db, "user").await;

        let group = service
            .create(&founder.id, "birders".to_string(), None, vec![])
            .await
            .unwrap();

        service.join(&group.id, &user.id).await.unwrap();
        service.leave(&group.id, &user.id).await.unwrap();
        // No cooldown, no re-invitation requirement.
        service.join(&group.id, &user.id).await.unwrap();
        assert!(service.is_active_member(&group.id, &user.id).await.unwrap());
    }

    #[tokio::test]
    async fn leader_cannot_leave_or_kick_self() {
        let (db, _temp_dir) = create_test_db().await;
        let service = GroupService::new(db.clone());
        let founder = seed_user(&db, "founder").await;
        let member = seed_user(&db, "member").await;

        let group = service
            .create(&founder.id, "birders".to_string(), None, vec![])
            .await
            .unwrap();
        service.join(&group.id, &member.id).await.unwrap();

        let err = service.leave(&group.id, &founder.id).await.unwrap_err();
        assert!(matches!(err, AppError::LeaderCannotLeave));

        // Self in the kick batch fails fast; nobody is removed.
        let err = service
            .kick_members(&group.id, &founder.id, &[member.id.clone(), founder.id.clone()])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CannotKickSelf));
        assert!(service.is_active_member(&group.id, &member.id).await.unwrap());
    }

    #[tokio::test]
    async fn transfer_then_old_leader_loses_authority() {
        let (db, _temp_dir) = create_test_db().await;
        let service = GroupService::new(db.clone());
        let leader = seed_user(&db, "leader").await;
        let m1 = seed_user(&db, "m1").await;
        let m2 = seed_user(&db, "m2").await;

        let group = service
            .create(&leader.id, "birders".to_string(), None, vec![])
            .await
            .unwrap();
        service.join(&group.id, &m1.id).await.unwrap();
        service.join(&group.id, &m2.id).await.unwrap();

        // Target must be a member.
        let outsider = seed_user(&db, "outsider").await;
        let err = service
            .transfer_leadership(&group.id, &leader.id, &outsider.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TargetNotMember));

        service
            .transfer_leadership(&group.id, &leader.id, &m1.id)
            .await
            .unwrap();
        let group_row = service.get(&group.id).await.unwrap();
        assert_eq!(group_row.leader_id, m1.id);

        // The former leader is now an ordinary member with no authority.
        let err = service
            .kick_members(&group.id, &leader.id, &[m1.id.clone()])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        // And the new leader can disband; members read back empty.
        service.disband(&group.id, &m1.id).await.unwrap();
        let group_row = service.get(&group.id).await.unwrap();
        assert!(group_row.is_disbanded);
        assert!(service.members(&group.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invitation_lifecycle_with_reinvite() {
        let (db, _temp_dir) = create_test_db().await;
        let service = GroupService::new(db.clone());
        let leader = seed_user(&db, "leader").await;
        let invitee = seed_user(&db, "invitee").await;
        let outsider = seed_user(&db, "outsider").await;

        let group = service
            .create(&leader.id, "birders".to_string(), None, vec![])
            .await
            .unwrap();

        // Only members may invite.
        let err = service
            .invite(&group.id, &outsider.id, &invitee.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotAMember));

        let invitation = service
            .invite(&group.id, &leader.id, &invitee.id)
            .await
            .unwrap();
        service
            .respond_to_invitation(&invitation.id, &invitee.id, ResponseAction::Reject)
            .await
            .unwrap();

        // Responding again is already-processed.
        let err = service
            .respond_to_invitation(&invitation.id, &invitee.id, ResponseAction::Accept)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyProcessed));

        // Re-invite resets the same row; accept then inserts membership.
        let again = service
            .invite(&group.id, &leader.id, &invitee.id)
            .await
            .unwrap();
        assert_eq!(again.id, invitation.id);
        assert_eq!(again.status, "pending");

        service
            .respond_to_invitation(&again.id, &invitee.id, ResponseAction::Accept)
            .await
            .unwrap();
        assert!(service.is_active_member(&group.id, &invitee.id).await.unwrap());

        // A member cannot be invited again.
        let err = service
            .invite(&group.id, &leader.id, &invitee.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyMember));
    }

    #[tokio::test]
    async fn only_the_invitee_may_respond() {
        let (db, _temp_dir) = create_test_db().await;
        let service = GroupService::new(db.clone());
        let leader = seed_user(&db, "leader").await;
        let invitee = seed_user(&db, "invitee").await;
        let other = seed_user(&db, "other").await;

        let group = service
            .create(&leader.id, "birders".to_string(), None, vec![])
            .await
            .unwrap();
        let invitation = service
            .invite(&group.id, &leader.id, &invitee.id)
            .await
            .unwrap();

        let err = service
            .respond_to_invitation(&invitation.id, &other.id, ResponseAction::Accept)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[tokio::test]
    async fn accept_tolerates_a_direct_join_in_the_interim() {
        let (db, _temp_dir) = create_test_db().await;
        let service = GroupService::new(db.clone());
        let leader = seed_user(&db, "leader").await;
        let invitee = seed_user(&db, "invitee").await;

        let group = service
            .create(&leader.id, "birders".to_string(), None, vec![])
            .await
            .unwrap();
        let invitation = service
            .invite(&group.id, &leader.id, &invitee.id)
            .await
            .unwrap();

        // Invitee joins directly while the invitation sits pending.
        service.join(&group.id, &invitee.id).await.unwrap();

        // Accept converges on the same single membership row.
        service
            .respond_to_invitation(&invitation.id, &invitee.id, ResponseAction::Accept)
            .await
            .unwrap();
        assert_eq!(service.member_count(&group.id).await.unwrap(), 2);
    }
}
