//! Friendship service
//!
//! Owns the friendship-edge state machine: request, auto-accept,
//! respond, re-send after rejection, and removal. The typed transition
//! table lives in [`crate::data::FriendshipState`]; this service applies
//! it against the single edge row per pair.

use std::sync::Arc;

use crate::data::{
    Database, EntityId, Friendship, FriendshipStanding, RequestTransition, ResponseAction, User,
};
use crate::error::AppError;

/// Friendship service
pub struct FriendshipService {
    db: Arc<Database>,
}

/// What a successful `request` did.
#[derive(Debug, Clone)]
pub enum RequestOutcome {
    /// A pending request now awaits the other party.
    Requested(Friendship),
    /// The other side had already asked; the edge is now accepted.
    AutoAccepted(Friendship),
}

impl RequestOutcome {
    pub fn edge(&self) -> &Friendship {
        match self {
            Self::Requested(edge) | Self::AutoAccepted(edge) => edge,
        }
    }
}

impl FriendshipService {
    /// Create new friendship service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    async fn require_active_user(&self, id: &str) -> Result<User, AppError> {
        self.db
            .get_active_user(id)
            .await?
            .ok_or(AppError::NotFound("user"))
    }

    /// Send a friend request from `from` to `to`.
    ///
    /// Resolves every shape the edge can be in:
    /// - accepted: `AlreadyFriends`
    /// - pending from us: `RequestAlreadySent`
    /// - pending from them: auto-accept, so simultaneous mutual requests
    ///   deterministically end as friends with one edge row
    /// - rejected: re-send in place on the same row
    /// - absent: insert a fresh pending edge
    pub async fn request(&self, from: &str, to: &str) -> Result<RequestOutcome, AppError> {
        if from == to {
            return Err(AppError::Validation(
                "cannot send a friend request to yourself".to_string(),
            ));
        }
        self.require_active_user(to).await?;

        // Each compare-and-set can lose to a concurrent writer; one
        // re-read is enough to land in a terminal answer.
        for _ in 0..2 {
            let existing = self.db.get_friendship_between(from, to).await?;

            let Some(edge) = existing else {
                let inserted = self
                    .db
                    .insert_pending_friendship(
                        &EntityId::new().0,
                        from,
                        to,
                        from,
                        chrono::Utc::now(),
                    )
                    .await?;
                if !inserted {
                    // Lost the insert race; re-read and reconsider.
                    continue;
                }
                let edge = self.current_edge(from, to).await?;
                tracing::info!(from = %from, to = %to, "friend request created");
                return Ok(RequestOutcome::Requested(edge));
            };

            match edge.state()?.on_request(from)? {
                RequestTransition::AutoAccept => {
                    if !self
                        .db
                        .accept_friendship_if_pending(&edge.id, chrono::Utc::now())
                        .await?
                    {
                        continue;
                    }
                    let edge = self.current_edge(from, to).await?;
                    tracing::info!(from = %from, to = %to, "mutual friend requests auto-accepted");
                    return Ok(RequestOutcome::AutoAccepted(edge));
                }
                RequestTransition::Resend => {
                    if !self
                        .db
                        .resend_friendship_if_rejected(&edge.id, from, chrono::Utc::now())
                        .await?
                    {
                        continue;
                    }
                    let edge = self.current_edge(from, to).await?;
                    tracing::info!(from = %from, to = %to, "friend request re-sent");
                    return Ok(RequestOutcome::Requested(edge));
                }
            }
        }

        Err(AppError::Internal(anyhow::anyhow!(
            "friendship edge kept changing concurrently; caller should retry"
        )))
    }

    async fn current_edge(&self, a: &str, b: &str) -> Result<Friendship, AppError> {
        self.db
            .get_friendship_between(a, b)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("friendship edge vanished mid-update")))
    }

    /// Accept or reject a pending request.
    ///
    /// Only the invited party may respond; a request that is no longer
    /// pending reports `AlreadyProcessed` and changes nothing.
    pub async fn respond(
        &self,
        request_id: &str,
        responder: &str,
        action: ResponseAction,
    ) -> Result<Friendship, AppError> {
        let edge = self
            .db
            .get_friendship(request_id)
            .await?
            .ok_or(AppError::NotFound("friend request"))?;

        if edge.user_lo != responder && edge.user_hi != responder {
            return Err(AppError::Forbidden);
        }
        if edge.requester_id == responder {
            // The requester cannot answer their own request.
            return Err(AppError::Forbidden);
        }

        // Validates pending-ness against the transition table.
        edge.state()?.on_response(action)?;

        let applied = match action {
            ResponseAction::Accept => {
                self.db
                    .accept_friendship_if_pending(&edge.id, chrono::Utc::now())
                    .await?
            }
            ResponseAction::Reject => self.db.reject_friendship_if_pending(&edge.id).await?,
        };
        if !applied {
            return Err(AppError::AlreadyProcessed);
        }

        self.db
            .get_friendship(request_id)
            .await?
            .ok_or(AppError::NotFound("friend request"))
    }

    /// Remove a friendship outright, regardless of status.
    ///
    /// Unlike reject, this clears all history: the next request between
    /// the pair starts from nothing and can never auto-accept off a
    /// stale edge.
    pub async fn remove(&self, actor: &str, other: &str) -> Result<(), AppError> {
        if actor == other {
            return Err(AppError::Validation(
                "cannot remove a friendship with yourself".to_string(),
            ));
        }
        if !self.db.delete_friendship_between(actor, other).await? {
            return Err(AppError::NotFound("friendship"));
        }
        tracing::info!(actor = %actor, other = %other, "friendship removed");
        Ok(())
    }

    /// The viewer's standing toward `subject`, derived from the single
    /// edge row.
    pub async fn status(&self, viewer: &str, subject: &str) -> Result<FriendshipStanding, AppError> {
        if viewer == subject {
            return Ok(FriendshipStanding::None);
        }
        let standing = self
            .db
            .get_friendship_between(viewer, subject)
            .await?
            .map(|edge| edge.standing_for(viewer))
            .unwrap_or(FriendshipStanding::None);
        Ok(standing)
    }

    /// List the user's friends.
    pub async fn friends(&self, user_id: &str) -> Result<Vec<User>, AppError> {
        self.db.list_friends(user_id).await
    }

    /// List requests awaiting the user's response.
    pub async fn pending_received(&self, user_id: &str) -> Result<Vec<Friendship>, AppError> {
        self.db.list_pending_received(user_id).await
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
        let db_path = temp_dir.path().join("service-friendship.db");
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
    async fn request_then_accept_makes_friends_symmetrically() {
        let (db, _temp_dir) = create_test_db().await;
        let service = FriendshipService::new(db.clone());
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;

        let outcome = service.request(&alice.id, &bob.id).await.unwrap();
        let edge = match outcome {
            RequestOutcome::Requested(edge) => edge,
            other => panic!("expected Requested, got {:?}", other),
        };
        assert_eq!(
            service.status(&alice.id, &bob.id).await.unwrap(),
            FriendshipStanding::PendingSent
        );
        assert_eq!(
            service.status(&bob.id, &alice.id).await.unwrap(),
            FriendshipStanding::PendingReceived
        );

        service
            .respond(&edge.id, &bob.id, ResponseAction::Accept)
            .await
            .unwrap();
        assert_eq!(
            service.status(&alice.id, &bob.id).await.unwrap(),
            FriendshipStanding::Friends
        );
        assert_eq!(
            service.status(&bob.id, &alice.id).await.unwrap(),
            FriendshipStanding::Friends
        );
    }

    #[tokio::test]
    async fn mutual_requests_auto_accept_with_one_edge() {
        let (db, _temp_dir) = create_test_db().await;
        let service = FriendshipService::new(db.clone());
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;

        service.request(&alice.id, &bob.id).await.unwrap();
        let outcome = service.request(&bob.id, &alice.id).await.unwrap();
        assert!(matches!(outcome, RequestOutcome::AutoAccepted(_)));

        assert_eq!(
            service.status(&alice.id, &bob.id).await.unwrap(),
            FriendshipStanding::Friends
        );

        // Exactly one row for the pair either way around.
        let edge = db
            .get_friendship_between(&bob.id, &alice.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(edge.status, "accepted");
        assert!(edge.accepted_at.is_some());
    }

    #[tokio::test]
    async fn duplicate_request_reports_already_sent() {
        let (db, _temp_dir) = create_test_db().await;
        let service = FriendshipService::new(db.clone());
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;

        service.request(&alice.id, &bob.id).await.unwrap();
        let err = service.request(&alice.id, &bob.id).await.unwrap_err();
        assert!(matches!(err, AppError::RequestAlreadySent));
    }

    #[tokio::test]
    async fn reject_keeps_the_row_for_resend() {
        let (db, _temp_dir) = create_test_db().await;
        let service = FriendshipService::new(db.clone());
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;

        let edge = match service.request(&alice.id, &bob.id).await.unwrap() {
            RequestOutcome::Requested(edge) => edge,
            other => panic!("expected Requested, got {:?}", other),
        };
        service
            .respond(&edge.id, &bob.id, ResponseAction::Reject)
            .await
            .unwrap();

        // Rejected reads as no relationship, but the row is retained.
        assert_eq!(
            service.status(&alice.id, &bob.id).await.unwrap(),
            FriendshipStanding::None
        );
        let row = db.get_friendship(&edge.id).await.unwrap().unwrap();
        assert_eq!(row.status, "rejected");

        // Either party may re-send; the same row flips back to pending.
        let resent = match service.request(&alice.id, &bob.id).await.unwrap() {
            RequestOutcome::Requested(edge) => edge,
            other => panic!("expected Requested, got {:?}", other),
        };
        assert_eq!(resent.id, edge.id);
        assert_eq!(resent.requester_id, alice.id);
        assert_eq!(
            service.status(&alice.id, &bob.id).await.unwrap(),
            FriendshipStanding::PendingSent
        );
    }

    #[tokio::test]
    async fn responding_twice_reports_already_processed() {
        let (db, _temp_dir) = create_test_db().await;
        let service = FriendshipService::new(db.clone());
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;

        let edge = service.request(&alice.id, &bob.id).await.unwrap();
        let edge_id = edge.edge().id.clone();
        service
            .respond(&edge_id, &bob.id, ResponseAction::Accept)
            .await
            .unwrap();

        let err = service
            .respond(&edge_id, &bob.id, ResponseAction::Reject)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyProcessed));
    }

    #[tokio::test]
    async fn only_the_invited_party_may_respond() {
        let (db, _temp_dir) = create_test_db().await;
        let service = FriendshipService::new(db.clone());
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;
        let carol = seed_user(&db, "carol").await;

        let edge_id = service
            .request(&alice.id, &bob.id)
            .await
            .unwrap()
            .edge()
            .id
            .clone();

        // The requester cannot answer their own request.
        let err = service
            .respond(&edge_id, &alice.id, ResponseAction::Accept)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        // Neither can a third party.
        let err = service
            .respond(&edge_id, &carol.id, ResponseAction::Accept)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[tokio::test]
    async fn removal_clears_history_so_rerequest_starts_fresh() {
        let (db, _temp_dir) = create_test_db().await;
        let service = FriendshipService::new(db.clone());
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;

        service.request(&alice.id, &bob.id).await.unwrap();
        service.request(&bob.id, &alice.id).await.unwrap();
        service.remove(&alice.id, &bob.id).await.unwrap();
        assert_eq!(
            service.status(&alice.id, &bob.id).await.unwrap(),
            FriendshipStanding::None
        );

        // No stale state: the new request is pending, not auto-accepted.
        let outcome = service.request(&bob.id, &alice.id).await.unwrap();
        assert!(matches!(outcome, RequestOutcome::Requested(_)));

        // Removing a non-existent friendship is reported, not ignored.
        let stranger = EntityId::new().0;
        let err = service.remove(&alice.id, &stranger).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("friendship")));
    }
}
