//! Follow toggles and follow queries.

use crate::caller::Caller;
use crate::services::blob::clamp_limit;
use blobhub_common::{AppError, AppResult, is_path_safe};
use blobhub_db::{
    DocumentStore,
    entities::{self, FollowEdge, UserProfile, follow, user_profile},
    repositories::ProfileRepository,
};
use tracing::info;

/// Following service for business logic.
#[derive(Clone, Debug)]
pub struct FollowingService {
    store: DocumentStore,
    profile_repo: ProfileRepository,
}

impl FollowingService {
    /// Create a new following service.
    #[must_use]
    pub fn new(store: DocumentStore) -> Self {
        Self {
            profile_repo: ProfileRepository::new(store.clone()),
            store,
        }
    }

    /// Follow `followee_id` if not following, unfollow otherwise.
    ///
    /// Both mirror edges and the followee's `followersCount` change in one
    /// transaction. Returns whether the caller follows afterwards.
    pub async fn toggle_follow(&self, caller: &Caller, followee_id: &str) -> AppResult<bool> {
        if !is_path_safe(followee_id) {
            return Err(AppError::Validation(format!(
                "invalid user id: {followee_id:?}"
            )));
        }
        if caller.uid == followee_id {
            return Err(AppError::SelfFollowDenied);
        }

        let following = self
            .store
            .run_transaction(|tx| {
                let follower = caller.uid.clone();
                let followee = followee_id.to_string();
                Box::pin(async move {
                    let forward = follow::following_path(&follower, &followee);
                    let mirror = follow::follower_path(&followee, &follower);
                    let profile_path = user_profile::path(&followee);

                    let mut profile = tx
                        .get_as::<UserProfile>(&profile_path)
                        .await?
                        .unwrap_or_default();

                    let now_following = if tx.exists(&forward).await? {
                        tx.delete(&forward);
                        tx.delete(&mirror);
                        profile.followers_count = profile.followers_count.saturating_sub(1);
                        false
                    } else {
                        let ts = entities::now();
                        tx.set(
                            &forward,
                            &FollowEdge {
                                uid: followee.clone(),
                                ts,
                            },
                        )?;
                        tx.set(
                            &mirror,
                            &FollowEdge {
                                uid: follower.clone(),
                                ts,
                            },
                        )?;
                        profile.followers_count = profile.followers_count.saturating_add(1);
                        true
                    };
                    tx.set(&profile_path, &profile)?;
                    Ok(now_following)
                })
            })
            .await?;

        info!(
            follower_id = %caller.uid,
            followee_id = %followee_id,
            following,
            "Follow toggled"
        );
        Ok(following)
    }

    /// Whether `follower_id` follows `followee_id`.
    pub async fn is_following(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        self.profile_repo.is_following(follower_id, followee_id).await
    }

    /// A user's followers, most recent first.
    pub async fn followers(&self, user_id: &str, limit: usize) -> AppResult<Vec<FollowEdge>> {
        self.profile_repo.followers(user_id, clamp_limit(limit)).await
    }

    /// Users a user follows, most recent first.
    pub async fn following(&self, user_id: &str, limit: usize) -> AppResult<Vec<FollowEdge>> {
        self.profile_repo.following(user_id, clamp_limit(limit)).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::testing::TestEnv;

    async fn followers_count(env: &TestEnv, uid: &str) -> u64 {
        env.profiles.get(uid).await.unwrap().followers_count
    }

    #[tokio::test]
    async fn test_toggle_twice_is_follow_then_unfollow() {
        let env = TestEnv::new();
        let alice = Caller::new("alice");

        assert!(env.follows.toggle_follow(&alice, "bob").await.unwrap());
        assert!(env.follows.is_following("alice", "bob").await.unwrap());
        assert_eq!(followers_count(&env, "bob").await, 1);
        assert_eq!(env.follows.followers("bob", 10).await.unwrap()[0].uid, "alice");
        assert_eq!(env.follows.following("alice", 10).await.unwrap()[0].uid, "bob");

        assert!(!env.follows.toggle_follow(&alice, "bob").await.unwrap());
        assert!(!env.follows.is_following("alice", "bob").await.unwrap());
        assert_eq!(followers_count(&env, "bob").await, 0);
        assert!(env.follows.followers("bob", 10).await.unwrap().is_empty());
        assert!(env.follows.following("alice", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_self_follow_denied() {
        let env = TestEnv::new();
        assert!(matches!(
            env.follows.toggle_follow(&Caller::new("alice"), "alice").await,
            Err(AppError::SelfFollowDenied)
        ));
        assert!(matches!(
            env.follows.toggle_follow(&Caller::new("alice"), "a/b").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_followers_counted_once_each() {
        let env = TestEnv::with_attempts(50);

        let handles: Vec<_> = ["alice", "carol", "dave", "erin"]
            .into_iter()
            .map(|uid| {
                let follows = env.follows.clone();
                tokio::spawn(async move { follows.toggle_follow(&Caller::new(uid), "bob").await })
            })
            .collect();
        for result in futures::future::join_all(handles).await {
            assert!(result.unwrap().unwrap());
        }

        assert_eq!(followers_count(&env, "bob").await, 4);
        assert_eq!(env.follows.followers("bob", 100).await.unwrap().len(), 4);
    }
}
