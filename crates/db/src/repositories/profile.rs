//! Profile and follow-edge repository.

use crate::entities::{FollowEdge, UserProfile, follow, user_profile};
use crate::store::{Direction, DocumentStore, Query};
use blobhub_common::AppResult;

/// Profile documents and the follow edges stored beneath them.
#[derive(Clone, Debug)]
pub struct ProfileRepository {
    store: DocumentStore,
}

impl ProfileRepository {
    /// Create a new profile repository.
    #[must_use]
    pub const fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// Find a profile by user ID.
    pub async fn find(&self, user_id: &str) -> AppResult<Option<UserProfile>> {
        self.store.get_as(&user_profile::path(user_id)).await
    }

    /// Whether `follower_id` follows `followee_id`.
    pub async fn is_following(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        Ok(self
            .store
            .get(&follow::following_path(follower_id, followee_id))
            .await?
            .is_some())
    }

    /// Users following `user_id`, most recent first.
    pub async fn followers(&self, user_id: &str, limit: usize) -> AppResult<Vec<FollowEdge>> {
        self.edges(follow::followers_collection(user_id), limit).await
    }

    /// Users `user_id` follows, most recent first.
    pub async fn following(&self, user_id: &str, limit: usize) -> AppResult<Vec<FollowEdge>> {
        self.edges(follow::following_collection(user_id), limit).await
    }

    async fn edges(&self, collection: String, limit: usize) -> AppResult<Vec<FollowEdge>> {
        let query = Query::collection(collection)
            .order_by("ts", Direction::Descending)
            .limit(limit);
        self.store
            .query(&query)
            .await?
            .iter()
            .map(|snapshot| snapshot.decode())
            .collect()
    }
}
