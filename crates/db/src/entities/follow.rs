//! Follow edge mirrors.
//!
//! A follow of `followee` by `follower` is stored twice:
//! `user_profiles/{followee}/followers/{follower}` and
//! `user_profiles/{follower}/following/{followee}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Collection of a user's followers.
#[must_use]
pub fn followers_collection(user_id: &str) -> String {
    format!("{}/followers", super::user_profile::path(user_id))
}

/// Collection of the users someone follows.
#[must_use]
pub fn following_collection(user_id: &str) -> String {
    format!("{}/following", super::user_profile::path(user_id))
}

/// Edge stored under the followee.
#[must_use]
pub fn follower_path(followee_id: &str, follower_id: &str) -> String {
    format!("{}/{follower_id}", followers_collection(followee_id))
}

/// Edge stored under the follower.
#[must_use]
pub fn following_path(follower_id: &str, followee_id: &str) -> String {
    format!("{}/{followee_id}", following_collection(follower_id))
}

/// One side of a follow relationship.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowEdge {
    /// The other party.
    pub uid: String,
    /// When the follow was created.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub ts: DateTime<Utc>,
}
