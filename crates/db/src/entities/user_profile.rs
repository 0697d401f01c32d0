//! Public profile document (`user_profiles/{userId}`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Collection of profile documents.
pub const COLLECTION: &str = "user_profiles";

/// Document path of a profile.
#[must_use]
pub fn path(user_id: &str) -> String {
    format!("{COLLECTION}/{user_id}")
}

/// Profile fields a user edits, plus the follower counter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    /// Name shown instead of the user id.
    pub display_name: Option<String>,
    /// Free-form about text
    pub bio: Option<String>,
    /// Where the user says they are
    pub location: Option<String>,
    /// Contact address shown on the profile
    pub public_email: Option<String>,
    /// Avatar image URL
    pub avatar_url: Option<String>,
    /// Maintained only by follow toggles.
    pub followers_count: u64,
    /// Last edit by the owner.
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub updated_at: Option<DateTime<Utc>>,
}
