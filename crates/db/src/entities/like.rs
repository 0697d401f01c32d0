//! Like edge (`blobs/{blobId}/likes/{userId}`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Like collection of one blob.
#[must_use]
pub fn collection(blob_id: &str) -> String {
    format!("{}/likes", super::blob::path(blob_id))
}

/// Document path of one user's like.
#[must_use]
pub fn path(blob_id: &str, user_id: &str) -> String {
    format!("{}/{user_id}", collection(blob_id))
}

/// Presence means the user likes the blob.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeEdge {
    /// Who liked.
    pub uid: String,
    /// When.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub ts: DateTime<Utc>,
}
