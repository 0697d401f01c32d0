//! Per-user byte usage (`blobUsers/{userId}`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Collection of usage documents.
pub const COLLECTION: &str = "blobUsers";

/// Document path of a user's usage.
#[must_use]
pub fn path(user_id: &str) -> String {
    format!("{COLLECTION}/{user_id}")
}

/// Running total of the bytes a user holds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUsage {
    /// Sum of `sizeBytes` over the user's quota-reserved blobs.
    #[serde(default)]
    pub total_bytes_used: u64,
    /// When the document was first written.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl UserUsage {
    /// Fresh usage with nothing counted.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            total_bytes_used: 0,
            created_at: super::now(),
        }
    }
}
