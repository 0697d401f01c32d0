//! Blob record document (`blobs/{blobId}`).

use blobhub_common::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Collection holding every blob record.
pub const COLLECTION: &str = "blobs";

/// Fallback MIME type for uploads that declare none.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Document path of a blob record.
#[must_use]
pub fn path(blob_id: &str) -> String {
    format!("{COLLECTION}/{blob_id}")
}

/// Who may read a blob.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Owner only.
    #[default]
    Private,
    /// Anyone.
    Public,
}

/// Lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobStatus {
    /// Record exists, chunks are being written.
    Uploading,
    /// All chunks written and quota reserved.
    Active,
    /// Soft-deleted; chunks may still be retained.
    Deleted,
}

/// Something that happens to a blob.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlobEvent {
    /// A chunk is stored.
    WriteChunk,
    /// The upload is sealed.
    Commit,
    /// Owner or sweeper marks the blob deleted.
    SoftDelete,
    /// Content is downloaded.
    Read,
    /// Content of a deleted blob is retrieved from retained chunks.
    Recover,
}

/// A stored file and its metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobRecord {
    /// Blob ID (lowercase ULID)
    pub id: String,
    /// Owner user ID
    pub owner_id: String,
    /// Owner display name at upload time
    #[serde(default)]
    pub owner_name: Option<String>,
    /// Display title
    pub title: String,
    /// Original file name
    pub file_name: String,
    /// File size in bytes
    pub size_bytes: u64,
    /// MIME type
    pub mime_type: String,
    /// Who may read it
    pub visibility: Visibility,
    /// Number of chunks the payload is split into
    pub chunk_count: u32,
    /// When the upload began
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// Last download, used by the archival sweep
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_accessed_at: DateTime<Utc>,
    /// When it was soft-deleted
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Lifecycle state
    pub status: BlobStatus,
    /// Like counter, kept in step with the like edges
    #[serde(default)]
    pub likes: u64,
    /// Download counter
    #[serde(default)]
    pub views: u64,
    /// Source blob of a fork
    #[serde(default)]
    pub forked_from: Option<String>,
    /// Whether `size_bytes` is currently counted in the owner's usage.
    #[serde(default)]
    pub quota_reserved: bool,
    /// Whether the chunks of a deleted blob have been reclaimed.
    #[serde(default)]
    pub chunks_purged: bool,
}

impl BlobRecord {
    /// Next state after `event`, or the error the caller should see.
    ///
    /// This is the only place that decides which transitions are legal.
    pub fn transition(&self, event: BlobEvent) -> AppResult<BlobStatus> {
        use BlobEvent as E;
        use BlobStatus as S;

        match (self.status, event) {
            (S::Uploading, E::WriteChunk) => Ok(S::Uploading),
            (S::Uploading, E::Commit) => Ok(S::Active),
            (S::Active, E::Read) => Ok(S::Active),
            (S::Active, E::SoftDelete) => Ok(S::Deleted),
            (S::Deleted, E::Recover) => Ok(S::Deleted),
            (S::Deleted, E::Read | E::SoftDelete) => Err(AppError::Deleted(self.id.clone())),
            (status, event) => Err(AppError::InvalidTransition(format!(
                "{event:?} is not allowed on blob {} while {status:?}",
                self.id
            ))),
        }
    }

    /// Whether `uid` owns this blob.
    #[must_use]
    pub fn is_owned_by(&self, uid: &str) -> bool {
        self.owner_id == uid
    }

    /// Whether `uid` may read this blob's content.
    #[must_use]
    pub fn is_visible_to(&self, uid: Option<&str>) -> bool {
        self.visibility == Visibility::Public || uid.is_some_and(|uid| self.is_owned_by(uid))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(status: BlobStatus) -> BlobRecord {
        let now = Utc::now();
        BlobRecord {
            id: "b1".to_string(),
            owner_id: "alice".to_string(),
            owner_name: None,
            title: "notes".to_string(),
            file_name: "notes.txt".to_string(),
            size_bytes: 10,
            mime_type: "text/plain".to_string(),
            visibility: Visibility::Private,
            chunk_count: 1,
            created_at: now,
            last_accessed_at: now,
            deleted_at: None,
            status,
            likes: 0,
            views: 0,
            forked_from: None,
            quota_reserved: false,
            chunks_purged: false,
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        assert_eq!(
            record(BlobStatus::Uploading).transition(BlobEvent::Commit).unwrap(),
            BlobStatus::Active
        );
        assert_eq!(
            record(BlobStatus::Active).transition(BlobEvent::SoftDelete).unwrap(),
            BlobStatus::Deleted
        );
        assert_eq!(
            record(BlobStatus::Deleted).transition(BlobEvent::Recover).unwrap(),
            BlobStatus::Deleted
        );
    }

    #[test]
    fn test_rejected_transitions() {
        assert!(matches!(
            record(BlobStatus::Deleted).transition(BlobEvent::Read),
            Err(AppError::Deleted(_))
        ));
        assert!(matches!(
            record(BlobStatus::Active).transition(BlobEvent::Commit),
            Err(AppError::InvalidTransition(_))
        ));
        assert!(matches!(
            record(BlobStatus::Uploading).transition(BlobEvent::SoftDelete),
            Err(AppError::InvalidTransition(_))
        ));
        assert!(matches!(
            record(BlobStatus::Active).transition(BlobEvent::Recover),
            Err(AppError::InvalidTransition(_))
        ));
        assert!(matches!(
            record(BlobStatus::Uploading).transition(BlobEvent::Read),
            Err(AppError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_visibility() {
        let mut blob = record(BlobStatus::Active);
        assert!(blob.is_visible_to(Some("alice")));
        assert!(!blob.is_visible_to(Some("bob")));
        assert!(!blob.is_visible_to(None));
        blob.visibility = Visibility::Public;
        assert!(blob.is_visible_to(None));
    }

    #[test]
    fn test_wire_shape_is_camel_case_with_millis() {
        let blob = record(BlobStatus::Active);
        let value = serde_json::to_value(&blob).unwrap();

        assert_eq!(value["ownerId"], json!("alice"));
        assert_eq!(value["status"], json!("active"));
        assert_eq!(value["visibility"], json!("private"));
        assert_eq!(value["createdAt"], json!(blob.created_at.timestamp_millis()));
        assert!(value["deletedAt"].is_null());
    }
}
