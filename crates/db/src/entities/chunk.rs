//! Chunk document (`blobs/{blobId}/chunks/{index}`).
//!
//! Payloads are stored base64-encoded so they fit in a JSON document.

use serde::{Deserialize, Serialize};

/// Chunk collection of one blob.
#[must_use]
pub fn collection(blob_id: &str) -> String {
    format!("{}/chunks", super::blob::path(blob_id))
}

/// Document path of one chunk.
#[must_use]
pub fn path(blob_id: &str, index: u32) -> String {
    format!("{}/{index}", collection(blob_id))
}

/// One stored slice of a blob's payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkDoc {
    /// 0-based position within the blob.
    pub index: u32,
    /// Base64 of the raw bytes.
    pub data_base64: String,
}
