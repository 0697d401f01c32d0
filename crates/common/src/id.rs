//! Identifier helpers.
//!
//! Blob ids double as document path segments, so every id handed out or
//! accepted from a client must be free of `/`.

use ulid::Ulid;
use uuid::Uuid;

/// Longest identifier accepted from a client.
pub const MAX_ID_LEN: usize = 128;

/// Produces store-safe identifiers.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// New blob id: a lowercase ULID, so ids sort by creation time.
    #[must_use]
    pub fn blob_id(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Opaque random id without a time component.
    #[must_use]
    pub fn opaque(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Whether `id` can be used as a single document path segment.
#[must_use]
pub fn is_path_safe(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id != "."
        && id != ".."
        && !id.chars().any(|c| c == '/' || c.is_control())
}
