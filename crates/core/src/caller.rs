//! Authenticated caller identity.

/// The user on whose behalf an operation runs.
///
/// Identity is established upstream; the core only consumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Opaque user id.
    pub uid: String,
    /// Display name, copied onto blobs the caller creates.
    pub display_name: Option<String>,
}

impl Caller {
    /// Caller without a display name.
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: None,
        }
    }

    /// Attach a display name; blank names are dropped.
    #[must_use]
    pub fn with_display_name(mut self, name: Option<String>) -> Self {
        self.display_name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        self
    }
}
