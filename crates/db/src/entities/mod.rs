//! Document types and their store paths.

pub mod blob;
pub mod chunk;
pub mod document;
pub mod follow;
pub mod like;
pub mod user_profile;
pub mod user_usage;

pub use blob::{BlobEvent, BlobRecord, BlobStatus, Visibility};
pub use chunk::ChunkDoc;
pub use document::Entity as Document;
pub use follow::FollowEdge;
pub use like::LikeEdge;
pub use user_profile::UserProfile;
pub use user_usage::UserUsage;

use chrono::{DateTime, SubsecRound, Utc};

/// Current time at the millisecond precision documents are stored with.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
