//! Business logic services.

#![allow(missing_docs)]

pub mod archive;
pub mod blob;
pub mod following;
pub mod fork;
pub mod like;
pub mod profile;
pub mod quota;

#[cfg(test)]
pub(crate) mod testing;

pub use archive::{ArchiveService, SweepReport};
pub use blob::{BlobContent, BlobService, MAX_LIST_LIMIT, NewBlob};
pub use following::FollowingService;
pub use fork::ForkService;
pub use like::{LikeOutcome, LikeService};
pub use profile::{ProfileService, ProfileUpdate};
pub use quota::{QuotaLedger, Reconciliation, Usage};
