//! Typed access to documents outside of transactions.

mod blob;
mod like;
mod profile;
mod usage;

pub use blob::BlobRepository;
pub use like::LikeRepository;
pub use profile::ProfileRepository;
pub use usage::UsageRepository;
