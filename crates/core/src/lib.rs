//! Core business logic for blobhub.
//!
//! Services here own every rule about bytes, quotas and counters. They talk
//! to storage only through [`blobhub_db::DocumentStore`], and every
//! read-modify-write of a shared counter runs inside one store transaction.

pub mod caller;
pub mod codec;
pub mod scheduler;
pub mod services;

pub use caller::Caller;
pub use codec::ChunkCodec;
pub use services::*;
