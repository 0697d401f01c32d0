//! Common utilities and shared types for blobhub.
//!
//! This crate provides foundational components used across all blobhub crates:
//!
//! - **Configuration**: Application settings via [`Config`] and the storage
//!   limits derived from it via [`Limits`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: store-safe identifiers via [`IdGenerator`]
//!
//! # Example
//!
//! ```no_run
//! use blobhub_common::{AppResult, Config, IdGenerator};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let limits = config.storage.limits();
//!     let id = IdGenerator::new().blob_id();
//!     println!("{id}: {} byte chunks", limits.chunk_size);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;

pub use config::{Config, Limits};
pub use error::{AppError, AppResult};
pub use id::{IdGenerator, is_path_safe};
