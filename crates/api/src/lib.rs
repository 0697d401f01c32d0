//! HTTP API layer for blobhub.
//!
//! This crate exposes the core services over JSON/HTTP:
//!
//! - **Endpoints**: uploads, downloads, lifecycle, forks, likes, follows,
//!   profiles, usage and the owner-triggered sweep
//! - **Extractors**: the authenticated caller
//! - **Middleware**: identity from the fronting gateway, application state
//!
//! Built on Axum 0.8.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::AppState;
