//! service-core: Shared infrastructure for the board services.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
pub mod retry;

pub use axum;
pub use tracing;
pub use validator;
