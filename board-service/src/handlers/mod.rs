pub mod auth;
pub mod boards;
pub mod cards;
pub mod health;
pub mod lists;
pub mod metrics;

pub use health::{health_check, readiness_check};
pub use metrics::metrics_endpoint;
