//! Request middleware

pub mod rate_limit;
pub mod request_metrics;

pub use rate_limit::{create_rate_limiter, rate_limit_middleware};
pub use request_metrics::track_metrics;
