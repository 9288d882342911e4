//! API layer - HTTP endpoint handlers organized by domain.

mod health;
mod metrics;
mod routes;

pub use health::health;
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
