use axum::{
    routing::{get, post},
    Router,
};

use crate::server::AppState;
use crate::triggers::{notify, vapid_public_key};

use super::health::health;
use super::metrics::prometheus_metrics;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & Metrics
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        // Browser subscription bootstrap
        .route("/vapid-public-key", get(vapid_public_key))
        // Notification endpoints
        .route("/notify", post(notify))
        .nest("/api/v1", Router::new().route("/notify", post(notify)))
}
