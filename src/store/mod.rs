//! Push subscription storage.
//!
//! The dispatcher reads subscriptions per user and prunes the ones a push
//! service reports as gone. Two backends implement [`SubscriptionStore`]:
//!
//! - `MemorySubscriptionStore`: DashMap keyed by subscription id (default)
//! - `PostgresSubscriptionStore`: `push_subscriptions` table
//!
//! Use `create_subscription_store()` to pick one from configuration.

mod memory_backend;
mod postgres_backend;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::postgres::PostgresPool;
use crate::push::Subscription;

pub use memory_backend::MemorySubscriptionStore;
pub use postgres_backend::PostgresSubscriptionStore;

/// Errors that can occur during subscription store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// Backend is temporarily unavailable
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Durable mapping from user id to push subscriptions.
///
/// Deletes are keyed by subscription id and must be safe to run concurrently.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Backend identifier, e.g. "memory"
    fn backend_name(&self) -> &'static str;

    /// All subscriptions registered for `user_id`.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Subscription>, StoreError>;

    /// Remove a subscription. Returns `false` if it did not exist.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Insert a subscription, replacing any existing one with the same
    /// `(user_id, endpoint)`. Returns the id of the stored record.
    async fn upsert(&self, subscription: Subscription) -> Result<Uuid, StoreError>;
}

/// Create a subscription store based on configuration.
///
/// Returns the appropriate backend implementation based on the `backend` setting:
/// - `"postgres"`: Returns a `PostgresSubscriptionStore` if a PostgreSQL pool is provided
/// - `"memory"` (default): Returns a `MemorySubscriptionStore`
pub fn create_subscription_store(
    settings: &StoreConfig,
    postgres_pool: Option<Arc<PostgresPool>>,
) -> Arc<dyn SubscriptionStore> {
    match settings.backend.as_str() {
        "postgres" => {
            if let Some(pool) = postgres_pool {
                tracing::info!(
                    backend = "postgres",
                    database_url = %pool.database_url_masked(),
                    "Creating PostgreSQL subscription store"
                );
                Arc::new(PostgresSubscriptionStore::new(pool.pool().clone()))
            } else {
                tracing::warn!(
                    "PostgreSQL store requested but no pool provided, falling back to memory"
                );
                Arc::new(MemorySubscriptionStore::new())
            }
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory subscription store");
            Arc::new(MemorySubscriptionStore::new())
        }
    }
}
