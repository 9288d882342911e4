use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Serialize;

use crate::config::PushConfig;
use crate::error::{AppError, Result};
use crate::metrics::PushMetrics;
use crate::store::SubscriptionStore;

use super::vapid::{self, ServerKeyPair};
use super::{DeliveryOutcome, DispatchResult, NotificationPayload, NotificationRequest, Subscription};

/// Bytes of a rejected push response body kept for logging
const ERROR_BODY_LOG_LIMIT: usize = 512;

/// Statistics for the push dispatcher
#[derive(Debug, Default)]
pub struct DispatcherStats {
    /// Total dispatch calls
    pub total_dispatches: AtomicU64,
    /// Deliveries accepted by a push service
    pub total_delivered: AtomicU64,
    /// Subscriptions reported gone (410)
    pub total_expired: AtomicU64,
    /// Other failed deliveries
    pub total_failed: AtomicU64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            total_dispatches: self.total_dispatches.load(Ordering::Relaxed),
            total_delivered: self.total_delivered.load(Ordering::Relaxed),
            total_expired: self.total_expired.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
        }
    }

    fn record(&self, outcome: &DeliveryOutcome) {
        let counter = match outcome {
            DeliveryOutcome::Delivered => &self.total_delivered,
            DeliveryOutcome::Expired => &self.total_expired,
            DeliveryOutcome::Failed(_) => &self.total_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub total_dispatches: u64,
    pub total_delivered: u64,
    pub total_expired: u64,
    pub total_failed: u64,
}

/// Fans a notification out to every push subscription of a user.
pub struct PushDispatcher {
    store: Arc<dyn SubscriptionStore>,
    keys: Arc<ServerKeyPair>,
    subject: String,
    client: reqwest::Client,
    ttl_seconds: u32,
    max_concurrency: usize,
    stats: DispatcherStats,
}

impl PushDispatcher {
    /// Create a dispatcher with its own HTTP client.
    ///
    /// The client's timeout bounds every delivery attempt.
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        keys: Arc<ServerKeyPair>,
        subject: impl Into<String>,
        config: &PushConfig,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(store, keys, subject, config, client))
    }

    /// Create a dispatcher around an existing HTTP client.
    pub fn with_client(
        store: Arc<dyn SubscriptionStore>,
        keys: Arc<ServerKeyPair>,
        subject: impl Into<String>,
        config: &PushConfig,
        client: reqwest::Client,
    ) -> Self {
        Self {
            store,
            keys,
            subject: subject.into(),
            client,
            ttl_seconds: config.ttl_seconds,
            max_concurrency: config.max_concurrency.max(1),
            stats: DispatcherStats::default(),
        }
    }

    /// Get dispatcher statistics
    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn keys(&self) -> &ServerKeyPair {
        &self.keys
    }

    /// Deliver `request` to every subscription of `user_id`.
    ///
    /// Only a failed subscription read or a signing failure fails the call.
    /// Per-subscription errors end up in the `failed` count.
    #[tracing::instrument(
        name = "dispatcher.dispatch",
        skip_all,
        fields(user_id = %user_id)
    )]
    pub async fn dispatch(&self, user_id: &str, request: &NotificationRequest) -> Result<DispatchResult> {
        let started = Instant::now();
        let subscriptions = self.store.list_for_user(user_id).await?;

        self.stats.total_dispatches.fetch_add(1, Ordering::Relaxed);
        PushMetrics::record_dispatch(subscriptions.len());

        if subscriptions.is_empty() {
            tracing::debug!(user_id = %user_id, "No push subscriptions for user");
            return Ok(DispatchResult::default());
        }

        let payload: Arc<str> = serde_json::to_string(&NotificationPayload::from(request))
            .map_err(|e| AppError::Internal(format!("Failed to serialize payload: {}", e)))?
            .into();

        // Sign up front so a key problem fails the call before any request goes out
        let mut outcomes = Vec::with_capacity(subscriptions.len());
        let mut deliveries = Vec::with_capacity(subscriptions.len());
        let mut tokens: HashMap<String, Arc<str>> = HashMap::new();
        let now = Utc::now();

        for subscription in subscriptions {
            let audience = match vapid::audience_for(&subscription.endpoint) {
                Ok(audience) => audience,
                Err(e) => {
                    tracing::warn!(
                        subscription_id = %subscription.id,
                        endpoint = %subscription.endpoint,
                        error = %e,
                        "Skipping subscription with invalid endpoint"
                    );
                    outcomes.push(DeliveryOutcome::Failed(e.to_string()));
                    continue;
                }
            };

            let authorization = match tokens.get(&audience) {
                Some(header) => header.clone(),
                None => {
                    let token = vapid::sign(&subscription.endpoint, &self.keys, &self.subject, now)
                        .inspect_err(|_| PushMetrics::record_signing_failure())?;
                    let header: Arc<str> = vapid::authorization_header(&token, &self.keys).into();
                    tokens.insert(audience, header.clone());
                    header
                }
            };

            deliveries.push((subscription, authorization));
        }

        let mut futures = FuturesUnordered::new();
        for (subscription, authorization) in deliveries {
            futures.push(self.deliver(subscription, authorization, payload.clone()));

            // Drain completed attempts when we hit the concurrency limit
            while futures.len() >= self.max_concurrency {
                match futures.next().await {
                    Some(outcome) => outcomes.push(outcome),
                    None => break,
                }
            }
        }

        while let Some(outcome) = futures.next().await {
            outcomes.push(outcome);
        }

        for outcome in &outcomes {
            self.stats.record(outcome);
            PushMetrics::record_outcome(outcome);
        }
        PushMetrics::record_dispatch_latency(started.elapsed().as_secs_f64());

        let result = DispatchResult::from_outcomes(&outcomes);

        tracing::info!(
            user_id = %user_id,
            successful = result.successful,
            failed = result.failed,
            total = result.total,
            "Dispatched push notification"
        );

        Ok(result)
    }

    /// One POST to one push endpoint, classified into an outcome.
    async fn deliver(
        &self,
        subscription: Subscription,
        authorization: Arc<str>,
        payload: Arc<str>,
    ) -> DeliveryOutcome {
        let response = self
            .client
            .post(&subscription.endpoint)
            .header("TTL", self.ttl_seconds.to_string())
            .header(AUTHORIZATION, authorization.as_ref())
            .header(CONTENT_TYPE, "application/json")
            .body(payload.as_ref().to_owned())
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    subscription_id = %subscription.id,
                    endpoint = %subscription.endpoint,
                    error = %e,
                    timeout = e.is_timeout(),
                    "Push delivery failed"
                );
                return DeliveryOutcome::Failed(e.to_string());
            }
        };

        let status = response.status();
        if status.is_success() {
            tracing::debug!(
                subscription_id = %subscription.id,
                status = status.as_u16(),
                "Push delivered"
            );
            return DeliveryOutcome::Delivered;
        }

        if status == StatusCode::GONE {
            self.prune(&subscription).await;
            return DeliveryOutcome::Expired;
        }

        let body = read_body_prefix(response, ERROR_BODY_LOG_LIMIT).await;
        tracing::warn!(
            subscription_id = %subscription.id,
            endpoint = %subscription.endpoint,
            status = status.as_u16(),
            body = %body,
            "Push service rejected notification"
        );
        DeliveryOutcome::Failed(format!("HTTP {}", status.as_u16()))
    }

    /// Best-effort removal of a subscription the push service no longer knows.
    async fn prune(&self, subscription: &Subscription) {
        match self.store.delete(subscription.id).await {
            Ok(removed) => {
                if removed {
                    PushMetrics::record_pruned();
                }
                tracing::info!(
                    subscription_id = %subscription.id,
                    endpoint = %subscription.endpoint,
                    removed = removed,
                    "Deleted expired subscription"
                );
            }
            Err(e) => {
                PushMetrics::record_prune_error();
                tracing::warn!(
                    subscription_id = %subscription.id,
                    error = %e,
                    "Failed to delete expired subscription"
                );
            }
        }
    }
}

/// Read at most `limit` bytes of a response body; the rest is never buffered.
async fn read_body_prefix(mut response: reqwest::Response, limit: usize) -> String {
    let mut buffer = Vec::new();
    while buffer.len() < limit {
        match response.chunk().await {
            Ok(Some(chunk)) => buffer.extend_from_slice(&chunk),
            _ => break,
        }
    }
    truncate_for_log(&buffer, limit)
}

fn truncate_for_log(bytes: &[u8], limit: usize) -> String {
    let end = bytes.len().min(limit);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::vapid::tests::test_keys;
    use crate::store::{MemorySubscriptionStore, StoreError};
    use async_trait::async_trait;
    use uuid::Uuid;

    /// Store whose reads always fail.
    struct BrokenStore;

    #[async_trait]
    impl SubscriptionStore for BrokenStore {
        fn backend_name(&self) -> &'static str {
            "broken"
        }

        async fn list_for_user(&self, _user_id: &str) -> std::result::Result<Vec<Subscription>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn delete(&self, _id: Uuid) -> std::result::Result<bool, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn upsert(&self, _subscription: Subscription) -> std::result::Result<Uuid, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    fn dispatcher(store: Arc<dyn SubscriptionStore>) -> PushDispatcher {
        PushDispatcher::new(
            store,
            Arc::new(test_keys()),
            "mailto:ops@example.com",
            &PushConfig::default(),
        )
        .unwrap()
    }

    fn request() -> NotificationRequest {
        NotificationRequest {
            title: "Title".into(),
            body: "Body".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_no_subscriptions_is_zero_result() {
        let dispatcher = dispatcher(Arc::new(MemorySubscriptionStore::new()));

        let result = dispatcher.dispatch("u1", &request()).await.unwrap();
        assert_eq!(result, DispatchResult::default());
        assert_eq!(dispatcher.stats().total_dispatches, 1);
    }

    #[tokio::test]
    async fn test_store_read_failure_aborts() {
        let dispatcher = dispatcher(Arc::new(BrokenStore));

        let result = dispatcher.dispatch("u1", &request()).await;
        assert!(matches!(result, Err(AppError::Store(_))));
    }

    #[tokio::test]
    async fn test_invalid_endpoint_counts_as_failed() {
        let store = Arc::new(MemorySubscriptionStore::new());
        store
            .upsert(Subscription::new("u1", "not-a-url", "key", "auth"))
            .await
            .unwrap();
        let dispatcher = dispatcher(store.clone());

        let result = dispatcher.dispatch("u1", &request()).await.unwrap();
        assert_eq!(result.successful, 0);
        assert_eq!(result.failed, 1);
        assert_eq!(result.total, 1);
        // Only 410 responses prune
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_error_body_truncated_for_log() {
        let body = vec![b'x'; 4096];
        assert_eq!(truncate_for_log(&body, ERROR_BODY_LOG_LIMIT).len(), ERROR_BODY_LOG_LIMIT);
        assert_eq!(truncate_for_log(b"gone", ERROR_BODY_LOG_LIMIT), "gone");

        // A split multi-byte character becomes a replacement character
        let text = "\u{e9}".repeat(300);
        let truncated = truncate_for_log(text.as_bytes(), 511);
        assert!(truncated.ends_with('\u{fffd}'));
    }

    #[test]
    fn test_stats_snapshot() {
        let stats = DispatcherStats::default();
        stats.record(&DeliveryOutcome::Delivered);
        stats.record(&DeliveryOutcome::Expired);
        stats.record(&DeliveryOutcome::Failed("HTTP 500".into()));
        stats.total_dispatches.fetch_add(1, Ordering::Relaxed);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_dispatches, 1);
        assert_eq!(snapshot.total_delivered, 1);
        assert_eq!(snapshot.total_expired, 1);
        assert_eq!(snapshot.total_failed, 1);
    }
}
