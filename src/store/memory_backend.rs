//! In-memory subscription store.
//!
//! Subscriptions live in a `DashMap` keyed by id, so concurrent deletes of
//! different subscriptions never contend on a shared lock. A second map from
//! `(user_id, endpoint)` to id keeps one record per browser subscription.
//! Writers lock the index entry before touching the subscription map.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::push::Subscription;

use super::{StoreError, SubscriptionStore};

#[derive(Debug, Default)]
pub struct MemorySubscriptionStore {
    subscriptions: DashMap<Uuid, Subscription>,
    endpoints: DashMap<(String, String), Uuid>,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.subscriptions.contains_key(&id)
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Subscription>, StoreError> {
        let mut subscriptions: Vec<Subscription> = self
            .subscriptions
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        subscriptions.sort_by_key(|s| s.created_at);
        Ok(subscriptions)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let key = match self.subscriptions.get(&id) {
            Some(subscription) => (subscription.user_id.clone(), subscription.endpoint.clone()),
            None => return Ok(false),
        };

        match self.endpoints.entry(key) {
            Entry::Occupied(entry) => {
                let removed = self.subscriptions.remove(&id).is_some();
                if *entry.get() == id {
                    entry.remove();
                }
                Ok(removed)
            }
            Entry::Vacant(_) => Ok(self.subscriptions.remove(&id).is_some()),
        }
    }

    async fn upsert(&self, subscription: Subscription) -> Result<Uuid, StoreError> {
        let key = (subscription.user_id.clone(), subscription.endpoint.clone());

        match self.endpoints.entry(key) {
            // Same browser re-subscribing: keep the original id, refresh the keys
            Entry::Occupied(entry) => {
                let id = *entry.get();
                match self.subscriptions.get_mut(&id) {
                    Some(mut existing) => {
                        existing.p256dh = subscription.p256dh;
                        existing.auth = subscription.auth;
                    }
                    None => {
                        self.subscriptions.insert(id, Subscription { id, ..subscription });
                    }
                }
                Ok(id)
            }
            Entry::Vacant(entry) => {
                let id = subscription.id;
                self.subscriptions.insert(id, subscription);
                entry.insert(id);
                Ok(id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription(user_id: &str, endpoint: &str) -> Subscription {
        Subscription::new(user_id, endpoint, "p256dh-key", "auth-secret")
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_user() {
        let store = MemorySubscriptionStore::new();
        store.upsert(subscription("u1", "https://push.example.com/1")).await.unwrap();
        store.upsert(subscription("u1", "https://push.example.com/2")).await.unwrap();
        store.upsert(subscription("u2", "https://push.example.com/3")).await.unwrap();

        assert_eq!(store.list_for_user("u1").await.unwrap().len(), 2);
        assert_eq!(store.list_for_user("u2").await.unwrap().len(), 1);
        assert!(store.list_for_user("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemorySubscriptionStore::new();
        let id = store.upsert(subscription("u1", "https://push.example.com/1")).await.unwrap();

        assert!(store.delete(id).await.unwrap());
        assert!(!store.delete(id).await.unwrap());
        assert!(!store.delete(Uuid::new_v4()).await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_endpoint() {
        let store = MemorySubscriptionStore::new();
        let first = store.upsert(subscription("u1", "https://push.example.com/1")).await.unwrap();

        let mut renewed = subscription("u1", "https://push.example.com/1");
        renewed.auth = "new-auth".to_string();
        let second = store.upsert(renewed).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
        let stored = store.list_for_user("u1").await.unwrap();
        assert_eq!(stored[0].auth, "new-auth");

        // Another user on the same endpoint is a separate record
        store.upsert(subscription("u2", "https://push.example.com/1")).await.unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_upserts_keep_one_record() {
        let store = std::sync::Arc::new(MemorySubscriptionStore::new());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .upsert(subscription("u1", "https://push.example.com/same"))
                        .await
                })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(store.len(), 1);
        assert!(ids.iter().all(|id| *id == ids[0]));
        assert!(store.contains(ids[0]));
    }

    #[tokio::test]
    async fn test_resubscribe_after_delete_is_new_record() {
        let store = MemorySubscriptionStore::new();
        let first = store.upsert(subscription("u1", "https://push.example.com/1")).await.unwrap();
        assert!(store.delete(first).await.unwrap());

        let second = store.upsert(subscription("u1", "https://push.example.com/1")).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_deletes() {
        let store = std::sync::Arc::new(MemorySubscriptionStore::new());
        let mut ids = Vec::new();
        for i in 0..20 {
            let endpoint = format!("https://push.example.com/{}", i);
            ids.push(store.upsert(subscription("u1", &endpoint)).await.unwrap());
        }

        let handles: Vec<_> = ids
            .into_iter()
            .map(|id| {
                let store = store.clone();
                tokio::spawn(async move { store.delete(id).await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().unwrap());
        }
        assert!(store.is_empty());
    }
}
