use std::sync::Arc;
use std::time::Instant;

use crate::auth::{IdentityResolver, JwtValidator};
use crate::config::Settings;
use crate::error::Result;
use crate::push::{PushDispatcher, ServerKeyPair};
use crate::store::SubscriptionStore;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub identity: Arc<dyn IdentityResolver>,
    pub keys: Arc<ServerKeyPair>,
    pub store: Arc<dyn SubscriptionStore>,
    pub dispatcher: Arc<PushDispatcher>,
    pub started_at: Instant,
}

impl AppState {
    /// Wire the application from settings and a subscription store.
    ///
    /// Fails if the VAPID key pair cannot be loaded.
    pub fn new(settings: Settings, store: Arc<dyn SubscriptionStore>) -> Result<Self> {
        let keys = Arc::new(ServerKeyPair::from_config(&settings.vapid)?);
        let identity: Arc<dyn IdentityResolver> = Arc::new(JwtValidator::new(&settings.jwt));
        let dispatcher = Arc::new(PushDispatcher::new(
            store.clone(),
            keys.clone(),
            settings.vapid.subject.trim(),
            &settings.push,
        )?);

        tracing::info!(
            store = store.backend_name(),
            public_key = %keys.public_key_base64url(),
            "VAPID key pair loaded"
        );

        Ok(Self {
            settings: Arc::new(settings),
            identity,
            keys,
            store,
            dispatcher,
            started_at: Instant::now(),
        })
    }

    /// Replace the caller identity resolver.
    pub fn with_identity_resolver(mut self, identity: Arc<dyn IdentityResolver>) -> Self {
        self.identity = identity;
        self
    }
}
