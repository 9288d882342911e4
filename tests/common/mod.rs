//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::EncodePrivateKey;
use p256::SecretKey;
use serde_json::json;

use push_dispatch_service::config::{
    DatabaseConfig, JwtConfig, LoggingConfig, OtelConfig, PushConfig, ServerConfig, Settings,
    StoreConfig, VapidConfig,
};
use push_dispatch_service::push::{PushDispatcher, ServerKeyPair};
use push_dispatch_service::store::SubscriptionStore;

pub const JWT_SECRET: &str = "integration-test-secret";
pub const SUBJECT: &str = "mailto:ops@example.com";

/// Deterministic VAPID key pair as (public, private) base64url strings
pub fn key_material() -> (String, String) {
    let secret = SecretKey::from_slice(&[11u8; 32]).expect("valid scalar");
    let public = secret.public_key().to_encoded_point(false);
    let pkcs8 = secret.to_pkcs8_der().expect("pkcs8 encoding");
    (
        URL_SAFE_NO_PAD.encode(public.as_bytes()),
        URL_SAFE_NO_PAD.encode(pkcs8.as_bytes()),
    )
}

pub fn server_keys() -> Arc<ServerKeyPair> {
    let (public, private) = key_material();
    Arc::new(ServerKeyPair::from_base64url(&public, &private).expect("valid key pair"))
}

pub fn push_config() -> PushConfig {
    PushConfig {
        ttl_seconds: 86_400,
        request_timeout_seconds: 2,
        max_concurrency: 4,
    }
}

pub fn dispatcher(store: Arc<dyn SubscriptionStore>) -> PushDispatcher {
    dispatcher_with(store, &push_config())
}

pub fn dispatcher_with(store: Arc<dyn SubscriptionStore>, config: &PushConfig) -> PushDispatcher {
    PushDispatcher::new(store, server_keys(), SUBJECT, config).expect("dispatcher")
}

pub fn settings() -> Settings {
    let (public_key, private_key) = key_material();
    Settings {
        server: ServerConfig::default(),
        jwt: JwtConfig {
            secret: JWT_SECRET.to_string(),
            issuer: None,
            audience: None,
        },
        vapid: VapidConfig {
            public_key,
            private_key,
            subject: SUBJECT.to_string(),
        },
        store: StoreConfig::default(),
        database: DatabaseConfig::default(),
        push: push_config(),
        logging: LoggingConfig::default(),
        otel: OtelConfig::default(),
    }
}

/// HS256 bearer token for `user_id`, signed with the test secret
pub fn bearer_token(user_id: &str) -> String {
    let claims = json!({
        "sub": user_id,
        "exp": Utc::now().timestamp() + 3600,
        "iat": Utc::now().timestamp(),
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("encode token")
}

/// Decode the claims segment of a compact JWT
pub fn jwt_claims(token: &str) -> serde_json::Value {
    let segment = token.split('.').nth(1).expect("claims segment");
    let bytes = URL_SAFE_NO_PAD.decode(segment).expect("base64url segment");
    serde_json::from_slice(&bytes).expect("json claims")
}
