//! VAPID (RFC 8292) server identification.
//!
//! The server key pair is loaded once at startup. Every push request carries
//! a short-lived ES256 JWT whose audience is the origin of the subscription's
//! endpoint, plus the server public key.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use p256::{PublicKey, SecretKey};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::VapidConfig;

/// Lifetime of a VAPID token. Push services reject anything above 24 hours.
pub const TOKEN_LIFETIME_SECONDS: i64 = 12 * 60 * 60;

/// Errors raised while loading the server key pair.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("{which} key is not valid base64url: {source}")]
    Encoding {
        which: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("private key is not a P-256 PKCS#8 key: {0}")]
    InvalidPrivateKey(String),

    #[error("public key is not an uncompressed P-256 point")]
    InvalidPublicKey,

    #[error("configured public key does not belong to the private key")]
    Mismatch,
}

/// Errors raised while producing a VAPID token.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("endpoint {endpoint:?} is not a valid push URL: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("failed to sign token: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
}

/// The application server's P-256 identity.
#[derive(Clone)]
pub struct ServerKeyPair {
    encoding_key: EncodingKey,
    public_key: PublicKey,
    public_key_b64: String,
}

impl std::fmt::Debug for ServerKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerKeyPair")
            .field("public_key", &self.public_key_b64)
            .finish_non_exhaustive()
    }
}

impl ServerKeyPair {
    pub fn from_config(config: &VapidConfig) -> Result<Self, KeyError> {
        Self::from_base64url(&config.public_key, &config.private_key)
    }

    /// Load the key pair from its base64url encodings.
    ///
    /// The private key is PKCS#8 DER. A bare 32-byte scalar, as emitted by
    /// the common `web-push` key generators, is accepted too. Trailing `=`
    /// padding is tolerated on both keys.
    pub fn from_base64url(public_key_b64: &str, private_key_b64: &str) -> Result<Self, KeyError> {
        let private_bytes = decode_b64url(private_key_b64, "private")?;
        let secret_key = if private_bytes.len() == 32 {
            SecretKey::from_slice(&private_bytes)
                .map_err(|e| KeyError::InvalidPrivateKey(e.to_string()))?
        } else {
            SecretKey::from_pkcs8_der(&private_bytes)
                .map_err(|e| KeyError::InvalidPrivateKey(e.to_string()))?
        };

        let public_bytes = decode_b64url(public_key_b64, "public")?;
        if public_bytes.len() != 65 || public_bytes[0] != 0x04 {
            return Err(KeyError::InvalidPublicKey);
        }
        let public_key =
            PublicKey::from_sec1_bytes(&public_bytes).map_err(|_| KeyError::InvalidPublicKey)?;

        if secret_key.public_key() != public_key {
            return Err(KeyError::Mismatch);
        }

        // Re-encode so the signer always sees a canonical PKCS#8 document
        let pkcs8 = secret_key
            .to_pkcs8_der()
            .map_err(|e| KeyError::InvalidPrivateKey(e.to_string()))?;

        Ok(Self {
            encoding_key: EncodingKey::from_ec_der(pkcs8.as_bytes()),
            public_key,
            public_key_b64: BASE64URL.encode(public_key.to_encoded_point(false).as_bytes()),
        })
    }

    /// Uncompressed public key, base64url without padding.
    ///
    /// Browsers use this as the `applicationServerKey` when subscribing.
    pub fn public_key_base64url(&self) -> &str {
        &self.public_key_b64
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

fn decode_b64url(value: &str, which: &'static str) -> Result<Vec<u8>, KeyError> {
    BASE64URL
        .decode(value.trim().trim_end_matches('='))
        .map_err(|source| KeyError::Encoding { which, source })
}

/// Claims of a VAPID token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VapidClaims {
    pub aud: String,
    pub exp: i64,
    pub sub: String,
}

/// A signed VAPID assertion bound to one push service origin.
#[derive(Debug, Clone)]
pub struct VapidToken {
    /// Compact `header.payload.signature` JWT
    pub token: String,
    pub audience: String,
    /// Expiry as Unix seconds
    pub expires_at: i64,
}

/// Origin (`scheme://host[:port]`) of a push endpoint.
pub fn audience_for(endpoint: &str) -> Result<String, SigningError> {
    let invalid = |reason: &str| SigningError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(endpoint).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "https" | "http") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }

    Ok(url.origin().ascii_serialization())
}

/// Sign a VAPID token for `endpoint`, valid for twelve hours from `now`.
pub fn sign(
    endpoint: &str,
    keys: &ServerKeyPair,
    subject: &str,
    now: DateTime<Utc>,
) -> Result<VapidToken, SigningError> {
    let audience = audience_for(endpoint)?;
    let expires_at = (now + Duration::seconds(TOKEN_LIFETIME_SECONDS)).timestamp();

    let claims = VapidClaims {
        aud: audience.clone(),
        exp: expires_at,
        sub: subject.to_string(),
    };

    // Header::new sets typ=JWT, giving {"typ":"JWT","alg":"ES256"}
    let token = encode(&Header::new(Algorithm::ES256), &claims, &keys.encoding_key)?;

    Ok(VapidToken {
        token,
        audience,
        expires_at,
    })
}

/// Value of the `Authorization` header for a push request.
pub fn authorization_header(token: &VapidToken, keys: &ServerKeyPair) -> String {
    format!("vapid t={}, k={}", token.token, keys.public_key_base64url())
}
