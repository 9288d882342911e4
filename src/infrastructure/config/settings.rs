use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    pub vapid: VapidConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum accepted request body in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

/// Server identity used to sign push requests.
#[derive(Clone, Deserialize)]
pub struct VapidConfig {
    /// Uncompressed P-256 public key, base64url
    pub public_key: String,
    /// PKCS#8 DER private key, base64url
    pub private_key: String,
    /// Contact URI placed in the `sub` claim (`mailto:` or `https:`)
    pub subject: String,
}

impl std::fmt::Debug for VapidConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidConfig")
            .field("public_key", &self.public_key)
            .field("private_key", &"***")
            .field("subject", &self.subject)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Subscription store backend: "memory" or "postgres"
    #[serde(default = "default_store_backend")]
    pub backend: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    /// Value of the `TTL` header sent to push services, in seconds
    #[serde(default = "default_push_ttl")]
    pub ttl_seconds: u32,
    /// Upper bound for a single delivery attempt
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Maximum in-flight deliveries per dispatch call
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// "text" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// OpenTelemetry trace export
#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    /// OTLP gRPC endpoint
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_otel_service_name")]
    pub service_name: String,
    /// Trace sampling ratio (0.0-1.0)
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8081
}

fn default_body_limit() -> usize {
    64 * 1024
}

fn default_store_backend() -> String {
    "memory".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_push_ttl() -> u32 {
    86_400 // 24 hours
}

fn default_request_timeout() -> u64 {
    10
}

fn default_max_concurrency() -> usize {
    16
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "push-dispatch-service".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

/// Flat environment variable names and the config keys they populate.
///
/// `Environment` with a `_` separator would split `VAPID_PUBLIC_KEY` into
/// `vapid.public.key`, so multi-word keys are mapped explicitly.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("SERVER_HOST", "server.host"),
    ("SERVER_PORT", "server.port"),
    ("SERVER_BODY_LIMIT", "server.body_limit"),
    ("JWT_SECRET", "jwt.secret"),
    ("JWT_ISSUER", "jwt.issuer"),
    ("JWT_AUDIENCE", "jwt.audience"),
    ("VAPID_PUBLIC_KEY", "vapid.public_key"),
    ("VAPID_PRIVATE_KEY", "vapid.private_key"),
    ("VAPID_SUBJECT", "vapid.subject"),
    ("STORE_BACKEND", "store.backend"),
    ("DATABASE_URL", "database.url"),
    ("DATABASE_POOL_SIZE", "database.pool_size"),
    ("DATABASE_CONNECT_TIMEOUT", "database.connect_timeout_seconds"),
    ("PUSH_TTL_SECONDS", "push.ttl_seconds"),
    ("PUSH_REQUEST_TIMEOUT_SECONDS", "push.request_timeout_seconds"),
    ("PUSH_MAX_CONCURRENCY", "push.max_concurrency"),
    ("LOG_FORMAT", "logging.format"),
    ("OTEL_ENABLED", "otel.enabled"),
    ("OTEL_ENDPOINT", "otel.endpoint"),
    ("OTEL_SERVICE_NAME", "otel.service_name"),
    ("OTEL_SAMPLING_RATIO", "otel.sampling_ratio"),
];

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("store.backend", default_store_backend())?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Nested keys, e.g. APP__PUSH__MAX_CONCURRENCY
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        for (var, key) in ENV_OVERRIDES {
            builder = builder.set_override_option(*key, env::var(var).ok())?;
        }

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that would only fail later at request time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let subject = self.vapid.subject.trim();
        if !(subject.starts_with("mailto:") || subject.starts_with("https:")) {
            return Err(ConfigError::Message(format!(
                "vapid.subject must be a mailto: or https: URI, got {:?}",
                subject
            )));
        }
        if self.jwt.secret.is_empty() {
            return Err(ConfigError::Message("jwt.secret must not be empty".into()));
        }
        if self.push.max_concurrency == 0 {
            return Err(ConfigError::Message(
                "push.max_concurrency must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit: default_body_limit(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_push_ttl(),
            request_timeout_seconds: default_request_timeout(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_otel_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with_subject(subject: &str) -> Settings {
        Settings {
            server: ServerConfig::default(),
            jwt: JwtConfig {
                secret: "secret".to_string(),
                issuer: None,
                audience: None,
            },
            vapid: VapidConfig {
                public_key: "pub".to_string(),
                private_key: "priv".to_string(),
                subject: subject.to_string(),
            },
            store: StoreConfig::default(),
            database: DatabaseConfig::default(),
            push: PushConfig::default(),
            logging: LoggingConfig::default(),
            otel: OtelConfig::default(),
        }
    }

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8081);

        let push = PushConfig::default();
        assert_eq!(push.ttl_seconds, 86_400);
        assert_eq!(push.request_timeout_seconds, 10);
        assert_eq!(push.max_concurrency, 16);

        assert_eq!(StoreConfig::default().backend, "memory");
        assert!(DatabaseConfig::default().url.is_none());
        assert!(!LoggingConfig::default().is_json());

        let otel = OtelConfig::default();
        assert!(!otel.enabled);
        assert_eq!(otel.endpoint, "http://localhost:4317");
        assert_eq!(otel.sampling_ratio, 1.0);
    }

    #[test]
    fn test_subject_must_be_contact_uri() {
        assert!(settings_with_subject("mailto:ops@example.com").validate().is_ok());
        assert!(settings_with_subject("https://example.com/contact").validate().is_ok());
        assert!(settings_with_subject("ops@example.com").validate().is_err());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut settings = settings_with_subject("mailto:ops@example.com");
        settings.push.max_concurrency = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_private_key_redacted_in_debug() {
        let settings = settings_with_subject("mailto:ops@example.com");
        let debug = format!("{:?}", settings.vapid);
        assert!(debug.contains("***"));
        assert!(!debug.contains("priv\""));
    }
}
