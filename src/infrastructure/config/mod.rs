mod settings;

pub use settings::{
    DatabaseConfig, JwtConfig, LoggingConfig, OtelConfig, PushConfig, ServerConfig, Settings,
    StoreConfig, VapidConfig,
};
