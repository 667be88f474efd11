mod settings;

pub use settings::{
    AuthorizeConfig, LoggingConfig, RedisConfig, RedisNodeConfig, ServerConfig, Settings,
    TlsConfig, WebSocketConfig,
};
