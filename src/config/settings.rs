use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub authorize: AuthorizeConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_environment")]
    pub environment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path the WebSocket endpoint is mounted on
    #[serde(default = "default_ws_path")]
    pub ws_path: String,
    #[serde(default = "default_health_path")]
    pub health_path: String,
    /// Advertised WebSocket URL; derived from host/port/path when unset
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default)]
    pub tls: TlsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub cert_file: String,
    #[serde(default)]
    pub key_file: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeConfig {
    /// Endpoint that answers `POST` with `Authorization: Bearer <token>`
    #[serde(default)]
    pub url: String,
    /// How long a verdict stays cached, in minutes
    #[serde(default = "default_cache_ttl_minutes")]
    pub cache_ttl_minutes: u64,
    /// Request timeout for the authorization call, in seconds
    #[serde(default = "default_authorize_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedisConfig {
    #[serde(default)]
    pub nodes: Vec<RedisNodeConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisNodeConfig {
    /// `host:port` or a full `redis://` URL
    pub address: String,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    /// Capacity of the per-connection outbound queue
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_cache_ttl_minutes() -> u64 {
    5
}

fn default_authorize_timeout() -> u64 {
    10
}

fn default_outbound_buffer() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("server.ws_path", default_ws_path())?
            .set_default("server.health_path", default_health_path())?
            .set_default("authorize.cache_ttl_minutes", default_cache_ttl_minutes() as i64)?
            .set_default("authorize.timeout_secs", default_authorize_timeout() as i64)?
            .set_default("websocket.outbound_buffer", default_outbound_buffer() as i64)?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?
            .set_default("environment", run_mode.clone())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false));

        if let Ok(path) = env::var("RELAY_CONFIG") {
            builder = builder.add_source(File::with_name(&path));
        }

        // RELAY__SERVER__PORT, RELAY__AUTHORIZE__URL, ...
        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("RELAY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject configurations the relay cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.redis.nodes.is_empty() {
            return Err(ConfigError::Message(
                "redis.nodes must list at least one backend".into(),
            ));
        }
        if self.redis.nodes.iter().any(|n| n.address.trim().is_empty()) {
            return Err(ConfigError::Message("redis node address is empty".into()));
        }
        if self.server.host.is_empty() || self.server.port == 0 {
            return Err(ConfigError::Message("server.host and server.port are required".into()));
        }
        if self.authorize.url.is_empty() {
            return Err(ConfigError::Message("authorize.url is required".into()));
        }
        if self.websocket.outbound_buffer == 0 {
            return Err(ConfigError::Message(
                "websocket.outbound_buffer must be greater than 0".into(),
            ));
        }
        for (key, path) in [
            ("server.ws_path", &self.server.ws_path),
            ("server.health_path", &self.server.health_path),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::Message(format!("{} must start with '/'", key)));
            }
        }
        if self.server.tls.enabled
            && (self.server.tls.cert_file.is_empty() || self.server.tls.key_file.is_empty())
        {
            return Err(ConfigError::Message(
                "server.tls.cert_file and server.tls.key_file are required when TLS is enabled"
                    .into(),
            ));
        }
        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// URL advertised to subscribers in the subscription reply
    pub fn ws_url(&self) -> String {
        if let Some(url) = &self.server.public_url {
            return url.clone();
        }
        let scheme = if self.server.tls.enabled { "wss" } else { "ws" };
        format!(
            "{}://{}:{}{}",
            scheme, self.server.host, self.server.port, self.server.ws_path
        )
    }

}

impl AuthorizeConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_minutes.saturating_mul(60))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ws_path: default_ws_path(),
            health_path: default_health_path(),
            public_url: None,
            tls: TlsConfig::default(),
        }
    }
}

impl Default for AuthorizeConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            cache_ttl_minutes: default_cache_ttl_minutes(),
            timeout_secs: default_authorize_timeout(),
        }
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
