use serde::Deserialize;

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub auth: AuthSettings,
    pub logging: LoggingSettings,
}

/// Where the WebSocket endpoint listens and how long a fresh connection may
/// take to authenticate.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub auth_timeout_secs: u64,
}

/// Limits applied by the broker to connections and deliveries.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub max_connections: usize,
    pub delivery_timeout_ms: u64,
    /// Frames buffered per connection before deliveries start waiting.
    pub outbound_buffer: usize,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthBackend {
    Jwt,
    AccessKeys,
}

/// Which credential validator checks access keys.
#[derive(Debug, Deserialize, Clone)]
pub struct AuthSettings {
    pub backend: AuthBackend,
    pub jwt_secret: String,
    pub access_key_db: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values are filled from
/// the defaults.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub auth: Option<PartialAuthSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub auth_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialBrokerSettings {
    pub max_connections: Option<usize>,
    pub delivery_timeout_ms: Option<u64>,
    pub outbound_buffer: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialAuthSettings {
    pub backend: Option<AuthBackend>,
    pub jwt_secret: Option<String>,
    pub access_key_db: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            auth_timeout_secs: 10,
        }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            max_connections: 1000,
            delivery_timeout_ms: 5000,
            outbound_buffer: 64,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            backend: AuthBackend::Jwt,
            jwt_secret: "secret".to_string(),
            access_key_db: "roomcast_keys".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
