//! Configuration loading
//!
//! Sources, later ones winning:
//! 1. built-in defaults (`Settings::default()`)
//! 2. `config/default.{toml,yaml,json}` relative to the working directory
//! 3. environment variables prefixed `ROOMCAST_`, with `__` between nested
//!    keys, e.g. `ROOMCAST_SERVER__PORT=9000` or
//!    `ROOMCAST_AUTH__BACKEND=access_keys`

mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{
    AuthBackend, AuthSettings, BrokerSettings, LoggingSettings, ServerSettings, Settings,
};

pub const ENV_PREFIX: &str = "ROOMCAST";

/// Loads the configuration from the default file and environment variables
/// and merges it over the defaults.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(merge(partial, Settings::default()))
}

fn merge(partial: PartialSettings, default: Settings) -> Settings {
    let server = partial.server.unwrap_or_default();
    let broker = partial.broker.unwrap_or_default();
    let auth = partial.auth.unwrap_or_default();
    let logging = partial.logging.unwrap_or_default();

    Settings {
        server: ServerSettings {
            host: server.host.unwrap_or(default.server.host),
            port: server.port.unwrap_or(default.server.port),
            auth_timeout_secs: server
                .auth_timeout_secs
                .unwrap_or(default.server.auth_timeout_secs),
        },
        broker: BrokerSettings {
            max_connections: broker
                .max_connections
                .unwrap_or(default.broker.max_connections),
            delivery_timeout_ms: broker
                .delivery_timeout_ms
                .unwrap_or(default.broker.delivery_timeout_ms),
            outbound_buffer: broker
                .outbound_buffer
                .unwrap_or(default.broker.outbound_buffer),
        },
        auth: AuthSettings {
            backend: auth.backend.unwrap_or(default.auth.backend),
            jwt_secret: auth.jwt_secret.unwrap_or(default.auth.jwt_secret),
            access_key_db: auth.access_key_db.unwrap_or(default.auth.access_key_db),
        },
        logging: LoggingSettings {
            level: logging.level.unwrap_or(default.logging.level),
        },
    }
}

#[cfg(test)]
mod tests;
