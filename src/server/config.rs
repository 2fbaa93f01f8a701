//! Server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use serde::Deserialize;

use crate::server::error::Error;

/// Prefix of the environment variables read by [`ServerConfig::from_env`].
pub const ENV_PREFIX: &str = "MICROROUTE";
/// Environment variable holding the full bind address.
pub const ADDR_ENV: &str = "MICROROUTE_ADDR";
/// Environment variable overriding only the port.
pub const PORT_ENV: &str = "MICROROUTE_PORT";

/// Settings that can be overridden from the environment. Absent keys keep
/// the defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Overrides {
    addr: Option<SocketAddr>,
    port: Option<u16>,
    max_connections: Option<usize>,
    max_body_size: Option<usize>,
    read_timeout_secs: Option<u64>,
    shutdown_timeout_secs: Option<u64>,
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The address to bind to.
    pub addr: SocketAddr,
    /// The maximum number of concurrent connections.
    pub max_connections: usize,
    /// The size of each socket read.
    pub read_buffer_size: usize,
    /// The largest request head accepted, in bytes.
    pub max_header_size: usize,
    /// The largest request body accepted, in bytes.
    pub max_body_size: usize,
    /// How long a connection may take to deliver its whole request.
    pub read_timeout: Duration,
    /// How long close waits for in-flight connections before aborting them.
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080),
            max_connections: 1024,
            read_buffer_size: 8192,
            max_header_size: 16 * 1024,
            max_body_size: 1024 * 1024,
            read_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Use a different bind address.
    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    /// Keep the bind host but listen on `port`.
    pub fn with_port(mut self, port: u16) -> Self {
        self.addr.set_port(port);
        self
    }

    /// Build a configuration from the defaults and the process environment.
    ///
    /// Loads a `.env` file if present, then reads `MICROROUTE_*` variables:
    /// `MICROROUTE_ADDR` replaces the whole address, then `MICROROUTE_PORT`
    /// replaces the port. `MAX_CONNECTIONS`, `MAX_BODY_SIZE`,
    /// `READ_TIMEOUT_SECS` and `SHUTDOWN_TIMEOUT_SECS` are also recognised.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if a variable cannot be parsed.
    pub fn from_env() -> Result<Self, Error> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?;

        Self::try_from(settings)
    }

    fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(addr) = overrides.addr {
            self = self.with_addr(addr);
        }
        if let Some(port) = overrides.port {
            self = self.with_port(port);
        }
        if let Some(max_connections) = overrides.max_connections {
            self.max_connections = max_connections;
        }
        if let Some(max_body_size) = overrides.max_body_size {
            self.max_body_size = max_body_size;
        }
        if let Some(secs) = overrides.read_timeout_secs {
            self.read_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = overrides.shutdown_timeout_secs {
            self.shutdown_timeout = Duration::from_secs(secs);
        }
        self
    }
}

/// Applies the settings found in `settings` on top of the defaults.
impl TryFrom<config::Config> for ServerConfig {
    type Error = Error;

    fn try_from(settings: config::Config) -> Result<Self, Self::Error> {
        let overrides: Overrides = settings.try_deserialize()?;
        Ok(Self::default().apply(overrides))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> config::Config {
        pairs
            .iter()
            .fold(config::Config::builder(), |builder, (key, value)| {
                builder.set_override(*key, *value).unwrap()
            })
            .build()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.max_connections, 1024);
        assert_eq!(config.read_buffer_size, 8192);
    }

    #[test]
    fn test_empty_settings_keep_defaults() {
        let config = ServerConfig::try_from(settings(&[])).unwrap();
        assert_eq!(config.addr, ServerConfig::default().addr);
        assert_eq!(config.max_body_size, 1024 * 1024);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::try_from(settings(&[
            ("addr", "0.0.0.0:9000"),
            ("port", "3040"),
            ("max_connections", "16"),
            ("read_timeout_secs", "5"),
        ]))
        .unwrap();
        assert_eq!(config.addr, "0.0.0.0:3040".parse().unwrap());
        assert_eq!(config.max_connections, 16);
        assert_eq!(config.read_timeout, Duration::from_secs(5));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_values() {
        for (key, value) in [("port", "http"), ("max_connections", "many"), ("addr", "nowhere")] {
            let result = ServerConfig::try_from(settings(&[(key, value)]));
            assert!(matches!(result, Err(Error::ConfigError(_))), "{key}={value}");
        }
    }
}
