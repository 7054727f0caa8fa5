//! Server configuration, read from environment variables.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use foosball_shared::config::TableConfig;
use foosball_shared::side::Side;

pub const DEFAULT_PORT: u16 = 3000;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Text frames longer than this close the connection
    pub max_message_bytes: usize,
    /// Unparsable frames tolerated before the connection is closed
    pub max_parse_errors: u32,
    /// Capacity of the delivery broadcast channel
    pub delivery_capacity: usize,
    /// Directory with the web client, served at `/` when set
    pub static_dir: Option<PathBuf>,
    /// Side whose ball and score updates are authoritative
    pub authority: Side,
    pub table: TableConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: format!("0.0.0.0:{}", DEFAULT_PORT),
            max_message_bytes: 1024,
            max_parse_errors: 5,
            delivery_capacity: 256,
            static_dir: None,
            authority: Side::P1,
            table: TableConfig::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {name}")]
    InvalidValue { name: &'static str, value: String },

    #[error("invalid listen address {0:?}")]
    InvalidAddress(String),

    #[error("invalid table rules: {0}")]
    InvalidTable(String),

    #[error("{0}")]
    Invalid(&'static str),
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// `FOOSBALL_LISTEN_ADDR` takes precedence over `PORT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(addr) = lookup("FOOSBALL_LISTEN_ADDR") {
            config.listen_addr = addr;
        } else if let Some(port) = lookup("PORT") {
            let port: u16 = parse_var("PORT", &port)?;
            config.listen_addr = format!("0.0.0.0:{}", port);
        }

        if let Some(v) = lookup("FOOSBALL_MAX_MESSAGE_BYTES") {
            config.max_message_bytes = parse_var("FOOSBALL_MAX_MESSAGE_BYTES", &v)?;
        }
        if let Some(v) = lookup("FOOSBALL_MAX_PARSE_ERRORS") {
            config.max_parse_errors = parse_var("FOOSBALL_MAX_PARSE_ERRORS", &v)?;
        }
        if let Some(dir) = lookup("FOOSBALL_STATIC_DIR").filter(|d| !d.is_empty()) {
            config.static_dir = Some(PathBuf::from(dir));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidAddress(self.listen_addr.clone()))?;
        if self.max_message_bytes == 0 {
            return Err(ConfigError::Invalid("max_message_bytes must be > 0"));
        }
        if self.delivery_capacity == 0 {
            return Err(ConfigError::Invalid("delivery_capacity must be > 0"));
        }
        self.table.validate().map_err(ConfigError::InvalidTable)?;
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
    })
}
