//! Headless client configuration, read from environment variables.

use std::env;
use std::time::Duration;

pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:3000/ws";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub ws_url: url::Url,
    /// Frame loop rate
    pub fps: u32,
    /// Drive own rods automatically
    pub autopilot: bool,
    /// Start a new match this long after the result is shown; never when unset
    pub auto_restart: Option<Duration>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {name}")]
    InvalidValue { name: &'static str, value: String },

    #[error("invalid server url {value:?}: {source}")]
    InvalidUrl {
        value: String,
        source: url::ParseError,
    },

    #[error("server url must use ws or wss, got {0:?}")]
    UnsupportedScheme(String),

    #[error("{0}")]
    Invalid(&'static str),
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_url = lookup("FOOSBALL_WS_URL").unwrap_or_else(|| DEFAULT_WS_URL.to_string());
        let ws_url = url::Url::parse(raw_url.trim()).map_err(|source| ConfigError::InvalidUrl {
            value: raw_url.clone(),
            source,
        })?;
        let mut config = Self {
            ws_url,
            fps: 60,
            autopilot: true,
            auto_restart: Some(Duration::from_secs(3)),
        };

        if let Some(v) = lookup("FOOSBALL_FPS") {
            config.fps = parse_var("FOOSBALL_FPS", &v)?;
        }
        if let Some(v) = lookup("FOOSBALL_AUTOPILOT") {
            config.autopilot = parse_var("FOOSBALL_AUTOPILOT", &v)?;
        }
        if let Some(v) = lookup("FOOSBALL_AUTO_RESTART_SECS") {
            let secs: f64 = parse_var("FOOSBALL_AUTO_RESTART_SECS", &v)?;
            if !secs.is_finite() {
                return Err(ConfigError::InvalidValue {
                    name: "FOOSBALL_AUTO_RESTART_SECS",
                    value: v,
                });
            }
            config.auto_restart = if secs < 0.0 {
                None
            } else {
                Some(Duration::from_secs_f64(secs))
            };
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.ws_url.scheme() {
            "ws" | "wss" => {}
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
        if self.fps == 0 || self.fps > 1000 {
            return Err(ConfigError::Invalid("fps must be in 1..=1000"));
        }
        Ok(())
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps))
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
    })
}
