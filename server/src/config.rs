use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::connection::ConnectionOptions;
use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::server::ServerOptions;

/// Process configuration, read from the environment (and `.env` if present).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Drawing events kept for late joiners.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    /// Connections silent for longer than this are dropped.
    #[serde(default = "default_client_timeout_secs")]
    pub client_timeout_secs: u64,
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable error: {0}")]
    Env(#[from] envy::Error),
    #[error("HISTORY_LIMIT must be at least 1")]
    ZeroHistoryLimit,
    #[error("OUTBOUND_BUFFER must be at least 2, got {0}")]
    OutboundBufferTooSmall(usize),
    #[error("CLIENT_TIMEOUT_SECS ({timeout}) must exceed HEARTBEAT_INTERVAL_SECS ({heartbeat})")]
    TimeoutBeforeHeartbeat { heartbeat: u64, timeout: u64 },
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::validated(envy::from_env::<Config>()?)
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self::validated(envy::from_iter::<_, Config>(vars)?)
    }

    fn validated(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_limit == 0 {
            return Err(ConfigError::ZeroHistoryLimit);
        }
        // drawing-history and active-users are queued back to back on connect
        if self.outbound_buffer < 2 {
            return Err(ConfigError::OutboundBufferTooSmall(self.outbound_buffer));
        }
        if self.client_timeout_secs <= self.heartbeat_interval_secs {
            return Err(ConfigError::TimeoutBeforeHeartbeat {
                heartbeat: self.heartbeat_interval_secs,
                timeout: self.client_timeout_secs,
            });
        }
        Ok(())
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            history_limit: self.history_limit,
        }
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs),
            client_timeout: Duration::from_secs(self.client_timeout_secs),
            outbound_buffer: self.outbound_buffer,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            history_limit: default_history_limit(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            client_timeout_secs: default_client_timeout_secs(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_heartbeat_interval_secs() -> u64 {
    25
}

fn default_client_timeout_secs() -> u64 {
    60
}

fn default_outbound_buffer() -> usize {
    1024
}
