use serde::{Deserialize, Serialize};
use std::{
    fs::read_to_string,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::SchemaflowError;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";
pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:8080/ws";
/// Quiet period after the last write event before a change counts as settled.
pub const DEFAULT_STABILITY_THRESHOLD_MS: u64 = 2000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_stability_threshold_ms() -> u64 {
    DEFAULT_STABILITY_THRESHOLD_MS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

/// Settings for [`crate::server::SyncServer`].
///
/// ```toml
/// schema_path = "prisma/schema.prisma"
/// listen = "127.0.0.1:8081"
/// stability_threshold_ms = 500
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub schema_path: PathBuf,
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    #[serde(default = "default_stability_threshold_ms")]
    pub stability_threshold_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl ServerConfig {
    pub fn new(schema_path: impl Into<PathBuf>) -> Self {
        ServerConfig {
            schema_path: schema_path.into(),
            listen: default_listen(),
            stability_threshold_ms: DEFAULT_STABILITY_THRESHOLD_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, SchemaflowError> {
        let config: ServerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaflowError> {
        tracing::debug!("Reading server config from {:?}", path.as_ref());
        let content = read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), SchemaflowError> {
        if self.stability_threshold_ms == 0 {
            return Err(SchemaflowError::Config(
                "stability_threshold_ms must be greater than zero".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(SchemaflowError::Config(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn settle_window(&self) -> Duration {
        Duration::from_millis(self.stability_threshold_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub endpoint: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}
