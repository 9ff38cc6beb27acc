//! Client configuration.
//!
//! Settings live in a single `config.toml`, by default
//! `~/.config/homesim/config.toml`. Every section and field is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use homesim_protocol::Endpoint;

use crate::error::{ClientError, ClientResult};
use crate::poller::PollConfig;
use crate::transport::RpcTimeouts;

/// Configuration for device clients and the CLI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend address.
    pub endpoint: Endpoint,

    /// RPC timeouts.
    pub rpc: RpcSettings,

    /// Status polling.
    pub poll: PollSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcSettings {
    /// TCP connect timeout, in milliseconds.
    pub connect_timeout_ms: u64,

    /// Time allowed for one request/reply exchange, in milliseconds.
    pub call_timeout_ms: u64,

    /// How long a call waits for the channel lock before it is skipped.
    pub lock_timeout_ms: u64,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 2000,
            call_timeout_ms: 5000,
            lock_timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub interval_ms: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self { interval_ms: 500 }
    }
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults if there is
    /// no file.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            ClientError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("homesim")
    }

    pub fn rpc_timeouts(&self) -> RpcTimeouts {
        RpcTimeouts {
            connect: Duration::from_millis(self.rpc.connect_timeout_ms),
            call: Duration::from_millis(self.rpc.call_timeout_ms),
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc.lock_timeout_ms)
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig::new(Duration::from_millis(self.poll.interval_ms))
    }

    /// Rejects values that would make every call fail or spin.
    pub fn validate(&self) -> ClientResult<()> {
        if self.endpoint.host.is_empty() {
            return Err(ClientError::Config("endpoint.host must not be empty".into()));
        }
        let zero = [
            ("rpc.connect_timeout_ms", self.rpc.connect_timeout_ms),
            ("rpc.call_timeout_ms", self.rpc.call_timeout_ms),
            ("poll.interval_ms", self.poll.interval_ms),
        ]
        .into_iter()
        .find(|(_, value)| *value == 0);
        if let Some((name, _)) = zero {
            return Err(ClientError::Config(format!("{} must be greater than zero", name)));
        }
        Ok(())
    }
}
