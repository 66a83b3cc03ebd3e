use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::common::config::load_config;

/// Port used when neither the config file nor `PORT` sets one.
pub const DEFAULT_PORT: u16 = 3000;

/// Complete server configuration loaded from TOML file.
///
/// Every section is optional; missing values fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ListenConfig,
    pub assets: AssetsConfig,
    pub poll: PollConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Interface to bind (e.g. "0.0.0.0")
    pub bind: String,
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Directories served as static front-end assets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Served at `/`
    pub public_dir: PathBuf,
    /// Served at `/sound`
    pub sound_dir: PathBuf,
    /// Served at `/video`
    pub video_dir: PathBuf,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            public_dir: PathBuf::from("public"),
            sound_dir: PathBuf::from("sound"),
            video_dir: PathBuf::from("video"),
        }
    }
}

/// Poll behaviour switches. Both are off by default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Count at most one vote per connection per round.
    pub dedup_votes: bool,
    /// When set, role "admin" must present this token and only granted
    /// admins may issue `admin:*` commands.
    pub admin_token: Option<String>,
}

impl ServerConfig {
    /// Load server configuration from a TOML file.
    ///
    /// # Example
    /// ```ignore
    /// let config = ServerConfig::from_file("config/server.toml")?;
    /// ```
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        load_config(path)
    }

    /// Apply command-line / environment overrides on top of the file values.
    pub fn with_overrides(mut self, bind: Option<String>, port: Option<u16>) -> Self {
        if let Some(bind) = bind {
            self.server.bind = bind;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
        self
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }
}
