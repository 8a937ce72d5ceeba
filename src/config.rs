//! Configuration store for the bot.
//!
//! This module defines the persisted configuration record and the
//! [`ConfigStore`] that loads, generates and rewrites it. The record is a flat
//! JSON document, every mutation rewrites the whole file.
//!
//! # Configuration File Format
//!
//! ```json
//! {
//!   "token": "syt_matrix_access_token",
//!   "user_id": "@mcqbot:matrix.org",
//!   "device_id": "ABCDEFGHIJ",
//!   "server": "play.example.com",
//!   "port": 25565,
//!   "channel": "",
//!   "manager_level": 50
//! }
//! ```
//!
//! - `token`, `user_id`, `device_id`: Matrix session of the bot account
//! - `server`, `port`: default Minecraft server for `query`, `status` and `start-server`
//! - `channel`: sole room the bot answers in, empty means every room
//! - `manager_level`: power level granting the `Bot Manager` role

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Format, Json, Serialized},
};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};

use crate::status::{DEFAULT_PORT, ServerAddress};

/// Default power level required for the `Bot Manager` role.
pub const DEFAULT_MANAGER_LEVEL: i64 = 50;

/// Persisted configuration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Matrix access token of the bot account
    pub token: String,
    /// Matrix user id of the bot account
    pub user_id: String,
    /// Matrix device id bound to the access token
    pub device_id: String,
    /// Default Minecraft server host
    pub server: String,
    /// Default Minecraft server port
    pub port: u16,
    /// Sole response channel, empty means every channel
    pub channel: String,
    /// Power level granting the manager role
    pub manager_level: i64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            token: String::new(),
            user_id: String::new(),
            device_id: String::new(),
            server: String::new(),
            port: DEFAULT_PORT,
            channel: String::new(),
            manager_level: DEFAULT_MANAGER_LEVEL,
        }
    }
}

/// Values given on the command line, merged over a base record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub token: Option<String>,
    pub server: Option<String>,
    pub port: Option<u16>,
}

impl ConfigOverrides {
    /// Whether at least one value is overridden.
    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.server.is_none() && self.port.is_none()
    }

    fn apply(&self, config: &mut Config) {
        if let Some(token) = &self.token {
            config.token = token.clone();
        }
        if let Some(server) = &self.server {
            config.server = server.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
    }
}

/// Errors raised by the configuration store.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No configuration file, a new one must be generated.
    #[error("configuration file {0} not found")]
    Missing(PathBuf),
    /// A required field is empty.
    #[error("no {0} found")]
    Incomplete(&'static str),
    /// The file exists but cannot be parsed.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// In-memory configuration bound to its file.
///
/// # Examples
///
/// ```no_run
/// use mcqbot::config::{ConfigError, ConfigOverrides, ConfigStore};
///
/// # async fn example() -> Result<(), ConfigError> {
/// let mut store = match ConfigStore::load("config.json").await {
///     Ok(store) => store,
///     Err(ConfigError::Missing(_)) => {
///         ConfigStore::generate("config.json", &ConfigOverrides::default()).await?
///     }
///     Err(e) => return Err(e),
/// };
/// store.set_restricted_channel("general").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigStore {
    /// Path of the JSON file
    path: PathBuf,
    /// Current record
    config: Config,
}

impl ConfigStore {
    /// Loads the configuration from `path`.
    ///
    /// Absent fields take their default value.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Missing`] if the file does not exist
    /// - [`ConfigError::Invalid`] if the file cannot be parsed
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        if !fs::try_exists(&path).await.unwrap_or_default() {
            return Err(ConfigError::Missing(path));
        }

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Json::file(&path))
            .extract()
            .map_err(Box::new)?;

        info!("loaded configuration from {}", path.display());
        debug!("server={} port={} channel={}", config.server, config.port, config.channel);

        Ok(ConfigStore { path, config })
    }

    /// Generates a new configuration from the defaults merged with `overrides`
    /// and persists it immediately.
    pub async fn generate(
        path: impl AsRef<Path>,
        overrides: &ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        overrides.apply(&mut config);

        let store = ConfigStore {
            path: path.as_ref().to_path_buf(),
            config,
        };
        store.persist(&store.config).await?;

        info!("generated configuration at {}", store.path.display());
        Ok(store)
    }

    /// Merges `overrides` over the loaded record and persists it.
    ///
    /// The record is left untouched when it cannot be written.
    pub async fn apply_overrides(&mut self, overrides: &ConfigOverrides) -> Result<(), ConfigError> {
        let mut config = self.config.clone();
        overrides.apply(&mut config);
        self.replace(config).await
    }

    /// Checks the fields required to connect to Matrix.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Incomplete`] naming the first empty field.
    pub fn check_complete(&self) -> Result<(), ConfigError> {
        if self.config.token.is_empty() {
            return Err(ConfigError::Incomplete("token"));
        }
        if self.config.user_id.is_empty() {
            return Err(ConfigError::Incomplete("user id"));
        }
        if self.config.device_id.is_empty() {
            return Err(ConfigError::Incomplete("device id"));
        }
        Ok(())
    }

    pub fn get_token(&self) -> &str {
        &self.config.token
    }

    pub fn get_user_id(&self) -> &str {
        &self.config.user_id
    }

    pub fn get_device_id(&self) -> &str {
        &self.config.device_id
    }

    /// Returns the configured server, `None` when no host is set.
    pub fn get_server_address(&self) -> Option<ServerAddress> {
        if self.config.server.is_empty() {
            return None;
        }
        Some(ServerAddress::new(&self.config.server, self.config.port))
    }

    /// Returns the sole response channel, empty when unrestricted.
    pub fn get_restricted_channel(&self) -> &str {
        &self.config.channel
    }

    pub fn get_manager_level(&self) -> i64 {
        self.config.manager_level
    }

    /// Sets the sole response channel and persists the configuration.
    ///
    /// An empty `name` removes the restriction. When the file cannot be
    /// written the previous channel stays in effect.
    pub async fn set_restricted_channel(&mut self, name: &str) -> Result<(), ConfigError> {
        info!("set restricted channel to '{}'", name);
        let config = Config {
            channel: name.to_owned(),
            ..self.config.clone()
        };
        self.replace(config).await
    }

    /// Persists `config`, then makes it the current record.
    async fn replace(&mut self, config: Config) -> Result<(), ConfigError> {
        self.persist(&config).await?;
        self.config = config;
        Ok(())
    }

    /// Rewrites the whole file.
    ///
    /// The record goes to a sibling temporary file which is flushed, synced and
    /// then renamed over the target, a crash never leaves a partial file.
    async fn persist(&self, config: &Config) -> Result<(), ConfigError> {
        let serialized = serde_json::to_string_pretty(config)?;

        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);

        {
            let mut file = fs::File::create(&tmp_path).await?;
            file.write_all(serialized.as_bytes()).await?;
            file.flush().await?;
            file.sync_all().await?;
        }
        fs::rename(&tmp_path, &self.path).await?;

        debug!("persisted configuration to {}", self.path.display());
        Ok(())
    }
}
