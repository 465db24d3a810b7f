use crate::InventorySchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SMD_URL: &str = "http://localhost:27779/hsm/v2";
pub const DEFAULT_PCS_URL: &str = "http://localhost:28007";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to write config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("{0} url must not be empty")]
    EmptyUrl(&'static str),
    #[error("timeout_secs must be greater than zero")]
    ZeroTimeout,
    #[error("HOME not set")]
    NoHome,
}

/// Where SMD and PCS live and how long a single request may take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub inventory: InventoryConfig,
    #[serde(default)]
    pub power: PowerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InventoryConfig {
    #[serde(default = "default_smd_url")]
    pub url: String,
    #[serde(default)]
    pub schema: InventorySchema,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PowerConfig {
    #[serde(default = "default_pcs_url")]
    pub url: String,
}

fn default_timeout_secs() -> u64 {
    crate::DEFAULT_TIMEOUT.as_secs()
}

fn default_smd_url() -> String {
    DEFAULT_SMD_URL.to_owned()
}

fn default_pcs_url() -> String {
    DEFAULT_PCS_URL.to_owned()
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            url: default_smd_url(),
            schema: InventorySchema::default(),
        }
    }
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            url: default_pcs_url(),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            inventory: InventoryConfig::default(),
            power: PowerConfig::default(),
        }
    }
}

impl EndpointConfig {
    /// Point both authorities at explicit base URLs, keeping other defaults.
    pub fn new(smd_url: &str, pcs_url: &str) -> Self {
        let mut config = Self::default();
        config.inventory.url = smd_url.to_owned();
        config.power.url = pcs_url.to_owned();
        config.normalized()
    }

    #[must_use]
    pub fn with_schema(mut self, schema: InventorySchema) -> Self {
        self.inventory.schema = schema;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.inventory.url = self.inventory.url.trim_end_matches('/').to_owned();
        self.power.url = self.power.url.trim_end_matches('/').to_owned();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inventory.url.trim().is_empty() {
            return Err(ConfigError::EmptyUrl("inventory"));
        }
        if self.power.url.trim().is_empty() {
            return Err(ConfigError::EmptyUrl("power"));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EndpointConfig = toml::from_str(content)?;
        let config = config.normalized();
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load `~/.config/nodepower/config.toml`, or defaults if it does not exist.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path()?;
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = std::env::var("HOME").map_err(|_| ConfigError::NoHome)?;
    Ok(PathBuf::from(home).join(".config/nodepower/config.toml"))
}
