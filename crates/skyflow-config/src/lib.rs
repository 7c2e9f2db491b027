pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_PATH_ENV: &str = "SKYFLOW_CONFIG_PATH";
const TIMEOUT_ENV: &str = "SKYFLOW_OPERATION_TIMEOUT_SECS";
const API_ENDPOINT_ENV: &str = "SKYFLOW_API_ENDPOINT";
const API_TOKEN_ENV: &str = "SKYFLOW_API_TOKEN";

/// Get the SkyFlow config directory, creating it if needed
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("skyflow");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Locate the engine configuration file
///
/// Search order:
/// 1. `SKYFLOW_CONFIG_PATH` (direct path)
/// 2. current directory: skyflow.local.yaml, skyflow.yaml
/// 3. `./.skyflow/` with the same names
/// 4. `~/.config/skyflow/config.yaml`
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;
    let candidates = ["skyflow.local.yaml", "skyflow.yaml"];

    for filename in &candidates {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let local_dir = current_dir.join(".skyflow");
    if local_dir.is_dir() {
        for filename in &candidates {
            let path = local_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("skyflow").join("config.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

/// Engine-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound for a single remote call
    pub operation_timeout_secs: u64,

    /// Leave zone out of drift comparison (zone stays immutable either way)
    pub ignore_zone_drift: bool,

    /// Recursive deletion tuning
    pub deletion: DeletionConfig,

    /// Per-zone API endpoint overrides, e.g. for staging environments
    pub zone_endpoints: BTreeMap<String, String>,

    /// Per-zone object-storage (S3) endpoint overrides
    pub storage_endpoints: BTreeMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            operation_timeout_secs: 30,
            ignore_zone_drift: false,
            deletion: DeletionConfig::default(),
            zone_endpoints: BTreeMap::new(),
            storage_endpoints: BTreeMap::new(),
        }
    }
}

/// Settings for the list-then-remove sweep over container contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeletionConfig {
    /// Capacity of the channel between the listing producer and the remover
    pub channel_capacity: usize,

    /// Maximum removals in flight at once
    pub concurrency: usize,
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            concurrency: 8,
        }
    }
}

impl EngineConfig {
    /// Load from the discovered config file, falling back to defaults when none exists
    pub fn load() -> Result<Self> {
        let config = match find_config_file() {
            Ok(path) => Self::from_file(&path)?,
            Err(ConfigError::ConfigFileNotFound) => Self::default(),
            Err(e) => return Err(e),
        };
        config.with_env_overrides()
    }

    /// Parse a YAML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides on top of file values
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(value) = std::env::var(TIMEOUT_ENV) {
            self.operation_timeout_secs =
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: TIMEOUT_ENV.to_string(),
                        message: format!("expected seconds, got '{}'", value),
                    })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.operation_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "operation_timeout_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.deletion.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "deletion.channel_capacity".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.deletion.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "deletion.concurrency".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Where DBaaS settings schemas are fetched from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSourceConfig {
    /// API base URL, e.g. `https://api-ch-gva-2.exoscale.com/v2`
    pub endpoint: String,

    /// Bearer token sent with every request
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
}

impl SchemaSourceConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Read `SKYFLOW_API_ENDPOINT` and the optional `SKYFLOW_API_TOKEN`
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var(API_ENDPOINT_ENV).map_err(|_| ConfigError::InvalidValue {
            key: API_ENDPOINT_ENV.to_string(),
            message: "not set".to_string(),
        })?;
        let endpoint = endpoint.trim().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: API_ENDPOINT_ENV.to_string(),
                message: "must not be empty".to_string(),
            });
        }

        let token = std::env::var(API_TOKEN_ENV)
            .ok()
            .filter(|token| !token.trim().is_empty());

        Ok(Self { endpoint, token })
    }
}
