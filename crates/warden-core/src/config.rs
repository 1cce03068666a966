use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{WardenError, WardenResult};
use crate::types::Algorithm;

/// Top-level configuration (loaded from warden.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Application discriminator; providers with different names cannot
    /// read each other's payloads even when sharing a key ring
    pub application_name: Option<String>,
    pub keys: KeysConfig,
    pub repository: RepositoryConfig,
    pub logging: LoggingConfig,
}

/// Key generation and rotation policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Algorithm for newly generated keys (default: xchacha20-poly1305)
    pub algorithm: Algorithm,
    /// Lifetime of a generated key in days (default: 90)
    pub lifetime_days: u64,
    /// Generate a replacement when the current key expires within this many days (default: 2)
    pub renewal_window_days: u64,
    /// Generate keys automatically when none is current (default: true)
    pub auto_generate: bool,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            lifetime_days: 90,
            renewal_window_days: 2,
            auto_generate: true,
        }
    }
}

/// Where key material is persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Directory holding one JSON document per key; `None` keeps keys in memory
    pub directory: Option<PathBuf>,
    /// Warn if key files are readable by group or others (default: true)
    pub file_mode_check: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_mode_check: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or EnvFilter directive (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl WardenConfig {
    /// Parse a configuration document.
    pub fn from_toml_str(content: &str) -> WardenResult<Self> {
        let config: WardenConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> WardenResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WardenError::Config(format!("reading config {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    fn validate(&self) -> WardenResult<()> {
        if let Some(name) = &self.application_name {
            if name.is_empty() {
                return Err(WardenError::Config(
                    "application_name must not be empty when set".into(),
                ));
            }
        }
        if self.keys.lifetime_days == 0 {
            return Err(WardenError::Config("keys.lifetime_days must be positive".into()));
        }
        if self.keys.renewal_window_days >= self.keys.lifetime_days {
            return Err(WardenError::Config(format!(
                "keys.renewal_window_days ({}) must be shorter than keys.lifetime_days ({})",
                self.keys.renewal_window_days, self.keys.lifetime_days
            )));
        }
        match self.logging.format.as_str() {
            "json" | "text" => Ok(()),
            other => Err(WardenError::Config(format!(
                "logging.format must be \"json\" or \"text\", got {other:?}"
            ))),
        }
    }
}
