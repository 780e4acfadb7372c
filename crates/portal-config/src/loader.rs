//! Layered configuration loading: defaults, then file, then environment.

use crate::config::PortalConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use validator::Validate;

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.yaml` / `.yml`
    Yaml,
    /// `.toml`
    Toml,
}

impl ConfigFormat {
    /// Detect the format from a file extension
    ///
    /// # Errors
    /// Returns error if the extension is missing or unknown
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Parse `content` in this format
    ///
    /// # Errors
    /// Returns error if the content does not parse
    pub fn parse(self, content: &str) -> ConfigResult<PortalConfig> {
        match self {
            Self::Yaml => PortalConfig::from_yaml(content),
            Self::Toml => PortalConfig::from_toml(content),
        }
    }
}

/// Builder for loading a [`PortalConfig`]
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    use_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader that reads only defaults and environment overrides
    #[must_use]
    pub const fn new() -> Self {
        Self {
            file: None,
            use_env: true,
        }
    }

    /// Read the given YAML or TOML file on top of the defaults
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Skip `PORTAL_*` environment overrides
    #[must_use]
    pub const fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Load, apply overrides and validate
    ///
    /// # Errors
    /// Returns error if the file can't be read or parsed, an override is
    /// malformed, or the result fails validation
    pub async fn load(&self) -> ConfigResult<PortalConfig> {
        let mut config = match &self.file {
            Some(path) => {
                let format = ConfigFormat::from_path(path)?;
                let content = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| ConfigError::Io {
                        path: path.clone(),
                        source,
                    })?;
                debug!(path = %path.display(), ?format, "Read config file");
                format.parse(&content)?
            }
            None => PortalConfig::default(),
        };

        if self.use_env {
            config.apply_env()?;
        }

        config.validate()?;

        info!(
            file = ?self.file,
            breakers = config.resilience.breakers.len(),
            distributed_cache = config.cache.redis_url.is_some(),
            "Configuration loaded"
        );
        Ok(config)
    }
}
