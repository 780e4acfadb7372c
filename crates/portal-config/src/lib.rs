//! Configuration for the client portal core.
//!
//! Values are layered: built-in defaults, then an optional YAML or TOML
//! file, then `PORTAL_*` environment overrides. The result is validated
//! before it is handed out.

mod config;
mod error;
mod loader;

pub use config::{
    PortalConfig, ResilienceConfig, ENV_CACHE_DEFAULT_TTL, ENV_CACHE_KEY_PREFIX, ENV_LOG_FORMAT,
    ENV_LOG_LEVEL, ENV_REDIS_URL,
};
pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigFormat, ConfigLoader};
