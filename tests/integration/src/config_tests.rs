//! Configuration integration tests
//!
//! Loads a full file and wires the resulting configuration into the
//! services it describes.

use crate::fixtures::*;
use crate::helpers::*;
use portal_cache::CacheService;
use portal_config::{ConfigError, ConfigLoader, PortalConfig};
use portal_dashboard::{DashboardService, InvalidationScope};
use portal_resilience::{CircuitState, ExecuteOptions};
use pretty_assertions::assert_eq;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

const PORTAL_YAML: &str = r#"
cache:
  key_prefix: acme-portal
  namespace: dashboards
  default_ttl: 2m
resilience:
  breakers:
    analytics-db:
      failure_threshold: 3
      success_threshold: 1
      timeout: 2s
      reset_timeout: 5000ms
  default_retry:
    max_attempts: 2
    base_delay: 10ms
dashboard:
  global_stats_ttl: 10m
  recent_projects_limit: 1
logging:
  level: warn
"#;

fn config_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_loaded_config_wires_services() {
    init_tracing();
    let file = config_file(".yml", PORTAL_YAML);
    let config = ConfigLoader::new()
        .with_file(file.path())
        .without_env()
        .load()
        .await
        .unwrap();

    assert_eq!(config.cache.default_ttl, Duration::from_secs(120));
    assert_eq!(config.dashboard.global_stats_ttl, Duration::from_secs(600));
    assert_eq!(config.logging.level, "warn");

    let resilience = Arc::new(config.resilience.build_service());
    assert_eq!(resilience.keys(), vec!["analytics-db".to_string()]);
    assert_eq!(
        resilience.circuit_breaker_state("analytics-db").unwrap(),
        CircuitState::Closed
    );

    let cache = CacheService::from_config(&config.cache).await.unwrap();
    assert_eq!(cache.build_key("global-stats"), "acme-portal:dashboards:global-stats");
    assert_eq!(cache.default_ttl(), Duration::from_secs(120));

    let service = DashboardService::new(cache, seeded_store(), config.dashboard.clone()).with_resilience(
        resilience,
        "analytics-db",
        ExecuteOptions::new().with_retry(config.resilience.default_retry.clone()),
    );
    let acme = service.user_dashboard(ACME).await.unwrap();
    assert_eq!(acme.recent_projects.len(), 1);
    assert_eq!(service.invalidate_caches(InvalidationScope::Users).await, 1);
}

#[test]
fn test_toml_and_yaml_agree() {
    let yaml = PortalConfig::from_yaml("cache:\n  namespace: reports\n  max_entries: 50\n").unwrap();
    let toml = PortalConfig::from_toml("[cache]\nnamespace = \"reports\"\nmax_entries = 50\n").unwrap();
    assert_eq!(yaml.cache, toml.cache);
    assert_eq!(yaml.dashboard, toml.dashboard);
}

#[tokio::test]
async fn test_invalid_file_is_rejected() {
    let file = config_file(
        ".toml",
        "[resilience.default_retry]\nbase_delay = \"5s\"\nmax_delay = \"1s\"\n",
    );
    let err = ConfigLoader::new()
        .with_file(file.path())
        .without_env()
        .load()
        .await
        .unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));

    let file = config_file(".json", "{}");
    let err = ConfigLoader::new().with_file(file.path()).load().await.unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
}
