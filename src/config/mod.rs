//! Daemon configuration.
//!
//! Loaded from a TOML file, then overridden by `TRACKD_*` environment
//! variables, then validated. Validation collects every problem before
//! failing so a bad config is fixed in one pass.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_STORAGE_DIR: &str = "./storage";
const DEFAULT_MAX_CONCURRENT_TASKS: usize = 5;
const DEFAULT_RETENTION_DAYS: u32 = 30;
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_TRACKER_API_URL: &str = "https://project.tracker.example/open_api";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("configuration validation failed:\n{}", .0.join("\n"))]
    Invalid(Vec<String>),
}

// ─── ServiceConfig ────────────────────────────────────────────────────────────

/// Service identity (`[service]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub version: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "trackd".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// ─── StorageConfig ────────────────────────────────────────────────────────────

/// Record store configuration (`[storage]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for the `tasks/` and `workflows/` record namespaces.
    pub dir: PathBuf,
    /// Admission cap: maximum number of non-terminal tasks at once.
    pub max_concurrent_tasks: usize,
    /// Age at which the retention sweep removes terminal tasks.
    pub retention_days: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

// ─── TrackerConfig ────────────────────────────────────────────────────────────

/// External tracker credentials (`[tracker]` in config.toml). Consumed by the
/// concrete tracker client, which lives outside this crate.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub app_id: String,
    pub app_secret: String,
    pub api_url: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_secret: String::new(),
            api_url: DEFAULT_TRACKER_API_URL.to_string(),
        }
    }
}

// ─── HealthConfig ─────────────────────────────────────────────────────────────

/// Health aggregator tuning (`[health]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Per-probe timeout in seconds.
    pub probe_timeout_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
        }
    }
}

// ─── LogConfig ────────────────────────────────────────────────────────────────

/// Logging configuration (`[log]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level filter (trace, debug, info, warn, error).
    pub level: String,
    /// Write logs to daily-rotated files in this directory. None = stderr.
    pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            dir: None,
        }
    }
}

// ─── DaemonConfig ─────────────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub tracker: TrackerConfig,
    pub health: HealthConfig,
    pub log: LogConfig,
}

impl DaemonConfig {
    /// Load from a TOML file, apply environment overrides, and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        let mut config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Defaults + environment overrides, no file. Still validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("TRACKD_STORAGE_DIR") {
            self.storage.dir = PathBuf::from(dir);
        }
        if let Ok(max) = std::env::var("TRACKD_MAX_CONCURRENT_TASKS") {
            if let Ok(max) = max.parse() {
                self.storage.max_concurrent_tasks = max;
            }
        }
        if let Ok(app_id) = std::env::var("TRACKD_TRACKER_APP_ID") {
            self.tracker.app_id = app_id;
        }
        if let Ok(app_secret) = std::env::var("TRACKD_TRACKER_APP_SECRET") {
            self.tracker.app_secret = app_secret;
        }
        if let Ok(api_url) = std::env::var("TRACKD_TRACKER_API_URL") {
            self.tracker.api_url = api_url;
        }
        if let Ok(level) = std::env::var("TRACKD_LOG") {
            self.log.level = level;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.tracker.app_id.is_empty() {
            errors.push("tracker app_id is required".to_string());
        }
        if self.tracker.app_secret.is_empty() {
            errors.push("tracker app_secret is required".to_string());
        }
        if self.tracker.api_url.is_empty() {
            errors.push("tracker api_url is required".to_string());
        }
        if self.storage.max_concurrent_tasks < 1 {
            errors.push("storage max_concurrent_tasks must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> DaemonConfig {
        DaemonConfig {
            tracker: TrackerConfig {
                app_id: "app".to_string(),
                app_secret: "secret".to_string(),
                ..TrackerConfig::default()
            },
            ..DaemonConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = DaemonConfig::default();
        assert_eq!(config.storage.max_concurrent_tasks, 5);
        assert_eq!(config.storage.retention_days, 30);
        assert_eq!(config.health.probe_timeout_secs, 5);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_validation_collects_every_error() {
        let config = DaemonConfig {
            storage: StorageConfig {
                max_concurrent_tasks: 0,
                ..StorageConfig::default()
            },
            ..DaemonConfig::default()
        };
        match config.validate() {
            Err(ConfigError::Invalid(errors)) => {
                assert_eq!(errors.len(), 3);
                assert!(errors.iter().any(|e| e.contains("app_id")));
                assert!(errors.iter().any(|e| e.contains("app_secret")));
                assert!(errors.iter().any(|e| e.contains("max_concurrent_tasks")));
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_load_reads_a_file() {
        let _env = ENV_LOCK.lock().unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[tracker]\napp_id = \"app\"\napp_secret = \"secret\"\n",
        )
        .unwrap();

        let config = DaemonConfig::load(&path).unwrap();
        assert_eq!(config.tracker.app_id, "app");
        assert_eq!(config.storage.max_concurrent_tasks, 5);

        assert!(matches!(
            DaemonConfig::load(&dir.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));
    }

    // Process environment is shared across test threads, so every test that
    // reads or writes TRACKD_* variables holds this lock.
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[test]
    fn test_env_overrides_win() {
        let _env = ENV_LOCK.lock().unwrap();
        std::env::set_var("TRACKD_MAX_CONCURRENT_TASKS", "12");
        std::env::set_var("TRACKD_TRACKER_APP_ID", "env-app");
        std::env::set_var("TRACKD_TRACKER_APP_SECRET", "env-secret");

        let config = DaemonConfig::from_env().unwrap();
        assert_eq!(config.storage.max_concurrent_tasks, 12);
        assert_eq!(config.tracker.app_id, "env-app");
        assert_eq!(config.tracker.app_secret, "env-secret");

        std::env::remove_var("TRACKD_MAX_CONCURRENT_TASKS");
        std::env::remove_var("TRACKD_TRACKER_APP_ID");
        std::env::remove_var("TRACKD_TRACKER_APP_SECRET");
    }

    #[test]
    fn test_toml_sections_parse() {
        let raw = r#"
            [storage]
            dir = "/var/lib/trackd"
            max_concurrent_tasks = 8

            [tracker]
            app_id = "app"
            app_secret = "secret"

            [log]
            level = "debug"
        "#;
        let config: DaemonConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.storage.dir, PathBuf::from("/var/lib/trackd"));
        assert_eq!(config.storage.max_concurrent_tasks, 8);
        assert_eq!(config.storage.retention_days, 30);
        assert_eq!(config.log.level, "debug");
        assert!(config.validate().is_ok());
    }
}
