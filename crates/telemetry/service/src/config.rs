//! Configuration for the telemetry engine

use serde::{Deserialize, Serialize};
use telemetry_detection::DetectionConfig;

use crate::error::{EngineError, EngineResult};

/// Environment variable prefix, e.g. `TELEMETRY_DETECTION__Z_THRESHOLD=3.0`.
pub const ENV_PREFIX: &str = "TELEMETRY";

/// Main engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Window and threshold settings
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Ingestion pipeline settings
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (for development/testing)
    Memory,

    /// SQLite storage
    Sqlite {
        /// Connection URL
        #[serde(default = "default_sqlite_url")]
        url: String,

        /// Maximum connections in pool
        #[serde(default = "default_pool_size")]
        max_connections: u32,

        /// Connection timeout in seconds
        #[serde(default = "default_connection_timeout")]
        connect_timeout_secs: u64,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            url: default_sqlite_url(),
            max_connections: default_pool_size(),
            connect_timeout_secs: default_connection_timeout(),
        }
    }
}

/// Ingestion configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Upper bound on one reading's persistence, in milliseconds. `0` disables it.
    #[serde(default = "default_persistence_timeout")]
    pub persistence_timeout_ms: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            persistence_timeout_ms: default_persistence_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_sqlite_url() -> String {
    "sqlite://telemetry.db".to_string()
}

fn default_pool_size() -> u32 {
    5
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_persistence_timeout() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl EngineConfig {
    /// Load configuration: defaults, then the optional file, then `TELEMETRY_*`
    /// environment variables.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&EngineConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Nested keys use `__` so field names keep their underscores.
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Configuration backed by in-memory storage.
    pub fn in_memory() -> Self {
        Self {
            storage: StorageConfig::Memory,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.detection.validate()?;
        if let StorageConfig::Sqlite {
            url,
            max_connections,
            ..
        } = &self.storage
        {
            if url.trim().is_empty() {
                return Err(EngineError::Config("storage.url must not be empty".into()));
            }
            if *max_connections == 0 {
                return Err(EngineError::Config(
                    "storage.max_connections must be at least 1".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.detection.window_capacity, 30);
        assert_eq!(config.detection.min_samples, 2);
        assert!((config.detection.z_threshold - 2.5).abs() < f64::EPSILON);
        assert_eq!(config.ingestion.persistence_timeout_ms, 5_000);
        assert!(matches!(
            config.storage,
            StorageConfig::Sqlite { ref url, .. } if url == "sqlite://telemetry.db"
        ));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_without_file_matches_defaults() {
        let config = EngineConfig::load(None).unwrap();
        assert_eq!(config.detection, DetectionConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join(format!("telemetry-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("engine.toml");
        std::fs::write(
            &path,
            r#"
[detection]
window_capacity = 50
z_threshold = 3.0

[storage]
type = "memory"
"#,
        )
        .unwrap();

        let config = EngineConfig::load(path.to_str()).unwrap();
        assert_eq!(config.detection.window_capacity, 50);
        assert_eq!(config.detection.min_samples, 2);
        assert!((config.detection.z_threshold - 3.0).abs() < f64::EPSILON);
        assert_eq!(config.storage, StorageConfig::Memory);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_invalid_detection_rejected() {
        let mut config = EngineConfig::in_memory();
        config.detection.window_capacity = 0;
        assert!(matches!(
            config.validate(),
            Err(EngineError::Detection(_))
        ));
    }

    #[test]
    fn test_sqlite_defaults_fill_in() {
        let storage: StorageConfig =
            serde_json::from_str(r#"{"type": "sqlite", "url": "sqlite::memory:"}"#).unwrap();
        assert_eq!(
            storage,
            StorageConfig::Sqlite {
                url: "sqlite::memory:".into(),
                max_connections: 5,
                connect_timeout_secs: 5,
            }
        );
    }
}
