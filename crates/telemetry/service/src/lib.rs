//! # telemetry-service
//!
//! Ingestion and query entry points of the telemetry anomaly engine.
//!
//! [`Engine`] wires one storage backend to both services:
//!
//! ```text
//!                 ┌──────────────────────┐
//!   NewReading ──▶│   IngestionService   │── WindowStore + AnomalyDetector
//!                 └──────────┬───────────┘
//!                            │ record(reading, anomaly?)
//!                            ▼
//!                 ┌──────────────────────┐
//!                 │    TelemetryStore    │  memory | sqlite
//!                 └──────────┬───────────┘
//!                            │
//!                 ┌──────────┴───────────┐
//!   queries ─────▶│     QueryService     │
//!                 └──────────────────────┘
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod ingestion;
pub mod query;

use std::sync::Arc;

use telemetry_storage::{InMemoryTelemetryStore, SqliteTelemetryStore, TelemetryStore};
use tracing::info;

pub use config::{EngineConfig, IngestionConfig, LoggingConfig, StorageConfig};
pub use error::{EngineError, EngineResult};
pub use ingestion::{IngestionResult, IngestionService};
pub use query::{PlotSeries, QueryService, DEFAULT_PLOT_LIMIT, DEFAULT_RECENT_COUNT};

/// Ingestion and query services sharing one storage backend.
pub struct Engine {
    pub ingestion: IngestionService,
    pub query: QueryService,
}

impl Engine {
    /// Validate `config` and connect the configured storage backend.
    pub async fn connect(config: &EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        match &config.storage {
            StorageConfig::Memory => {
                info!("using in-memory storage");
                Ok(Self::with_store(config, Arc::new(InMemoryTelemetryStore::new())))
            }
            StorageConfig::Sqlite {
                url,
                max_connections,
                connect_timeout_secs,
            } => {
                let store = SqliteTelemetryStore::connect_with_options(
                    url,
                    *max_connections,
                    *connect_timeout_secs,
                )
                .await?;
                info!(url = %url, "using sqlite storage");
                Ok(Self::with_store(config, Arc::new(store)))
            }
        }
    }

    /// Build on an already constructed store.
    pub fn with_store<S>(config: &EngineConfig, store: Arc<S>) -> Self
    where
        S: TelemetryStore + 'static,
    {
        Self {
            ingestion: IngestionService::new(&config.detection, &config.ingestion, store.clone()),
            query: QueryService::new(store),
        }
    }
}
