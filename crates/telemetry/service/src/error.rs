//! Error types for the ingestion and query services

use telemetry_detection::DetectionError;
use telemetry_storage::StorageError;
use telemetry_types::ValidationError;
use thiserror::Error;

/// Engine-level errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// The submitted reading was rejected before any state changed
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Window bookkeeping failed
    #[error("Detection error: {0}")]
    Detection(#[from] DetectionError),

    /// Storage unavailable, write failure or timeout
    #[error("Persistence error: {0}")]
    Persistence(#[from] StorageError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
