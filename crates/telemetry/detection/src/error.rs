use telemetry_types::WindowKey;
use thiserror::Error;

/// Errors from the window store and detector configuration.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("invalid detection config: {0}")]
    InvalidConfig(String),

    #[error("window lock poisoned for {0}")]
    LockPoisoned(WindowKey),
}

/// Convenience type alias for detection results.
pub type DetectionResult<T> = Result<T, DetectionError>;
