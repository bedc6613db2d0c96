#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use telemetry_service::{Engine, EngineConfig, StorageConfig};
use telemetry_types::NewReading;

pub fn memory_config() -> EngineConfig {
    EngineConfig::in_memory()
}

pub fn sqlite_config() -> EngineConfig {
    EngineConfig {
        storage: StorageConfig::Sqlite {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            connect_timeout_secs: 5,
        },
        ..EngineConfig::default()
    }
}

/// One engine per storage backend, labelled for assertion messages.
pub async fn engines() -> Vec<(&'static str, Engine)> {
    vec![
        ("memory", Engine::connect(&memory_config()).await.unwrap()),
        ("sqlite", Engine::connect(&sqlite_config()).await.unwrap()),
    ]
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub fn at(offset_secs: i64) -> DateTime<Utc> {
    base_time() + Duration::seconds(offset_secs)
}

pub fn reading(device: &str, metric: &str, value: f64, offset_secs: i64) -> NewReading {
    NewReading::new(device, metric, value)
        .with_unit("C")
        .at(at(offset_secs))
}

/// Steady values around 10 with a low spike at index 10 and a high spike at 20.
pub fn spiky_series() -> Vec<f64> {
    let normal = [10.0, 11.0, 9.0, 10.0, 12.0, 8.0, 10.0, 11.0, 9.0, 10.0];
    let mut values = Vec::new();
    values.extend_from_slice(&normal);
    values.push(-30.0);
    values.extend_from_slice(&normal[..9]);
    values.push(50.0);
    values.extend_from_slice(&normal);
    values
}
