//! SQLite adapter for telemetry storage.
//!
//! Timestamps are stored as integer nanoseconds since the Unix epoch so that
//! range filters and ordering are plain integer comparisons. Each relation has
//! an autoincrement `seq` column that breaks timestamp ties by insertion order.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::Row;
use telemetry_types::{Anomaly, AnomalyKind, Reading, ReadingId};
use tracing::debug;
use uuid::Uuid;

use crate::model::{AnomalyQuery, MetricSummary, SeriesQuery};
use crate::traits::{AnomalyStore, IngestionSink, QueryWindow, ReadingStore};
use crate::{StorageError, StorageResult};

const READING_COLUMNS: &str = "reading_id, device_id, metric_name, metric_value, unit, ts_nanos";
const ANOMALY_COLUMNS: &str = "reading_id, device_id, metric_name, metric_value, unit, ts_nanos, \
                               score, anomaly_type, threshold_used";

/// SQLite-backed storage adapter.
#[derive(Clone)]
pub struct SqliteTelemetryStore {
    pool: SqlitePool,
}

impl SqliteTelemetryStore {
    /// Connect to SQLite and initialize required schema.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with_options(database_url, 5, 5).await
    }

    /// Connect with explicit pool parameters.
    ///
    /// In-memory databases are pinned to a single long-lived connection, since
    /// every SQLite connection to `:memory:` opens a separate database.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> StorageResult<Self> {
        let in_memory = is_memory_url(database_url);
        let mut options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StorageError::InvalidInput(format!("bad sqlite url: {e}")))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(connect_timeout_secs.max(1)));
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let mut pool_options = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(connect_timeout_secs));
        pool_options = if in_memory {
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(max_connections.max(1))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to connect sqlite: {e}")))?;
        debug!(url = %database_url, in_memory, "sqlite pool connected");

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create adapter from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> StorageResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist. Safe to call repeatedly.
    pub async fn init_schema(&self) -> StorageResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS telemetry_data (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                reading_id TEXT NOT NULL UNIQUE,
                device_id TEXT NOT NULL,
                metric_name TEXT NOT NULL,
                metric_value REAL NOT NULL,
                unit TEXT,
                ts_nanos INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_telemetry_data_key_ts
                ON telemetry_data (device_id, metric_name, ts_nanos)
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS anomalies (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                reading_id TEXT NOT NULL UNIQUE REFERENCES telemetry_data (reading_id),
                device_id TEXT NOT NULL,
                metric_name TEXT NOT NULL,
                metric_value REAL NOT NULL,
                unit TEXT,
                ts_nanos INTEGER NOT NULL,
                score REAL NOT NULL,
                anomaly_type TEXT NOT NULL,
                threshold_used REAL NOT NULL
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_anomalies_key_ts
                ON anomalies (device_id, metric_name, ts_nanos)
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_anomalies_ts
                ON anomalies (ts_nanos)
            "#,
        ];

        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }
}

#[async_trait]
impl IngestionSink for SqliteTelemetryStore {
    async fn record(&self, reading: &Reading, anomaly: Option<&Anomaly>) -> StorageResult<()> {
        if let Some(anomaly) = anomaly {
            if anomaly.reading_id != reading.id {
                return Err(StorageError::InvalidInput(format!(
                    "anomaly references reading {} but was recorded with {}",
                    anomaly.reading_id, reading.id
                )));
            }
        }
        let ts = to_nanos(reading.timestamp)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO telemetry_data
                (reading_id, device_id, metric_name, metric_value, unit, ts_nanos)
            VALUES
                (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(reading.id.0.to_string())
        .bind(&reading.device_id)
        .bind(&reading.metric_name)
        .bind(reading.value)
        .bind(reading.unit.as_deref())
        .bind(ts)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        if let Some(anomaly) = anomaly {
            sqlx::query(
                r#"
                INSERT INTO anomalies
                    (reading_id, device_id, metric_name, metric_value, unit, ts_nanos,
                     score, anomaly_type, threshold_used)
                VALUES
                    (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(anomaly.reading_id.0.to_string())
            .bind(&anomaly.device_id)
            .bind(&anomaly.metric_name)
            .bind(anomaly.value)
            .bind(anomaly.unit.as_deref())
            .bind(to_nanos(anomaly.timestamp)?)
            .bind(anomaly.score)
            .bind(anomaly.anomaly_type.as_str())
            .bind(anomaly.threshold_used)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))
    }
}

#[async_trait]
impl ReadingStore for SqliteTelemetryStore {
    async fn list_readings(&self, window: QueryWindow) -> StorageResult<Vec<Reading>> {
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM telemetry_data \
             ORDER BY ts_nanos ASC, seq ASC LIMIT ?1 OFFSET ?2"
        );
        let rows = sqlx::query(&sql)
            .bind(limit_param(window.limit)?)
            .bind(to_i64(window.offset)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        rows.into_iter().map(reading_row_to_record).collect()
    }

    async fn readings_for_device(
        &self,
        device_id: &str,
        window: QueryWindow,
    ) -> StorageResult<Vec<Reading>> {
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM telemetry_data WHERE device_id = ?1 \
             ORDER BY ts_nanos ASC, seq ASC LIMIT ?2 OFFSET ?3"
        );
        let rows = sqlx::query(&sql)
            .bind(device_id)
            .bind(limit_param(window.limit)?)
            .bind(to_i64(window.offset)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        rows.into_iter().map(reading_row_to_record).collect()
    }

    async fn recent_readings(&self, device_id: &str, count: usize) -> StorageResult<Vec<Reading>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM telemetry_data WHERE device_id = ?1 \
             ORDER BY ts_nanos DESC, seq DESC LIMIT ?2"
        );
        let rows = sqlx::query(&sql)
            .bind(device_id)
            .bind(to_i64(count)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        rows.into_iter().map(reading_row_to_record).collect()
    }

    async fn time_series(&self, query: &SeriesQuery) -> StorageResult<Vec<Reading>> {
        if query.is_empty_range() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM telemetry_data \
             WHERE device_id = ?1 AND metric_name = ?2 \
               AND (?3 IS NULL OR ts_nanos >= ?3) \
               AND (?4 IS NULL OR ts_nanos <= ?4) \
             ORDER BY ts_nanos ASC, seq ASC LIMIT ?5"
        );
        let rows = sqlx::query(&sql)
            .bind(&query.device_id)
            .bind(&query.metric_name)
            .bind(query.from.map(bound_nanos))
            .bind(query.to.map(bound_nanos))
            .bind(limit_param(query.limit)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        rows.into_iter().map(reading_row_to_record).collect()
    }

    async fn metric_summary(
        &self,
        device_id: &str,
        metric_name: &str,
    ) -> StorageResult<Option<MetricSummary>> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n,
                   MIN(metric_value) AS min_value,
                   MAX(metric_value) AS max_value,
                   AVG(metric_value) AS avg_value
              FROM telemetry_data
             WHERE device_id = ?1 AND metric_name = ?2
            "#,
        )
        .bind(device_id)
        .bind(metric_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        let count: i64 = row
            .try_get("n")
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        if count == 0 {
            return Ok(None);
        }
        let get = |column: &str| -> StorageResult<f64> {
            row.try_get::<Option<f64>, _>(column)
                .map_err(|e| StorageError::Backend(e.to_string()))?
                .ok_or_else(|| StorageError::Backend(format!("{column} is null")))
        };
        Ok(Some(MetricSummary {
            device_id: device_id.to_string(),
            metric_name: metric_name.to_string(),
            count: count as u64,
            min: get("min_value")?,
            max: get("max_value")?,
            mean: get("avg_value")?,
        }))
    }
}

#[async_trait]
impl AnomalyStore for SqliteTelemetryStore {
    async fn list_anomalies(&self, query: &AnomalyQuery) -> StorageResult<Vec<Anomaly>> {
        let sql = format!(
            "SELECT {ANOMALY_COLUMNS} FROM anomalies \
             WHERE (?1 IS NULL OR ts_nanos >= ?1) \
             ORDER BY ts_nanos DESC, seq DESC LIMIT ?2 OFFSET ?3"
        );
        let rows = sqlx::query(&sql)
            .bind(query.since.map(bound_nanos))
            .bind(limit_param(query.window.limit)?)
            .bind(to_i64(query.window.offset)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        rows.into_iter().map(anomaly_row_to_record).collect()
    }

    async fn anomalies_for_key(
        &self,
        device_id: &str,
        metric_name: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> StorageResult<Vec<Anomaly>> {
        let sql = format!(
            "SELECT {ANOMALY_COLUMNS} FROM anomalies \
             WHERE device_id = ?1 AND metric_name = ?2 \
               AND (?3 IS NULL OR ts_nanos >= ?3) \
               AND (?4 IS NULL OR ts_nanos <= ?4) \
             ORDER BY ts_nanos ASC, seq ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(device_id)
            .bind(metric_name)
            .bind(from.map(bound_nanos))
            .bind(to.map(bound_nanos))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        rows.into_iter().map(anomaly_row_to_record).collect()
    }
}

fn reading_row_to_record(row: SqliteRow) -> StorageResult<Reading> {
    Ok(Reading {
        id: parse_reading_id(&row)?,
        device_id: row
            .try_get("device_id")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        metric_name: row
            .try_get("metric_name")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        value: row
            .try_get("metric_value")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        unit: row
            .try_get("unit")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        timestamp: from_nanos(
            row.try_get("ts_nanos")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
    })
}

fn anomaly_row_to_record(row: SqliteRow) -> StorageResult<Anomaly> {
    let anomaly_type: String = row
        .try_get("anomaly_type")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    Ok(Anomaly {
        reading_id: parse_reading_id(&row)?,
        device_id: row
            .try_get("device_id")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        metric_name: row
            .try_get("metric_name")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        value: row
            .try_get("metric_value")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        unit: row
            .try_get("unit")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        timestamp: from_nanos(
            row.try_get("ts_nanos")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        score: row
            .try_get("score")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        anomaly_type: AnomalyKind::from_str(&anomaly_type).map_err(StorageError::Serialization)?,
        threshold_used: row
            .try_get("threshold_used")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
    })
}

fn parse_reading_id(row: &SqliteRow) -> StorageResult<ReadingId> {
    let raw: String = row
        .try_get("reading_id")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    Uuid::parse_str(&raw)
        .map(ReadingId)
        .map_err(|e| StorageError::Serialization(format!("bad reading id `{raw}`: {e}")))
}

fn to_nanos(ts: DateTime<Utc>) -> StorageResult<i64> {
    ts.timestamp_nanos_opt().ok_or_else(|| {
        StorageError::InvalidInput(format!("timestamp {ts} outside the storable range"))
    })
}

/// Filter bounds beyond the nanosecond range clamp to it; no stored row lies outside.
fn bound_nanos(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_nanos_opt()
        .unwrap_or(if ts.timestamp() < 0 { i64::MIN } else { i64::MAX })
}

fn from_nanos(nanos: i64) -> DateTime<Utc> {
    Utc.timestamp_nanos(nanos)
}

/// SQLite treats a negative LIMIT as "no limit".
fn limit_param(limit: usize) -> StorageResult<i64> {
    if limit == 0 {
        Ok(-1)
    } else {
        to_i64(limit)
    }
}

fn to_i64(value: usize) -> StorageResult<i64> {
    i64::try_from(value)
        .map_err(|_| StorageError::InvalidInput("window value too large".to_string()))
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}
