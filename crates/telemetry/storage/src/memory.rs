//! In-memory reference implementation of the storage traits.
//!
//! Deterministic and test-friendly. Both relations sit behind one lock so a
//! reading and its anomaly are appended under a single write guard.

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use telemetry_types::{Anomaly, Reading, ReadingId};

use crate::model::{AnomalyQuery, MetricSummary, SeriesQuery};
use crate::traits::{AnomalyStore, IngestionSink, QueryWindow, ReadingStore};
use crate::{StorageError, StorageResult};

#[derive(Default)]
struct Tables {
    readings: Vec<Reading>,
    reading_ids: HashSet<ReadingId>,
    anomalies: Vec<Anomaly>,
}

/// In-memory telemetry storage adapter.
#[derive(Default)]
pub struct InMemoryTelemetryStore {
    tables: RwLock<Tables>,
}

impl InMemoryTelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reading_count(&self) -> StorageResult<usize> {
        Ok(self.read()?.readings.len())
    }

    pub fn anomaly_count(&self) -> StorageResult<usize> {
        Ok(self.read()?.anomalies.len())
    }

    fn read(&self) -> StorageResult<std::sync::RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StorageError::Backend("telemetry tables lock poisoned".to_string()))
    }
}

#[async_trait]
impl IngestionSink for InMemoryTelemetryStore {
    async fn record(&self, reading: &Reading, anomaly: Option<&Anomaly>) -> StorageResult<()> {
        if let Some(anomaly) = anomaly {
            if anomaly.reading_id != reading.id {
                return Err(StorageError::InvalidInput(format!(
                    "anomaly references reading {} but was recorded with {}",
                    anomaly.reading_id, reading.id
                )));
            }
        }

        let mut guard = self
            .tables
            .write()
            .map_err(|_| StorageError::Backend("telemetry tables lock poisoned".to_string()))?;

        if !guard.reading_ids.insert(reading.id) {
            return Err(StorageError::InvalidInput(format!(
                "reading {} already recorded",
                reading.id
            )));
        }

        guard.readings.push(reading.clone());
        if let Some(anomaly) = anomaly {
            guard.anomalies.push(anomaly.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl ReadingStore for InMemoryTelemetryStore {
    async fn list_readings(&self, window: QueryWindow) -> StorageResult<Vec<Reading>> {
        let guard = self.read()?;
        Ok(apply_window(oldest_first(guard.readings.iter()), window))
    }

    async fn readings_for_device(
        &self,
        device_id: &str,
        window: QueryWindow,
    ) -> StorageResult<Vec<Reading>> {
        let guard = self.read()?;
        let values = oldest_first(guard.readings.iter().filter(|r| r.device_id == device_id));
        Ok(apply_window(values, window))
    }

    async fn recent_readings(&self, device_id: &str, count: usize) -> StorageResult<Vec<Reading>> {
        let guard = self.read()?;
        let mut values = oldest_first(guard.readings.iter().filter(|r| r.device_id == device_id));
        values.reverse();
        values.truncate(count);
        Ok(values)
    }

    async fn time_series(&self, query: &SeriesQuery) -> StorageResult<Vec<Reading>> {
        if query.is_empty_range() {
            return Ok(Vec::new());
        }
        let guard = self.read()?;
        let values = oldest_first(guard.readings.iter().filter(|r| {
            r.matches(&query.device_id, &query.metric_name)
                && in_range(r.timestamp, query.from, query.to)
        }));
        Ok(apply_window(values, QueryWindow::new(query.limit, 0)))
    }

    async fn metric_summary(
        &self,
        device_id: &str,
        metric_name: &str,
    ) -> StorageResult<Option<MetricSummary>> {
        let guard = self.read()?;
        let mut count = 0_u64;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for r in guard
            .readings
            .iter()
            .filter(|r| r.matches(device_id, metric_name))
        {
            count += 1;
            sum += r.value;
            min = min.min(r.value);
            max = max.max(r.value);
        }
        if count == 0 {
            return Ok(None);
        }
        Ok(Some(MetricSummary {
            device_id: device_id.to_string(),
            metric_name: metric_name.to_string(),
            count,
            min,
            max,
            mean: sum / count as f64,
        }))
    }
}

#[async_trait]
impl AnomalyStore for InMemoryTelemetryStore {
    async fn list_anomalies(&self, query: &AnomalyQuery) -> StorageResult<Vec<Anomaly>> {
        let guard = self.read()?;
        // Reverse first so the stable sort leaves equal timestamps newest first.
        let mut values = guard
            .anomalies
            .iter()
            .rev()
            .filter(|a| query.since.map_or(true, |since| a.timestamp >= since))
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(apply_window(values, query.window))
    }

    async fn anomalies_for_key(
        &self,
        device_id: &str,
        metric_name: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> StorageResult<Vec<Anomaly>> {
        let guard = self.read()?;
        let mut values = guard
            .anomalies
            .iter()
            .filter(|a| {
                a.device_id == device_id
                    && a.metric_name == metric_name
                    && in_range(a.timestamp, from, to)
            })
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(values)
    }
}

fn oldest_first<'a>(readings: impl Iterator<Item = &'a Reading>) -> Vec<Reading> {
    let mut values = readings.cloned().collect::<Vec<_>>();
    values.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    values
}

fn in_range(ts: DateTime<Utc>, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> bool {
    from.map_or(true, |from| ts >= from) && to.map_or(true, |to| ts <= to)
}

fn apply_window<T>(items: Vec<T>, window: QueryWindow) -> Vec<T> {
    let iter = items.into_iter().skip(window.offset);
    if window.limit == 0 {
        iter.collect()
    } else {
        iter.take(window.limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use telemetry_types::NewReading;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn reading(device: &str, metric: &str, value: f64, secs: i64) -> Reading {
        NewReading::new(device, metric, value)
            .at(at(secs))
            .into_reading(Utc::now())
            .unwrap()
    }

    #[tokio::test]
    async fn record_rejects_mismatched_anomaly() {
        let store = InMemoryTelemetryStore::new();
        let a = reading("d1", "temp", 1.0, 0);
        let b = reading("d1", "temp", 9.0, 1);
        let anomaly = Anomaly::for_reading(&b, 3.0, 2.5).unwrap();

        let result = store.record(&a, Some(&anomaly)).await;
        assert!(matches!(result, Err(StorageError::InvalidInput(_))));
        assert_eq!(store.reading_count().unwrap(), 0);
        assert_eq!(store.anomaly_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn record_rejects_duplicate_reading() {
        let store = InMemoryTelemetryStore::new();
        let r = reading("d1", "temp", 1.0, 0);
        store.record(&r, None).await.unwrap();
        assert!(store.record(&r, None).await.is_err());
        assert_eq!(store.reading_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_with_anomaly_adds_nothing() {
        let store = InMemoryTelemetryStore::new();
        let readings: Vec<_> = (0..50).map(|i| reading("d1", "temp", i as f64, i)).collect();
        for r in &readings {
            store.record(r, None).await.unwrap();
        }

        let replay = &readings[17];
        let anomaly = Anomaly::for_reading(replay, 3.0, 2.5).unwrap();
        let result = store.record(replay, Some(&anomaly)).await;
        assert!(matches!(result, Err(StorageError::InvalidInput(_))));
        assert_eq!(store.reading_count().unwrap(), 50);
        assert_eq!(store.anomaly_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn series_is_oldest_first_with_inclusive_bounds() {
        let store = InMemoryTelemetryStore::new();
        for (secs, v) in [(30, 3.0), (10, 1.0), (20, 2.0), (40, 4.0)] {
            store
                .record(&reading("d1", "temp", v, secs), None)
                .await
                .unwrap();
        }
        store
            .record(&reading("d1", "humidity", 50.0, 25), None)
            .await
            .unwrap();

        let all = store
            .time_series(&SeriesQuery::new("d1", "temp"))
            .await
            .unwrap();
        let values: Vec<f64> = all.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);

        let bounded = store
            .time_series(
                &SeriesQuery::new("d1", "temp")
                    .from(Some(at(20)))
                    .to(Some(at(30))),
            )
            .await
            .unwrap();
        let values: Vec<f64> = bounded.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![2.0, 3.0]);

        let inverted = store
            .time_series(
                &SeriesQuery::new("d1", "temp")
                    .from(Some(at(40)))
                    .to(Some(at(10))),
            )
            .await
            .unwrap();
        assert!(inverted.is_empty());
    }

    #[tokio::test]
    async fn anomalies_newest_first_and_since_filter() {
        let store = InMemoryTelemetryStore::new();
        for secs in [5, 15, 10] {
            let r = reading("d1", "temp", 100.0, secs);
            let a = Anomaly::for_reading(&r, 4.0, 2.5).unwrap();
            store.record(&r, Some(&a)).await.unwrap();
        }

        let listed = store
            .list_anomalies(&AnomalyQuery::default())
            .await
            .unwrap();
        let stamps: Vec<_> = listed.iter().map(|a| a.timestamp).collect();
        assert_eq!(stamps, vec![at(15), at(10), at(5)]);

        let recent = store
            .list_anomalies(&AnomalyQuery::new(Some(1), Some(at(6))))
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].timestamp, at(15));

        let second_page = store
            .list_anomalies(&AnomalyQuery::new(Some(2), None).skip(1))
            .await
            .unwrap();
        let stamps: Vec<_> = second_page.iter().map(|a| a.timestamp).collect();
        assert_eq!(stamps, vec![at(10), at(5)]);
    }

    #[tokio::test]
    async fn recent_readings_newest_first() {
        let store = InMemoryTelemetryStore::new();
        for secs in 0..5 {
            store
                .record(&reading("d1", "temp", secs as f64, secs), None)
                .await
                .unwrap();
        }
        store
            .record(&reading("d2", "temp", 99.0, 100), None)
            .await
            .unwrap();

        let recent = store.recent_readings("d1", 3).await.unwrap();
        let values: Vec<f64> = recent.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![4.0, 3.0, 2.0]);
    }

    #[tokio::test]
    async fn metric_summary_aggregates() {
        let store = InMemoryTelemetryStore::new();
        assert!(store.metric_summary("d1", "temp").await.unwrap().is_none());

        for (secs, v) in [(0, 2.0), (1, 8.0), (2, 5.0)] {
            store
                .record(&reading("d1", "temp", v, secs), None)
                .await
                .unwrap();
        }
        let summary = store.metric_summary("d1", "temp").await.unwrap().unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.min, 2.0);
        assert_eq!(summary.max, 8.0);
        assert!((summary.mean - 5.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn paging_windows() {
        let store = InMemoryTelemetryStore::new();
        let base = at(0);
        for i in 0..6 {
            let r = NewReading::new("d1", "temp", i as f64)
                .at(base + Duration::seconds(i))
                .into_reading(Utc::now())
                .unwrap();
            store.record(&r, None).await.unwrap();
        }
        let page = store
            .list_readings(QueryWindow::new(2, 3))
            .await
            .unwrap();
        let values: Vec<f64> = page.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![3.0, 4.0]);

        let all = store
            .readings_for_device("d1", QueryWindow::unbounded())
            .await
            .unwrap();
        assert_eq!(all.len(), 6);
    }
}
