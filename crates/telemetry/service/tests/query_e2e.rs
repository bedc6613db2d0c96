//! Query views over persisted data, checked against every storage backend.

mod common;

use common::{at, engines, reading, spiky_series};
use telemetry_storage::{AnomalyQuery, QueryWindow, SeriesQuery};

#[tokio::test]
async fn empty_store_yields_empty_results() {
    for (backend, engine) in engines().await {
        let q = &engine.query;
        assert!(q.list_anomalies(Some(10), None).await.unwrap().is_empty(), "{backend}");
        assert!(q.time_series("x", "y", None, None).await.unwrap().is_empty());
        assert!(q.recent_readings("x", None).await.unwrap().is_empty());
        assert!(q.metric_summary("x", "y").await.unwrap().is_none());

        let plot = q.plot_series("x", "y", None).await.unwrap();
        assert!(plot.readings.is_empty() && plot.anomalies.is_empty());
    }
}

#[tokio::test]
async fn time_series_is_ascending_and_includes_normal_readings() {
    for (backend, engine) in engines().await {
        // Submitted out of timestamp order.
        for (offset, v) in [(30, 3.0), (10, 1.0), (40, 4.0), (20, 2.0)] {
            engine
                .ingestion
                .ingest(reading("dev", "temp", v, offset))
                .await
                .unwrap();
        }
        engine
            .ingestion
            .ingest(reading("dev", "humidity", 55.0, 25))
            .await
            .unwrap();

        let series = engine
            .query
            .time_series("dev", "temp", None, None)
            .await
            .unwrap();
        let stamps: Vec<_> = series.iter().map(|r| r.timestamp).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]), "{backend}: not ascending");
        assert_eq!(series.len(), 4);
        assert!(series.iter().all(|r| r.metric_name == "temp"));

        let bounded = engine
            .query
            .time_series("dev", "temp", Some(at(20)), Some(at(30)))
            .await
            .unwrap();
        let values: Vec<f64> = bounded.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![2.0, 3.0], "{backend}: bounds are inclusive");

        let limited = engine
            .query
            .series(&SeriesQuery::new("dev", "temp").from(Some(at(15))).limit(2))
            .await
            .unwrap();
        let values: Vec<f64> = limited.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![2.0, 3.0], "{backend}");
    }
}

#[tokio::test]
async fn anomaly_listing_honours_limit_and_since() {
    for (backend, engine) in engines().await {
        let mut flagged = Vec::new();
        for (i, v) in spiky_series().into_iter().enumerate() {
            let result = engine
                .ingestion
                .ingest(reading("dev", "temp", v, i as i64))
                .await
                .unwrap();
            flagged.extend(result.anomaly);
        }
        let newest = flagged.last().cloned().unwrap();

        let one = engine.query.list_anomalies(Some(1), None).await.unwrap();
        assert_eq!(one, vec![newest.clone()], "{backend}");

        let since_newest = engine
            .query
            .list_anomalies(None, Some(newest.timestamp))
            .await
            .unwrap();
        assert_eq!(since_newest, vec![newest], "{backend}: since is inclusive");

        let all = engine.query.list_anomalies(None, None).await.unwrap();
        let skipped = engine
            .query
            .anomalies(&AnomalyQuery::new(None, None).skip(1))
            .await
            .unwrap();
        assert_eq!(skipped.as_slice(), &all[1..], "{backend}: offset skips newest");
    }
}

#[tokio::test]
async fn device_listings_recent_and_summary() {
    for (backend, engine) in engines().await {
        for i in 0..15 {
            engine
                .ingestion
                .ingest(reading("dev-1", "temp", i as f64, i))
                .await
                .unwrap();
        }
        engine
            .ingestion
            .ingest(reading("dev-2", "temp", 99.0, 100))
            .await
            .unwrap();

        let recent = engine.query.recent_readings("dev-1", None).await.unwrap();
        assert_eq!(recent.len(), 10, "{backend}: default count");
        assert_eq!(recent[0].value, 14.0, "{backend}: newest first");
        assert_eq!(recent[9].value, 5.0);

        let three = engine.query.recent_readings("dev-1", Some(3)).await.unwrap();
        assert_eq!(three.len(), 3);

        let page = engine
            .query
            .readings_for_device("dev-1", QueryWindow::new(5, 10))
            .await
            .unwrap();
        let values: Vec<f64> = page.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![10.0, 11.0, 12.0, 13.0, 14.0], "{backend}");

        let everything = engine
            .query
            .list_readings(QueryWindow::unbounded())
            .await
            .unwrap();
        assert_eq!(everything.len(), 16);

        let summary = engine
            .query
            .metric_summary("dev-1", "temp")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.count, 15, "{backend}");
        assert_eq!(summary.min, 0.0);
        assert_eq!(summary.max, 14.0);
        assert!((summary.mean - 7.0).abs() < 1e-9);
    }
}

#[tokio::test]
async fn plot_series_pairs_readings_with_their_anomalies() {
    for (backend, engine) in engines().await {
        let mut flagged = Vec::new();
        for (i, v) in spiky_series().into_iter().enumerate() {
            let result = engine
                .ingestion
                .ingest(reading("dev", "temp", v, i as i64))
                .await
                .unwrap();
            flagged.extend(result.anomaly);
        }

        let full = engine.query.plot_series("dev", "temp", None).await.unwrap();
        assert_eq!(full.readings.len(), spiky_series().len(), "{backend}");
        assert_eq!(full.anomalies, flagged, "{backend}");

        // The low spike sits at index 10; the high spike at 20 falls outside.
        let head = engine
            .query
            .plot_series("dev", "temp", Some(15))
            .await
            .unwrap();
        assert_eq!(head.readings.len(), 15);
        assert!(head
            .anomalies
            .iter()
            .all(|a| head.readings.iter().any(|r| r.id == a.reading_id)));
        assert!(head.anomalies.len() < flagged.len(), "{backend}");
    }
}
