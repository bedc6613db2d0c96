//! Reading ingestion from flags or JSON lines on stdin

use chrono::{DateTime, Utc};
use clap::Args;
use telemetry_service::{Engine, IngestionResult};
use telemetry_types::NewReading;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::output::{print_error, print_single, print_success, print_warning};

/// Arguments for `ingest`. Without `--device`, readings are read from stdin,
/// one JSON object per line.
#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Device identifier
    #[arg(short, long, requires_all = ["metric", "value"])]
    pub device: Option<String>,

    /// Metric name
    #[arg(short, long)]
    pub metric: Option<String>,

    /// Observed value
    #[arg(short, long, allow_hyphen_values = true)]
    pub value: Option<f64>,

    /// Unit of measure
    #[arg(short, long)]
    pub unit: Option<String>,

    /// RFC 3339 timestamp; defaults to the ingestion time
    #[arg(short, long)]
    pub timestamp: Option<DateTime<Utc>>,

    /// Print the full ingestion result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute an ingest command
pub async fn execute(args: IngestArgs, engine: &Engine) -> anyhow::Result<()> {
    if let (Some(device), Some(metric), Some(value)) = (&args.device, &args.metric, args.value) {
        let mut submission = NewReading::new(device.as_str(), metric.as_str(), value);
        submission.unit = args.unit.clone();
        submission.timestamp = args.timestamp;
        let result = engine.ingestion.ingest(submission).await?;
        return report(&result, args.json);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let (mut stored, mut flagged, mut failed) = (0_u64, 0_u64, 0_u64);
    let mut line_no = 0_u64;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let submission: NewReading = match serde_json::from_str(&line) {
            Ok(submission) => submission,
            Err(e) => {
                warn!(line = line_no, error = %e, "skipping malformed reading");
                failed += 1;
                continue;
            }
        };
        match engine.ingestion.ingest(submission).await {
            Ok(result) => {
                stored += 1;
                if result.is_anomalous() {
                    flagged += 1;
                }
                if args.json {
                    println!("{}", serde_json::to_string(&result)?);
                } else if let Some(anomaly) = &result.anomaly {
                    print_warning(&format!(
                        "line {line_no}: {} {} = {} is {} (z = {:+.2})",
                        anomaly.device_id,
                        anomaly.metric_name,
                        anomaly.value,
                        anomaly.anomaly_type,
                        anomaly.score
                    ));
                }
            }
            Err(e) => {
                print_error(&format!("line {line_no}: {e}"));
                failed += 1;
            }
        }
    }

    if !args.json {
        print_success(&format!(
            "stored {stored} readings, {flagged} anomalies, {failed} rejected"
        ));
    }
    Ok(())
}

fn report(result: &IngestionResult, json: bool) -> anyhow::Result<()> {
    if json {
        return print_single(result);
    }
    match &result.anomaly {
        Some(anomaly) => print_warning(&format!(
            "anomaly: {} is {} (z = {:+.2}, threshold {})",
            anomaly.value, anomaly.anomaly_type, anomaly.score, anomaly.threshold_used
        )),
        None => print_success(&format!("stored reading {}", result.reading.id)),
    }
    Ok(())
}
