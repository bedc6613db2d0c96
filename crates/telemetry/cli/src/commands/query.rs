//! Query commands over persisted readings and anomalies

use chrono::{DateTime, Utc};
use clap::Subcommand;
use telemetry_service::Engine;
use telemetry_storage::{AnomalyQuery, QueryWindow, SeriesQuery};
use telemetry_types::{Anomaly, Reading};

use super::{AnomalyRow, ReadingRow};
use crate::output::{print_list, print_single, print_warning, OutputFormat};

/// Query subcommands
#[derive(Debug, Subcommand)]
pub enum QueryCommands {
    /// List detected anomalies, newest first
    Anomalies {
        /// Number of newest anomalies to skip
        #[arg(long, default_value = "0")]
        skip: usize,

        /// Maximum number of anomalies
        #[arg(short, long, default_value = "100")]
        limit: usize,

        /// Only anomalies at or after this RFC 3339 instant
        #[arg(short, long)]
        since: Option<DateTime<Utc>>,
    },

    /// Readings of one device metric, oldest first
    Series {
        device: String,
        metric: String,

        #[arg(long)]
        from: Option<DateTime<Utc>>,

        #[arg(long)]
        to: Option<DateTime<Utc>>,

        /// Maximum number of readings (0 for all)
        #[arg(short, long, default_value = "0")]
        limit: usize,
    },

    /// List stored readings, oldest first
    Readings {
        /// Restrict to one device
        #[arg(short, long)]
        device: Option<String>,

        #[arg(long, default_value = "0")]
        skip: usize,

        #[arg(short, long, default_value = "100")]
        limit: usize,
    },

    /// Most recent readings of a device, newest first
    Recent {
        device: String,

        #[arg(short, long)]
        count: Option<usize>,
    },

    /// Min, max and mean of one device metric
    Summary { device: String, metric: String },

    /// Readings and their anomalies for plotting, as JSON
    Plot {
        device: String,
        metric: String,

        #[arg(short, long)]
        limit: Option<usize>,
    },
}

/// Execute a query command
pub async fn execute(
    command: QueryCommands,
    engine: &Engine,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let q = &engine.query;
    match command {
        QueryCommands::Anomalies { skip, limit, since } => {
            let query = AnomalyQuery::new(Some(limit), since).skip(skip);
            let anomalies = q.anomalies(&query).await?;
            print_list::<Anomaly, AnomalyRow>(&anomalies, format)
        }
        QueryCommands::Series {
            device,
            metric,
            from,
            to,
            limit,
        } => {
            let query = SeriesQuery::new(device, metric).from(from).to(to).limit(limit);
            let readings = q.series(&query).await?;
            print_list::<Reading, ReadingRow>(&readings, format)
        }
        QueryCommands::Readings {
            device,
            skip,
            limit,
        } => {
            let window = QueryWindow::new(limit, skip);
            let readings = match device {
                Some(device) => q.readings_for_device(&device, window).await?,
                None => q.list_readings(window).await?,
            };
            print_list::<Reading, ReadingRow>(&readings, format)
        }
        QueryCommands::Recent { device, count } => {
            let readings = q.recent_readings(&device, count).await?;
            print_list::<Reading, ReadingRow>(&readings, format)
        }
        QueryCommands::Summary { device, metric } => {
            match q.metric_summary(&device, &metric).await? {
                Some(summary) => print_single(&summary),
                None => {
                    print_warning(&format!("no readings for {device}/{metric}"));
                    Ok(())
                }
            }
        }
        QueryCommands::Plot {
            device,
            metric,
            limit,
        } => print_single(&q.plot_series(&device, &metric, limit).await?),
    }
}
