//! telemetryd - telemetry anomaly engine command line
//!
//! Ingests readings (from flags or JSON lines on stdin), scores each one
//! against its device/metric rolling window, and queries persisted readings
//! and anomalies.

use clap::{Parser, Subcommand};
use telemetry_service::{Engine, EngineConfig, StorageConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod output;

use commands::ingest::{self, IngestArgs};
use commands::query::{self, QueryCommands};
use output::{print_success, OutputFormat};

/// Telemetry anomaly engine CLI
#[derive(Parser)]
#[command(name = "telemetryd")]
#[command(about = "Telemetry anomaly engine - ingest readings, query anomalies", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "TELEMETRY_CONFIG")]
    config: Option<String>,

    /// SQLite database URL, overriding the configured storage
    #[arg(long, env = "TELEMETRY_DATABASE_URL", conflicts_with = "memory")]
    database: Option<String>,

    /// Use in-memory storage (nothing survives the process)
    #[arg(long)]
    memory: bool,

    /// Log level
    #[arg(long, env = "TELEMETRY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "TELEMETRY_LOG_JSON")]
    log_json: bool,

    /// Output format for query commands
    #[arg(short, long, value_enum, default_value = "table")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Create the storage schema if it does not exist
    Init,

    /// Ingest readings and report anomalies
    Ingest(IngestArgs),

    #[command(flatten)]
    Query(QueryCommands),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = EngineConfig::load(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli);
    init_tracing(&config);

    let engine = Engine::connect(&config).await?;
    info!(
        window_capacity = config.detection.window_capacity,
        min_samples = config.detection.min_samples,
        z_threshold = config.detection.z_threshold,
        "engine ready"
    );

    match cli.command {
        Commands::Init => {
            print_success("storage schema ready");
            Ok(())
        }
        Commands::Ingest(args) => ingest::execute(args, &engine).await,
        Commands::Query(command) => query::execute(command, &engine, cli.output).await,
    }
}

fn apply_overrides(config: &mut EngineConfig, cli: &Cli) {
    if cli.memory {
        config.storage = StorageConfig::Memory;
    } else if let Some(url) = &cli.database {
        config.storage = match &config.storage {
            StorageConfig::Sqlite {
                max_connections,
                connect_timeout_secs,
                ..
            } => StorageConfig::Sqlite {
                url: url.clone(),
                max_connections: *max_connections,
                connect_timeout_secs: *connect_timeout_secs,
            },
            StorageConfig::Memory => StorageConfig::Sqlite {
                url: url.clone(),
                max_connections: 5,
                connect_timeout_secs: 5,
            },
        };
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    config.logging.json |= cli.log_json;
}

fn init_tracing(config: &EngineConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    // Logs go to stderr so query output on stdout stays machine readable.
    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn memory_flag_overrides_storage() {
        let cli = Cli::parse_from(["telemetryd", "--memory", "init"]);
        let mut config = EngineConfig::default();
        apply_overrides(&mut config, &cli);
        assert_eq!(config.storage, StorageConfig::Memory);
    }

    #[test]
    fn database_flag_keeps_pool_settings() {
        let cli = Cli::parse_from(["telemetryd", "--database", "sqlite://other.db", "init"]);
        let mut config = EngineConfig::default();
        apply_overrides(&mut config, &cli);
        assert!(matches!(
            config.storage,
            StorageConfig::Sqlite { ref url, max_connections: 5, .. } if url == "sqlite://other.db"
        ));
    }

    #[test]
    fn ingest_flags_parse_negative_values() {
        let cli = Cli::parse_from([
            "telemetryd", "ingest", "-d", "sensor-1", "-m", "temp", "-v", "-4.5",
        ]);
        match cli.command {
            Commands::Ingest(args) => assert_eq!(args.value, Some(-4.5)),
            _ => panic!("expected ingest"),
        }
    }
}
