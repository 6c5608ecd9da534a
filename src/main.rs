//! CLI entry point for the bike availability watcher.
//!
//! Provides subcommands for listing the station catalog and for watching the
//! status feed, logging every inventory change as it is delivered.

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use bike_availability::catalog::StationCatalog;
use bike_availability::config::{DEFAULT_POLL_INTERVAL_SECS, FeedConfig, PipelineConfig};
use bike_availability::delivery::DeliveryMode;
use bike_availability::infra::gbfs::GbfsClient;
use bike_availability::output::CsvSink;
use bike_availability::poller::PollScheduler;
use bike_availability::sink::{FanOut, InventoryTracker, TracingSink};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "bike_availability")]
#[command(about = "Watch bike-share station inventory changes", long_about = None)]
struct Cli {
    /// Station status feed URL (overrides GBFS_STATUS_URL)
    #[arg(long, global = true)]
    status_url: Option<String>,

    /// Station information feed URL (overrides GBFS_STATION_URL)
    #[arg(long, global = true)]
    station_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the station catalog and list every station
    Stations,
    /// Poll the status feed and report inventory changes until Ctrl+C
    Watch {
        /// Poll interval in seconds
        #[arg(short, long, default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
        interval: u64,

        /// Emit changes as soon as they are detected instead of spreading
        /// them across the poll interval
        #[arg(long, default_value_t = false)]
        immediate: bool,

        /// Optional: CSV file to append observations to
        #[arg(long)]
        csv: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/bike_availability.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bike_availability.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let feed_config = FeedConfig::from_env().with_overrides(cli.status_url, cli.station_url);

    match cli.command {
        Commands::Stations => {
            let client = GbfsClient::new(feed_config)?;
            let catalog = StationCatalog::load(&client).await?;

            for station in catalog.iter_sorted() {
                info!(
                    station_id = %station.id,
                    name = %station.name,
                    address = %station.address,
                    lon = station.location.lon,
                    lat = station.location.lat,
                    "Station"
                );
            }
            info!(total = catalog.len(), "Station list summary");
        }
        Commands::Watch {
            interval,
            immediate,
            csv,
        } => {
            let mode = if immediate {
                DeliveryMode::Immediate
            } else {
                DeliveryMode::Smoothed
            };
            watch(feed_config, PipelineConfig::new(interval, mode)?, csv).await?;
        }
    }

    Ok(())
}

/// Loads the catalog, runs the pipeline until Ctrl+C, then disconnects.
#[tracing::instrument(skip(feed_config, pipeline_config), fields(interval = pipeline_config.poll_interval_secs()))]
async fn watch(
    feed_config: FeedConfig,
    pipeline_config: PipelineConfig,
    csv: Option<String>,
) -> Result<()> {
    let client = Arc::new(GbfsClient::new(feed_config)?);
    let catalog = Arc::new(StationCatalog::load(client.as_ref()).await?);

    let tracker = Arc::new(InventoryTracker::default());
    let mut sink = FanOut::new().with(TracingSink).with(tracker.clone());
    if let Some(path) = csv {
        info!(path = %path, "Writing observations to CSV");
        sink = sink.with(CsvSink::new(path));
    }

    let mut pipeline = PollScheduler::new(pipeline_config, catalog, client, sink);
    pipeline.connect()?;

    info!("Watching for inventory changes. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    pipeline.disconnect().await;

    info!(
        stations = tracker.stations(),
        bikes_available = tracker.bikes_available(),
        bikes_added = tracker.bikes_added(),
        bikes_taken = tracker.bikes_taken(),
        cycles = pipeline.cycles(),
        "Finished watching"
    );
    Ok(())
}
