//! Bucket Courier - single-file upload service backed by S3

use bucket_courier::config::Config;
use bucket_courier::metrics::server::MetricsServer;
use bucket_courier::server::Server;
use bucket_courier::storage::memory::MemoryStorage;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Bucket Courier - forwards uploaded files to an S3 bucket
#[derive(Parser, Debug)]
#[command(name = "bucket-courier")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (environment variables are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Storage backend
    #[arg(long, value_enum, default_value_t = StorageKind::S3)]
    storage: StorageKind,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum StorageKind {
    /// AWS S3 or an S3-compatible endpoint
    S3,
    /// In-process store, contents are lost on exit
    Memory,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Bucket Courier v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = match &args.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => {
            let config = Config::from_env()?;
            info!("Loaded configuration from environment");
            config
        }
    };

    let metrics = if config.metrics.enabled {
        let server = MetricsServer::bind(&format!("0.0.0.0:{}", config.metrics.port)).await?;
        Some(server.spawn())
    } else {
        None
    };

    // Start server
    let server = match args.storage {
        StorageKind::S3 => Server::new(config).await?,
        StorageKind::Memory => Server::with_storage(config, Arc::new(MemoryStorage::new())).await?,
    };
    info!("App running at http://{}", server.local_addr());
    server.run().await?;

    if let Some(metrics) = metrics {
        metrics.shutdown().await;
    }

    Ok(())
}
