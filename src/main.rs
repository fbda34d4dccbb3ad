//! Tidegate server
//!
//! Command-line entry point for the query gateway: loads configuration,
//! wires the status store, table router, and backend drivers together, and
//! serves the HTTP API.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tidegate::api::{self, ApiConfig, AppState};
use tidegate::backend::{
    BackendRegistry, DorisBackend, ElasticBackend, StorageType, TableRouter, TableTarget,
};
use tidegate::config::Config;
use tidegate::query::TableId;
use tidegate::scroll::ScrollOrchestrator;
use tidegate::store::{MemoryStore, StatusStore};

/// Unified time-series query gateway
#[derive(Debug, Parser)]
#[command(name = "tidegate", version, about)]
struct Args {
    /// Path to a TOML config file; default locations are tried when unset
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the API listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the API listen port
    #[arg(long)]
    port: Option<u16>,

    /// Print a default config file and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.init_config {
        print!("{}", tidegate::config::generate_default_config());
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading config from {:?}", path))?,
        None => Config::load_default(),
    };
    if let Some(host) = args.host {
        config.api.host = host;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }

    init_logging(&config);

    tracing::info!("Tidegate query gateway v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn StatusStore> = Arc::new(MemoryStore::new());

    let router = Arc::new(TableRouter::new());
    for route in &config.tables {
        let Some(storage_type) = StorageType::from_str(&route.storage_type) else {
            tracing::warn!(
                table = %route.table_id,
                storage_type = %route.storage_type,
                "unknown storage type in table route, skipping"
            );
            continue;
        };
        router
            .add(TableTarget {
                table_id: TableId::new(&route.table_id),
                storage_type,
                connect: route.connect.clone(),
                db: route.db.clone(),
            })
            .await;
    }
    tracing::info!("Registered {} table routes", router.len().await);

    let backend_timeout = Duration::from_secs(config.backends.request_timeout_secs);
    let mut backends = BackendRegistry::new();
    backends.register(Arc::new(
        ElasticBackend::new(backend_timeout).with_time_field(&config.backends.time_field),
    ));
    backends.register(Arc::new(
        DorisBackend::new(backend_timeout).with_time_field(&config.backends.time_field),
    ));

    let orchestrator = Arc::new(ScrollOrchestrator::new(
        Arc::clone(&store),
        Arc::clone(&router),
        Arc::new(backends),
        config.scroll.to_engine_config(),
    ));

    let api_config = ApiConfig {
        host: config.api.host.clone(),
        port: config.api.port,
        request_timeout_ms: config.api.request_timeout_secs * 1000,
        max_body_size: config.api.max_body_size,
    };

    let state = AppState::new(orchestrator, store, api_config.clone());
    api::serve(state, &api_config)
        .await
        .context("API server failed")?;

    Ok(())
}

/// Initialize logging from config, honoring RUST_LOG when set
fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("tidegate={}", config.logging.level)),
    );

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
