use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use apix_server::api::state::AppState;
use apix_server::api::{build_router, cors_layer};
use apix_server::config::AppConfig;
use apix_server::genai::{resolve_api_key, GenAiClient, GenerativeBackend};
use apix_server::models::Category;
use apix_server::storage::{migrate_legacy, DocumentStore, ImageStore, StorageLayout};

#[derive(Parser)]
#[command(name = "apix-server")]
#[command(about = "Local image storage backend for the aPix client")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./apix.toml")]
    config: PathBuf,

    /// Storage root directory (overrides the config file)
    #[arg(long)]
    storage_root: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare storage, migrate legacy uploads and start the API server
    Serve {
        /// Bind address
        #[arg(long)]
        host: Option<String>,

        /// Port number
        #[arg(long)]
        port: Option<u16>,

        /// Accept requests from any origin
        #[arg(long)]
        dev: bool,
    },

    /// Run the legacy storage migration and exit
    Migrate,

    /// Check that a generative AI API key is accepted
    CheckKey {
        /// Key to check; falls back to the configured environment variable
        #[arg(long)]
        api_key: Option<String>,
    },
}

fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Create the directory tree and drain the legacy layout. Any failure here
/// stops startup.
fn prepare_storage(config: &AppConfig) -> Result<StorageLayout> {
    let layout = StorageLayout::new(&config.storage_root)
        .with_context(|| format!("invalid storage root {:?}", config.storage_root))?;
    layout
        .ensure()
        .with_context(|| format!("failed to create storage under {:?}", layout.root()))?;

    let report = migrate_legacy(&layout).context("legacy storage migration failed")?;
    if !report.is_noop() {
        tracing::info!(
            "Migrated {} legacy files ({} renamed)",
            report.files_moved,
            report.files_renamed
        );
    }
    Ok(layout)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("failed to load {:?}", cli.config))?;
    if let Some(root) = cli.storage_root {
        config.storage_root = root;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    init_tracing(&config.log_level, cli.json_logs);
    tracing::info!("Starting apix-server v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Serve { host, port, dev } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            config.server.dev_mode |= dev;
            config.validate()?;

            let layout = prepare_storage(&config)?;
            for category in Category::ALL {
                tracing::info!(
                    "{} directory: {}",
                    category,
                    layout.category_dir(category).display()
                );
            }
            tracing::info!("Data directory: {}", layout.data_dir().display());

            let state = AppState {
                documents: Arc::new(DocumentStore::new(layout.data_dir())),
                images: Arc::new(ImageStore::new(layout)),
                base_url: Arc::from(config.server.base_url()),
                uploads: Arc::new(config.uploads.clone()),
            };
            let app = build_router(state).layer(cors_layer(&config.server));

            let addr = format!("{}:{}", config.server.host, config.server.port);
            let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| {
                format!(
                    "port {} is unavailable, stop the other process or pick another port",
                    config.server.port
                )
            })?;
            tracing::info!("aPix backend server running on http://{}", addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        Commands::Migrate => {
            let layout = prepare_storage(&config)?;
            tracing::info!("Storage ready under {}", layout.root().display());
        }
        Commands::CheckKey { api_key } => {
            let env_value = std::env::var(&config.genai.api_key_env).ok();
            let Some(key) = resolve_api_key(api_key.as_deref(), env_value) else {
                bail!(
                    "no API key: pass --api-key or set {}",
                    config.genai.api_key_env
                );
            };

            let client = GenAiClient::new(&config.genai, key)?;
            if client.health_check().await? {
                tracing::info!(
                    "API key accepted by {} for model {}",
                    client.name(),
                    client.model()
                );
            } else {
                bail!("API key rejected by {}", client.name());
            }
        }
    }

    Ok(())
}
