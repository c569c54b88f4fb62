use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use shelfscan::{router, AppConfig, AppState};
use shelfscan_core::{
    Intake, LocalFileStorage, MemoryStore, PostgresStore, RecordStore, TokioExecutor,
    TracingEventSink,
};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Warehouse scan ingestion and inventory comparison service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP API server
    Serve(ServeArgs),
    /// Run database migrations
    Migrate,
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Address to listen on (overrides SHELFSCAN_BIND)
    #[arg(long)]
    bind: Option<SocketAddr>,
    /// Keep records in memory instead of Postgres
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    match cli.command {
        Command::Serve(args) => serve(config, args).await,
        Command::Migrate => {
            let store = connect_store(&config).await?;
            store.run_migrations().await?;
            info!("Database migrations applied");
            Ok(())
        }
    }
}

async fn serve(config: AppConfig, args: ServeArgs) -> Result<()> {
    let store: Arc<dyn RecordStore> = if args.in_memory {
        warn!("Using in-memory record store; records are lost on exit");
        Arc::new(MemoryStore::new())
    } else {
        let store = connect_store(&config).await?;
        store.run_migrations().await?;
        Arc::new(store)
    };

    let intake = Intake::new(
        store,
        Arc::new(LocalFileStorage),
        Arc::new(TokioExecutor),
        Arc::new(TracingEventSink),
        config.storage_layout(),
        config.pipeline.clone(),
    );
    let app = router(AppState::new(intake), config.max_upload_bytes);

    let bind = args.bind.unwrap_or(config.bind);
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn connect_store(config: &AppConfig) -> Result<PostgresStore> {
    let database_url = config.require_database_url()?;
    PostgresStore::connect(database_url, shelfscan::config::DEFAULT_MAX_CONNECTIONS)
        .await
        .context("failed to connect to Postgres")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
    }
}
