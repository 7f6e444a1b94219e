use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use field_sync::application::ports::ConnectivitySignal;
use field_sync::shared::config::AppConfig;
use field_sync::{init_logging, AppState};
use futures::StreamExt;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "field-sync-agent")]
#[command(about = "Drains the offline submission queue into the field data backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override the queue database URL
    #[arg(long, env = "FIELD_SYNC_DATABASE_URL")]
    database_url: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch connectivity and sync automatically until Ctrl+C
    Run,
    /// Print queue and sync status as JSON
    Status,
    /// Run one sync pass now
    Sync,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    let mut config = AppConfig::from_env();
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }

    let state = AppState::new(config)
        .await
        .context("failed to initialize field sync state")?;
    info!("field-sync-agent v{} started", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Run => run(&state).await,
        Commands::Status => {
            let outcome = status(&state).await;
            state.shutdown(Vec::new()).await;
            outcome
        }
        Commands::Sync => {
            let outcome = sync_once(&state).await;
            state.shutdown(Vec::new()).await;
            outcome
        }
    }
}

async fn run(state: &AppState) -> Result<()> {
    let handles = state.start_background_tasks();

    let mut progress = Box::pin(state.sync_service.progress_stream());
    let progress_task = tokio::spawn(async move {
        while let Some(update) = progress.next().await {
            info!(processed = update.processed, total = update.total, "sync progress");
        }
    });

    if state.connectivity.is_online() {
        if let Err(err) = state.sync_service.trigger_sync().await {
            warn!(error = %err, "initial sync failed");
        }
    }

    info!("watching for connectivity changes. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    progress_task.abort();
    state.shutdown(handles).await;
    Ok(())
}

async fn status(state: &AppState) -> Result<()> {
    let status = state.sync_service.get_status().await?;
    let report = serde_json::json!({
        "online": state.connectivity.is_online(),
        "status": status,
        "metrics": state.sync_service.metrics(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn sync_once(state: &AppState) -> Result<()> {
    let summary = state.sync_service.trigger_sync().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    if !summary.rejected.is_empty() {
        warn!(
            rejected = summary.rejected.len(),
            "some submissions were rejected and need correction"
        );
    }
    Ok(())
}
