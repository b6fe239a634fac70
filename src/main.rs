use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use fixability_search::api;
use fixability_search::config::Config;
use fixability_search::github::run_full_sync;
use fixability_search::scoring::drain_dirty;
use fixability_search::state::AppState;

#[derive(Parser)]
#[command(name = "fixability-search")]
#[command(about = "Ingest GitHub issues, score their fixability, and serve ranked search")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,
    /// Pull repositories, issues and comments from GitHub
    Sync {
        /// Repo list to read instead of REPOS_CSV_PATH
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Score every dirty issue
    Score,
    /// Sync, then score
    Full {
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());

    let state = AppState::new(config).context("Failed to initialize application state")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(state).await,
        Commands::Sync { csv } => sync(&state, csv).await,
        Commands::Score => score(&state).await,
        Commands::Full { csv } => {
            sync(&state, csv).await?;
            score(&state).await
        }
    }
}

async fn sync(state: &AppState, csv: Option<PathBuf>) -> anyhow::Result<()> {
    let csv_path = csv.unwrap_or_else(|| state.config.repos_csv_path.clone());
    let stats = run_full_sync(
        &state.github,
        state.store.clone(),
        state.index.clone(),
        &csv_path,
        state.sync_options(),
    )
    .await?;
    println!(
        "Synced {} repos, {} issues, {} comments",
        stats.repos, stats.issues, stats.comments
    );
    Ok(())
}

async fn score(state: &AppState) -> anyhow::Result<()> {
    let store = state.store.clone();
    let limit = state.config.score_batch_limit;
    let scored = tokio::task::spawn_blocking(move || drain_dirty(&store, limit)).await??;
    println!("Scored {scored} issues");
    Ok(())
}

/// Drain dirty issues on a fixed interval, recorded as the `score` job.
fn spawn_periodic_scoring(state: AppState, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if !state.jobs.try_start("score") {
                continue;
            }

            let store = state.store.clone();
            let limit = state.config.score_batch_limit;
            match tokio::task::spawn_blocking(move || drain_dirty(&store, limit)).await {
                Ok(Ok(scored)) => state.jobs.complete("score", serde_json::json!({ "scored": scored })),
                Ok(Err(e)) => {
                    tracing::error!("Periodic scoring failed: {e:#}");
                    state.jobs.fail("score", format!("{e:#}"));
                }
                Err(e) => {
                    tracing::error!("Periodic scoring task panicked: {e}");
                    state.jobs.fail("score", e.to_string());
                }
            }
        }
    });
}

async fn serve(state: AppState) -> anyhow::Result<()> {
    let bind_addr = state.config.bind_addr.clone();

    if state.config.score_interval_secs > 0 {
        tracing::info!("Scoring dirty issues every {}s", state.config.score_interval_secs);
        spawn_periodic_scoring(state.clone(), Duration::from_secs(state.config.score_interval_secs));
    }

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {bind_addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
