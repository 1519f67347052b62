//! docsmith server entry point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use docsmith_core::Config;
use docsmith_engine::{Orchestrator, ProgressBus};
use docsmith_github::{GithubClient, SourceProvider};
use docsmith_store::Database;
use docsmith_web::AppState;

#[derive(Parser)]
#[command(name = "docsmith-server", about = "Automated documentation pipeline server")]
struct Cli {
    /// Path to a TOML config file (environment variables still win)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the bind address
    #[arg(long)]
    bind: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = format!(
        "docsmith_server={level},docsmith_web={level},docsmith_engine={level},\
         docsmith_store={level},docsmith_github={level},analyzer=debug",
        level = log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(env_filter))
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }

    let db = match config.sqlite_path() {
        Some(path) => {
            info!(path = %path.display(), "opening database");
            Database::open(&path).context("failed to open database")?
        }
        None => {
            warn!("DATABASE_URL not set; persistence is disabled");
            Database::unconfigured()
        }
    };

    if config.webhook_secret.is_none() {
        warn!("GITHUB_WEBHOOK_SECRET not set; webhook deliveries will be rejected");
    }
    if config.public_webhook_base_url.is_none() {
        warn!("PUBLIC_WEBHOOK_BASE_URL not set; webhooks will not be registered");
    }

    let provider: Arc<dyn SourceProvider> = Arc::new(
        GithubClient::new(config.provider_timeout).context("failed to build provider client")?,
    );
    let bus = Arc::new(ProgressBus::new());
    let orchestrator = Orchestrator::new(config.clone(), db.clone(), provider.clone(), bus);

    let state = AppState::new(config.clone(), db, provider, orchestrator);
    let app = docsmith_web::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "docsmith listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown requested");
}
