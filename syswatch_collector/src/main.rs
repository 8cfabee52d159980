//! Entry point for the SysWatch collector. `migrate` sets up the database,
//! `serve` (default) runs the HTTP API.

use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use syswatch_collector::config::{parse_args, ArgsError, CollectorConfig, Command};
use syswatch_collector::db::SqliteRepository;
use syswatch_collector::http::build_router;
use syswatch_collector::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = match parse_args(std::env::args()) {
        Ok(c) => c,
        Err(ArgsError::Help(usage)) => {
            println!("{usage}");
            return Ok(());
        }
        Err(e @ ArgsError::Invalid(..)) => return Err(e.into()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match cfg.command {
        Command::Migrate => migrate(&cfg),
        Command::Serve => serve(cfg).await,
    }
}

fn migrate(cfg: &CollectorConfig) -> anyhow::Result<()> {
    let repo = SqliteRepository::open(&cfg.db_path)
        .with_context(|| format!("opening {}", cfg.db_path.display()))?;
    repo.migrate()?;
    info!("schema ready in {}", cfg.db_path.display());
    Ok(())
}

async fn serve(cfg: CollectorConfig) -> anyhow::Result<()> {
    let repo = SqliteRepository::open(&cfg.db_path)
        .with_context(|| format!("opening {}", cfg.db_path.display()))?;
    repo.ensure_migrated()
        .with_context(|| format!("checking schema of {}", cfg.db_path.display()))?;
    info!(
        "durable store {} holds {} systems",
        cfg.db_path.display(),
        repo.row_count()?
    );

    let state = AppState::new(Arc::new(repo), cfg.public_url.clone());
    let app = build_router(state);

    let addr = cfg.addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("collector listening on http://{}", listener.local_addr()?);
    info!("dashboard links point at {}", cfg.public_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("shutting down"),
                Err(e) => {
                    warn!("cannot listen for Ctrl-C ({e}); serving until killed");
                    std::future::pending::<()>().await;
                }
            }
        })
        .await?;
    Ok(())
}
