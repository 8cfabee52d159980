//! Entry point for the SysWatch agent. Loads (or creates) the host identity
//! and pushes a reading to the collector every interval until Ctrl-C.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use syswatch_agent::config::{parse_args, ArgsError};
use syswatch_agent::identity::load_or_create;
use syswatch_agent::ping::PingProbe;
use syswatch_agent::runner::Runner;
use syswatch_agent::sampler::Sampler;
use syswatch_agent::transport::Transport;

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

    let system_id = load_or_create(&cfg.identity_path).context("loading system identity")?;
    let transport =
        Transport::new(cfg.server.clone(), cfg.request_timeout).context("building HTTP client")?;
    let sampler = Sampler::new(PingProbe::new(cfg.ping_host.clone(), cfg.ping_timeout));

    info!("SysWatch agent started");
    info!("sending metrics to {}", cfg.server);
    info!("update interval: {}s", cfg.interval.as_secs());
    info!("system id: {system_id} ({})", cfg.identity_path.display());

    let mut runner = Runner::new(system_id, sampler, transport);
    tokio::select! {
        _ = runner.run(&cfg) => {}
        _ = tokio::signal::ctrl_c() => info!("agent stopped by user"),
    }
    Ok(())
}
