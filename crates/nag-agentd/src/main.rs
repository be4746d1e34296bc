//! `nagd`: notification dispatch daemon.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use clap::Parser;
use nag_api::{HttpApi, NotifierAdapter};
use nag_core::{Notifier, NotifierConfig, SystemClock, TaskQueue};
use nag_observe::{Journal, logger_init};
use tracing::{info, warn};

mod config;
use config::DaemonConfig;

#[derive(Parser, Debug)]
#[command(name = "nagd", version, about = "Notification dispatch daemon")]
struct Args {
    /// Path to the TOML config file.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Listen address, overrides the config file.
    #[arg(long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => DaemonConfig::load(path)?,
        None => DaemonConfig::default(),
    };
    if let Some(listen) = args.listen {
        cfg.listen = listen;
    }
    logger_init(&cfg.logger.clone().with_env_override())?;

    let router = cfg.build_router()?;
    if router.is_empty() {
        warn!(target: "nagd", "no delivery backends configured; every notification will error");
    } else {
        info!(target: "nagd", backends = ?router.names(), "delivery backends ready");
    }

    let queue = TaskQueue::new();
    let journal = Journal::new();
    let queue_log = journal.follow_queue(queue.subscribe());

    let notifier = Notifier::with_config(
        queue,
        Arc::new(router),
        NotifierConfig {
            sweep_interval: cfg.sweep_interval(),
            clock: Arc::new(SystemClock),
        },
    );
    let nag_log = journal.follow_notifier(notifier.subscribe());

    let app = HttpApi::new(Arc::new(NotifierAdapter::new(notifier.clone()))).router();
    let listener = tokio::net::TcpListener::bind(cfg.listen).await?;
    info!(target: "nagd", listen = %cfg.listen, "daemon starting");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(target: "nagd", "shutting down");
    notifier.shutdown();
    if let Err(e) = notifier.suspend(true).await {
        warn!(target: "nagd", error = %e, "failed to stop running delivery");
    }
    drop(notifier);
    queue_log.abort();
    nag_log.abort();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(target: "nagd", error = %e, "ctrl-c handler failed; shutting down");
    }
}
