#![forbid(unsafe_code)]
#![warn(clippy::dbg_macro, clippy::use_debug, clippy::todo)]

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use emcc_sandboxd::{api, config, gate::MemoryGate, metrics::Metrics, reclaim, VERSION};
use poem::{listener::TcpListener, middleware::Tracing, EndpointExt, Server};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    info!("starting emcc-sandboxd v{VERSION}");

    let config = config::load().context("failed to load config")?;

    if !config.working_dir.is_empty() {
        std::env::set_current_dir(&config.working_dir).with_context(|| {
            format!(
                "failed to change working directory to '{}'",
                config.working_dir
            )
        })?;
        info!("changed working directory to {}", config.working_dir);
    }

    if config.nsjail_enabled {
        which::which(&config.nsjail_path).with_context(|| {
            format!("nsjail enabled but not found at '{}'", config.nsjail_path)
        })?;
    }

    info!("creating directories for jobs and artifacts");
    tokio::fs::create_dir_all(config.jobs_path()).await?;
    tokio::fs::create_dir_all(config.artifacts_path()).await?;

    info!("pruning jobs directory");
    for entry in std::fs::read_dir(config.jobs_path())? {
        let path = entry?.path();
        if path.is_dir() {
            std::fs::remove_dir_all(path)?;
        } else {
            std::fs::remove_file(path)?;
        }
    }

    let config = Arc::new(config);
    let gate = Arc::new(MemoryGate::new(config.cgroup_v2_root.clone()));
    let metrics = Arc::new(Metrics::new()?);

    tokio::spawn(reclaim::reclaim_loop(
        Arc::clone(&config),
        Arc::clone(&metrics),
    ));

    let app = api::app(Arc::clone(&config), gate, metrics).with(Tracing);

    let addr = config.listen_addr();
    info!("listening on {addr}");
    Server::new(TcpListener::bind(addr))
        .run_with_graceful_shutdown(app, shutdown_signal(), Some(Duration::from_secs(3)))
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(_) => {
            let _ = ctrl_c.await;
        }
    }
    info!("shutdown signal received");
}
