//! Exporter run loop
//!
//! ```text
//!                ┌──────────────┐
//!   SIGINT ────▶ │ signal watch │ ──cancel──┐
//!   SIGTERM ───▶ └──────────────┘           ▼
//!                ┌──────────────┐     ┌──────────┐
//!   scrapes ───▶ │ HTTP server  │ ◀── │ lifetime │
//!                └──────────────┘     └──────────┘
//!                ┌──────────────┐           │
//!                │ async runner │ ◀─────────┘
//!                └──────────────┘
//! ```
//!
//! All three parts share one [`CancellationToken`]. A signal, a failing signal
//! watcher or the server going down cancels it, which in turn stops the other
//! parts. A failing async runner does not, so scrapes keep being served.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::cache::InstanceCache;
use crate::config::ExporterConfig;
use crate::orchestrator::Orchestrator;
use crate::registry::Registry;
use crate::runner::AsyncRunner;
use crate::server::spawn_server;

#[derive(Debug)]
pub struct Exporter {
    config: ExporterConfig,
    orchestrator: Orchestrator,
    runner: AsyncRunner,
}

impl Exporter {
    /// Build the working set from `registry`, sealing it
    pub fn new(
        config: ExporterConfig,
        registry: &Registry,
        cache: &InstanceCache,
    ) -> anyhow::Result<Self> {
        let orchestrator =
            Orchestrator::new(registry, cache, &config.namespace, config.collectors.as_slice())
                .context("failed to set up collectors")?;
        let runner = AsyncRunner::new(cache);

        Ok(Self {
            config,
            orchestrator,
            runner,
        })
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Serve until SIGINT or SIGTERM
    pub async fn run(self) -> anyhow::Result<()> {
        self.run_until(CancellationToken::new()).await
    }

    /// Serve until a signal arrives or `lifetime` is cancelled
    pub async fn run_until(self, lifetime: CancellationToken) -> anyhow::Result<()> {
        self.start(lifetime).await?.wait().await
    }

    /// Bind the server and start every part without waiting for them
    #[instrument(skip_all, fields(listen_address = %self.config.listen_address))]
    pub async fn start(self, lifetime: CancellationToken) -> anyhow::Result<RunningExporter> {
        info!(collectors = ?self.orchestrator.collectors(), "starting exporter");

        let (addr, server) = spawn_server(&self.config, self.orchestrator, lifetime.clone()).await?;

        let mut parts: JoinSet<anyhow::Result<()>> = JoinSet::new();
        parts.spawn(async move { server.await.context("metrics server task failed")? });
        parts.spawn(watch_signals(lifetime.clone()));
        let runner = self.runner;
        let runner_lifetime = lifetime.clone();
        parts.spawn(async move { Ok(runner.run(runner_lifetime).await?) });

        Ok(RunningExporter {
            addr,
            lifetime,
            parts,
        })
    }
}

/// Handle to an exporter started with [`Exporter::start`]
pub struct RunningExporter {
    addr: SocketAddr,
    lifetime: CancellationToken,
    parts: JoinSet<anyhow::Result<()>>,
}

impl RunningExporter {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn shutdown(&self) {
        self.lifetime.cancel();
    }

    /// Wait for every part to stop and return the error that occurred first
    pub async fn wait(self) -> anyhow::Result<()> {
        let result = first_error(self.parts).await;
        debug!("exporter stopped");
        result
    }
}

/// Join every task, keeping the earliest error in completion order
async fn first_error(mut parts: JoinSet<anyhow::Result<()>>) -> anyhow::Result<()> {
    let mut first = None;
    while let Some(joined) = parts.join_next().await {
        let result = joined
            .context("exporter task did not complete")
            .and_then(|res| res);

        if let Err(e) = result {
            match first {
                None => first = Some(e),
                Some(_) => debug!("exporter part failed after an earlier error: {e:#}"),
            }
        }
    }

    match first {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn watch_signals(lifetime: CancellationToken) -> anyhow::Result<()> {
    shutdown_on(lifetime, shutdown_signal()).await
}

/// Wait for SIGINT or SIGTERM and return the name of the one received
async fn shutdown_signal() -> anyhow::Result<&'static str> {
    #[cfg(unix)]
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("failed to install SIGTERM handler")?;

    #[cfg(unix)]
    let terminated = terminate.recv();
    #[cfg(not(unix))]
    let terminated = std::future::pending::<Option<()>>();

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("failed to listen for SIGINT")?;
            Ok("SIGINT")
        }
        _ = terminated => Ok("SIGTERM"),
    }
}

/// Cancel `lifetime` once `signal` resolves, whether it succeeded or not
async fn shutdown_on<F>(lifetime: CancellationToken, signal: F) -> anyhow::Result<()>
where
    F: Future<Output = anyhow::Result<&'static str>>,
{
    let _cancel_on_exit = lifetime.clone().drop_guard();

    tokio::select! {
        _ = lifetime.cancelled() => Ok(()),
        received = signal => {
            let received = received?;
            info!("received {received}, shutting down");
            Ok(())
        }
    }
}
