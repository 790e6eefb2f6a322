use aggregate_depth::bin_common::{parse_args, resolve_config_path, BinaryRunner, RunConfig};
use anyhow::{Context, Result};
use depth_relay::{init_tracing, RelayApp, RelayConfig, ShutdownManager};
use std::time::Duration;
use tracing::{error, info};

struct RelayRunner {
    app: Option<RelayApp>,
    shutdown: ShutdownManager,
    run_config: RunConfig,
}

impl BinaryRunner for RelayRunner {
    async fn run(&mut self) -> Result<String> {
        let app = self.app.take().context("Relay already stopped")?;

        let mut status = tokio::time::interval(Duration::from_secs(self.run_config.status_interval_secs));
        // First tick fires immediately
        status.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.wait() => break,
                _ = status.tick() => {
                    info!(
                        subscribers = app.subscriber_count(),
                        symbols = app.symbols_tracked(),
                        ingest = ?app.ingest_state(),
                        "Status"
                    );
                }
            }
        }

        let report = app.shutdown().await;
        Ok(format!(
            "Stop reason: {} | subscribers closed: {} | symbols tracked: {}",
            report.stop_reason, report.subscribers_closed, report.symbols_tracked
        ))
    }

    fn config(&self) -> &RunConfig {
        &self.run_config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load config first (before logging is initialized)
    let source = resolve_config_path(&parse_args());
    let config = RelayConfig::load(source.path())
        .with_context(|| format!("Failed to load config from {}", source.path().display()))?;

    init_tracing(config.env);
    info!("Config source: {:?}", source);
    config.log();

    let shutdown = ShutdownManager::new();
    shutdown.spawn_signal_handler();

    let app = match RelayApp::start(&config).await {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "Failed to start relay");
            return Err(e).context("Failed to start relay");
        }
    };
    info!("Serving subscribers on ws://{}{}", app.local_addr(), config.wss.path);

    let mut runner = RelayRunner {
        app: Some(app),
        shutdown,
        run_config: RunConfig::new("Aggregate Depth Relay"),
    };
    runner.execute().await
}
