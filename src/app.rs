use color_eyre::Result;
use eyre::{
    eyre,
    Context as _,
};
use marklogic_metrics_collector::{
    sink,
    ManageClient,
    Scheduler,
    TelemetrySink,
};
use marklogic_metrics_config::{
    Args,
    Config,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct App {
    config: Config,
    once: bool,
}

impl App {
    pub fn new(args: Args) -> Result<Self> {
        let once = args.once;
        let config = Config::new(args).context("Failed to load configuration")?;
        config.validate()?;
        Ok(Self { config, once })
    }

    pub fn verbose(&self) -> bool {
        self.config.verbose
    }

    pub async fn run(self) -> Result<()> {
        info!(
            manage = %self.config.manage.url,
            auth = %self.config.manage.auth,
            resources = ?self.config.collection.resource_types,
            interval = ?self.config.collection.interval,
            "Starting MarkLogic metrics collection"
        );
        debug!(config = ?self.config, "Effective configuration");

        let sink = sink::from_config(&self.config.telemetry, &self.config.collection.resource_types)?;
        let client = ManageClient::new(self.config.manage.clone())?;
        let scheduler = Scheduler::new(&self.config, Arc::new(client), sink.clone());
        let cancel = CancellationToken::new();

        let result = if self.once {
            let report = scheduler.run_once(&cancel).await;
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialize tick report")?
            );
            Ok(())
        } else {
            tokio::spawn(wait_for_shutdown(cancel.clone()));
            scheduler.run(cancel).await
        };

        shutdown_sink(sink).await;
        info!("MarkLogic metrics collection stopped");
        result
    }
}

/// Final export; errors are logged since the process is exiting anyway.
async fn shutdown_sink(sink: Arc<dyn TelemetrySink>) {
    let outcome = tokio::task::spawn_blocking(move || sink.shutdown())
        .await
        .map_err(|e| eyre!("shutdown task failed: {e}"))
        .and_then(|result| result);
    if let Err(err) = outcome {
        warn!("Failed to shut down telemetry exporter: {err}");
    }
}

async fn wait_for_shutdown(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
    cancel.cancel();
}
