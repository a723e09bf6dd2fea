//! The collection loop.
//!
//! Between ticks the loop is idle. Every tick runs fetch, normalize and emit
//! for each configured resource type in order, then flushes the sink exactly
//! once. A failing resource type is logged and contributes nothing; the
//! others are unaffected. Cancellation is honoured between resource types
//! and between ticks, and a final flush always runs before [`Scheduler::run`]
//! returns.

use crate::{
    error::CollectError,
    fetcher::MetricSource,
    normalizer::Normalizer,
    sink::TelemetrySink,
    window::TimeWindow,
};
use chrono::{
    DateTime,
    Utc,
};
use eyre::{
    eyre,
    Result,
};
use marklogic_metrics_config::{
    Config,
    ResourceKind,
};
use serde::Serialize;
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Outcome of one resource type within a tick.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceReport {
    pub resource: ResourceKind,
    pub observations: usize,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

impl ResourceReport {
    fn failed(resource: ResourceKind, err: &CollectError) -> Self {
        Self {
            resource,
            observations: 0,
            warnings: Vec::new(),
            error: Some(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub resources: Vec<ResourceReport>,
    pub flush_error: Option<String>,
    pub cancelled: bool,
}

impl TickReport {
    pub fn total_observations(&self) -> usize {
        self.resources.iter().map(|r| r.observations).sum()
    }
}

pub struct Scheduler {
    source: Arc<dyn MetricSource>,
    sink: Arc<dyn TelemetrySink>,
    normalizer: Normalizer,
    resource_types: Vec<ResourceKind>,
    interval: Duration,
    fetch_timeout: Duration,
    flush_timeout: Duration,
    verbose: bool,
}

impl Scheduler {
    pub fn new(config: &Config, source: Arc<dyn MetricSource>, sink: Arc<dyn TelemetrySink>) -> Self {
        Self {
            source,
            sink,
            normalizer: Normalizer::new(config.collection.entry_policy),
            resource_types: config.collection.resource_types.clone(),
            interval: config.collection.interval,
            // a host fetch issues the metrics request and the name lookup
            fetch_timeout: config.manage.request_timeout * 2,
            flush_timeout: config.telemetry.flush_timeout,
            verbose: config.verbose,
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Ticks every interval until `cancel` fires, then flushes one last time.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval = ?self.interval,
            resources = ?self.resource_types,
            "starting collection loop"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let report = self.run_once(&cancel).await;
            self.log_report(&report);
            if report.cancelled {
                break;
            }
        }

        info!("stopping collection loop, flushing pending observations");
        self.flush().await.inspect_err(|err| warn!("final flush failed: {err}"))
    }

    /// One full pass over all resource types followed by a single flush.
    pub async fn run_once(&self, cancel: &CancellationToken) -> TickReport {
        let started_at = Utc::now();
        let window = TimeWindow::current_hour(started_at);
        let mut resources = Vec::with_capacity(self.resource_types.len());
        let mut cancelled = false;

        for kind in &self.resource_types {
            if cancel.is_cancelled() {
                debug!(%kind, "cancelled before collecting");
                cancelled = true;
                break;
            }
            resources.push(self.collect(*kind, window, started_at).await);
        }

        let flush_error = self.flush().await.err().map(|err| {
            warn!("flush failed: {err}");
            err.to_string()
        });

        TickReport {
            started_at,
            finished_at: Utc::now(),
            resources,
            flush_error,
            cancelled,
        }
    }

    async fn collect(&self, kind: ResourceKind, window: TimeWindow, timestamp: DateTime<Utc>) -> ResourceReport {
        let fetched = tokio::time::timeout(self.fetch_timeout, self.source.fetch(kind, window))
            .await
            .unwrap_or_else(|_| Err(CollectError::Timeout(self.fetch_timeout)));

        let raw = match fetched {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                warn!(%kind, "no usable metrics in response");
                return ResourceReport {
                    resource: kind,
                    observations: 0,
                    warnings: Vec::new(),
                    error: None,
                };
            }
            Err(err) if err.is_auth() => {
                error!(%kind, "Management API rejected the credentials: {err}");
                return ResourceReport::failed(kind, &err);
            }
            Err(err) => {
                warn!(%kind, "failed to fetch metrics: {err}");
                return ResourceReport::failed(kind, &err);
            }
        };

        let normalized = self.normalizer.normalize(kind, &raw);
        for warning in &normalized.warnings {
            warn!(%kind, "skipping metric: {warning}");
        }
        for observation in &normalized.observations {
            self.sink.record(kind, observation, timestamp);
        }

        ResourceReport {
            resource: kind,
            observations: normalized.observations.len(),
            warnings: normalized.warnings.iter().map(ToString::to_string).collect(),
            error: None,
        }
    }

    /// Flushes on the blocking pool, bounded by the flush timeout.
    pub async fn flush(&self) -> Result<()> {
        let sink = self.sink.clone();
        let flush = tokio::task::spawn_blocking(move || sink.flush());
        match tokio::time::timeout(self.flush_timeout, flush).await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => Err(eyre!("flush task failed: {err}")),
            Err(_) => Err(eyre!("flush timed out after {:?}", self.flush_timeout)),
        }
    }

    fn log_report(&self, report: &TickReport) {
        for resource in &report.resources {
            if self.verbose {
                info!(
                    resource = %resource.resource,
                    count = resource.observations,
                    skipped = resource.warnings.len(),
                    failed = resource.error.is_some(),
                    "collected metrics"
                );
            } else {
                debug!(
                    resource = %resource.resource,
                    count = resource.observations,
                    skipped = resource.warnings.len(),
                    failed = resource.error.is_some(),
                    "collected metrics"
                );
            }
        }
    }
}
