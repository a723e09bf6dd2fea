//! The boundary to the telemetry backend.
//!
//! The collection loop only sees [`TelemetrySink`]: it records one gauge
//! value per observation and asks for a flush once per tick, so delivery
//! follows tick boundaries instead of the exporter's own timer.

mod console;
mod otlp;
mod recording;

use crate::observation::Observation;
use chrono::{
    DateTime,
    Utc,
};
pub use console::ConsoleSink;
use eyre::{
    eyre,
    Result,
};
use marklogic_metrics_config::{
    ResourceKind,
    TelemetryConfig,
};
pub use otlp::OtlpSink;
pub use recording::RecordingSink;
use std::sync::Arc;

pub trait TelemetrySink: Send + Sync {
    /// Records `observation` as a gauge value attributed to the tick started at `timestamp`.
    fn record(&self, kind: ResourceKind, observation: &Observation, timestamp: DateTime<Utc>);

    /// Delivers everything recorded so far. May block.
    fn flush(&self) -> Result<()>;

    /// Final flush before the process exits. May block.
    fn shutdown(&self) -> Result<()> {
        self.flush()
    }
}

/// Forwards to several sinks, e.g. OTLP plus the console.
pub struct FanoutSink {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn TelemetrySink>>) -> Self {
        Self { sinks }
    }

    /// Runs `op` on every sink even if an earlier one fails.
    fn each(&self, op: impl Fn(&dyn TelemetrySink) -> Result<()>) -> Result<()> {
        let errors = self
            .sinks
            .iter()
            .filter_map(|sink| op(sink.as_ref()).err())
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(eyre!(errors.join("; ")))
        }
    }
}

impl TelemetrySink for FanoutSink {
    fn record(&self, kind: ResourceKind, observation: &Observation, timestamp: DateTime<Utc>) {
        for sink in &self.sinks {
            sink.record(kind, observation, timestamp);
        }
    }

    fn flush(&self) -> Result<()> {
        self.each(|sink| sink.flush())
    }

    fn shutdown(&self) -> Result<()> {
        self.each(|sink| sink.shutdown())
    }
}

/// Builds the sinks enabled in `config`. Falls back to the console when nothing is enabled.
pub fn from_config(config: &TelemetryConfig, kinds: &[ResourceKind]) -> Result<Arc<dyn TelemetrySink>> {
    let mut sinks: Vec<Arc<dyn TelemetrySink>> = Vec::new();
    if config.otlp {
        sinks.push(Arc::new(OtlpSink::new(config, kinds)?));
    }
    if config.console || sinks.is_empty() {
        if !config.console {
            warn!("no exporter enabled, printing observations to the console");
        }
        sinks.push(Arc::new(ConsoleSink::default()));
    }

    if sinks.len() == 1 {
        Ok(sinks.remove(0))
    } else {
        Ok(Arc::new(FanoutSink::new(sinks)))
    }
}
