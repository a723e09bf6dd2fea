use super::TelemetrySink;
use crate::observation::Observation;
use chrono::{
    DateTime,
    Utc,
};
use eyre::Result;
use marklogic_metrics_config::ResourceKind;
use std::sync::{
    atomic::{
        AtomicUsize,
        Ordering,
    },
    Mutex,
};

/// Keeps everything in memory for inspection.
#[derive(Debug, Default)]
pub struct RecordingSink {
    recorded: Mutex<Vec<(ResourceKind, Observation, DateTime<Utc>)>>,
    flushes: AtomicUsize,
    shutdowns: AtomicUsize,
}

impl RecordingSink {
    pub fn observations(&self) -> Vec<(ResourceKind, Observation)> {
        self.recorded
            .lock()
            .map(|r| r.iter().map(|(kind, o, _)| (*kind, o.clone())).collect())
            .unwrap_or_default()
    }

    /// Tick timestamp of every recorded observation, in recording order.
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.recorded
            .lock()
            .map(|r| r.iter().map(|(_, _, ts)| *ts).collect())
            .unwrap_or_default()
    }

    pub fn observations_for(&self, kind: ResourceKind) -> Vec<Observation> {
        self.observations()
            .into_iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, o)| o)
            .collect()
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl TelemetrySink for RecordingSink {
    fn record(&self, kind: ResourceKind, observation: &Observation, timestamp: DateTime<Utc>) {
        if let Ok(mut recorded) = self.recorded.lock() {
            recorded.push((kind, observation.clone(), timestamp));
        }
    }

    fn flush(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.flush()
    }
}
