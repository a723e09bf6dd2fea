use super::TelemetrySink;
use crate::observation::{
    Observation,
    TAG_SOURCE,
    UNKNOWN_IDENTITY,
};
use chrono::{
    DateTime,
    SecondsFormat,
    Utc,
};
use eyre::{
    eyre,
    Result,
};
use marklogic_metrics_config::ResourceKind;
use std::{
    io::Write,
    sync::Mutex,
};

/// Lines recorded since the last flush, headed by the tick they belong to.
#[derive(Debug, Default)]
struct Batch {
    timestamp: Option<DateTime<Utc>>,
    lines: Vec<String>,
}

/// Prints `source: metric = value` lines on stdout, one batch per flush.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    pending: Mutex<Batch>,
}

impl ConsoleSink {
    fn line(observation: &Observation) -> String {
        let source = observation.tag(TAG_SOURCE).unwrap_or(UNKNOWN_IDENTITY);
        format!("{source}: {} = {}", observation.name, observation.value)
    }

    fn header(timestamp: Option<DateTime<Utc>>) -> String {
        match timestamp {
            Some(ts) => format!("=== Metric Export {} ===", ts.to_rfc3339_opts(SecondsFormat::Secs, true)),
            None => "=== Metric Export ===".to_string(),
        }
    }

    fn take(&self) -> Result<Batch> {
        let mut pending = self.pending.lock().map_err(|_| eyre!("console sink lock poisoned"))?;
        Ok(std::mem::take(&mut *pending))
    }
}

impl TelemetrySink for ConsoleSink {
    fn record(&self, _kind: ResourceKind, observation: &Observation, timestamp: DateTime<Utc>) {
        match self.pending.lock() {
            Ok(mut pending) => {
                pending.timestamp.get_or_insert(timestamp);
                pending.lines.push(Self::line(observation));
            }
            Err(_) => warn!(metric = %observation.name, "console sink lock poisoned, dropping observation"),
        }
    }

    fn flush(&self) -> Result<()> {
        let batch = self.take()?;
        if batch.lines.is_empty() {
            return Ok(());
        }
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "\n{}", Self::header(batch.timestamp))?;
        for line in batch.lines {
            writeln!(stdout, "{line}")?;
        }
        stdout.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    #[test]
    fn formats_source_name_and_value() {
        let observation = Observation {
            name: "cpu-usage".to_string(),
            value: 12.5,
            unit: "1".to_string(),
            tags: BTreeMap::from([("source".to_string(), "host".to_string())]),
        };
        assert_eq!(ConsoleSink::line(&observation), "host: cpu-usage = 12.5");
    }

    #[test]
    fn flush_drains_pending_lines() {
        let sink = ConsoleSink::default();
        let observation = Observation {
            name: "data-size".to_string(),
            value: 3.0,
            unit: "MB".to_string(),
            tags: BTreeMap::new(),
        };
        sink.record(ResourceKind::Databases, &observation, Utc::now());
        sink.flush().unwrap();
        let batch = sink.take().unwrap();
        assert!(batch.lines.is_empty());
        assert!(batch.timestamp.is_none());
    }

    #[test]
    fn batch_is_headed_by_the_first_tick_timestamp() {
        let sink = ConsoleSink::default();
        let observation = Observation {
            name: "cpu-usage".to_string(),
            value: 1.0,
            unit: "1".to_string(),
            tags: BTreeMap::new(),
        };
        let tick = Utc.with_ymd_and_hms(2024, 3, 7, 14, 42, 17).unwrap();
        sink.record(ResourceKind::Hosts, &observation, tick);
        sink.record(ResourceKind::Hosts, &observation, tick + chrono::Duration::seconds(1));

        let batch = sink.take().unwrap();
        assert_eq!(batch.lines.len(), 2);
        assert_eq!(ConsoleSink::header(batch.timestamp), "=== Metric Export 2024-03-07T14:42:17Z ===");
    }

    #[test]
    fn poisoned_lock_is_reported_by_flush() {
        let sink = std::sync::Arc::new(ConsoleSink::default());
        let poisoner = sink.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.pending.lock().unwrap();
            panic!("poison the batch lock");
        })
        .join();

        let observation = Observation {
            name: "cpu-usage".to_string(),
            value: 1.0,
            unit: "1".to_string(),
            tags: BTreeMap::new(),
        };
        sink.record(ResourceKind::Hosts, &observation, Utc::now());
        assert!(sink.flush().unwrap_err().to_string().contains("poisoned"));
    }
}
