use super::TelemetrySink;
use crate::{
    observation::Observation,
    rules::ExtractionRules,
};
use chrono::{
    DateTime,
    Utc,
};
use eyre::{
    eyre,
    Context as _,
    Result,
};
use marklogic_metrics_config::{
    ResourceKind,
    TelemetryConfig,
};
use opentelemetry::{
    metrics::{
        Gauge,
        MeterProvider as _,
    },
    KeyValue,
};
use opentelemetry_otlp::{
    MetricExporter,
    Protocol,
    WithExportConfig,
    WithHttpConfig,
};
use opentelemetry_sdk::{
    metrics::{
        exporter::PushMetricExporter,
        PeriodicReader,
        SdkMeterProvider,
        Temporality,
    },
    runtime,
    Resource,
};
use std::collections::HashMap;

const METER_NAME: &str = "marklogic-metrics";

/// Gauges report only values recorded since the previous collection.
const TEMPORALITY: Temporality = Temporality::Delta;

/// Exports observations as OTLP/HTTP gauges, one instrument per resource type.
///
/// Service identity is attached once as resource attributes. The periodic
/// reader keeps exporting in the background; `flush` forces an export of
/// the current tick.
pub struct OtlpSink {
    provider: SdkMeterProvider,
    gauges: HashMap<ResourceKind, Gauge<f64>>,
}

impl OtlpSink {
    /// Must be called from within a Tokio runtime.
    pub fn new(config: &TelemetryConfig, kinds: &[ResourceKind]) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_ref()
            .ok_or_else(|| eyre!("telemetry.endpoint is required for the OTLP exporter"))?;

        let exporter = MetricExporter::builder()
            .with_temporality(TEMPORALITY)
            .with_http()
            .with_protocol(Protocol::HttpBinary)
            .with_endpoint(endpoint.as_str())
            .with_timeout(config.flush_timeout)
            .with_headers(config.headers())
            .build()
            .context("failed to build OTLP metric exporter")?;

        info!(%endpoint, interval = ?config.export_interval, "OTLP metric exporter configured");
        Ok(Self::with_exporter(exporter, config, kinds))
    }

    /// Must be called from within a Tokio runtime.
    pub fn with_exporter<E>(exporter: E, config: &TelemetryConfig, kinds: &[ResourceKind]) -> Self
    where
        E: PushMetricExporter,
    {
        let reader = PeriodicReader::builder(exporter, runtime::Tokio)
            .with_interval(config.export_interval)
            .build();

        let resource = Resource::new(vec![
            KeyValue::new("service.name", config.service_name.clone()),
            KeyValue::new("service.version", config.service_version.clone()),
            KeyValue::new("host.name", config.host_name.clone()),
        ]);

        let provider = SdkMeterProvider::builder()
            .with_reader(reader)
            .with_resource(resource)
            .build();

        let meter = provider.meter(METER_NAME);
        let gauges = kinds
            .iter()
            .map(|kind| {
                let rules = ExtractionRules::for_kind(*kind);
                let gauge = meter
                    .f64_gauge(rules.instrument)
                    .with_description(rules.description)
                    .with_unit("1")
                    .build();
                (*kind, gauge)
            })
            .collect();

        Self { provider, gauges }
    }
}

impl TelemetrySink for OtlpSink {
    fn record(&self, kind: ResourceKind, observation: &Observation, _timestamp: DateTime<Utc>) {
        let Some(gauge) = self.gauges.get(&kind) else {
            warn!(%kind, "no gauge registered for resource type");
            return;
        };
        let attributes = observation
            .tags
            .iter()
            .map(|(key, value)| KeyValue::new(key.clone(), value.clone()))
            .collect::<Vec<_>>();
        gauge.record(observation.value, &attributes);
    }

    fn flush(&self) -> Result<()> {
        self.provider
            .force_flush()
            .map_err(|e| eyre!("failed to flush OTLP metrics: {e}"))
    }

    fn shutdown(&self) -> Result<()> {
        self.provider
            .shutdown()
            .map_err(|e| eyre!("failed to shut down OTLP exporter: {e}"))
    }
}
