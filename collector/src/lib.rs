//! # MarkLogic Metrics Collector
//!
//! Polls the MarkLogic Management API for host and database metrics and
//! republishes them as OpenTelemetry gauges.
//!
//! ## Architecture
//!
//! - **`fetcher`**: `ManageClient` requests the metrics view of a resource
//!   collection for the current hour and resolves the host name
//! - **`normalizer`**: flattens the nested metrics view into `Observation`s
//! - **`rules`**: per resource type extraction rules (container keys, tags)
//! - **`sink`**: the `TelemetrySink` boundary with OTLP and console exporters
//! - **`scheduler`**: the collection loop, one tick per interval, with a
//!   flush after every tick and on shutdown
//!
//! Failures of one resource type never abort a tick: they are logged and the
//! resource type contributes no observations until the next tick.

#[macro_use]
extern crate tracing;

pub mod error;
pub mod fetcher;
pub mod normalizer;
pub mod observation;
pub mod rules;
pub mod scheduler;
pub mod sink;
pub mod window;

pub use error::CollectError;
pub use fetcher::{
    FetchFuture,
    ManageClient,
    MetricSource,
    RawMetricResponse,
};
pub use normalizer::{
    Normalized,
    Normalizer,
};
pub use observation::{
    ConversionWarning,
    Observation,
};
pub use rules::ExtractionRules;
pub use scheduler::{
    ResourceReport,
    Scheduler,
    TickReport,
};
pub use sink::TelemetrySink;
pub use window::TimeWindow;
