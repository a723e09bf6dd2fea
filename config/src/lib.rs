#[macro_use]
extern crate tracing;

mod app_config;
mod args;
mod collection_config;
pub mod duration;
mod manage_config;
mod telemetry_config;

pub use app_config::{
    get_config_dir,
    get_data_dir,
};
pub use args::{
    version,
    Args,
};
pub use collection_config::{
    CollectionConfig,
    EntryPolicy,
    ResourceKind,
};
use config::{
    builder::DefaultState,
    ConfigBuilder,
    ConfigError,
    Environment,
    FileFormat,
};
use eyre::{
    eyre,
    Result,
};
pub use manage_config::{
    AuthScheme,
    ManageConfig,
    Secret,
};
use serde::{
    Deserialize,
    Serialize,
};
pub use telemetry_config::{
    TelemetryConfig,
    HONEYCOMB_DATASET_HEADER,
    HONEYCOMB_TEAM_HEADER,
};

const DEFAULT_CONFIG: &str = include_str!("default-config.yaml");
const ENV_PREFIX: &str = "MARKLOGIC_METRICS";

/// Everything the collector needs, read once at startup.
///
/// Sources are layered, later ones winning: built-in defaults,
/// `<config_dir>/config.yaml`, the file passed with `--config`,
/// `MARKLOGIC_METRICS_*` environment variables (`__` separates nested keys,
/// e.g. `MARKLOGIC_METRICS_MANAGE__PASSWORD`) and finally the command line.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub manage: ManageConfig,
    pub telemetry: TelemetryConfig,
    pub collection: CollectionConfig,
    #[serde(default)]
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        serde_yml::from_str(DEFAULT_CONFIG).expect("Failed to parse default config")
    }
}

impl Config {
    pub fn new(args: Args) -> Result<Self, ConfigError> {
        let config_dir = get_config_dir();
        let mut builder = Self::base_builder()?;

        let config_files = [("config.yaml", FileFormat::Yaml)];
        for (file, format) in &config_files {
            let source = config::File::from(config_dir.join(file))
                .format(*format)
                .required(false);
            builder = builder.add_source(source);
        }

        if let Some(path) = &args.config {
            debug!(?path, "Adding config file from args");
            builder = builder.add_source(config::File::from(path.as_path()).format(FileFormat::Yaml).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("collection.resource_types")
                .try_parsing(true),
        );

        builder = builder.add_source(args);

        builder.build()?.try_deserialize()
    }

    fn base_builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Ok(config::Config::builder().add_source(config::File::from_str(DEFAULT_CONFIG, FileFormat::Yaml)))
    }

    /// Rejects combinations that would make the collector spin or drop everything.
    pub fn validate(&self) -> Result<()> {
        if self.collection.resource_types.is_empty() {
            return Err(eyre!("collection.resource_types must be non-empty"));
        }
        if self.collection.interval.is_zero() {
            return Err(eyre!("collection.interval must be greater than zero"));
        }
        if self.manage.request_timeout.is_zero() {
            return Err(eyre!("manage.request_timeout must be greater than zero"));
        }
        if self.telemetry.export_interval.is_zero() {
            return Err(eyre!("telemetry.export_interval must be greater than zero"));
        }
        if self.telemetry.otlp && self.telemetry.endpoint.is_none() {
            return Err(eyre!("telemetry.endpoint is required when the OTLP exporter is enabled"));
        }
        if self.manage.auth != AuthScheme::Anonymous && self.manage.username.is_empty() {
            return Err(eyre!("manage.username is required for {} authentication", self.manage.auth));
        }
        Ok(())
    }
}
