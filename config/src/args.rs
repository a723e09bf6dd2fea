use crate::{
    AuthScheme,
    EntryPolicy,
    ResourceKind,
};
use clap::Parser;
use std::{
    path::PathBuf,
    time::Duration,
};

/// Polls the MarkLogic Management API and forwards host and database metrics over OTLP.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version = version(), about, long_about = None)]
pub struct Args {
    /// Additional YAML config file, applied on top of the one in the config directory.
    #[clap(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Base URL of the Management API.
    #[clap(long = "manage-url", value_name = "URL")]
    pub manage_url: Option<String>,

    #[clap(long, value_name = "USER")]
    pub username: Option<String>,

    #[clap(long, value_name = "PASSWORD")]
    pub password: Option<String>,

    /// Authentication scheme for the Management API.
    #[clap(long, value_enum)]
    pub auth: Option<AuthScheme>,

    /// OTLP/HTTP metrics endpoint. Enables the OTLP exporter.
    #[clap(long = "otlp-endpoint", value_name = "URL")]
    pub otlp_endpoint: Option<String>,

    /// Sent as `x-honeycomb-team`.
    #[clap(long = "api-key", value_name = "KEY")]
    pub api_key: Option<String>,

    /// Sent as `x-honeycomb-dataset`.
    #[clap(long, value_name = "DATASET")]
    pub dataset: Option<String>,

    /// Time between two collection ticks, e.g. `10s`.
    #[clap(long, value_parser = humantime::parse_duration)]
    pub interval: Option<Duration>,

    /// Time between two background exports of the OTLP reader, e.g. `5s`.
    #[clap(long = "export-interval", value_parser = humantime::parse_duration)]
    pub export_interval: Option<Duration>,

    /// Resource types to collect. May be given more than once.
    #[clap(long = "resource-type", value_enum)]
    pub resource_types: Vec<ResourceKind>,

    /// Sample picked from a metric's time series.
    #[clap(long = "entry-policy", value_enum)]
    pub entry_policy: Option<EntryPolicy>,

    /// Print every exported observation on stdout.
    #[clap(long, action)]
    pub console: bool,

    /// Run a single collection tick, print its report as JSON and exit.
    #[clap(long, action)]
    pub once: bool,

    /// Log at debug level and print per-tick summaries.
    #[clap(short, long, action)]
    pub verbose: bool,
}

mod config_ext {
    use super::*;
    use config::{
        Map,
        Source,
        Value,
    };
    use std::collections::HashMap;

    impl Source for Args {
        fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
            Box::new((*self).clone())
        }

        fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
            let mut cache = HashMap::<String, Value>::new();
            if let Some(url) = &self.manage_url {
                cache.insert("manage.url".to_string(), url.clone().into());
            }
            if let Some(username) = &self.username {
                cache.insert("manage.username".to_string(), username.clone().into());
            }
            if let Some(password) = &self.password {
                cache.insert("manage.password".to_string(), password.clone().into());
            }
            if let Some(auth) = &self.auth {
                cache.insert("manage.auth".to_string(), auth.to_string().into());
            }
            if let Some(endpoint) = &self.otlp_endpoint {
                cache.insert("telemetry.endpoint".to_string(), endpoint.clone().into());
                cache.insert("telemetry.otlp".to_string(), true.into());
            }
            if let Some(api_key) = &self.api_key {
                cache.insert("telemetry.api_key".to_string(), api_key.clone().into());
            }
            if let Some(dataset) = &self.dataset {
                cache.insert("telemetry.dataset".to_string(), dataset.clone().into());
            }
            if let Some(interval) = &self.interval {
                cache.insert(
                    "collection.interval".to_string(),
                    humantime::format_duration(*interval).to_string().into(),
                );
            }
            if let Some(interval) = &self.export_interval {
                cache.insert(
                    "telemetry.export_interval".to_string(),
                    humantime::format_duration(*interval).to_string().into(),
                );
            }
            if !self.resource_types.is_empty() {
                let kinds = self
                    .resource_types
                    .iter()
                    .map(|kind| kind.to_string())
                    .collect::<Vec<_>>();
                cache.insert("collection.resource_types".to_string(), kinds.into());
            }
            if let Some(policy) = &self.entry_policy {
                cache.insert("collection.entry_policy".to_string(), policy.to_string().into());
            }
            if self.console {
                cache.insert("telemetry.console".to_string(), true.into());
            }
            if self.verbose {
                cache.insert("verbose".to_string(), true.into());
            }
            Ok(cache)
        }
    }
}

pub fn version() -> String {
    let author = clap::crate_authors!();
    let config_dir_path = crate::get_config_dir().display().to_string();
    let data_dir_path = crate::get_data_dir().display().to_string();

    format!(
        "\
{version}

Authors: {author}

Config directory: {config_dir_path}
Data directory: {data_dir_path}",
        version = env!("CARGO_PKG_VERSION")
    )
}
