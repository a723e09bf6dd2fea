use crate::manage_config::Secret;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::HashMap,
    time::Duration,
};
use url::Url;

pub const HONEYCOMB_TEAM_HEADER: &str = "x-honeycomb-team";
pub const HONEYCOMB_DATASET_HEADER: &str = "x-honeycomb-dataset";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Export observations over OTLP/HTTP.
    #[serde(default)]
    pub otlp: bool,
    /// Print every observation on stdout as it is exported.
    #[serde(default)]
    pub console: bool,
    #[serde(default)]
    pub endpoint: Option<Url>,
    #[serde(default)]
    pub api_key: Secret,
    #[serde(default)]
    pub dataset: String,
    pub service_name: String,
    pub service_version: String,
    pub host_name: String,
    #[serde(with = "crate::duration")]
    pub export_interval: Duration,
    #[serde(with = "crate::duration")]
    pub flush_timeout: Duration,
}

impl TelemetryConfig {
    /// Headers attached to every export request. Empty values are left out.
    pub fn headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        if !self.api_key.is_empty() {
            headers.insert(HONEYCOMB_TEAM_HEADER.to_string(), self.api_key.expose().to_string());
        }
        if !self.dataset.is_empty() {
            headers.insert(HONEYCOMB_DATASET_HEADER.to_string(), self.dataset.clone());
        }
        headers
    }
}
