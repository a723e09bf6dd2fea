use serde::Serialize;
use std::{
    collections::BTreeMap,
    fmt,
};

pub const DEFAULT_UNIT: &str = "1";
pub const UNKNOWN_IDENTITY: &str = "unknown";

pub const TAG_SOURCE: &str = "source";
pub const TAG_HOST: &str = "host";
pub const TAG_DATABASE: &str = "database";
pub const TAG_METRIC_NAME: &str = "metric_name";
pub const TAG_UNIT: &str = "unit";
pub const TAG_TYPE: &str = "type";

/// One measurement ready for export. `value` is always finite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub tags: BTreeMap<String, String>,
}

impl Observation {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// A metric whose value could not be read as a number. Only that metric is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionWarning {
    pub metric_name: String,
    pub scope: Option<String>,
    pub raw: String,
}

impl fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{scope}/{}: not a number: {}", self.metric_name, self.raw),
            None => write!(f, "{}: not a number: {}", self.metric_name, self.raw),
        }
    }
}
