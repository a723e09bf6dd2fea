use serde::{
    Deserialize,
    Serialize,
};
use std::time::Duration;
use strum::{
    Display,
    EnumIter,
    EnumString,
};

/// A resource collection of the Management API that carries a metrics view.
#[derive(
    Debug, Clone, Copy, Display, EnumIter, EnumString, Serialize, Deserialize, PartialEq, Eq, Hash, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResourceKind {
    Hosts,
    Databases,
}

impl ResourceKind {
    /// Path segment below `/manage/v2/`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Hosts => "hosts",
            ResourceKind::Databases => "databases",
        }
    }
}

/// Which sample of a `summary.data.entry` time series becomes the observation.
#[derive(
    Debug, Default, Clone, Copy, Display, EnumIter, EnumString, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EntryPolicy {
    /// The most recent sample.
    #[default]
    Last,
    First,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollectionConfig {
    #[serde(with = "crate::duration")]
    pub interval: Duration,
    pub resource_types: Vec<ResourceKind>,
    #[serde(default)]
    pub entry_policy: EntryPolicy,
}
