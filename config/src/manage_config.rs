use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    time::Duration,
};
use strum::{
    Display,
    EnumIter,
    EnumString,
};
use url::Url;

/// How requests against the Management API authenticate.
#[derive(
    Debug, Default, Clone, Copy, Display, EnumIter, EnumString, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AuthScheme {
    #[default]
    Digest,
    Basic,
    #[serde(rename = "none")]
    #[strum(to_string = "none")]
    #[value(name = "none")]
    Anonymous,
}

/// A string that never shows up in `Debug` output or logs.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("\"\"")
        } else {
            f.write_str("\"***\"")
        }
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManageConfig {
    /// Base URL of the Management API, e.g. `http://localhost:8002`.
    pub url: Url,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: Secret,
    #[serde(default)]
    pub auth: AuthScheme,
    /// Upper bound for a single request, lookups included.
    #[serde(with = "crate::duration")]
    pub request_timeout: Duration,
}

impl ManageConfig {
    /// `{url}/manage/v2/{resource}`, tolerating a trailing slash on the base URL.
    pub fn resource_url(&self, resource: &str) -> Result<Url, url::ParseError> {
        let base = self.url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/manage/v2/{resource}"))
    }
}
