use crate::{
    error::CollectError,
    normalizer::metric_groups,
    rules::ExtractionRules,
    window::TimeWindow,
};
use eyre::{
    Context as _,
    Result,
};
use marklogic_metrics_config::{
    AuthScheme,
    ManageConfig,
    ResourceKind,
};
use reqwest::{
    header::{
        HeaderValue,
        ACCEPT,
        AUTHORIZATION,
        WWW_AUTHENTICATE,
    },
    Client as HttpClient,
    Request,
    RequestBuilder,
    Response,
    StatusCode,
};
use serde_json::Value;
use std::{
    future::Future,
    pin::Pin,
};
use url::Url;

const JSON: &str = "application/json";

/// Metrics view of one resource type, plus the resource name when it had to be looked up.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMetricResponse {
    pub body: Value,
    pub identity: Option<String>,
}

pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<RawMetricResponse>, CollectError>> + Send + 'a>>;

/// Where the collection loop gets raw metrics from.
///
/// `Ok(None)` means the upstream answered but with nothing usable; the loop
/// moves on to the next resource type.
pub trait MetricSource: Send + Sync {
    fn fetch(&self, kind: ResourceKind, window: TimeWindow) -> FetchFuture<'_>;
}

/// Client for `/manage/v2/{resource}`.
pub struct ManageClient {
    config: ManageConfig,
    http_client: HttpClient,
}

impl ManageClient {
    pub fn new(config: ManageConfig) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { config, http_client })
    }

    /// The metrics view for `window`, with the resource name resolved where the view lacks it.
    #[instrument(level = "debug", skip(self), fields(resource = %kind))]
    pub async fn fetch_resource(
        &self,
        kind: ResourceKind,
        window: TimeWindow,
    ) -> Result<Option<RawMetricResponse>, CollectError> {
        let rules = ExtractionRules::for_kind(kind);

        let Some(body) = self.fetch_metrics(kind, &window).await? else {
            return Ok(None);
        };

        if let Some(groups) = metric_groups(&body, rules.container) {
            let preview = groups
                .iter()
                .filter_map(Value::as_object)
                .flat_map(|group| group.keys())
                .take(3)
                .collect::<Vec<_>>();
            debug!(count = groups.len(), first = ?preview, "received metric groups");
        } else {
            debug!(container = rules.container, "metrics view has no metric list");
        }

        let identity = match rules.identity_list {
            Some(list) => match self.resolve_identity(kind, list).await {
                Ok(name) => {
                    debug!(name = ?name, "resolved resource name");
                    name
                }
                Err(err) => {
                    warn!("failed to resolve {kind} name, tagging as unknown: {err}");
                    None
                }
            },
            None => None,
        };

        Ok(Some(RawMetricResponse { body, identity }))
    }

    /// `GET /manage/v2/{resource}?format=json&view=metrics&start=..&end=..&period=hour`
    pub async fn fetch_metrics(&self, kind: ResourceKind, window: &TimeWindow) -> Result<Option<Value>, CollectError> {
        let url = self.url(kind)?;
        let query = [
            ("format", "json".to_string()),
            ("view", "metrics".to_string()),
            ("start", window.start_param()),
            ("end", window.end_param()),
            ("period", "hour".to_string()),
        ];
        debug!(%url, start = %query[2].1, end = %query[3].1, "fetching metrics");
        self.get_json(&url, &query).await
    }

    /// Looks up the name of the first item in the default view of `kind`.
    pub async fn resolve_identity(&self, kind: ResourceKind, list: &str) -> Result<Option<String>, CollectError> {
        let url = self.url(kind)?;
        let Some(body) = self.get_json(&url, &[("format", "json".to_string())]).await? else {
            return Err(CollectError::Shape(format!("{kind} default view is not a JSON object")));
        };
        identity_from_default_view(&body, list)
            .map(Some)
            .ok_or_else(|| CollectError::Shape(format!("{list}.list-items.list-item[0].nameref is missing")))
    }

    fn url(&self, kind: ResourceKind) -> Result<Url, CollectError> {
        self.config
            .resource_url(kind.as_str())
            .map_err(|e| CollectError::Transport {
                status: None,
                message: format!("invalid Management API URL: {e}"),
            })
    }

    async fn get_json(&self, url: &Url, query: &[(&str, String)]) -> Result<Option<Value>, CollectError> {
        let response = self.send(url, query).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollectError::status(status.as_u16(), body));
        }

        let bytes = response.bytes().await?;
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value @ Value::Object(_)) => Ok(Some(value)),
            Ok(other) => {
                warn!(%url, kind = json_kind(&other), "expected a JSON object");
                Ok(None)
            }
            Err(err) => {
                warn!(%url, "response is not valid JSON: {err}");
                Ok(None)
            }
        }
    }

    async fn send(&self, url: &Url, query: &[(&str, String)]) -> Result<Response, CollectError> {
        let mut builder = self.request(url, query);
        if self.config.auth == AuthScheme::Basic {
            builder = builder.basic_auth(&self.config.username, Some(self.config.password.expose()));
        }
        let response = self.http_client.execute(builder.build()?).await?;

        if self.config.auth != AuthScheme::Digest || response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        let Some(challenge) = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
        else {
            return Ok(response);
        };

        let mut request = self.request(url, query).build()?;
        let authorization = self.digest_authorization(&challenge, &request)?;
        request.headers_mut().insert(AUTHORIZATION, authorization);
        Ok(self.http_client.execute(request).await?)
    }

    fn request(&self, url: &Url, query: &[(&str, String)]) -> RequestBuilder {
        self.http_client.get(url.clone()).query(query).header(ACCEPT, JSON)
    }

    fn digest_authorization(&self, challenge: &str, request: &Request) -> Result<HeaderValue, CollectError> {
        let rejected = |reason: String| CollectError::Auth {
            status: StatusCode::UNAUTHORIZED.as_u16(),
            body: reason,
        };
        let mut prompt = digest_auth::parse(challenge).map_err(|e| rejected(format!("bad digest challenge: {e}")))?;
        let uri = request.url()[url::Position::BeforePath..].to_string();
        let context =
            digest_auth::AuthContext::new(self.config.username.as_str(), self.config.password.expose(), uri.as_str());
        let answer = prompt
            .respond(&context)
            .map_err(|e| rejected(format!("cannot answer digest challenge: {e}")))?;
        HeaderValue::from_str(&answer.to_string()).map_err(|e| rejected(format!("invalid authorization header: {e}")))
    }
}

impl MetricSource for ManageClient {
    fn fetch(&self, kind: ResourceKind, window: TimeWindow) -> FetchFuture<'_> {
        Box::pin(self.fetch_resource(kind, window))
    }
}

/// `nameref` of the first item in `<list>.list-items.list-item`.
pub fn identity_from_default_view(body: &Value, list: &str) -> Option<String> {
    body.get(list)?
        .get("list-items")?
        .get("list-item")?
        .get(0)?
        .get("nameref")?
        .as_str()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn host_name_comes_from_first_list_item() {
        let body = json!({
            "host-default-list": {
                "list-items": {
                    "list-item": [
                        { "nameref": "node1", "idref": "123" },
                        { "nameref": "node2", "idref": "456" },
                    ]
                }
            }
        });
        assert_eq!(
            identity_from_default_view(&body, "host-default-list"),
            Some("node1".to_string())
        );
    }

    #[test]
    fn missing_or_empty_host_name_is_none() {
        let bodies = [
            json!({}),
            json!({ "host-default-list": { "list-items": {} } }),
            json!({ "host-default-list": { "list-items": { "list-item": [] } } }),
            json!({ "host-default-list": { "list-items": { "list-item": [{ "nameref": "" }] } } }),
            json!({ "host-default-list": { "list-items": { "list-item": [{ "nameref": 7 }] } } }),
        ];
        for body in bodies {
            assert_eq!(identity_from_default_view(&body, "host-default-list"), None, "{body}");
        }
    }
}
