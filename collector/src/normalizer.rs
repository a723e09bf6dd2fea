//! Flattens the metrics view of the Management API into [`Observation`]s.
//!
//! The view nests the actual metric list as
//! `<container>.metrics-relations.<container>.metrics`, where every element is
//! an object mapping metric names to descriptors. A descriptor carries its
//! value either directly in `value` or as a time series under
//! `summary.data.entry`. Database groups may wrap descriptors in a sub-scope
//! label such as `master`. A database descriptor or group may name its
//! database in `nameref`.
//!
//! Any level that is missing or has an unexpected type yields nothing.

use crate::{
    fetcher::RawMetricResponse,
    observation::{
        ConversionWarning,
        Observation,
        DEFAULT_UNIT,
        TAG_METRIC_NAME,
        TAG_SOURCE,
        TAG_TYPE,
        TAG_UNIT,
        UNKNOWN_IDENTITY,
    },
    rules::ExtractionRules,
};
use marklogic_metrics_config::{
    EntryPolicy,
    ResourceKind,
};
use serde::Serialize;
use serde_json::{
    Map,
    Value,
};
use std::collections::BTreeMap;

const METRICS_RELATIONS: &str = "metrics-relations";
const METRICS: &str = "metrics";
const NAMEREF: &str = "nameref";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Normalized {
    pub observations: Vec<Observation>,
    pub warnings: Vec<ConversionWarning>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    policy: EntryPolicy,
}

impl Normalizer {
    pub fn new(policy: EntryPolicy) -> Self {
        Self { policy }
    }

    /// A pure function of its input: calling it twice on the same response
    /// yields the same observations in the same order.
    pub fn normalize(&self, kind: ResourceKind, raw: &RawMetricResponse) -> Normalized {
        let rules = ExtractionRules::for_kind(kind);
        let mut out = Normalized::default();

        let Some(groups) = metric_groups(&raw.body, rules.container) else {
            return out;
        };

        let base_tags = base_tags(rules, raw.identity.as_deref());

        for group in groups {
            let Some(group) = group.as_object() else {
                continue;
            };
            let group_name = nameref(group);
            for (name, entry) in group {
                if rules.scoped && !is_descriptor(entry) {
                    for (inner_name, descriptor, inner_group_name) in scoped_descriptors(entry) {
                        let identity = inner_group_name.or(group_name);
                        let metric = Metric {
                            name: inner_name,
                            descriptor,
                            scope: Some(name.as_str()),
                        };
                        self.push(&mut out, rules, &base_tags, metric, identity);
                    }
                } else if let Some(descriptor) = entry.as_object() {
                    let metric = Metric {
                        name: name.as_str(),
                        descriptor,
                        scope: rules.default_scope,
                    };
                    self.push(&mut out, rules, &base_tags, metric, group_name);
                }
            }
        }

        out
    }

    fn push(
        &self,
        out: &mut Normalized,
        rules: &ExtractionRules,
        base_tags: &BTreeMap<String, String>,
        metric: Metric<'_>,
        group_name: Option<&str>,
    ) {
        let Metric { name, descriptor, scope } = metric;
        let Some(raw_value) = descriptor_value(descriptor, self.policy) else {
            trace!(metric = name, "no sample for metric");
            return;
        };

        let Some(value) = coerce(raw_value) else {
            debug!(metric = name, value = %raw_value, "skipping non-numeric metric");
            out.warnings.push(ConversionWarning {
                metric_name: name.to_string(),
                scope: scope.map(str::to_string),
                raw: raw_value.to_string(),
            });
            return;
        };

        let unit = descriptor_unit(descriptor);
        let mut tags = base_tags.clone();
        tags.insert(TAG_METRIC_NAME.to_string(), name.to_string());
        tags.insert(TAG_UNIT.to_string(), unit.clone());
        if let Some(scope) = scope {
            tags.insert(TAG_TYPE.to_string(), scope.to_string());
        }
        if rules.nameref_identity {
            if let Some(identity) = nameref(descriptor).or(group_name) {
                tags.insert(rules.identity_tag.to_string(), identity.to_string());
            }
        }

        out.observations.push(Observation {
            name: name.to_string(),
            value,
            unit,
            tags,
        });
    }
}

struct Metric<'a> {
    name: &'a str,
    descriptor: &'a Map<String, Value>,
    scope: Option<&'a str>,
}

/// The list of metric groups for `container`, if the response has one.
pub(crate) fn metric_groups<'a>(body: &'a Value, container: &str) -> Option<&'a Vec<Value>> {
    body.get(container)?
        .get(METRICS_RELATIONS)?
        .get(container)?
        .get(METRICS)?
        .as_array()
}

fn base_tags(rules: &ExtractionRules, identity: Option<&str>) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    tags.insert(TAG_SOURCE.to_string(), rules.source.to_string());
    match identity.filter(|name| !name.is_empty()) {
        Some(name) => {
            tags.insert(rules.identity_tag.to_string(), name.to_string());
        }
        None if rules.identity_required => {
            tags.insert(rules.identity_tag.to_string(), UNKNOWN_IDENTITY.to_string());
        }
        None => {}
    }
    tags
}

fn is_descriptor(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.contains_key("value") || obj.contains_key("summary"))
}

fn nameref(object: &Map<String, Value>) -> Option<&str> {
    object
        .get(NAMEREF)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

/// Descriptors below a sub-scope label: either a list of metric groups or a
/// single group, each paired with the `nameref` of the group holding it.
fn scoped_descriptors(scope: &Value) -> Vec<(&str, &Map<String, Value>, Option<&str>)> {
    let groups: Vec<&Value> = match scope {
        Value::Array(list) => list.iter().collect(),
        Value::Object(_) => vec![scope],
        _ => Vec::new(),
    };
    groups
        .into_iter()
        .filter_map(Value::as_object)
        .flat_map(|group| {
            let group_name = nameref(group);
            group
                .iter()
                .filter_map(move |(name, descriptor)| descriptor.as_object().map(|d| (name.as_str(), d, group_name)))
        })
        .collect()
}

fn descriptor_value(descriptor: &Map<String, Value>, policy: EntryPolicy) -> Option<&Value> {
    if let Some(value) = descriptor.get("value") {
        return Some(value);
    }
    let entries = descriptor.get("summary")?.get("data")?.get("entry")?;
    let entry = match entries {
        Value::Array(list) => match policy {
            EntryPolicy::Last => list.last()?,
            EntryPolicy::First => list.first()?,
        },
        Value::Object(_) => entries,
        _ => return None,
    };
    entry.get("value")
}

fn descriptor_unit(descriptor: &Map<String, Value>) -> String {
    ["units", "unit"]
        .iter()
        .find_map(|key| descriptor.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|unit| !unit.is_empty())
        .unwrap_or(DEFAULT_UNIT)
        .to_string()
}

fn coerce(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}
