use marklogic_metrics_config::ResourceKind;

/// How the metrics view of one resource type is laid out and tagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionRules {
    /// Key of the metrics list, used both at the top level and inside `metrics-relations`.
    pub container: &'static str,
    /// Value of the `source` tag.
    pub source: &'static str,
    /// Tag carrying the resolved resource name.
    pub identity_tag: &'static str,
    /// Emit the identity tag as `unknown` when the name could not be resolved.
    pub identity_required: bool,
    /// Default-view list that holds the resource name, if it must be looked up.
    pub identity_list: Option<&'static str>,
    /// A `nameref` on a descriptor or its group names the resource.
    pub nameref_identity: bool,
    /// Metric groups may nest descriptors under a sub-scope label such as `master`.
    pub scoped: bool,
    /// `type` tag for descriptors that sit directly in a group.
    pub default_scope: Option<&'static str>,
    pub instrument: &'static str,
    pub description: &'static str,
}

const HOSTS: ExtractionRules = ExtractionRules {
    container: "host-metrics-list",
    source: "host",
    identity_tag: "host",
    identity_required: true,
    identity_list: Some("host-default-list"),
    nameref_identity: false,
    scoped: false,
    default_scope: None,
    instrument: "marklogic.host.metrics",
    description: "All MarkLogic host metrics",
};

const DATABASES: ExtractionRules = ExtractionRules {
    container: "database-metrics-list",
    source: "database",
    identity_tag: "database",
    identity_required: false,
    identity_list: None,
    nameref_identity: true,
    scoped: true,
    default_scope: Some("master"),
    instrument: "marklogic.database.metrics",
    description: "All MarkLogic database metrics",
};

impl ExtractionRules {
    pub fn for_kind(kind: ResourceKind) -> &'static ExtractionRules {
        match kind {
            ResourceKind::Hosts => &HOSTS,
            ResourceKind::Databases => &DATABASES,
        }
    }
}
