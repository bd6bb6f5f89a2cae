//! LokiStack custom resource and the scrape config for the pods it creates

use super::{object_meta, service_monitor, CustomResource, Endpoint, Labels, StepOutput};
use crate::clusters::ClusterConfig;
use crate::template::keys::LOKI_CONFIG;
use crate::template::{LokiLimitOverrides, LokiOverrides};
use rhobs_common::Result;
use serde_json::{json, Map, Value};

pub const COMPONENT: &str = "loki-operator-default-cr";
pub const API_VERSION: &str = "loki.grafana.com/v1";
pub const STACK_NAME: &str = "observatorium-lokistack";
/// Secret holding the object-storage credentials of the stack
pub const BUCKET_SECRET: &str = "loki-default-bucket";

const SIZE: &str = "1x.extra-small";
const STORAGE_CLASS: &str = "gp3-csi";
const SCHEMA_EFFECTIVE_DATE: &str = "2025-06-06";
const SCHEMA_VERSION: &str = "v13";

const STREAM_LABEL_ATTRIBUTES: [&str; 4] = [
    "k8s.namespace.name",
    "openshift.label.cluster_name",
    "openshift.log.source",
    "openshift.log.type",
];

/// Pods the operator creates for a stack, scraped on their `metrics` port
const STACK_COMPONENTS: [(&str, &str); 6] = [
    ("compactor", "loki-compactor-http"),
    ("distributor", "loki-distributor-http"),
    ("index-gateway", "loki-index-gateway-http"),
    ("ingester", "loki-ingester-http"),
    ("querier", "loki-querier-http"),
    ("query-frontend", "loki-query-frontend-http"),
];

pub fn build(cluster: &ClusterConfig) -> Result<StepOutput> {
    let namespace = cluster.namespace.as_str();
    let overrides = cluster.templates.loki(LOKI_CONFIG)?;

    let mut out = StepOutput::default();
    out.push_custom(COMPONENT, &loki_stack(namespace, &overrides))?;
    out.service_monitors = service_monitors(namespace);
    Ok(out)
}

pub fn loki_stack(namespace: &str, overrides: &LokiOverrides) -> CustomResource {
    let mut global = json!({
        "otlp": {
            "streamLabels": {
                "resourceAttributes": STREAM_LABEL_ATTRIBUTES
                    .iter()
                    .map(|name| json!({ "name": name }))
                    .collect::<Vec<_>>(),
            },
        },
    });
    if let Some(limits) = global_limits(&overrides.limits) {
        if let (Some(global), Value::Object(limits)) = (global.as_object_mut(), limits) {
            global.extend(limits);
        }
    }

    let spec = json!({
        "managementState": "Managed",
        "size": SIZE,
        "storageClassName": STORAGE_CLASS,
        "storage": {
            "schemas": [{
                "effectiveDate": SCHEMA_EFFECTIVE_DATE,
                "version": SCHEMA_VERSION,
            }],
            "secret": {
                "name": BUCKET_SECRET,
                "type": "s3",
            },
        },
        "limits": { "global": global },
        "template": {
            "distributor": { "replicas": overrides.router.replicas },
            "ingester": { "replicas": overrides.ingest.replicas },
            "querier": { "replicas": overrides.query.replicas },
            "queryFrontend": { "replicas": overrides.query_frontend.replicas },
        },
    });

    CustomResource::new(
        API_VERSION,
        "LokiStack",
        object_meta(STACK_NAME, namespace, Labels::new()),
        spec,
    )
}

/// Only the limits that were set make it into the stack; the operator
/// fills in the rest from the size profile.
fn global_limits(limits: &LokiLimitOverrides) -> Option<Value> {
    let mut ingestion = Map::new();
    for (field, value) in [
        ("ingestionRate", limits.ingestion_rate_limit_mb),
        ("ingestionBurstSize", limits.ingestion_burst_size_mb),
        ("maxLineSize", limits.max_line_size),
        ("perStreamRateLimit", limits.per_stream_rate_limit_mb),
        ("perStreamRateLimitBurst", limits.per_stream_burst_size_mb),
    ] {
        if value != 0 {
            ingestion.insert(field.to_string(), json!(value));
        }
    }

    let mut global = Map::new();
    if !ingestion.is_empty() {
        global.insert("ingestion".to_string(), Value::Object(ingestion));
    }
    if !limits.query_timeout.is_empty() {
        global.insert(
            "queries".to_string(),
            json!({ "queryTimeout": limits.query_timeout }),
        );
    }

    (!global.is_empty()).then_some(Value::Object(global))
}

fn stack_labels(component: &str) -> Labels {
    [
        ("app.kubernetes.io/component", component),
        ("app.kubernetes.io/created-by", "lokistack-controller"),
        ("app.kubernetes.io/instance", STACK_NAME),
        ("app.kubernetes.io/managed-by", "lokistack-controller"),
        ("app.kubernetes.io/name", "lokistack"),
    ]
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .into()
}

pub fn service_monitors(namespace: &str) -> Vec<CustomResource> {
    let operator_labels: Labels = [
        ("app.kubernetes.io/component", "monitoring"),
        ("app.kubernetes.io/created-by", "loki-operator"),
        ("app.kubernetes.io/instance", "controller-manager-metrics"),
        ("app.kubernetes.io/managed-by", "rhobs"),
        ("app.kubernetes.io/name", "servicemonitor"),
        ("app.kubernetes.io/part-of", "loki-operator"),
    ]
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .into();
    let operator_selector =
        Labels::from([("app.kubernetes.io/component".to_string(), "metrics".to_string())]);

    let mut monitors = vec![service_monitor(
        "loki-operator-controller-manager-metrics",
        namespace,
        operator_labels,
        operator_selector,
        &[Endpoint::metrics("metrics")],
    )];
    monitors.extend(STACK_COMPONENTS.iter().map(|(component, name)| {
        service_monitor(
            name,
            namespace,
            stack_labels(component),
            stack_labels(component),
            &[Endpoint::metrics("metrics")],
        )
    }));
    monitors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clusters::catalog::default_clusters;

    #[test]
    fn test_build_loki_stack() {
        let cluster = default_clusters().unwrap().remove(0);
        let out = build(&cluster).unwrap();
        assert_eq!(out.manifests.len(), 1);

        let stack = &out.manifests[0];
        assert_eq!(stack.kind, "LokiStack");
        assert_eq!(stack.name, STACK_NAME);

        let spec = &stack.object["spec"];
        assert_eq!(spec["size"], SIZE);
        assert_eq!(spec["storage"]["secret"]["name"], BUCKET_SECRET);
        assert_eq!(spec["storage"]["schemas"][0]["version"], "v13");
        assert_eq!(spec["template"]["distributor"]["replicas"], 3);
        assert_eq!(spec["template"]["queryFrontend"]["replicas"], 2);

        let global = &spec["limits"]["global"];
        assert_eq!(global["ingestion"]["ingestionRate"], 12);
        assert_eq!(global["ingestion"]["maxLineSize"], 1_048_576);
        assert!(global["ingestion"].get("perStreamRateLimit").is_none());
        assert_eq!(global["queries"]["queryTimeout"], "3m");
        assert_eq!(
            global["otlp"]["streamLabels"]["resourceAttributes"][1]["name"],
            "openshift.label.cluster_name"
        );
    }

    #[test]
    fn test_unset_limits_are_omitted() {
        let stack = loki_stack("logs", &LokiOverrides::default());
        let global = &serde_json::to_value(&stack).unwrap()["spec"]["limits"]["global"];
        assert!(global.get("ingestion").is_none());
        assert!(global.get("queries").is_none());
        assert!(global.get("otlp").is_some());
    }

    #[test]
    fn test_service_monitors() {
        let monitors = service_monitors("rhobs-int");
        assert_eq!(monitors.len(), 7);
        assert_eq!(monitors[0].name(), "loki-operator-controller-manager-metrics");
        assert!(monitors.iter().any(|m| m.name() == "loki-query-frontend-http"));
    }
}
