//! Default Thanos stack, expressed as thanos-operator custom resources

use super::{object_meta, secrets, CustomResource, Labels, StepOutput};
use crate::clusters::ClusterConfig;
use crate::manifests::alertmanager;
use crate::template::keys::{
    COMPACT_DEFAULT, DEFAULT_BUCKET, QUERY, QUERY_FRONTEND, RECEIVE_INGESTOR_DEFAULT,
    RECEIVE_ROUTER, RULER, STORE_DEFAULT,
};
use crate::template::TemplateMaps;
use rhobs_common::Result;
use serde_json::{json, Value};

pub const COMPONENT: &str = "thanos-operator-default-cr";
pub const API_VERSION: &str = "monitoring.thanos.io/v1alpha1";

/// Name shared by the query, receive, compact and ruler resources
pub const INSTANCE: &str = "rhobs";
pub const STORE_INSTANCE: &str = "default";

/// Tenant used for writes that carry no tenant header
const DEFAULT_TENANT_ID: &str = "FB870BF3-9F3A-44FF-9BF7-D7A047A52F43";

const GRPC_SERVICE_CONFIG: &str = r#"{
  "loadBalancingPolicy":"round_robin",
  "retryPolicy": {
    "maxAttempts": 0,
    "initialBackoff": "0.1s",
    "backoffMultiplier": 1,
    "retryableStatusCodes": [
      "UNAVAILABLE"
    ]
  }
}"#;

/// Settings every operator-managed Thanos component takes from the templates
fn common_fields(templates: &TemplateMaps, key: &str) -> Result<Value> {
    Ok(json!({
        "image": templates.image(key)?,
        "version": templates.version(key)?,
        "imagePullPolicy": "IfNotPresent",
        "logLevel": templates.log_level(key)?,
        "logFormat": "logfmt",
        "resourceRequirements": serde_json::to_value(templates.resources(key)?)?,
        "securityContext": { "seccompProfile": { "type": "RuntimeDefault" } },
    }))
}

/// `spec` extended with the common fields of `key`. Fields already in `spec` win.
fn component_spec(templates: &TemplateMaps, key: &str, spec: Value) -> Result<Value> {
    let mut merged = common_fields(templates, key)?;
    if let (Some(target), Value::Object(fields)) = (merged.as_object_mut(), spec) {
        target.extend(fields);
    }
    Ok(merged)
}

fn cache_config(secret: &str) -> Value {
    json!({ "externalCacheConfig": { "name": secret, "key": secrets::THANOS_CONFIG_KEY } })
}

fn disabled_service_monitor() -> Value {
    json!({ "serviceMonitor": { "enable": false } })
}

fn thanos_resource(kind: &str, name: &str, namespace: &str, spec: Value) -> CustomResource {
    CustomResource::new(API_VERSION, kind, object_meta(name, namespace, Labels::new()), spec)
}

pub fn build(cluster: &ClusterConfig) -> Result<StepOutput> {
    let namespace = cluster.namespace.as_str();
    let templates = &cluster.templates;

    let mut out = StepOutput::default();
    for resource in [
        query(templates, namespace)?,
        receive(templates, namespace)?,
        compact(templates, namespace)?,
        ruler(templates, namespace)?,
        store(templates, namespace)?,
    ] {
        out.push_custom(COMPONENT, &resource)?;
    }
    Ok(out)
}

fn query(templates: &TemplateMaps, namespace: &str) -> Result<CustomResource> {
    let frontend = component_spec(
        templates,
        QUERY_FRONTEND,
        json!({
            "replicas": templates.replicas(QUERY_FRONTEND)?,
            "compressResponses": true,
            "logQueriesLongerThan": "10s",
            "labelsMaxRetries": 3,
            "queryRangeMaxRetries": 3,
            "queryLabelSelector": {
                "matchLabels": { "operator.thanos.io/query-api": "true" }
            },
            "queryRangeSplitInterval": "48h",
            "labelsSplitInterval": "48h",
            "labelsDefaultTimeRange": "336h",
            "queryRangeResponseCacheConfig": cache_config(secrets::QUERY_RANGE_CACHE),
        }),
    )?;

    let spec = component_spec(
        templates,
        QUERY,
        json!({
            "replicas": templates.replicas(QUERY)?,
            "storeLabelSelector": {
                "matchLabels": {
                    "operator.thanos.io/store-api": "true",
                    "app.kubernetes.io/part-of": "thanos",
                }
            },
            "replicaLabels": ["prometheus_replica", "replica", "rule_replica"],
            "webConfig": { "prefixHeader": "X-Forwarded-Prefix" },
            "grpcProxyStrategy": "lazy",
            "telemetryQuantiles": {
                "duration": [
                    "0.1", "0.25", "0.75", "1.25", "1.75", "2.5", "3", "5", "10", "15", "30",
                    "60", "120"
                ]
            },
            "queryFrontend": frontend,
            "featureGates": {
                "serviceMonitor": { "enable": false },
                "podDisruptionBudget": { "enable": false },
            },
        }),
    )?;

    Ok(thanos_resource("ThanosQuery", INSTANCE, namespace, spec))
}

fn receive(templates: &TemplateMaps, namespace: &str) -> Result<CustomResource> {
    let bucket = serde_json::to_value(templates.bucket(DEFAULT_BUCKET)?)?;

    let router = component_spec(
        templates,
        RECEIVE_ROUTER,
        json!({
            "replicas": templates.replicas(RECEIVE_ROUTER)?,
            "replicationFactor": 3,
            "externalLabels": { "receive": "true" },
            "additional": {
                "args": [format!("--receive.grpc-service-config={GRPC_SERVICE_CONFIG}")]
            },
        }),
    )?;

    let hashring = component_spec(
        templates,
        RECEIVE_INGESTOR_DEFAULT,
        json!({
            "name": "default",
            "externalLabels": { "replica": "$(POD_NAME)" },
            "replicas": templates.replicas(RECEIVE_INGESTOR_DEFAULT)?,
            "tsdbConfig": { "retention": "1d" },
            "asyncForwardWorkerCount": 50,
            "tooFarInFutureTimeWindow": "5m",
            "tenancyConfig": {
                "tenantMatcherType": "exact",
                "defaultTenantID": DEFAULT_TENANT_ID,
                "tenantHeader": "THANOS-TENANT",
                "tenantLabelName": "tenant_id",
            },
            "objectStorageConfig": bucket,
            "storageConfiguration": {
                "size": templates.storage_size(RECEIVE_INGESTOR_DEFAULT)?.to_string()
            },
        }),
    )?;

    Ok(thanos_resource(
        "ThanosReceive",
        INSTANCE,
        namespace,
        json!({
            "router": router,
            "ingesterSpec": {
                "defaultObjectStorageConfig": bucket,
                "hashrings": [hashring],
            },
            "featureGates": disabled_service_monitor(),
        }),
    ))
}

fn compact(templates: &TemplateMaps, namespace: &str) -> Result<CustomResource> {
    let spec = component_spec(
        templates,
        COMPACT_DEFAULT,
        json!({
            "objectStorageConfig": serde_json::to_value(templates.bucket(DEFAULT_BUCKET)?)?,
            "retentionConfig": {
                "raw": "365d",
                "fiveMinutes": "365d",
                "oneHour": "365d",
            },
            "downsamplingConfig": { "downsamplingConcurrency": 1, "disable": false },
            "compactConfig": { "compactConcurrency": 1 },
            "debugConfig": {
                "acceptMalformedIndex": true,
                "haltOnError": true,
                "maxCompactionLevel": 3,
            },
            "storageConfiguration": {
                "size": templates.storage_size(COMPACT_DEFAULT)?.to_string()
            },
            "additional": { "args": ["--deduplication.replica-label=replica"] },
            "featureGates": disabled_service_monitor(),
        }),
    )?;

    Ok(thanos_resource("ThanosCompact", INSTANCE, namespace, spec))
}

fn ruler(templates: &TemplateMaps, namespace: &str) -> Result<CustomResource> {
    let alertmanager_url = format!(
        "dnssrv+http://{}-cluster.{namespace}.svc.cluster.local:{}",
        alertmanager::SERVICE,
        alertmanager::PORT
    );

    let spec = component_spec(
        templates,
        RULER,
        json!({
            "replicas": templates.replicas(RULER)?,
            "ruleConfigSelector": {
                "matchLabels": { "operator.thanos.io/rule-file": "true" }
            },
            "prometheusRuleSelector": {
                "matchLabels": { "operator.thanos.io/prometheus-rule": "true" }
            },
            "queryLabelSelector": {
                "matchLabels": {
                    "operator.thanos.io/query-api": "true",
                    "app.kubernetes.io/part-of": "thanos",
                }
            },
            "ruleTenancyConfig": {
                "tenantLabel": "tenant_id",
                "tenantValueLabel": "operator.thanos.io/tenant",
            },
            "externalLabels": { "rule_replica": "$(NAME)" },
            "objectStorageConfig": serde_json::to_value(templates.bucket(DEFAULT_BUCKET)?)?,
            "alertmanagerURL": alertmanager_url,
            "alertLabelDrop": ["rule_replica"],
            "retention": "48h",
            "evaluationInterval": "1m",
            "storageConfiguration": { "size": templates.storage_size(RULER)?.to_string() },
            "featureGates": disabled_service_monitor(),
        }),
    )?;

    Ok(thanos_resource("ThanosRuler", INSTANCE, namespace, spec))
}

fn store(templates: &TemplateMaps, namespace: &str) -> Result<CustomResource> {
    let spec = component_spec(
        templates,
        STORE_DEFAULT,
        json!({
            "replicas": templates.replicas(STORE_DEFAULT)?,
            "objectStorageConfig": serde_json::to_value(templates.bucket(DEFAULT_BUCKET)?)?,
            "indexCacheConfig": cache_config(secrets::INDEX_CACHE),
            "cachingBucketConfig": cache_config(secrets::BUCKET_CACHE),
            "shardingStrategy": { "type": "block", "shards": 1 },
            "indexHeaderConfig": {
                "enableLazyReader": true,
                "lazyDownloadStrategy": "lazy",
                "lazyReaderIdleTimeout": "5m",
            },
            "blockConfig": {
                "blockDiscoveryStrategy": "concurrent",
                "blockFilesConcurrency": 1,
                "blockMetaFetchConcurrency": 32,
            },
            "ignoreDeletionMarksDelay": "24h",
            "timeRangeConfig": { "maxTime": "-22h" },
            "storageConfiguration": {
                "size": templates.storage_size(STORE_DEFAULT)?.to_string()
            },
            "featureGates": disabled_service_monitor(),
        }),
    )?;

    Ok(thanos_resource("ThanosStore", STORE_INSTANCE, namespace, spec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clusters::catalog::default_clusters;
    use crate::template::{Images, Replicas};

    fn cluster() -> ClusterConfig {
        default_clusters().unwrap().remove(1)
    }

    #[test]
    fn test_build_default_stack() {
        let out = build(&cluster()).unwrap();
        let kinds: Vec<_> = out.manifests.iter().map(|m| m.kind.as_str()).collect();
        assert_eq!(
            kinds,
            vec!["ThanosQuery", "ThanosReceive", "ThanosCompact", "ThanosRuler", "ThanosStore"]
        );
        assert_eq!(out.manifests[4].name, STORE_INSTANCE);
        assert!(out.service_monitors.is_empty());
    }

    #[test]
    fn test_common_fields_come_from_templates() {
        let mut cluster = cluster();
        cluster.templates = cluster.templates.override_with(&[
            &Images::from([(QUERY, "quay.io/thanos/thanos".to_string())]),
            &Replicas::from([(QUERY_FRONTEND, 4)]),
        ]);
        let query = query(&cluster.templates, "rhobs-stage").unwrap();

        assert_eq!(query.spec["image"], "quay.io/thanos/thanos");
        assert_eq!(query.spec["logFormat"], "logfmt");
        assert_eq!(query.spec["queryFrontend"]["replicas"], 4);
        assert_eq!(
            query.spec["queryFrontend"]["securityContext"]["seccompProfile"]["type"],
            "RuntimeDefault"
        );
    }

    #[test]
    fn test_ruler_points_at_alertmanager() {
        let ruler = ruler(&cluster().templates, "rhobs-stage").unwrap();
        assert_eq!(
            ruler.spec["alertmanagerURL"],
            "dnssrv+http://alertmanager-cluster.rhobs-stage.svc.cluster.local:9093"
        );
        assert_eq!(ruler.spec["storageConfiguration"]["size"], "10Gi");
    }

    #[test]
    fn test_missing_image_surfaces_key() {
        let mut cluster = cluster();
        let mut images = (*cluster.templates.images).clone();
        images.remove(RULER);
        cluster.templates.images = std::sync::Arc::new(images);

        let err = build(&cluster).unwrap_err();
        assert!(matches!(
            err,
            rhobs_common::Error::MissingTemplateKey { key, .. } if key == RULER
        ));
    }
}
