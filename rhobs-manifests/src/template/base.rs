//! Base parameter set and the environment-wide maps

use super::keys::*;
use super::{
    LokiComponentSpec, LokiLimitOverrides, LokiOverrides, ObjectStorageConfig, ParamMap,
    StorageSize, TemplateMaps,
};
use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;
use std::sync::Arc;

const THANOS_IMAGE: &str = "quay.io/redhat-services-prod/rhobs-mco-tenant/rhobs-thanos";
const THANOS_VERSION_STAGE: &str = "358a4a4341684ca1f199b6780891f4d09d5ca458";
const THANOS_VERSION_PROD: &str = "358a4a4341684ca1f199b6780891f4d09d5ca458";

const THANOS_OPERATOR_IMAGE: &str =
    "quay.io/redhat-services-prod/rhobs-mco-tenant/rhobs-thanos-operator:d4ab5437b2d988fa31db741f53c9462f66327785";
const KUBE_RBAC_PROXY_IMAGE: &str = "registry.redhat.io/openshift4/ose-kube-rbac-proxy@sha256:98455d503b797b6b02edcfd37045c8fab0796b95ee5cf4cfe73b221a07e805f0";
const JAEGER_AGENT_IMAGE: &str = "registry.redhat.io/rhosdt/jaeger-agent-rhel8:1.57.0-10";

const MEMCACHED_TAG: &str = "1.5-316";
const MEMCACHED_IMAGE: &str = "registry.redhat.io/rhel8/memcached:1.5-316";
const MEMCACHED_EXPORTER_IMAGE: &str = "quay.io/prometheus/memcached-exporter:v0.15.0";

const SYNTHETICS_API_IMAGE: &str = "quay.io/redhat-services-prod/openshift/rhobs-synthetics-api";
const SYNTHETICS_API_VERSION: &str = "cea7d4656cd0ad338e580cc6ba266264a9938e5c";

const OBSERVATORIUM_API_IMAGE: &str = "quay.io/redhat-services-prod/rhobs-mco-tenant/rhobs-observatorium-api";
const OBSERVATORIUM_API_VERSION: &str = "210d0f7ddfd29f43068cb0060c32ff47cb9ca41a";
const OBSERVATORIUM_API_VERSION_LEGACY: &str = "9aada65247a07782465beb500323a0e18d7e3d05";

const OPA_AMS_IMAGE: &str =
    "quay.io/redhat-services-prod/rhobs-mco-tenant/rhobs-opa-ams:da95dce02a3be7dade09199ce5a9d91a5ac6a878";

// Stores and compactors of the legacy multi-store layout
const STORE02W: &str = "STORE02W";
const STORE2W90D: &str = "STORE2W90D";
const STORE90D_PLUS: &str = "STORE90D+";
const STORE_ROS: &str = "STORE_ROS";
const RECEIVE_INGESTOR_TELEMETER: &str = "RECEIVE_INGESTOR_TELEMETER";
const COMPACT_ROS: &str = "COMPACT_ROS";
const COMPACT_TELEMETER: &str = "COMPACT_TELEMETER";

fn params<T, const N: usize>(entries: [(&str, T); N]) -> Arc<ParamMap<T>> {
    Arc::new(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

fn resource_list(cpu: &str, memory: &str) -> BTreeMap<String, Quantity> {
    BTreeMap::from([
        ("cpu".to_string(), Quantity(cpu.to_string())),
        ("memory".to_string(), Quantity(memory.to_string())),
    ])
}

/// Build a `ResourceRequirements` from `(cpu, memory)` pairs
pub fn resource_requirements(
    requests: Option<(&str, &str)>,
    limits: Option<(&str, &str)>,
) -> ResourceRequirements {
    ResourceRequirements {
        requests: requests.map(|(cpu, mem)| resource_list(cpu, mem)),
        limits: limits.map(|(cpu, mem)| resource_list(cpu, mem)),
        ..Default::default()
    }
}

fn small() -> ResourceRequirements {
    resource_requirements(Some(("100m", "256Mi")), Some(("200m", "512Mi")))
}

fn bucket(name: &str) -> ObjectStorageConfig {
    ObjectStorageConfig::new(name, "thanos.yaml")
}

/// Base parameter set for every cluster.
///
/// Every key looked up by a manifest builder in the default pipeline has an
/// entry here.
pub fn default_base_template() -> TemplateMaps {
    let thanos_components = [
        STORE_DEFAULT,
        RECEIVE_ROUTER,
        RECEIVE_INGESTOR_DEFAULT,
        RULER,
        COMPACT_DEFAULT,
        QUERY,
        QUERY_FRONTEND,
    ];

    let mut images = ParamMap::new();
    let mut versions = ParamMap::new();
    let mut log_levels = ParamMap::new();
    for key in thanos_components {
        images.insert(key.to_string(), THANOS_IMAGE.to_string());
        versions.insert(key.to_string(), THANOS_VERSION_PROD.to_string());
        log_levels.insert(key.to_string(), LOG_LEVELS[1].to_string());
    }

    images.extend(
        [
            (THANOS_OPERATOR, THANOS_OPERATOR_IMAGE.to_string()),
            (KUBE_RBAC_PROXY, KUBE_RBAC_PROXY_IMAGE.to_string()),
            (JAEGER, JAEGER_AGENT_IMAGE.to_string()),
            (API_CACHE, "docker.io/memcached:1.6.17-alpine".to_string()),
            (MEMCACHED_EXPORTER, MEMCACHED_EXPORTER_IMAGE.to_string()),
            (
                OBSERVATORIUM_API,
                format!("{OBSERVATORIUM_API_IMAGE}:{OBSERVATORIUM_API_VERSION}"),
            ),
            (OPA_AMS, OPA_AMS_IMAGE.to_string()),
            (SYNTHETICS_API, SYNTHETICS_API_IMAGE.to_string()),
        ]
        .map(|(k, v)| (k.to_string(), v)),
    );
    versions.extend(
        [
            (API_CACHE, MEMCACHED_TAG),
            (SYNTHETICS_API, SYNTHETICS_API_VERSION),
            (OBSERVATORIUM_API, OBSERVATORIUM_API_VERSION),
        ]
        .map(|(k, v)| (k.to_string(), v.to_string())),
    );
    log_levels.extend(
        [SYNTHETICS_API, OBSERVATORIUM_API].map(|k| (k.to_string(), LOG_LEVELS[1].to_string())),
    );

    let gateway_sized = resource_requirements(Some(("100m", "100Mi")), Some(("1", "2Gi")));

    TemplateMaps {
        images: Arc::new(images),
        versions: Arc::new(versions),
        log_levels: Arc::new(log_levels),
        resource_requirements: params([
            (STORE_DEFAULT, small()),
            (RECEIVE_ROUTER, resource_requirements(Some(("1", "5Gi")), None)),
            (
                RECEIVE_INGESTOR_DEFAULT,
                resource_requirements(Some(("2", "15Gi")), None),
            ),
            (RULER, small()),
            (COMPACT_DEFAULT, small()),
            (QUERY, small()),
            (QUERY_FRONTEND, small()),
            (
                MANAGER,
                resource_requirements(Some(("50m", "64Mi")), Some(("100m", "128Mi"))),
            ),
            (
                KUBE_RBAC_PROXY,
                resource_requirements(Some(("25m", "32Mi")), Some(("50m", "64Mi"))),
            ),
            (
                API_CACHE,
                resource_requirements(Some(("500m", "100Mi")), Some(("3", "1844Mi"))),
            ),
            (
                MEMCACHED_EXPORTER,
                resource_requirements(Some(("100m", "100Mi")), Some(("200m", "200Mi"))),
            ),
            (OBSERVATORIUM_API, gateway_sized.clone()),
            (SYNTHETICS_API, gateway_sized),
        ]),
        replicas: params([
            (STORE_DEFAULT, 1),
            (RECEIVE_ROUTER, 1),
            (RECEIVE_INGESTOR_DEFAULT, 3),
            (RULER, 1),
            (QUERY, 1),
            (QUERY_FRONTEND, 1),
            (COMPACT_DEFAULT, 1),
            (API_CACHE, 1),
            (OBSERVATORIUM_API, 2),
            (SYNTHETICS_API, 1),
        ]),
        storage_size: params([
            (STORE_DEFAULT, StorageSize::from("10Gi")),
            (RECEIVE_INGESTOR_DEFAULT, StorageSize::from("10Gi")),
            (COMPACT_DEFAULT, StorageSize::from("10Gi")),
            (RULER, StorageSize::from("10Gi")),
        ]),
        object_storage_bucket: params([(DEFAULT_BUCKET, bucket("default-thanos-bucket"))]),
        loki_overrides: params([(
            LOKI_CONFIG,
            LokiOverrides {
                limits: LokiLimitOverrides {
                    ingestion_rate_limit_mb: 12,
                    // OTLP clients send very large batches
                    ingestion_burst_size_mb: 256,
                    // audit log lines exceed the 256K default
                    max_line_size: 1024 * 1024,
                    query_timeout: "3m".to_string(),
                    ..Default::default()
                },
                router: LokiComponentSpec { replicas: 3 },
                ingest: LokiComponentSpec { replicas: 3 },
                query: LokiComponentSpec { replicas: 2 },
                query_frontend: LokiComponentSpec { replicas: 2 },
            },
        )]),
    }
}

fn legacy_buckets() -> Arc<ParamMap<ObjectStorageConfig>> {
    params([
        ("DEFAULT", bucket("observatorium-mst-thanos-objectstorage")),
        ("TELEMETER", bucket("thanos-objectstorage")),
        ("ROS", bucket("ros-thanos-objstore")),
    ])
}

/// Environment-wide maps of the staging deployment
pub fn stage_maps() -> TemplateMaps {
    let thanos = [
        STORE02W,
        STORE2W90D,
        STORE90D_PLUS,
        STORE_ROS,
        STORE_DEFAULT,
        RECEIVE_ROUTER,
        RECEIVE_INGESTOR_TELEMETER,
        RECEIVE_INGESTOR_DEFAULT,
        RULER,
        COMPACT_DEFAULT,
        COMPACT_ROS,
        COMPACT_TELEMETER,
        QUERY,
        QUERY_FRONTEND,
    ];

    let mut images: ParamMap<String> = thanos
        .iter()
        .map(|k| (k.to_string(), THANOS_IMAGE.to_string()))
        .collect();
    images.extend(
        [
            (JAEGER, JAEGER_AGENT_IMAGE.to_string()),
            (THANOS_OPERATOR, THANOS_OPERATOR_IMAGE.to_string()),
            (KUBE_RBAC_PROXY, KUBE_RBAC_PROXY_IMAGE.to_string()),
            (API_CACHE, MEMCACHED_IMAGE.to_string()),
            (MEMCACHED_EXPORTER, MEMCACHED_EXPORTER_IMAGE.to_string()),
            (
                OBSERVATORIUM_API,
                format!("{OBSERVATORIUM_API_IMAGE}:{OBSERVATORIUM_API_VERSION}"),
            ),
            (
                SYNTHETICS_API,
                format!("{SYNTHETICS_API_IMAGE}:{SYNTHETICS_API_VERSION}"),
            ),
            (OPA_AMS, OPA_AMS_IMAGE.to_string()),
        ]
        .map(|(k, v)| (k.to_string(), v)),
    );

    let mut versions: ParamMap<String> = thanos
        .iter()
        .map(|k| (k.to_string(), THANOS_VERSION_STAGE.to_string()))
        .collect();
    versions.extend(
        [
            (API_CACHE, MEMCACHED_TAG),
            (OBSERVATORIUM_API, OBSERVATORIUM_API_VERSION_LEGACY),
            (SYNTHETICS_API, SYNTHETICS_API_VERSION),
        ]
        .map(|(k, v)| (k.to_string(), v.to_string())),
    );

    let mut log_levels: ParamMap<String> = thanos
        .iter()
        .map(|k| (k.to_string(), LOG_LEVELS[1].to_string()))
        .collect();
    log_levels.extend(
        [OBSERVATORIUM_API, SYNTHETICS_API].map(|k| (k.to_string(), LOG_LEVELS[0].to_string())),
    );

    let store = resource_requirements(Some(("50m", "512Mi")), Some(("250m", "2Gi")));
    let receive = resource_requirements(Some(("700m", "2Gi")), Some(("2", "5Gi")));
    let compact = resource_requirements(Some(("100m", "1Gi")), Some(("1", "5Gi")));
    let gateway_sized = resource_requirements(Some(("100m", "100Mi")), Some(("1", "2Gi")));

    TemplateMaps {
        images: Arc::new(images),
        versions: Arc::new(versions),
        log_levels: Arc::new(log_levels),
        storage_size: params([
            (STORE02W, StorageSize::from("512Mi")),
            (STORE2W90D, StorageSize::from("512Mi")),
            (STORE90D_PLUS, StorageSize::from("512Mi")),
            (STORE_ROS, StorageSize::from("512Mi")),
            (STORE_DEFAULT, StorageSize::from("3Gi")),
            ("RECEIVE_TELEMETER", StorageSize::from("3Gi")),
            ("RECEIVE_DEFAULT", StorageSize::from("3Gi")),
            (RULER, StorageSize::from("512Mi")),
            (COMPACT_DEFAULT, StorageSize::from("512Mi")),
            (COMPACT_ROS, StorageSize::from("512Mi")),
            (COMPACT_TELEMETER, StorageSize::from("512Mi")),
        ]),
        replicas: params([
            (STORE02W, 3),
            (STORE2W90D, 3),
            (STORE90D_PLUS, 3),
            (STORE_ROS, 3),
            (STORE_DEFAULT, 3),
            (RECEIVE_ROUTER, 3),
            (RECEIVE_INGESTOR_TELEMETER, 6),
            (RECEIVE_INGESTOR_DEFAULT, 3),
            (RULER, 2),
            (QUERY, 6),
            (QUERY_FRONTEND, 3),
            (API_CACHE, 1),
            (OBSERVATORIUM_API, 2),
            (SYNTHETICS_API, 2),
        ]),
        resource_requirements: params([
            (STORE02W, store.clone()),
            (STORE2W90D, store.clone()),
            (STORE90D_PLUS, store.clone()),
            (STORE_ROS, store.clone()),
            (STORE_DEFAULT, store),
            (RECEIVE_ROUTER, receive.clone()),
            (RECEIVE_INGESTOR_TELEMETER, receive.clone()),
            (RECEIVE_INGESTOR_DEFAULT, receive),
            (
                RULER,
                resource_requirements(Some(("700m", "1Gi")), Some(("2", "3Gi"))),
            ),
            (COMPACT_DEFAULT, compact.clone()),
            (COMPACT_ROS, compact.clone()),
            (COMPACT_TELEMETER, compact),
            (
                QUERY,
                resource_requirements(Some(("300m", "1Gi")), Some(("2", "5Gi"))),
            ),
            (
                QUERY_FRONTEND,
                resource_requirements(Some(("100m", "500Mi")), Some(("1", "3Gi"))),
            ),
            (
                MANAGER,
                resource_requirements(Some(("100m", "512Mi")), Some(("1", "2Gi"))),
            ),
            (
                KUBE_RBAC_PROXY,
                resource_requirements(Some(("5m", "64Mi")), Some(("500m", "128Mi"))),
            ),
            (
                API_CACHE,
                resource_requirements(Some(("500m", "100Mi")), Some(("3", "1844Mi"))),
            ),
            (
                MEMCACHED_EXPORTER,
                resource_requirements(Some(("100m", "100Mi")), Some(("200m", "200Mi"))),
            ),
            (OBSERVATORIUM_API, gateway_sized.clone()),
            (SYNTHETICS_API, gateway_sized),
        ]),
        object_storage_bucket: legacy_buckets(),
        loki_overrides: Arc::default(),
    }
}

/// Environment-wide maps of the production deployment
pub fn production_maps() -> TemplateMaps {
    let thanos = [
        STORE02W,
        STORE2W90D,
        STORE90D_PLUS,
        STORE_ROS,
        STORE_DEFAULT,
        QUERY,
        QUERY_FRONTEND,
        RECEIVE_ROUTER,
        RECEIVE_INGESTOR_DEFAULT,
        RULER,
    ];

    let mut images: ParamMap<String> = thanos
        .iter()
        .chain(std::iter::once(&"COMPACT"))
        .map(|k| (k.to_string(), THANOS_IMAGE.to_string()))
        .collect();
    images.extend(
        [
            (THANOS_OPERATOR, THANOS_OPERATOR_IMAGE.to_string()),
            (KUBE_RBAC_PROXY, KUBE_RBAC_PROXY_IMAGE.to_string()),
            (API_CACHE, MEMCACHED_IMAGE.to_string()),
            (MEMCACHED_EXPORTER, MEMCACHED_EXPORTER_IMAGE.to_string()),
            (
                OBSERVATORIUM_API,
                format!("{OBSERVATORIUM_API_IMAGE}:{OBSERVATORIUM_API_VERSION}"),
            ),
            (
                SYNTHETICS_API,
                format!("{SYNTHETICS_API_IMAGE}:{SYNTHETICS_API_VERSION}"),
            ),
            (JAEGER, JAEGER_AGENT_IMAGE.to_string()),
        ]
        .map(|(k, v)| (k.to_string(), v)),
    );

    let mut versions: ParamMap<String> = thanos
        .iter()
        .map(|k| (k.to_string(), THANOS_VERSION_PROD.to_string()))
        .collect();
    versions.extend(
        [
            (API_CACHE, MEMCACHED_TAG),
            (OBSERVATORIUM_API, OBSERVATORIUM_API_VERSION_LEGACY),
            (SYNTHETICS_API, SYNTHETICS_API_VERSION),
        ]
        .map(|(k, v)| (k.to_string(), v.to_string())),
    );

    let log_levels: ParamMap<String> = thanos
        .iter()
        .chain([OBSERVATORIUM_API, SYNTHETICS_API].iter())
        .map(|k| (k.to_string(), LOG_LEVELS[0].to_string()))
        .collect();

    let store = resource_requirements(Some(("50m", "512Mi")), None);
    let receive = resource_requirements(Some(("700m", "2Gi")), Some(("2", "5Gi")));
    let gateway_sized = resource_requirements(Some(("100m", "100Mi")), Some(("1", "2Gi")));

    TemplateMaps {
        images: Arc::new(images),
        versions: Arc::new(versions),
        log_levels: Arc::new(log_levels),
        storage_size: params([
            (STORE02W, StorageSize::from("300Gi")),
            (STORE2W90D, StorageSize::from("300Gi")),
            (STORE90D_PLUS, StorageSize::from("300Gi")),
            (STORE_ROS, StorageSize::from("300Gi")),
            (STORE_DEFAULT, StorageSize::from("300Gi")),
            ("RECEIVE_DEFAULT", StorageSize::from("3Gi")),
            (RULER, StorageSize::from("3Gi")),
        ]),
        replicas: params([
            (STORE02W, 2),
            (STORE2W90D, 2),
            (STORE90D_PLUS, 1),
            // ROS store only runs in staging
            (STORE_ROS, 0),
            (STORE_DEFAULT, 2),
            (RECEIVE_ROUTER, 2),
            (RECEIVE_INGESTOR_DEFAULT, 3),
            (QUERY, 3),
            (QUERY_FRONTEND, 3),
            (RULER, 1),
            (API_CACHE, 1),
            (OBSERVATORIUM_API, 2),
            (SYNTHETICS_API, 2),
        ]),
        resource_requirements: params([
            (STORE02W, store.clone()),
            (STORE2W90D, store.clone()),
            (STORE90D_PLUS, store.clone()),
            (STORE_ROS, store.clone()),
            (STORE_DEFAULT, store),
            (QUERY, resource_requirements(Some(("300m", "1Gi")), None)),
            (
                QUERY_FRONTEND,
                resource_requirements(Some(("100m", "500Mi")), None),
            ),
            (RECEIVE_ROUTER, receive.clone()),
            (RECEIVE_INGESTOR_DEFAULT, receive),
            (
                RULER,
                resource_requirements(Some(("300m", "1Gi")), Some(("1", "4Gi"))),
            ),
            (
                MANAGER,
                resource_requirements(Some(("100m", "512Mi")), Some(("1", "2Gi"))),
            ),
            (
                KUBE_RBAC_PROXY,
                resource_requirements(Some(("5m", "64Mi")), Some(("500m", "128Mi"))),
            ),
            (
                API_CACHE,
                resource_requirements(Some(("500m", "100Mi")), Some(("3", "1844Mi"))),
            ),
            (
                MEMCACHED_EXPORTER,
                resource_requirements(Some(("100m", "100Mi")), Some(("200m", "200Mi"))),
            ),
            (OBSERVATORIUM_API, gateway_sized.clone()),
            (SYNTHETICS_API, gateway_sized),
        ]),
        object_storage_bucket: legacy_buckets(),
        loki_overrides: Arc::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_covers_thanos_components() {
        let base = default_base_template();
        for key in [STORE_DEFAULT, RECEIVE_ROUTER, RULER, QUERY, QUERY_FRONTEND] {
            assert!(base.image(key).is_ok(), "missing image for {key}");
            assert!(base.version(key).is_ok(), "missing version for {key}");
            assert!(base.log_level(key).is_ok(), "missing log level for {key}");
            assert!(base.resources(key).is_ok(), "missing resources for {key}");
        }
        assert_eq!(base.bucket(DEFAULT_BUCKET).unwrap().name, "default-thanos-bucket");
    }

    #[test]
    fn test_base_loki_config() {
        let loki = default_base_template().loki(LOKI_CONFIG).unwrap();
        assert_eq!(loki.limits.ingestion_rate_limit_mb, 12);
        assert_eq!(loki.limits.max_line_size, 1_048_576);
        assert_eq!(loki.limits.query_timeout, "3m");
        assert_eq!(loki.query_frontend.replicas, 2);
    }

    #[test]
    fn test_resource_requirements_helper() {
        let rr = resource_requirements(Some(("1", "5Gi")), None);
        assert!(rr.limits.is_none());
        let requests = rr.requests.unwrap();
        assert_eq!(requests["cpu"], Quantity("1".to_string()));
        assert_eq!(requests["memory"], Quantity("5Gi".to_string()));
    }

    #[test]
    fn test_environment_maps_use_legacy_keys() {
        let stage = stage_maps();
        let prod = production_maps();
        assert_eq!(stage.replicas(STORE_ROS).unwrap(), 3);
        assert_eq!(prod.replicas(STORE_ROS).unwrap(), 0);
        assert_eq!(stage.bucket("ROS").unwrap().name, "ros-thanos-objstore");
        assert!(prod.image(OPA_AMS).is_err());
        assert_eq!(prod.log_level(QUERY).unwrap(), "debug");
    }
}
