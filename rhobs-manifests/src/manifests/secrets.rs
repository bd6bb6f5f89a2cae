//! Storage and cache secrets consumed by the thanos and loki stacks.
//!
//! Credentials are left as `${...}` placeholders; the deploy pipeline fills
//! them in from the vault.

use super::{object_meta, Labels, StepOutput, PART_OF};
use crate::clusters::ClusterConfig;
use crate::template::keys::DEFAULT_BUCKET;
use k8s_openapi::api::core::v1::Secret;
use rhobs_common::Result;
use std::collections::BTreeMap;

pub const COMPONENT: &str = "secrets";

pub const QUERY_RANGE_CACHE: &str = "thanos-query-range-cache-memcached";
pub const INDEX_CACHE: &str = "thanos-index-cache-memcached";
pub const BUCKET_CACHE: &str = "thanos-bucket-cache-memcached";
/// Key every thanos secret stores its config under
pub const THANOS_CONFIG_KEY: &str = "thanos.yaml";

const CACHE_MAX_ITEM_SIZE: &str = "5MiB";

fn labels() -> Labels {
    Labels::from([
        ("app.kubernetes.io/part-of".to_string(), PART_OF.to_string()),
        ("app.kubernetes.io/managed-by".to_string(), "rhobs".to_string()),
    ])
}

fn opaque(name: &str, namespace: &str, data: BTreeMap<String, String>) -> Secret {
    Secret {
        metadata: object_meta(name, namespace, labels()),
        string_data: Some(data),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    }
}

pub fn build(cluster: &ClusterConfig) -> Result<StepOutput> {
    let namespace = cluster.namespace.as_str();
    let bucket = cluster.templates.bucket(DEFAULT_BUCKET)?;

    let mut out = StepOutput::default();
    out.push(
        COMPONENT,
        &opaque(
            &bucket.name,
            namespace,
            BTreeMap::from([(bucket.key.clone(), objstore_config())]),
        ),
    )?;

    for (secret, service) in [
        (QUERY_RANGE_CACHE, "thanos-query-range-cache"),
        (INDEX_CACHE, "thanos-index-cache"),
        (BUCKET_CACHE, "thanos-bucket-cache"),
    ] {
        out.push(
            COMPONENT,
            &opaque(
                secret,
                namespace,
                BTreeMap::from([(
                    THANOS_CONFIG_KEY.to_string(),
                    cache_config(service, namespace),
                )]),
            ),
        )?;
    }

    out.push(
        COMPONENT,
        &opaque(super::loki::BUCKET_SECRET, namespace, loki_bucket_data()),
    )?;

    Ok(out)
}

fn objstore_config() -> String {
    [
        "type: S3",
        "config:",
        "  bucket: ${S3_BUCKET_NAME}",
        "  endpoint: ${S3_BUCKET_ENDPOINT}",
        "  region: ${S3_BUCKET_REGION}",
        "  access_key: ${AWS_ACCESS_KEY_ID}",
        "  secret_key: ${AWS_SECRET_ACCESS_KEY}",
    ]
    .join("\n")
}

/// Memcached client config resolving the cache pods through the SRV record
/// of their headless service
fn cache_config(service: &str, namespace: &str) -> String {
    [
        "type: MEMCACHED".to_string(),
        "config:".to_string(),
        format!("  addresses: [\"dnssrv+_client._tcp.{service}.{namespace}.svc.cluster.local\"]"),
        format!("  max_item_size: {CACHE_MAX_ITEM_SIZE}"),
        "  max_async_buffer_size: 100000".to_string(),
        "  max_get_multi_batch_size: 100".to_string(),
        "  timeout: 2s".to_string(),
    ]
    .join("\n")
}

fn loki_bucket_data() -> BTreeMap<String, String> {
    [
        ("bucketnames", "${LOKI_S3_BUCKET_NAME}"),
        ("endpoint", "${LOKI_S3_BUCKET_ENDPOINT}"),
        ("region", "${LOKI_S3_BUCKET_REGION}"),
        ("access_key_id", "${AWS_ACCESS_KEY_ID}"),
        ("access_key_secret", "${AWS_SECRET_ACCESS_KEY}"),
    ]
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clusters::catalog::default_clusters;
    use crate::template::{ObjectStorageBuckets, ObjectStorageConfig, TemplateOverride};

    #[test]
    fn test_build_secrets() {
        let cluster = default_clusters().unwrap().remove(2);
        let out = build(&cluster).unwrap();
        let names: Vec<_> = out.manifests.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "default-thanos-bucket",
                QUERY_RANGE_CACHE,
                INDEX_CACHE,
                BUCKET_CACHE,
                "loki-default-bucket"
            ]
        );
        assert!(out.manifests.iter().all(|m| m.kind == "Secret"));

        let cache = out.manifests[2].object["stringData"][THANOS_CONFIG_KEY]
            .as_str()
            .unwrap();
        assert!(cache.contains("thanos-index-cache.rhobs-stage.svc.cluster.local"));
    }

    #[test]
    fn test_bucket_override_renames_secret() {
        let mut cluster = default_clusters().unwrap().remove(0);
        let buckets = ObjectStorageBuckets::from([(
            DEFAULT_BUCKET,
            ObjectStorageConfig::new("custom-bucket", "objstore.yaml"),
        )]);
        cluster.templates = cluster
            .templates
            .override_with(&[&buckets as &dyn TemplateOverride]);

        let out = build(&cluster).unwrap();
        assert_eq!(out.manifests[0].name, "custom-bucket");
        assert!(out.manifests[0].object["stringData"]["objstore.yaml"].is_string());
    }
}
