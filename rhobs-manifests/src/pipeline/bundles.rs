//! Per-cluster monitoring bundles
//!
//! ServiceMonitors are not written next to the component that owns them.
//! Steps hand them to the bundle of their cluster, and [`MonitoringBundles::render_all`]
//! turns every bundle into `monitoring` manifests once the steps are done,
//! retargeted at the cluster's customer monitoring stack.

use crate::clusters::ClusterConfig;
use crate::manifests::{CustomResource, Manifest};
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const MONITORING_COMPONENT: &str = "monitoring";
pub const MONITORING_NAMESPACE: &str = "openshift-customer-monitoring";
const NAMESPACE_PLACEHOLDER: &str = "${NAMESPACE}";

#[derive(Debug, Clone)]
struct MonitoringBundle {
    cluster: ClusterConfig,
    monitors: Vec<CustomResource>,
}

/// Registry of monitoring bundles keyed by `<environment>-<cluster>`
#[derive(Debug, Default)]
pub struct MonitoringBundles {
    bundles: BTreeMap<String, MonitoringBundle>,
}

impl MonitoringBundles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(cluster: &ClusterConfig) -> String {
        format!("{}-{}", cluster.environment, cluster.name)
    }

    pub fn add(&mut self, cluster: &ClusterConfig, monitors: Vec<CustomResource>) {
        if monitors.is_empty() {
            return;
        }
        self.bundles
            .entry(Self::key(cluster))
            .or_insert_with(|| MonitoringBundle {
                cluster: cluster.clone(),
                monitors: Vec::new(),
            })
            .monitors
            .extend(monitors);
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Number of ServiceMonitors registered for `key`
    pub fn monitor_count(&self, key: &str) -> usize {
        self.bundles.get(key).map_or(0, |b| b.monitors.len())
    }

    /// Render every bundle, keyed like the registry, and clear the registry.
    /// The registry is empty afterwards even when rendering fails.
    pub fn render_all(&mut self) -> rhobs_common::Result<BTreeMap<String, Vec<Manifest>>> {
        std::mem::take(&mut self.bundles)
            .into_iter()
            .map(|(key, bundle)| {
                tracing::debug!(bundle = %key, monitors = bundle.monitors.len(), "Rendering monitoring bundle");
                Ok((key, render_bundle(&bundle)?))
            })
            .collect()
    }
}

fn render_bundle(bundle: &MonitoringBundle) -> rhobs_common::Result<Vec<Manifest>> {
    bundle
        .monitors
        .iter()
        .map(|monitor| {
            let retargeted = retarget(monitor.clone(), &bundle.cluster);
            Manifest::custom(MONITORING_COMPONENT, &retargeted)
        })
        .collect()
}

/// Move a ServiceMonitor into the customer monitoring namespace while it keeps
/// scraping the cluster namespace
fn retarget(mut monitor: CustomResource, cluster: &ClusterConfig) -> CustomResource {
    monitor.metadata.namespace = Some(MONITORING_NAMESPACE.to_string());
    monitor
        .metadata
        .labels
        .get_or_insert_with(BTreeMap::new)
        .insert("prometheus".to_string(), "app-sre".to_string());

    let namespace = cluster.namespace.as_str();
    if let Some(Value::Array(names)) = monitor.spec.pointer_mut("/namespaceSelector/matchNames") {
        for name in names.iter_mut() {
            if matches!(name.as_str(), Some("") | Some(NAMESPACE_PLACEHOLDER)) {
                *name = json!(namespace);
            }
        }
        if names.is_empty() {
            names.push(json!(namespace));
        }
    } else if let Some(spec) = monitor.spec.as_object_mut() {
        spec.insert(
            "namespaceSelector".to_string(),
            json!({ "matchNames": [namespace] }),
        );
    }

    if let Some(group) = &cluster.monitoring_api_group {
        let version = monitor
            .api_version
            .rsplit_once('/')
            .map_or(monitor.api_version.as_str(), |(_, v)| v)
            .to_string();
        monitor.api_version = format!("{group}/{version}");
    }

    monitor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clusters::catalog::default_clusters;
    use crate::manifests::{object_meta, Labels, SERVICE_MONITOR_API_VERSION};

    fn monitor(match_names: Value) -> CustomResource {
        CustomResource::new(
            SERVICE_MONITOR_API_VERSION,
            "ServiceMonitor",
            object_meta("thanos-query", "rhobs-int", Labels::new()),
            json!({ "namespaceSelector": { "matchNames": match_names } }),
        )
    }

    #[test]
    fn test_retarget_replaces_placeholder_namespaces() {
        let cluster = default_clusters().unwrap().remove(1);
        let out = retarget(monitor(json!(["", "${NAMESPACE}", "other"])), &cluster);
        assert_eq!(out.metadata.namespace.as_deref(), Some(MONITORING_NAMESPACE));
        assert_eq!(
            out.spec["namespaceSelector"]["matchNames"],
            json!(["rhobs-stage", "rhobs-stage", "other"])
        );
        assert_eq!(out.metadata.labels.unwrap()["prometheus"], "app-sre");
        assert_eq!(out.api_version, SERVICE_MONITOR_API_VERSION);
    }

    #[test]
    fn test_retarget_rewrites_api_group() {
        let cluster = default_clusters().unwrap().remove(0);
        assert!(cluster.monitoring_api_group.is_some());
        let out = retarget(monitor(json!([])), &cluster);
        assert_eq!(out.api_version, "monitoring.rhobs/v1");
        assert_eq!(out.spec["namespaceSelector"]["matchNames"], json!(["rhobs-int"]));
    }

    #[test]
    fn test_render_all_clears_registry() {
        let cluster = default_clusters().unwrap().remove(2);
        let mut bundles = MonitoringBundles::new();
        bundles.add(&cluster, vec![monitor(json!([]))]);
        bundles.add(&cluster, vec![]);
        assert_eq!(bundles.monitor_count("staging-rhobss01uw2"), 1);

        let rendered = bundles.render_all().unwrap();
        let manifests = &rendered["staging-rhobss01uw2"];
        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests[0].component, MONITORING_COMPONENT);
        assert!(bundles.is_empty());
    }
}
