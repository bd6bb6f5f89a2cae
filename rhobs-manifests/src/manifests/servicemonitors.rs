//! Scrape configs for the services the thanos operator creates.
//!
//! The thanos CRs disable the operator's own ServiceMonitors so they can be
//! shipped through the cluster's monitoring bundle instead.

use super::thanos::{INSTANCE, STORE_INSTANCE};
use super::{service_monitor, CustomResource, Endpoint, Labels, StepOutput};
use crate::clusters::ClusterConfig;
use rhobs_common::Result;

/// thanos-operator component name and the CR instance it belongs to
const THANOS_SERVICES: [(&str, &str); 7] = [
    ("query", INSTANCE),
    ("query-frontend", INSTANCE),
    ("receive-router", INSTANCE),
    ("receive-ingester", STORE_INSTANCE),
    ("compact", STORE_INSTANCE),
    ("ruler", INSTANCE),
    ("store", STORE_INSTANCE),
];

pub fn build(cluster: &ClusterConfig) -> Result<StepOutput> {
    Ok(StepOutput {
        manifests: Vec::new(),
        service_monitors: thanos_service_monitors(&cluster.namespace),
    })
}

pub fn thanos_service_monitors(namespace: &str) -> Vec<CustomResource> {
    THANOS_SERVICES
        .iter()
        .map(|(component, instance)| {
            let name = format!("thanos-{component}-{instance}");
            let labels = Labels::from([
                ("app.kubernetes.io/component".to_string(), component.to_string()),
                ("app.kubernetes.io/instance".to_string(), name.clone()),
                ("app.kubernetes.io/part-of".to_string(), "thanos".to_string()),
            ]);
            let selector = Labels::from([
                ("app.kubernetes.io/instance".to_string(), name.clone()),
                ("app.kubernetes.io/part-of".to_string(), "thanos".to_string()),
            ]);
            service_monitor(&name, namespace, labels, selector, &[Endpoint::metrics("http")])
        })
        .collect()
}
