//! Alertmanager managed by the observability operator

use super::{
    cluster_ip_service, object_meta, service_monitor, service_port, CustomResource, Endpoint,
    Labels, StepOutput, PART_OF,
};
use crate::clusters::ClusterConfig;
use rhobs_common::Result;
use serde_json::json;

pub const COMPONENT: &str = "alertmanager";
pub const NAME: &str = "rhobs-alertmanager";
/// Service the gateway and rulers send alerts to
pub const SERVICE: &str = "alertmanager";
pub const PORT: i32 = 9093;

const API_VERSION: &str = "monitoring.rhobs/v1";
const REPLICAS: i32 = 1;

fn labels() -> Labels {
    [
        ("app.kubernetes.io/component", "alertmanager"),
        ("app.kubernetes.io/instance", PART_OF),
        ("app.kubernetes.io/name", "alertmanager"),
        ("app.kubernetes.io/part-of", PART_OF),
        ("app.kubernetes.io/managed-by", "observability-operator"),
    ]
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .into()
}

fn component_selector() -> Labels {
    Labels::from([(
        "app.kubernetes.io/component".to_string(),
        "alertmanager".to_string(),
    )])
}

pub fn build(cluster: &ClusterConfig) -> Result<StepOutput> {
    let namespace = cluster.namespace.as_str();
    let mut out = StepOutput::default();

    let alertmanager = CustomResource::new(
        API_VERSION,
        "Alertmanager",
        object_meta(NAME, namespace, labels()),
        json!({ "replicas": REPLICAS }),
    );
    out.push_custom(COMPONENT, &alertmanager)?;

    // pods created by the operator carry the `alertmanager: <name>` label
    let pod_selector = Labels::from([("alertmanager".to_string(), NAME.to_string())]);
    out.push(
        COMPONENT,
        &cluster_ip_service(
            SERVICE,
            namespace,
            labels(),
            pod_selector,
            vec![service_port("web", PORT)],
        ),
    )?;

    let mut endpoint = Endpoint::metrics("web");
    endpoint.honor_labels = true;
    out.service_monitors.push(service_monitor(
        NAME,
        namespace,
        component_selector(),
        component_selector(),
        &[endpoint],
    ));

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clusters::catalog::default_clusters;

    #[test]
    fn test_build_alertmanager() {
        let cluster = default_clusters().unwrap().remove(1);
        let out = build(&cluster).unwrap();

        let cr = &out.manifests[0];
        assert_eq!(cr.kind, "Alertmanager");
        assert_eq!(cr.object["apiVersion"], API_VERSION);
        assert_eq!(cr.object["spec"]["replicas"], REPLICAS);
        assert_eq!(cr.object["metadata"]["namespace"], "rhobs-stage");

        let sm = serde_json::to_value(&out.service_monitors[0]).unwrap();
        assert_eq!(sm["spec"]["endpoints"][0]["honorLabels"], true);
        assert_eq!(sm["spec"]["endpoints"][0]["port"], "web");
    }
}
