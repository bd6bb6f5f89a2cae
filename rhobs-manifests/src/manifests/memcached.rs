//! Memcached cache in front of the gateway's AMS authorizer

use super::{
    cluster_ip_service, component_labels, container_port, match_labels, object_meta,
    service_account, service_monitor, service_port, Endpoint, StepOutput,
};
use crate::clusters::ClusterConfig;
use crate::template::keys::{API_CACHE, MEMCACHED_EXPORTER};
use crate::template::TemplateMaps;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec, Probe, TCPSocketAction};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use rhobs_common::Result;

pub const COMPONENT: &str = "rhobs-gateway-cache";
pub const NAME: &str = "rhobs-gateway-cache";
pub const PORT: u16 = 11211;
const EXPORTER_PORT: i32 = 9150;

/// Memory limit handed to memcached, in megabytes
const MEMORY_LIMIT_MB: u32 = 1024;
const MAX_ITEM_SIZE: &str = "5m";
const CONNECTION_LIMIT: u32 = 1024;

pub fn build(cluster: &ClusterConfig) -> Result<StepOutput> {
    let namespace = cluster.namespace.as_str();
    let templates = &cluster.templates;
    let version = templates.version(API_CACHE)?;
    let (labels, selector) = component_labels("api-cache", NAME, Some(&version));

    let mut out = StepOutput::default();
    out.push(COMPONENT, &service_account(NAME, namespace, labels.clone()))?;
    out.push(
        COMPONENT,
        &Deployment {
            metadata: object_meta(NAME, namespace, labels.clone()),
            spec: Some(DeploymentSpec {
                replicas: Some(templates.replicas(API_CACHE)?),
                selector: match_labels(selector.clone()),
                template: PodTemplateSpec {
                    metadata: Some(object_meta(NAME, namespace, labels.clone())),
                    spec: Some(PodSpec {
                        service_account_name: Some(NAME.to_string()),
                        containers: vec![memcached_container(templates)?, exporter_container(templates)?],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        },
    )?;
    out.push(
        COMPONENT,
        &cluster_ip_service(
            NAME,
            namespace,
            labels.clone(),
            selector.clone(),
            vec![
                service_port("client", i32::from(PORT)),
                service_port("metrics", EXPORTER_PORT),
            ],
        ),
    )?;

    out.service_monitors.push(service_monitor(
        NAME,
        namespace,
        labels,
        selector,
        &[Endpoint::metrics("metrics")],
    ));

    Ok(out)
}

fn memcached_container(templates: &TemplateMaps) -> Result<Container> {
    Ok(Container {
        name: "memcached".to_string(),
        image: Some(templates.image(API_CACHE)?),
        image_pull_policy: Some("IfNotPresent".to_string()),
        args: Some(vec![
            format!("-m {MEMORY_LIMIT_MB}"),
            format!("-I {MAX_ITEM_SIZE}"),
            format!("-c {CONNECTION_LIMIT}"),
            "-v".to_string(),
        ]),
        ports: Some(vec![container_port("client", i32::from(PORT))]),
        readiness_probe: Some(Probe {
            tcp_socket: Some(TCPSocketAction {
                port: IntOrString::String("client".to_string()),
                ..Default::default()
            }),
            period_seconds: Some(10),
            ..Default::default()
        }),
        resources: Some(templates.resources(API_CACHE)?),
        termination_message_policy: Some("FallbackToLogsOnError".to_string()),
        ..Default::default()
    })
}

fn exporter_container(templates: &TemplateMaps) -> Result<Container> {
    Ok(Container {
        name: "exporter".to_string(),
        image: Some(templates.image(MEMCACHED_EXPORTER)?),
        image_pull_policy: Some("IfNotPresent".to_string()),
        args: Some(vec![
            format!("--memcached.address=localhost:{PORT}"),
            format!("--web.listen-address=0.0.0.0:{EXPORTER_PORT}"),
        ]),
        ports: Some(vec![container_port("metrics", EXPORTER_PORT)]),
        resources: Some(templates.resources(MEMCACHED_EXPORTER)?),
        termination_message_policy: Some("FallbackToLogsOnError".to_string()),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clusters::catalog::default_clusters;

    #[test]
    fn test_build_cache() {
        let cluster = default_clusters().unwrap().remove(0);
        let out = build(&cluster).unwrap();
        let kinds: Vec<_> = out.manifests.iter().map(|m| m.kind.as_str()).collect();
        assert_eq!(kinds, vec!["ServiceAccount", "Deployment", "Service"]);

        let containers = &out.manifests[1].object["spec"]["template"]["spec"]["containers"];
        assert_eq!(containers[0]["args"][0], "-m 1024");
        assert_eq!(containers[1]["args"][0], "--memcached.address=localhost:11211");
        assert_eq!(out.service_monitors.len(), 1);
    }
}
