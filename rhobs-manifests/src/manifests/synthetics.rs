//! Synthetics API, the probe registry behind the gateway's probes endpoint

use super::{
    cluster_ip_service, component_labels, container_port, match_labels, object_meta,
    service_account, service_monitor, service_port, Endpoint, Labels, StepOutput,
};
use crate::clusters::ClusterConfig;
use crate::template::keys::SYNTHETICS_API;
use crate::template::TemplateMaps;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, HTTPGetAction, PodSpec, PodTemplateSpec, Probe,
};
use k8s_openapi::api::rbac::v1 as rbacv1;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use rhobs_common::Result;

pub const COMPONENT: &str = "synthetics-api";
pub const NAME: &str = "synthetics-api";
pub const PORT: i32 = 8080;

pub fn build(cluster: &ClusterConfig) -> Result<StepOutput> {
    let namespace = cluster.namespace.as_str();
    let templates = &cluster.templates;
    let version = templates.version(SYNTHETICS_API)?;
    let (labels, selector) = component_labels(NAME, NAME, Some(&version));

    let mut out = StepOutput::default();
    out.push(COMPONENT, &service_account(NAME, namespace, labels.clone()))?;
    out.push(COMPONENT, &role(namespace, labels.clone()))?;
    out.push(COMPONENT, &role_binding(namespace, labels.clone()))?;
    out.push(
        COMPONENT,
        &deployment(templates, namespace, labels.clone(), selector.clone())?,
    )?;
    out.push(
        COMPONENT,
        &cluster_ip_service(
            NAME,
            namespace,
            labels.clone(),
            selector.clone(),
            vec![service_port(NAME, PORT)],
        ),
    )?;

    let mut endpoint = Endpoint::metrics(NAME);
    endpoint.honor_labels = true;
    out.service_monitors
        .push(service_monitor(NAME, namespace, labels, selector, &[endpoint]));

    Ok(out)
}

/// Probes are stored as ConfigMaps in the cluster namespace
fn role(namespace: &str, labels: Labels) -> rbacv1::Role {
    rbacv1::Role {
        metadata: object_meta(NAME, namespace, labels),
        rules: Some(vec![rbacv1::PolicyRule {
            api_groups: Some(vec![String::new()]),
            resources: Some(vec!["configmaps".to_string()]),
            verbs: ["get", "list", "watch", "create", "update", "patch", "delete"]
                .map(String::from)
                .to_vec(),
            ..Default::default()
        }]),
    }
}

fn role_binding(namespace: &str, labels: Labels) -> rbacv1::RoleBinding {
    rbacv1::RoleBinding {
        metadata: object_meta(NAME, namespace, labels),
        role_ref: rbacv1::RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "Role".to_string(),
            name: NAME.to_string(),
        },
        subjects: Some(vec![rbacv1::Subject {
            kind: "ServiceAccount".to_string(),
            name: NAME.to_string(),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        }]),
    }
}

fn probe(path: &str, initial_delay_seconds: i32) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(path.to_string()),
            port: IntOrString::Int(PORT),
            ..Default::default()
        }),
        initial_delay_seconds: Some(initial_delay_seconds),
        ..Default::default()
    }
}

fn deployment(
    templates: &TemplateMaps,
    namespace: &str,
    labels: Labels,
    selector: Labels,
) -> Result<Deployment> {
    let image = format!(
        "{}:{}",
        templates.image(SYNTHETICS_API)?,
        templates.version(SYNTHETICS_API)?
    );

    let container = Container {
        name: NAME.to_string(),
        image: Some(image),
        image_pull_policy: Some("IfNotPresent".to_string()),
        ports: Some(vec![container_port(NAME, PORT)]),
        env: Some(vec![EnvVar {
            name: "NAMESPACE".to_string(),
            value: Some(namespace.to_string()),
            ..Default::default()
        }]),
        liveness_probe: Some(probe("/livez", 30)),
        readiness_probe: Some(probe("/readyz", 5)),
        resources: Some(templates.resources(SYNTHETICS_API)?),
        termination_message_policy: Some("FallbackToLogsOnError".to_string()),
        ..Default::default()
    };

    Ok(Deployment {
        metadata: object_meta(NAME, namespace, labels.clone()),
        spec: Some(DeploymentSpec {
            replicas: Some(templates.replicas(SYNTHETICS_API)?),
            selector: match_labels(selector),
            template: PodTemplateSpec {
                metadata: Some(object_meta(NAME, namespace, labels)),
                spec: Some(PodSpec {
                    service_account_name: Some(NAME.to_string()),
                    containers: vec![container],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clusters::catalog::default_clusters;

    #[test]
    fn test_build_synthetics_api() {
        let cluster = default_clusters().unwrap().remove(3);
        let out = build(&cluster).unwrap();
        let kinds: Vec<_> = out.manifests.iter().map(|m| m.kind.as_str()).collect();
        assert_eq!(
            kinds,
            vec!["ServiceAccount", "Role", "RoleBinding", "Deployment", "Service"]
        );

        let container = &out.manifests[3].object["spec"]["template"]["spec"]["containers"][0];
        assert!(container["image"].as_str().unwrap().contains(':'));
        assert_eq!(container["env"][0]["value"], "rhobs-production");
        assert_eq!(container["readinessProbe"]["httpGet"]["path"], "/readyz");
    }
}
