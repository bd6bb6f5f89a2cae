//! Operator deployments: the thanos operator runs from our own Deployment,
//! the loki operator is installed through OLM.

use super::{
    cluster_ip_service, container_port, http_probe, match_labels, object_meta, service_account,
    service_monitor, service_port, CustomResource, Endpoint, Labels, StepOutput,
};
use crate::clusters::ClusterConfig;
use crate::template::keys::{KUBE_RBAC_PROXY, MANAGER, THANOS_OPERATOR};
use crate::template::TemplateMaps;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec, SecurityContext};
use k8s_openapi::api::rbac::v1 as rbacv1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use rhobs_common::Result;
use serde_json::json;

pub const THANOS_OPERATOR_COMPONENT: &str = "thanos-operator";
pub const LOKI_OPERATOR_COMPONENT: &str = "loki-operator";

const THANOS_OPERATOR_NAME: &str = "thanos-operator-controller-manager";
const METRICS_SERVICE: &str = "thanos-operator-controller-manager-metrics-service";
const HEALTH_PORT: i32 = 8081;
const METRICS_PORT: i32 = 8443;

const LOKI_OPERATOR_PACKAGE: &str = "loki-operator";
const LOKI_OPERATOR_CHANNEL: &str = "stable-6.3";
const LOKI_OPERATOR_SOURCE: &str = "redhat-operators";
const OLM_NAMESPACE: &str = "openshift-marketplace";

fn operator_labels() -> Labels {
    [
        ("app.kubernetes.io/component", "manager"),
        ("app.kubernetes.io/created-by", THANOS_OPERATOR_COMPONENT),
        ("app.kubernetes.io/name", THANOS_OPERATOR_COMPONENT),
        ("app.kubernetes.io/part-of", THANOS_OPERATOR_COMPONENT),
        ("control-plane", "controller-manager"),
    ]
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .into()
}

fn operator_selector() -> Labels {
    Labels::from([(
        "control-plane".to_string(),
        "controller-manager".to_string(),
    )])
}

pub fn thanos_operator(cluster: &ClusterConfig) -> Result<StepOutput> {
    let namespace = cluster.namespace.as_str();
    let templates = &cluster.templates;
    let labels = operator_labels();

    let mut out = StepOutput::default();
    out.push(
        THANOS_OPERATOR_COMPONENT,
        &service_account(THANOS_OPERATOR_NAME, namespace, labels.clone()),
    )?;
    out.push(THANOS_OPERATOR_COMPONENT, &cluster_role(labels.clone()))?;
    out.push(
        THANOS_OPERATOR_COMPONENT,
        &cluster_role_binding(namespace, labels.clone()),
    )?;
    out.push(
        THANOS_OPERATOR_COMPONENT,
        &thanos_operator_deployment(templates, namespace, labels.clone())?,
    )?;

    out.push(
        THANOS_OPERATOR_COMPONENT,
        &cluster_ip_service(
            METRICS_SERVICE,
            namespace,
            labels.clone(),
            operator_selector(),
            vec![service_port("https", METRICS_PORT)],
        ),
    )?;

    let mut monitor = service_monitor(
        METRICS_SERVICE,
        namespace,
        labels.clone(),
        labels,
        &[Endpoint::metrics("https")],
    );
    // kube-rbac-proxy serves a self-signed certificate
    monitor.spec["endpoints"][0]["scheme"] = json!("https");
    monitor.spec["endpoints"][0]["tlsConfig"] = json!({ "insecureSkipVerify": true });
    monitor.spec["endpoints"][0]["bearerTokenFile"] =
        json!("/var/run/secrets/kubernetes.io/serviceaccount/token");
    out.service_monitors.push(monitor);

    Ok(out)
}

fn cluster_scoped_meta(labels: Labels) -> ObjectMeta {
    ObjectMeta {
        name: Some(THANOS_OPERATOR_NAME.to_string()),
        labels: Some(labels),
        ..Default::default()
    }
}

fn cluster_role(labels: Labels) -> rbacv1::ClusterRole {
    let rule = |groups: &[&str], resources: &[&str], verbs: &[&str]| rbacv1::PolicyRule {
        api_groups: Some(groups.iter().map(|g| g.to_string()).collect()),
        resources: Some(resources.iter().map(|r| r.to_string()).collect()),
        verbs: verbs.iter().map(|v| v.to_string()).collect(),
        ..Default::default()
    };
    let all = ["create", "delete", "get", "list", "patch", "update", "watch"];

    rbacv1::ClusterRole {
        metadata: cluster_scoped_meta(labels),
        rules: Some(vec![
            rule(&["monitoring.thanos.io"], &["*"], &all),
            rule(
                &[""],
                &["configmaps", "secrets", "services", "serviceaccounts"],
                &all,
            ),
            rule(&["apps"], &["deployments", "statefulsets"], &all),
            rule(&["policy"], &["poddisruptionbudgets"], &all),
            rule(&["monitoring.coreos.com"], &["servicemonitors"], &all),
            rule(&[""], &["events"], &["create", "patch"]),
            rule(&["authentication.k8s.io"], &["tokenreviews"], &["create"]),
            rule(&["authorization.k8s.io"], &["subjectaccessreviews"], &["create"]),
        ]),
        ..Default::default()
    }
}

fn cluster_role_binding(namespace: &str, labels: Labels) -> rbacv1::ClusterRoleBinding {
    rbacv1::ClusterRoleBinding {
        metadata: cluster_scoped_meta(labels),
        role_ref: rbacv1::RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: THANOS_OPERATOR_NAME.to_string(),
        },
        subjects: Some(vec![rbacv1::Subject {
            kind: "ServiceAccount".to_string(),
            name: THANOS_OPERATOR_NAME.to_string(),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        }]),
    }
}

fn restricted_security_context() -> SecurityContext {
    SecurityContext {
        allow_privilege_escalation: Some(false),
        ..Default::default()
    }
}

fn thanos_operator_deployment(
    templates: &TemplateMaps,
    namespace: &str,
    labels: Labels,
) -> Result<Deployment> {
    let manager = Container {
        name: "manager".to_string(),
        image: Some(templates.image(THANOS_OPERATOR)?),
        command: Some(vec!["/manager".to_string()]),
        args: Some(vec![
            format!("--health-probe-bind-address=:{HEALTH_PORT}"),
            "--metrics-bind-address=127.0.0.1:8080".to_string(),
            "--leader-elect".to_string(),
            "--zap-log-level=info".to_string(),
        ]),
        ports: Some(vec![container_port("health", HEALTH_PORT)]),
        liveness_probe: Some(http_probe("/healthz", HEALTH_PORT, 20, 3)),
        readiness_probe: Some(http_probe("/readyz", HEALTH_PORT, 10, 3)),
        resources: Some(templates.resources(MANAGER)?),
        security_context: Some(restricted_security_context()),
        ..Default::default()
    };

    let proxy = Container {
        name: "kube-rbac-proxy".to_string(),
        image: Some(templates.image(KUBE_RBAC_PROXY)?),
        args: Some(vec![
            format!("--secure-listen-address=0.0.0.0:{METRICS_PORT}"),
            "--upstream=http://127.0.0.1:8080/".to_string(),
            "--logtostderr=true".to_string(),
            "--v=0".to_string(),
        ]),
        ports: Some(vec![container_port("https", METRICS_PORT)]),
        resources: Some(templates.resources(KUBE_RBAC_PROXY)?),
        security_context: Some(restricted_security_context()),
        ..Default::default()
    };

    Ok(Deployment {
        metadata: object_meta(THANOS_OPERATOR_NAME, namespace, labels.clone()),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: match_labels(operator_selector()),
            template: PodTemplateSpec {
                metadata: Some(object_meta(THANOS_OPERATOR_NAME, namespace, labels)),
                spec: Some(PodSpec {
                    service_account_name: Some(THANOS_OPERATOR_NAME.to_string()),
                    termination_grace_period_seconds: Some(10),
                    containers: vec![manager, proxy],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}

pub fn loki_operator(cluster: &ClusterConfig) -> Result<StepOutput> {
    let namespace = cluster.namespace.as_str();
    let labels = Labels::from([(
        "app.kubernetes.io/part-of".to_string(),
        LOKI_OPERATOR_COMPONENT.to_string(),
    )]);

    let group = CustomResource::new(
        "operators.coreos.com/v1",
        "OperatorGroup",
        object_meta(LOKI_OPERATOR_COMPONENT, namespace, labels.clone()),
        json!({ "targetNamespaces": [namespace] }),
    );
    let subscription = CustomResource::new(
        "operators.coreos.com/v1alpha1",
        "Subscription",
        object_meta(LOKI_OPERATOR_COMPONENT, namespace, labels),
        json!({
            "channel": LOKI_OPERATOR_CHANNEL,
            "installPlanApproval": "Automatic",
            "name": LOKI_OPERATOR_PACKAGE,
            "source": LOKI_OPERATOR_SOURCE,
            "sourceNamespace": OLM_NAMESPACE,
        }),
    );

    let mut out = StepOutput::default();
    out.push_custom(LOKI_OPERATOR_COMPONENT, &group)?;
    out.push_custom(LOKI_OPERATOR_COMPONENT, &subscription)?;
    Ok(out)
}
