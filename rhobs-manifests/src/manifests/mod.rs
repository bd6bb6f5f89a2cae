//! Manifest builders
//!
//! Each build step turns a [`ClusterConfig`](crate::clusters::ClusterConfig)
//! into a list of [`Manifest`]s. Core objects are built from k8s-openapi types;
//! operator resources use [`CustomResource`]. Values that vary per component
//! always come from the cluster's template maps.

pub mod alertmanager;
pub mod crds;
pub mod gateway;
pub mod loki;
pub mod memcached;
pub mod operators;
pub mod secrets;
pub mod servicemonitors;
pub mod synthetics;
pub mod thanos;

use k8s_openapi::api::core::v1::{
    ContainerPort, EnvVar, EnvVarSource, HTTPGetAction, ObjectFieldSelector, Probe,
    SecretKeySelector, Service, ServiceAccount, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use rhobs_common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub type Labels = BTreeMap<String, String>;

pub const PART_OF: &str = "rhobs";
pub const SERVICE_MONITOR_API_VERSION: &str = "monitoring.coreos.com/v1";

/// A rendered object ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    /// Directory the object is written to, below the cluster directory
    pub component: String,
    pub kind: String,
    pub name: String,
    pub object: Value,
}

impl Manifest {
    /// Render a k8s-openapi resource
    pub fn new<K>(component: &str, resource: &K) -> Result<Self>
    where
        K: k8s_openapi::Resource + k8s_openapi::Metadata<Ty = ObjectMeta> + Serialize,
    {
        let name = resource.metadata().name.clone().unwrap_or_default();
        Ok(Self {
            component: component.to_string(),
            kind: K::KIND.to_string(),
            name,
            object: serde_json::to_value(resource)?,
        })
    }

    pub fn custom(component: &str, resource: &CustomResource) -> Result<Self> {
        Ok(Self {
            component: component.to_string(),
            kind: resource.kind.clone(),
            name: resource.name().to_string(),
            object: serde_json::to_value(resource)?,
        })
    }

    /// Wrap an already decoded object, e.g. a vendored CRD
    pub fn from_value(component: &str, object: Value) -> Result<Self> {
        let kind = object
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Validation(format!("object in {component} has no kind")))?
            .to_string();
        let name = object
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Validation(format!("{kind} in {component} has no name")))?
            .to_string();

        Ok(Self {
            component: component.to_string(),
            kind,
            name,
            object,
        })
    }

    /// `<name>-<Kind>`, without extension
    pub fn file_stem(&self) -> String {
        format!("{}-{}", self.name, self.kind)
    }
}

/// Operator-managed resource with a free-form spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomResource {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub spec: Value,
}

impl CustomResource {
    pub fn new(api_version: &str, kind: &str, metadata: ObjectMeta, spec: Value) -> Self {
        Self {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            metadata,
            spec,
        }
    }

    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }
}

/// Output of one build step
#[derive(Debug, Default)]
pub struct StepOutput {
    pub manifests: Vec<Manifest>,
    /// ServiceMonitors handed to the cluster's monitoring bundle
    pub service_monitors: Vec<CustomResource>,
}

impl StepOutput {
    pub fn push<K>(&mut self, component: &str, resource: &K) -> Result<()>
    where
        K: k8s_openapi::Resource + k8s_openapi::Metadata<Ty = ObjectMeta> + Serialize,
    {
        self.manifests.push(Manifest::new(component, resource)?);
        Ok(())
    }

    pub fn push_custom(&mut self, component: &str, resource: &CustomResource) -> Result<()> {
        self.manifests.push(Manifest::custom(component, resource)?);
        Ok(())
    }
}

pub fn object_meta(name: &str, namespace: &str, labels: Labels) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: (!labels.is_empty()).then_some(labels),
        ..Default::default()
    }
}

/// Standard `app.kubernetes.io` labels and the matching selector labels.
///
/// The selector omits the version so it stays stable across upgrades.
pub fn component_labels(component: &str, name: &str, version: Option<&str>) -> (Labels, Labels) {
    let selector = Labels::from([
        ("app.kubernetes.io/component".to_string(), component.to_string()),
        ("app.kubernetes.io/instance".to_string(), PART_OF.to_string()),
        ("app.kubernetes.io/name".to_string(), name.to_string()),
        ("app.kubernetes.io/part-of".to_string(), PART_OF.to_string()),
    ]);

    let mut labels = selector.clone();
    if let Some(version) = version {
        labels.insert("app.kubernetes.io/version".to_string(), label_value(version));
    }
    (labels, selector)
}

/// Label values are capped at 63 characters; image digests and commit
/// hashes are truncated to fit.
fn label_value(value: &str) -> String {
    value.chars().take(crate::validation::MAX_DNS_LABEL_LENGTH).collect()
}

pub fn match_labels(labels: Labels) -> LabelSelector {
    LabelSelector {
        match_labels: Some(labels),
        ..Default::default()
    }
}

/// In-cluster DNS address of a service
pub fn service_address(service: &str, namespace: &str, port: u16) -> String {
    format!("{service}.{namespace}.svc.cluster.local:{port}")
}

pub fn container_port(name: &str, port: i32) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_string()),
        container_port: port,
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}

/// Service port targeting the container port of the same name
pub fn service_port(name: &str, port: i32) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port,
        target_port: Some(IntOrString::String(name.to_string())),
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}

pub fn http_probe(path: &str, port: i32, period_seconds: i32, failure_threshold: i32) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(path.to_string()),
            port: IntOrString::Int(port),
            scheme: Some("HTTP".to_string()),
            ..Default::default()
        }),
        period_seconds: Some(period_seconds),
        failure_threshold: Some(failure_threshold),
        ..Default::default()
    }
}

pub fn env_from_secret(name: &str, secret: &str, key: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.to_string(),
                key: key.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn env_from_field(name: &str, field_path: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                api_version: Some("v1".to_string()),
                field_path: field_path.to_string(),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn service_account(name: &str, namespace: &str, labels: Labels) -> ServiceAccount {
    ServiceAccount {
        metadata: object_meta(name, namespace, labels),
        ..Default::default()
    }
}

/// ClusterIP service in front of the pods matching `selector`
pub fn cluster_ip_service(
    name: &str,
    namespace: &str,
    labels: Labels,
    selector: Labels,
    ports: Vec<ServicePort>,
) -> Service {
    Service {
        metadata: object_meta(name, namespace, labels),
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            ports: Some(ports),
            selector: Some(selector),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Scrape endpoint of a ServiceMonitor
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub port: &'static str,
    pub path: &'static str,
    pub interval: &'static str,
    pub honor_labels: bool,
}

impl Endpoint {
    pub const fn metrics(port: &'static str) -> Self {
        Self {
            port,
            path: "/metrics",
            interval: "30s",
            honor_labels: false,
        }
    }
}

/// ServiceMonitor selecting `selector` in `namespace`
pub fn service_monitor(
    name: &str,
    namespace: &str,
    labels: Labels,
    selector: Labels,
    endpoints: &[Endpoint],
) -> CustomResource {
    let endpoints: Vec<Value> = endpoints
        .iter()
        .map(|e| {
            let mut endpoint = json!({
                "port": e.port,
                "path": e.path,
                "interval": e.interval,
            });
            if e.honor_labels {
                endpoint["honorLabels"] = json!(true);
            }
            endpoint
        })
        .collect();

    CustomResource::new(
        SERVICE_MONITOR_API_VERSION,
        "ServiceMonitor",
        object_meta(name, namespace, labels),
        json!({
            "endpoints": endpoints,
            "selector": { "matchLabels": selector },
            "namespaceSelector": { "matchNames": [namespace] },
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ServiceAccount;

    #[test]
    fn test_manifest_from_k8s_resource() {
        let sa = ServiceAccount {
            metadata: object_meta("rhobs-gateway", "rhobs", Labels::new()),
            ..Default::default()
        };
        let manifest = Manifest::new("gateway", &sa).unwrap();
        assert_eq!(manifest.kind, "ServiceAccount");
        assert_eq!(manifest.file_stem(), "rhobs-gateway-ServiceAccount");
        assert_eq!(manifest.object["apiVersion"], "v1");
        assert!(manifest.object["metadata"].get("labels").is_none());
    }

    #[test]
    fn test_manifest_from_value_requires_name() {
        let err = Manifest::from_value("crds", json!({"kind": "CustomResourceDefinition"}));
        assert!(err.is_err());

        let ok = Manifest::from_value(
            "crds",
            json!({"kind": "CustomResourceDefinition", "metadata": {"name": "thanosqueries.monitoring.thanos.io"}}),
        )
        .unwrap();
        assert_eq!(ok.name, "thanosqueries.monitoring.thanos.io");
    }

    #[test]
    fn test_component_labels_truncate_version() {
        let (labels, selector) = component_labels("api", "rhobs-gateway", Some(&"a".repeat(80)));
        assert_eq!(labels["app.kubernetes.io/version"].len(), 63);
        assert!(!selector.contains_key("app.kubernetes.io/version"));
    }

    #[test]
    fn test_service_monitor_shape() {
        let sm = service_monitor(
            "rhobs-gateway",
            "rhobs-stage",
            Labels::new(),
            Labels::from([("app".to_string(), "gw".to_string())]),
            &[Endpoint::metrics("internal")],
        );
        let value = serde_json::to_value(&sm).unwrap();
        assert_eq!(value["apiVersion"], SERVICE_MONITOR_API_VERSION);
        assert_eq!(value["spec"]["namespaceSelector"]["matchNames"][0], "rhobs-stage");
        assert_eq!(value["spec"]["endpoints"][0]["port"], "internal");
        assert!(value["spec"]["endpoints"][0].get("honorLabels").is_none());
    }
}
