//! Observatorium API gateway
//!
//! The gateway authenticates tenants and proxies reads and writes to the
//! metrics, logs and probes backends of the cluster. Its RBAC document and
//! tenant list are mounted from a ConfigMap and a Secret.

use super::{
    component_labels, container_port, env_from_field, env_from_secret, http_probe, match_labels,
    object_meta, service_account, service_address, service_monitor, service_port,
    cluster_ip_service, CustomResource, Endpoint, Labels, StepOutput,
};
use crate::clusters::{ClusterConfig, GatewayConfig};
use crate::manifests::alertmanager;
use crate::manifests::memcached;
use crate::template::keys::{API_CACHE, JAEGER, OBSERVATORIUM_API, OPA_AMS};
use crate::template::TemplateMaps;
use k8s_openapi::api::apps::v1::{
    Deployment, DeploymentSpec, DeploymentStrategy, RollingUpdateDeployment,
};
use k8s_openapi::api::core::v1::{
    Affinity, ConfigMap, ConfigMapVolumeSource, Container, PodAffinityTerm, PodAntiAffinity,
    PodSpec, PodTemplateSpec, Secret, SecretVolumeSource, Volume, VolumeMount,
    WeightedPodAffinityTerm,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use rhobs_common::Result;
use serde_json::json;

pub const COMPONENT: &str = "rhobs-gateway";
pub const NAME: &str = "rhobs-gateway";

const API_CONTAINER: &str = "observatorium-api";
const OPA_AMS_CONTAINER: &str = "opa-ams";
const JAEGER_CONTAINER: &str = "jaeger-agent";

const CONFIG_DIR: &str = "/etc/observatorium";
const RBAC_FILE: &str = "rbac.yaml";
const TENANTS_FILE: &str = "tenants.yaml";
const SSO_ISSUER: &str = "https://sso.redhat.com/auth/realms/redhat-external";

// backend services the gateway proxies to
const QUERY_FRONTEND_SERVICE: &str = "thanos-query-frontend-rhobs";
const RECEIVE_ROUTER_SERVICE: &str = "thanos-receive-router-rhobs";
const QUERY_SERVICE: &str = "thanos-query-rhobs";
const LOGS_QUERY_FRONTEND_SERVICE: &str = "observatorium-lokistack-query-frontend-http";
const LOGS_DISTRIBUTOR_SERVICE: &str = "observatorium-lokistack-distributor-http";
const SYNTHETICS_SERVICE: &str = "synthetics-api";
const TRACE_COLLECTOR: &str =
    "dns:///otel-trace-writer-collector-headless.observatorium-tools.svc:14250";

fn labels(templates: &TemplateMaps) -> Result<(Labels, Labels)> {
    let version = templates.version(OBSERVATORIUM_API)?;
    Ok(component_labels("api", NAME, Some(&version)))
}

/// Gateway objects for a cluster. Requires the cluster's gateway config.
pub fn build(cluster: &ClusterConfig) -> Result<StepOutput> {
    let config = cluster.gateway()?;
    let namespace = cluster.namespace.as_str();
    let templates = &cluster.templates;
    let (labels, selector) = labels(templates)?;

    let mut out = StepOutput::default();
    out.push(COMPONENT, &service_account(NAME, namespace, labels.clone()))?;
    out.push(COMPONENT, &rbac_config_map(namespace, labels.clone(), config)?)?;
    out.push(COMPONENT, &tenants_secret(namespace, labels.clone(), config)?)?;
    out.push(
        COMPONENT,
        &deployment(templates, namespace, config, labels.clone(), selector.clone())?,
    )?;
    out.push(
        COMPONENT,
        &cluster_ip_service(
            NAME,
            namespace,
            labels.clone(),
            selector.clone(),
            service_ports(config),
        ),
    )?;

    if let Some(host) = &config.custom_route {
        out.push_custom(COMPONENT, &route(namespace, host))?;
    }

    let mut endpoints = vec![Endpoint::metrics("internal")];
    if config.ams_url.is_some() {
        endpoints.push(Endpoint::metrics("opa-ams-metrics"));
    }
    out.service_monitors
        .push(service_monitor(NAME, namespace, labels, selector, &endpoints));

    Ok(out)
}

fn rbac_config_map(namespace: &str, labels: Labels, config: &GatewayConfig) -> Result<ConfigMap> {
    let mut metadata = object_meta(NAME, namespace, labels);
    metadata.annotations = Some([("qontract.recycle".to_string(), "true".to_string())].into());

    Ok(ConfigMap {
        metadata,
        data: Some([(RBAC_FILE.to_string(), config.rbac.to_yaml()?)].into()),
        ..Default::default()
    })
}

/// The OIDC client credentials stay template parameters; they are filled in
/// at deploy time.
fn tenants_secret(namespace: &str, labels: Labels, config: &GatewayConfig) -> Result<Secret> {
    let mut metadata = object_meta(NAME, namespace, labels);
    metadata.annotations = Some([("qontract.recycle".to_string(), "true".to_string())].into());

    Ok(Secret {
        metadata,
        string_data: Some(
            [
                ("client-id", "${CLIENT_ID}".to_string()),
                ("client-secret", "${CLIENT_SECRET}".to_string()),
                ("issuer-url", SSO_ISSUER.to_string()),
                (TENANTS_FILE, config.tenants.to_yaml()?),
            ]
            .map(|(k, v)| (k.to_string(), v))
            .into(),
        ),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    })
}

fn deployment(
    templates: &TemplateMaps,
    namespace: &str,
    config: &GatewayConfig,
    labels: Labels,
    selector: Labels,
) -> Result<Deployment> {
    let mut containers = vec![api_container(templates, namespace, config)?];
    if let Some(ams_url) = &config.ams_url {
        containers.push(opa_ams_container(templates, namespace, ams_url)?);
    }
    if config.tracing {
        containers.push(jaeger_container(templates)?);
    }

    Ok(Deployment {
        metadata: object_meta(NAME, namespace, labels.clone()),
        spec: Some(DeploymentSpec {
            replicas: Some(templates.replicas(OBSERVATORIUM_API)?),
            selector: match_labels(selector),
            strategy: Some(DeploymentStrategy {
                type_: Some("RollingUpdate".to_string()),
                rolling_update: Some(RollingUpdateDeployment {
                    max_surge: Some(IntOrString::Int(0)),
                    max_unavailable: Some(IntOrString::Int(1)),
                }),
            }),
            template: PodTemplateSpec {
                metadata: Some(object_meta(NAME, namespace, labels)),
                spec: Some(PodSpec {
                    service_account_name: Some(NAME.to_string()),
                    containers,
                    volumes: Some(vec![
                        Volume {
                            name: "rbac".to_string(),
                            config_map: Some(ConfigMapVolumeSource {
                                name: NAME.to_string(),
                                ..Default::default()
                            }),
                            ..Default::default()
                        },
                        Volume {
                            name: "tenants".to_string(),
                            secret: Some(SecretVolumeSource {
                                secret_name: Some(NAME.to_string()),
                                ..Default::default()
                            }),
                            ..Default::default()
                        },
                    ]),
                    affinity: Some(spread_across_nodes()),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}

fn spread_across_nodes() -> Affinity {
    Affinity {
        pod_anti_affinity: Some(PodAntiAffinity {
            preferred_during_scheduling_ignored_during_execution: Some(vec![
                WeightedPodAffinityTerm {
                    weight: 100,
                    pod_affinity_term: PodAffinityTerm {
                        label_selector: Some(LabelSelector {
                            match_expressions: Some(vec![LabelSelectorRequirement {
                                key: "app.kubernetes.io/name".to_string(),
                                operator: "In".to_string(),
                                values: Some(vec![NAME.to_string()]),
                            }]),
                            ..Default::default()
                        }),
                        topology_key: "kubernetes.io/hostname".to_string(),
                        ..Default::default()
                    },
                },
            ]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Command line of the observatorium-api container
pub fn api_args(namespace: &str, config: &GatewayConfig, log_level: &str) -> Vec<String> {
    let endpoint = |service: &str, port: u16| format!("http://{}", service_address(service, namespace, port));

    let mut args = vec![
        "--web.listen=0.0.0.0:8080".to_string(),
        "--web.internal.listen=0.0.0.0:8081".to_string(),
        format!("--log.level={log_level}"),
        format!(
            "--metrics.alertmanager.endpoint={}",
            endpoint(alertmanager::SERVICE, 9093)
        ),
        format!("--rbac.config={CONFIG_DIR}/{RBAC_FILE}"),
        format!("--tenants.config={CONFIG_DIR}/{TENANTS_FILE}"),
        "--server.read-timeout=5m".to_string(),
    ];

    if config.metrics {
        args.extend([
            format!("--metrics.read.endpoint={}", endpoint(QUERY_FRONTEND_SERVICE, 9090)),
            format!("--metrics.write.endpoint={}", endpoint(RECEIVE_ROUTER_SERVICE, 19291)),
            format!("--metrics.status.endpoint={}", endpoint(QUERY_SERVICE, 9090)),
        ]);
    }

    if config.logs {
        args.extend([
            "--logs.write-timeout=4m0s".to_string(),
            format!("--logs.read.endpoint={}", endpoint(LOGS_QUERY_FRONTEND_SERVICE, 3100)),
            format!("--logs.tail.endpoint={}", endpoint(LOGS_QUERY_FRONTEND_SERVICE, 3100)),
            format!("--logs.write.endpoint={}", endpoint(LOGS_DISTRIBUTOR_SERVICE, 3100)),
        ]);
    }

    if config.synthetics {
        args.push(format!(
            "--probes.endpoint={}",
            endpoint(SYNTHETICS_SERVICE, 8080)
        ));
    }

    if config.tracing {
        args.push("--internal.tracing.endpoint=localhost:6831".to_string());
    }

    args
}

fn config_mount(volume: &str, file: &str) -> VolumeMount {
    VolumeMount {
        name: volume.to_string(),
        mount_path: format!("{CONFIG_DIR}/{file}"),
        sub_path: Some(file.to_string()),
        read_only: Some(true),
        ..Default::default()
    }
}

fn api_container(
    templates: &TemplateMaps,
    namespace: &str,
    config: &GatewayConfig,
) -> Result<Container> {
    let log_level = templates.log_level(OBSERVATORIUM_API)?;

    Ok(Container {
        name: API_CONTAINER.to_string(),
        image: Some(templates.image(OBSERVATORIUM_API)?),
        args: Some(api_args(namespace, config, &log_level)),
        ports: Some(vec![
            container_port("grpc-public", 8090),
            container_port("internal", 8081),
            container_port("public", 8080),
        ]),
        volume_mounts: Some(vec![
            config_mount("rbac", RBAC_FILE),
            config_mount("tenants", TENANTS_FILE),
        ]),
        liveness_probe: Some(http_probe("/live", 8081, 30, 10)),
        readiness_probe: Some(http_probe("/ready", 8081, 5, 12)),
        resources: Some(templates.resources(OBSERVATORIUM_API)?),
        ..Default::default()
    })
}

fn opa_ams_container(templates: &TemplateMaps, namespace: &str, ams_url: &str) -> Result<Container> {
    Ok(Container {
        name: OPA_AMS_CONTAINER.to_string(),
        image: Some(templates.image(OPA_AMS)?),
        args: Some(vec![
            "--web.listen=127.0.0.1:8082".to_string(),
            "--web.internal.listen=0.0.0.0:8083".to_string(),
            "--web.healthchecks.url=http://127.0.0.1:8082".to_string(),
            "--log.level=warn".to_string(),
            format!("--ams.url={ams_url}"),
            "--resource-type-prefix=observatorium".to_string(),
            "--oidc.client-id=$(CLIENT_ID)".to_string(),
            "--oidc.client-secret=$(CLIENT_SECRET)".to_string(),
            "--oidc.issuer-url=$(ISSUER_URL)".to_string(),
            "--opa.package=observatorium".to_string(),
            format!(
                "--memcached={}",
                service_address(memcached::NAME, namespace, memcached::PORT)
            ),
            "--memcached.expire=300".to_string(),
        ]),
        env: Some(vec![
            env_from_secret("ISSUER_URL", NAME, "issuer-url"),
            env_from_secret("CLIENT_ID", NAME, "client-id"),
            env_from_secret("CLIENT_SECRET", NAME, "client-secret"),
        ]),
        ports: Some(vec![
            container_port("opa-ams-api", 8082),
            container_port("opa-ams-metrics", 8083),
        ]),
        liveness_probe: Some(http_probe("/live", 8083, 30, 10)),
        readiness_probe: Some(http_probe("/ready", 8083, 5, 12)),
        resources: Some(templates.resources(API_CACHE)?),
        ..Default::default()
    })
}

fn jaeger_container(templates: &TemplateMaps) -> Result<Container> {
    Ok(Container {
        name: JAEGER_CONTAINER.to_string(),
        image: Some(templates.image(JAEGER)?),
        image_pull_policy: Some("IfNotPresent".to_string()),
        args: Some(vec![
            format!("--reporter.grpc.host-port={TRACE_COLLECTOR}"),
            "--reporter.type=grpc".to_string(),
            "--agent.tags=pod.namespace=$(NAMESPACE),pod.name=$(POD)".to_string(),
        ]),
        env: Some(vec![
            env_from_field("NAMESPACE", "metadata.namespace"),
            env_from_field("POD", "metadata.name"),
        ]),
        ports: Some(vec![
            container_port("configs", 5778),
            container_port("jaeger-thrift", 6831),
            container_port("metrics", 14271),
        ]),
        liveness_probe: Some(http_probe("/", 14271, 10, 5)),
        readiness_probe: Some(http_probe("/", 14271, 10, 3)),
        resources: Some(templates.resources(OBSERVATORIUM_API)?),
        ..Default::default()
    })
}

fn service_ports(config: &GatewayConfig) -> Vec<k8s_openapi::api::core::v1::ServicePort> {
    let mut ports = vec![
        service_port("grpc-public", 8090),
        service_port("internal", 8081),
        service_port("public", 8080),
    ];
    if config.ams_url.is_some() {
        ports.push(service_port("opa-ams-api", 8082));
        ports.push(service_port("opa-ams-metrics", 8083));
    }
    ports
}

/// Public edge-terminated route with a cert-manager issued certificate
fn route(namespace: &str, host: &str) -> CustomResource {
    let mut metadata = object_meta(
        NAME,
        namespace,
        Labels::from([
            ("app".to_string(), API_CONTAINER.to_string()),
            ("rhobs-public-route".to_string(), "true".to_string()),
        ]),
    );
    metadata.annotations = Some(
        [
            ("cert-manager.io/issuer-kind", "ClusterIssuer"),
            ("cert-manager.io/issuer-name", "rhobs-public-route"),
            ("haproxy.router.openshift.io/balance", "source"),
            ("haproxy.router.openshift.io/timeout", "5m"),
        ]
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .into(),
    );

    CustomResource::new(
        "route.openshift.io/v1",
        "Route",
        metadata,
        json!({
            "host": host,
            "port": { "targetPort": "public" },
            "tls": {
                "termination": "edge",
                "insecureEdgeTerminationPolicy": "Redirect",
            },
            "to": { "kind": "Service", "name": NAME, "weight": 100 },
            "wildcardPolicy": "None",
        }),
    )
}
