//! The managed clusters

use super::{ClusterConfig, ClusterEnvironment, ClusterName, GatewayConfig};
use crate::pipeline::{default_build_steps, BuildStep};
use crate::rbac::catalog::HCP;
use crate::rbac::{generate_cluster_rbac, Grant};
use crate::template::keys::LOKI_CONFIG;
use crate::template::{
    default_base_template, LokiComponentSpec, LokiLimitOverrides, LokiOverrides, LokiOverridesMap,
    TemplateMaps,
};
use rhobs_common::rbac::Permission::{Read, Write};
use rhobs_common::rbac::{RbacDocument, Resource};
use rhobs_common::tenants::{Tenant, TenantOidc, Tenants};
use rhobs_common::Result;

pub const RHOBSI01UW2: &str = "rhobsi01uw2";
pub const RHOBSS01UE1: &str = "rhobss01ue1";
pub const RHOBSS01UW2: &str = "rhobss01uw2";
pub const RHOBSP01UE1: &str = "rhobsp01ue1";

const HCP_TENANT_ID: &str = "EFD08939-FE1D-41A1-A28A-BE9A9BC68003";
const SSO_ISSUER: &str = "https://sso.redhat.com/auth/realms/redhat-external";

/// Every cluster in the catalog
pub fn default_clusters() -> Result<Vec<ClusterConfig>> {
    Ok(vec![
        rhobsi01uw2()?,
        rhobss01ue1()?,
        rhobss01uw2()?,
        rhobsp01ue1()?,
    ])
}

fn hcp_tenants(redirect_host: &str, username_claim: &str) -> Tenants {
    Tenants {
        tenants: vec![Tenant {
            name: HCP.to_string(),
            id: HCP_TENANT_ID.to_string(),
            oidc: Some(TenantOidc {
                client_id: "${CLIENT_ID}".to_string(),
                client_secret: "${CLIENT_SECRET}".to_string(),
                issuer_url: SSO_ISSUER.to_string(),
                redirect_url: format!("https://{redirect_host}/oidc/{HCP}/callback"),
                username_claim: username_claim.to_string(),
            }),
        }],
    }
}

/// Read and write access for the cluster's HCP service account
fn hcp_rbac(service_account: &str, resources: &[Resource]) -> Result<RbacDocument> {
    generate_cluster_rbac(vec![Grant::new(service_account, HCP)
        .resources(resources.iter().copied())
        .permissions([Read, Write])
        .concrete_name()])
}

fn staging_loki_overrides() -> LokiOverridesMap {
    LokiOverridesMap::from([(
        LOKI_CONFIG,
        LokiOverrides {
            limits: LokiLimitOverrides {
                ingestion_rate_limit_mb: 20,
                per_stream_rate_limit_mb: 15,
                per_stream_burst_size_mb: 30,
                query_timeout: "5m".to_string(),
                ..Default::default()
            },
            ingest: LokiComponentSpec { replicas: 3 },
            ..Default::default()
        },
    )])
}

fn staging_templates() -> TemplateMaps {
    default_base_template().override_with(&[&staging_loki_overrides()])
}

fn cell_build_steps() -> Vec<BuildStep> {
    vec![
        BuildStep::Gateway,
        BuildStep::DefaultThanosStack,
        BuildStep::DefaultLokiStack,
        BuildStep::SyntheticsApi,
        BuildStep::Alertmanager,
    ]
}

fn full_gateway(route: &str, tenants: Tenants, rbac: RbacDocument) -> GatewayConfig {
    GatewayConfig {
        metrics: true,
        logs: true,
        synthetics: true,
        tracing: true,
        ams_url: None,
        custom_route: Some(route.to_string()),
        tenants,
        rbac,
    }
}

/// US West integration cluster
fn rhobsi01uw2() -> Result<ClusterConfig> {
    Ok(ClusterConfig {
        name: ClusterName::from(RHOBSI01UW2),
        environment: ClusterEnvironment::Integration,
        namespace: "rhobs-int".to_string(),
        templates: default_base_template().override_with(&[]),
        gateway: Some(GatewayConfig {
            metrics: true,
            logs: true,
            ams_url: Some("https://api.openshift.com".to_string()),
            tenants: hcp_tenants("observatorium-mst.api.stage.openshift.com", "preferred_username"),
            rbac: hcp_rbac(
                "d4045e4b-7b9c-46fc-8af0-5d483d9d205b",
                &[Resource::Metrics, Resource::Logs],
            )?,
            ..Default::default()
        }),
        build_steps: default_build_steps(),
        monitoring_api_group: Some("monitoring.rhobs".to_string()),
    })
}

/// US East staging cluster
fn rhobss01ue1() -> Result<ClusterConfig> {
    let route = "rhobs.us-east-1-0.api.stage.openshift.com";
    Ok(ClusterConfig {
        name: ClusterName::from(RHOBSS01UE1),
        environment: ClusterEnvironment::Staging,
        namespace: "rhobs-stage".to_string(),
        templates: staging_templates(),
        gateway: Some(full_gateway(
            route,
            hcp_tenants(route, "client_id"),
            hcp_rbac(
                "45b1e1f4-6e17-4858-8f66-158320f6ac71",
                &[Resource::Metrics, Resource::Logs, Resource::Probes],
            )?,
        )),
        build_steps: cell_build_steps(),
        monitoring_api_group: None,
    })
}

/// US West staging cluster
fn rhobss01uw2() -> Result<ClusterConfig> {
    let route = "rhobs.us-west-2-0.api.stage.openshift.com";
    Ok(ClusterConfig {
        name: ClusterName::from(RHOBSS01UW2),
        environment: ClusterEnvironment::Staging,
        namespace: "rhobs-stage".to_string(),
        templates: staging_templates(),
        gateway: Some(full_gateway(
            route,
            hcp_tenants(route, "preferred_username"),
            hcp_rbac(
                "45b1e1f4-6e17-4858-8f66-158320f6ac71",
                &[Resource::Metrics, Resource::Logs, Resource::Probes],
            )?,
        )),
        build_steps: cell_build_steps(),
        monitoring_api_group: None,
    })
}

/// US East production cluster
fn rhobsp01ue1() -> Result<ClusterConfig> {
    let route = "rhobs.us-east-1-0.api.openshift.com";
    Ok(ClusterConfig {
        name: ClusterName::from(RHOBSP01UE1),
        environment: ClusterEnvironment::Production,
        namespace: "rhobs-production".to_string(),
        templates: default_base_template().override_with(&[]),
        gateway: Some(full_gateway(
            route,
            hcp_tenants(route, "client_id"),
            hcp_rbac(
                "cd54dce2-590e-4ea4-9b83-a83c58205962",
                &[Resource::Metrics, Resource::Logs, Resource::Probes],
            )?,
        )),
        build_steps: cell_build_steps(),
        monitoring_api_group: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::keys::LOKI_CONFIG;

    #[test]
    fn test_catalog_clusters_validate() {
        for cluster in default_clusters().unwrap() {
            cluster.validate().unwrap();
        }
    }

    #[test]
    fn test_staging_loki_override_is_sparse() {
        let loki = staging_templates().loki(LOKI_CONFIG).unwrap();
        assert_eq!(loki.limits.ingestion_rate_limit_mb, 20);
        assert_eq!(loki.limits.query_timeout, "5m");
        // untouched by the override
        assert_eq!(loki.limits.ingestion_burst_size_mb, 256);
        assert_eq!(loki.limits.max_line_size, 1_048_576);
        assert_eq!(loki.router.replicas, 3);
    }

    #[test]
    fn test_cluster_rbac_uses_concrete_subject() {
        let cluster = rhobss01ue1().unwrap();
        let rbac = &cluster.gateway.unwrap().rbac;
        assert_eq!(rbac.roles.len(), 6);
        let binding = &rbac.role_bindings[0];
        assert_eq!(binding.subjects.len(), 1);
        assert_eq!(
            binding.subjects[0].name,
            "service-account-45b1e1f4-6e17-4858-8f66-158320f6ac71"
        );
    }

    #[test]
    fn test_integration_cluster_runs_every_default_step() {
        let cluster = rhobsi01uw2().unwrap();
        assert_eq!(cluster.build_steps, default_build_steps());
        assert_eq!(cluster.gateway.unwrap().rbac.roles.len(), 4);
    }
}
