//! Cluster definitions and the cluster registry
//!
//! A [`ClusterConfig`] carries everything a build needs for one cluster: its
//! resolved template maps, the gateway settings and the ordered build steps.
//! Clusters are registered explicitly in a [`ClusterRegistry`] owned by the
//! caller.

pub mod catalog;

use crate::pipeline::BuildStep;
use crate::template::TemplateMaps;
use crate::validation;
use rhobs_common::rbac::RbacDocument;
use rhobs_common::tenants::Tenants;
use rhobs_common::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Cluster identifier, e.g. `rhobss01ue1`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterName(String);

impl ClusterName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClusterName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for ClusterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deployment environment of a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClusterEnvironment {
    Integration,
    Staging,
    Production,
}

impl ClusterEnvironment {
    pub const ALL: [ClusterEnvironment; 3] = [Self::Integration, Self::Staging, Self::Production];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integration => "integration",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for ClusterEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClusterEnvironment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|env| env.as_str() == s)
            .ok_or_else(|| Error::InvalidEnvironment(s.to_string()))
    }
}

/// API group the cluster's ServiceMonitor CRD is served under.
///
/// `None` keeps the group the objects were built with.
pub type MonitoringApiGroup = Option<String>;

/// Observatorium API gateway settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatewayConfig {
    pub metrics: bool,
    pub logs: bool,
    pub synthetics: bool,
    /// Internal tracing of the gateway itself
    pub tracing: bool,
    /// Account management service backing the OPA authorizer
    pub ams_url: Option<String>,
    /// Public hostname exposed through a Route
    pub custom_route: Option<String>,
    pub tenants: Tenants,
    pub rbac: RbacDocument,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.ams_url {
            validation::validate_url(url)?;
        }
        if let Some(host) = &self.custom_route {
            validation::validate_hostname(host)?;
        }
        Ok(())
    }
}

/// Configuration of one cluster deployment
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterConfig {
    pub name: ClusterName,
    pub environment: ClusterEnvironment,
    pub namespace: String,
    pub templates: TemplateMaps,
    pub gateway: Option<GatewayConfig>,
    pub build_steps: Vec<BuildStep>,
    pub monitoring_api_group: MonitoringApiGroup,
}

impl ClusterConfig {
    /// Check the configuration before it is registered
    pub fn validate(&self) -> Result<()> {
        validation::validate_cluster_name(self.name.as_str())?;
        validation::validate_namespace(&self.namespace)?;

        if self.build_steps.is_empty() {
            return Err(Error::Validation(format!(
                "cluster {} must have at least one build step",
                self.name
            )));
        }

        match &self.gateway {
            Some(gateway) => gateway.validate()?,
            None if self.build_steps.contains(&BuildStep::Gateway) => {
                return Err(Error::Validation(format!(
                    "cluster {} runs the gateway step without a gateway config",
                    self.name
                )));
            }
            None => {}
        }

        if let Some(group) = &self.monitoring_api_group {
            validation::validate_api_group(group)?;
        }

        Ok(())
    }

    /// Gateway settings, required by the gateway step
    pub fn gateway(&self) -> Result<&GatewayConfig> {
        self.gateway.as_ref().ok_or_else(|| {
            Error::InvalidConfig(format!("cluster {} has no gateway config", self.name))
        })
    }
}

/// Registered clusters, ordered by name
#[derive(Debug, Clone, Default)]
pub struct ClusterRegistry {
    clusters: BTreeMap<ClusterName, ClusterConfig>,
}

impl ClusterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every cluster in the catalog
    pub fn with_default_clusters() -> Result<Self> {
        let mut registry = Self::new();
        for cluster in catalog::default_clusters()? {
            registry.register(cluster)?;
        }
        Ok(registry)
    }

    /// Validate and add a cluster. Names must be unique.
    pub fn register(&mut self, config: ClusterConfig) -> Result<()> {
        config.validate()?;

        if self.clusters.contains_key(&config.name) {
            return Err(Error::DuplicateCluster(config.name.to_string()));
        }

        tracing::debug!(
            cluster = %config.name,
            environment = %config.environment,
            "Registered cluster"
        );
        self.clusters.insert(config.name.clone(), config);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&ClusterConfig> {
        self.clusters
            .get(&ClusterName::from(name))
            .ok_or_else(|| Error::ClusterNotFound(name.to_string()))
    }

    pub fn all(&self) -> Vec<&ClusterConfig> {
        self.clusters.values().collect()
    }

    pub fn by_environment(&self, environment: ClusterEnvironment) -> Vec<&ClusterConfig> {
        self.clusters
            .values()
            .filter(|c| c.environment == environment)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}
