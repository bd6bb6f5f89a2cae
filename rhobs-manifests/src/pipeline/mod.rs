//! Build pipeline
//!
//! A [`Builder`] runs the build steps of registered clusters in order and
//! writes what they produce. A run renders every targeted cluster, monitoring
//! bundles included, before the first file is written, so a failing step
//! leaves the output tree untouched. Only an I/O error during the write phase
//! can leave a partial tree behind.

pub mod bundles;
pub mod steps;

pub use bundles::{MonitoringBundles, MONITORING_COMPONENT, MONITORING_NAMESPACE};
pub use steps::{
    default_build_steps, default_logging_build_steps, default_metrics_build_steps,
    default_synthetics_build_steps, parse_steps, prune, BuildStep,
};

use crate::clusters::{ClusterConfig, ClusterEnvironment, ClusterName, ClusterRegistry};
use crate::config::{CrdConfig, GeneratorConfig};
use crate::error::{BuildError, BuildResult};
use crate::manifests::{
    alertmanager, crds, gateway, loki, memcached, operators, secrets, servicemonitors,
    synthetics, thanos, Manifest, StepOutput,
};
use crate::output::ManifestWriter;
use crate::rbac::catalog::environment_rbac;
use std::path::PathBuf;
use tracing::{debug, info};

/// File name of the environment-wide RBAC document
pub const RBAC_FILE: &str = "rbac.json";

/// What a cluster build wrote
#[derive(Debug, Clone)]
pub struct ClusterReport {
    pub cluster: ClusterName,
    pub environment: ClusterEnvironment,
    pub steps: Vec<BuildStep>,
    pub files: Vec<PathBuf>,
}

/// Runs build steps for clusters in a registry
pub struct Builder<'a> {
    registry: &'a ClusterRegistry,
    writer: ManifestWriter,
    crds: CrdConfig,
}

impl<'a> Builder<'a> {
    pub fn new(registry: &'a ClusterRegistry, writer: ManifestWriter, crds: CrdConfig) -> Self {
        Self {
            registry,
            writer,
            crds,
        }
    }

    pub fn from_config(registry: &'a ClusterRegistry, config: &GeneratorConfig) -> Self {
        Self::new(
            registry,
            ManifestWriter::new(&config.output.root_dir, config.output.format),
            config.crds.clone(),
        )
    }

    pub fn writer(&self) -> &ManifestWriter {
        &self.writer
    }

    /// Build every registered cluster
    pub fn build_clusters(&self) -> BuildResult<Vec<ClusterReport>> {
        if self.registry.is_empty() {
            return Err(BuildError::NoClusters);
        }
        self.run(
            self.registry
                .all()
                .into_iter()
                .map(|cluster| (cluster, cluster.build_steps.as_slice()))
                .collect(),
        )
    }

    pub fn build_cluster(&self, name: &str) -> BuildResult<ClusterReport> {
        let cluster = self.registry.get(name)?;
        self.run_one(cluster, &cluster.build_steps)
    }

    /// Build a cluster with an explicit step list instead of its own
    pub fn build_cluster_steps(
        &self,
        name: &str,
        steps: &[BuildStep],
    ) -> BuildResult<ClusterReport> {
        let cluster = self.registry.get(name)?;
        self.run_one(cluster, steps)
    }

    pub fn build_environment(
        &self,
        environment: ClusterEnvironment,
    ) -> BuildResult<Vec<ClusterReport>> {
        let clusters = self.registry.by_environment(environment);
        if clusters.is_empty() {
            return Err(BuildError::EmptyEnvironment(environment.to_string()));
        }
        self.run(
            clusters
                .into_iter()
                .map(|cluster| (cluster, cluster.build_steps.as_slice()))
                .collect(),
        )
    }

    /// Write the environment-wide RBAC document to `<root>/rbac.json`
    pub fn write_environment_rbac(&self) -> BuildResult<PathBuf> {
        let document = environment_rbac()?;
        info!(
            "Generated RBAC with {} roles and {} bindings",
            document.roles.len(),
            document.role_bindings.len()
        );
        self.writer.write_root_file(RBAC_FILE, &document)
    }

    /// Render one step without writing anything
    pub fn render_step(
        &self,
        cluster: &ClusterConfig,
        step: BuildStep,
    ) -> rhobs_common::Result<StepOutput> {
        match step {
            BuildStep::ThanosOperatorCrds => {
                crds::build(&self.crds.thanos_dir, crds::THANOS_COMPONENT)
            }
            BuildStep::ThanosOperator => operators::thanos_operator(cluster),
            BuildStep::DefaultThanosStack => thanos::build(cluster),
            BuildStep::LokiOperatorCrds => crds::build(&self.crds.loki_dir, crds::LOKI_COMPONENT),
            BuildStep::LokiOperator => operators::loki_operator(cluster),
            BuildStep::DefaultLokiStack => loki::build(cluster),
            BuildStep::ServiceMonitors => servicemonitors::build(cluster),
            BuildStep::Alertmanager => alertmanager::build(cluster),
            BuildStep::Secrets => secrets::build(cluster),
            BuildStep::Gateway => gateway::build(cluster),
            BuildStep::Memcached => memcached::build(cluster),
            BuildStep::SyntheticsApi => synthetics::build(cluster),
            BuildStep::NoOp => Ok(StepOutput::default()),
        }
    }

    fn run_one(&self, cluster: &ClusterConfig, steps: &[BuildStep]) -> BuildResult<ClusterReport> {
        self.run(vec![(cluster, steps)])?
            .into_iter()
            .next()
            .ok_or(BuildError::NoClusters)
    }

    /// Render every target, then write. Nothing is written unless every
    /// step of every target rendered.
    fn run(&self, targets: Vec<(&ClusterConfig, &[BuildStep])>) -> BuildResult<Vec<ClusterReport>> {
        let mut bundles = MonitoringBundles::new();
        let mut rendered = Vec::with_capacity(targets.len());
        for (cluster, steps) in targets {
            let manifests = self.render_cluster(cluster, steps, &mut bundles)?;
            rendered.push((cluster, steps, manifests));
        }
        let mut monitoring = bundles.render_all()?;

        rendered
            .into_iter()
            .map(|(cluster, steps, mut manifests)| {
                if let Some(monitors) = monitoring.remove(&MonitoringBundles::key(cluster)) {
                    manifests.extend(monitors);
                }
                let files = self.writer.write_all(cluster, &manifests)?;

                info!("Built cluster {} ({} files)", cluster.name, files.len());
                Ok(ClusterReport {
                    cluster: cluster.name.clone(),
                    environment: cluster.environment,
                    steps: steps.to_vec(),
                    files,
                })
            })
            .collect()
    }

    fn render_cluster(
        &self,
        cluster: &ClusterConfig,
        steps: &[BuildStep],
        bundles: &mut MonitoringBundles,
    ) -> BuildResult<Vec<Manifest>> {
        let span = tracing::info_span!(
            "render_cluster",
            cluster = %cluster.name,
            environment = %cluster.environment
        );
        let _enter = span.enter();

        let mut manifests = Vec::new();
        for &step in steps {
            debug!(step = %step, "Running build step");
            let output = self
                .render_step(cluster, step)
                .map_err(|e| BuildError::step(&cluster.name, step, e))?;

            manifests.extend(output.manifests);
            bundles.add(cluster, output.service_monitors);
        }
        Ok(manifests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use tempfile::TempDir;

    fn builder<'a>(registry: &'a ClusterRegistry, dir: &TempDir) -> Builder<'a> {
        Builder::new(
            registry,
            ManifestWriter::new(dir.path(), OutputFormat::Yaml),
            CrdConfig::default(),
        )
    }

    #[test]
    fn test_build_clusters_requires_registered_clusters() {
        let dir = TempDir::new().unwrap();
        let registry = ClusterRegistry::new();
        let err = builder(&registry, &dir).build_clusters().unwrap_err();
        assert_eq!(err.to_string(), "no clusters registered");
    }

    #[test]
    fn test_build_environment_without_clusters() {
        let dir = TempDir::new().unwrap();
        let mut registry = ClusterRegistry::new();
        for cluster in crate::clusters::catalog::default_clusters().unwrap() {
            if cluster.environment != ClusterEnvironment::Production {
                registry.register(cluster).unwrap();
            }
        }
        let err = builder(&registry, &dir)
            .build_environment(ClusterEnvironment::Production)
            .unwrap_err();
        assert!(matches!(err, BuildError::EmptyEnvironment(env) if env == "production"));
    }

    #[test]
    fn test_missing_crd_dir_reports_step() {
        let dir = TempDir::new().unwrap();
        let registry = ClusterRegistry::with_default_clusters().unwrap();
        let builder = Builder::new(
            &registry,
            ManifestWriter::new(dir.path(), OutputFormat::Yaml),
            CrdConfig {
                thanos_dir: dir.path().join("missing"),
                loki_dir: dir.path().join("missing"),
            },
        );
        let err = builder
            .build_cluster_steps("rhobsi01uw2", &[BuildStep::ThanosOperatorCrds])
            .unwrap_err();
        assert!(matches!(
            err,
            BuildError::Step { step: BuildStep::ThanosOperatorCrds, .. }
        ));
    }

    #[test]
    fn test_no_op_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let registry = ClusterRegistry::with_default_clusters().unwrap();
        let report = builder(&registry, &dir)
            .build_cluster_steps("rhobsp01ue1", &[BuildStep::NoOp])
            .unwrap();
        assert!(report.files.is_empty());
    }
}
