//! Build pipeline errors
//!
//! Step failures are wrapped with the cluster and step they came from so the
//! caller can report where a run stopped.

use crate::clusters::ClusterName;
use crate::pipeline::BuildStep;
use std::path::PathBuf;

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("step {step} failed for cluster {cluster}: {source}")]
    Step {
        cluster: ClusterName,
        step: BuildStep,
        #[source]
        source: rhobs_common::Error,
    },

    #[error("no clusters registered")]
    NoClusters,

    #[error("no clusters found for environment {0}")]
    EmptyEnvironment(String),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Generation(#[from] rhobs_common::Error),
}

impl BuildError {
    pub fn step(cluster: &ClusterName, step: BuildStep, source: rhobs_common::Error) -> Self {
        Self::Step {
            cluster: cluster.clone(),
            step,
            source,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_error_names_cluster_and_step() {
        let err = BuildError::step(
            &ClusterName::from("rhobss01ue1"),
            BuildStep::Gateway,
            rhobs_common::Error::MissingTemplateKey {
                category: "images".to_string(),
                key: "OBSERVATORIUM_API".to_string(),
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("gateway"));
        assert!(msg.contains("rhobss01ue1"));
        assert!(msg.contains("OBSERVATORIUM_API"));
    }

    #[test]
    fn test_empty_environment_message() {
        let err = BuildError::EmptyEnvironment("staging".to_string());
        assert_eq!(err.to_string(), "no clusters found for environment staging");
    }
}
