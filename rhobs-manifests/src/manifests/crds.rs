//! Vendored operator CRDs
//!
//! CRDs are synced into a local directory out of band. This step only reads
//! them back, so every YAML document found there ends up in the cluster
//! output unchanged.

use super::{Manifest, StepOutput};
use rhobs_common::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const THANOS_COMPONENT: &str = "thanos-operator-crds";
pub const LOKI_COMPONENT: &str = "loki-operator-crds";

pub fn build(dir: &Path, component: &str) -> Result<StepOutput> {
    if !dir.is_dir() {
        return Err(Error::InvalidConfig(format!(
            "CRD directory {} for {component} does not exist",
            dir.display()
        )));
    }

    let mut out = StepOutput::default();
    for path in yaml_files(dir)? {
        let content = fs::read_to_string(&path)?;
        let before = out.manifests.len();
        for document in serde_yaml::Deserializer::from_str(&content) {
            let value = Value::deserialize(document)?;
            // empty documents between `---` separators
            if value.is_null() {
                continue;
            }
            out.manifests.push(Manifest::from_value(component, value)?);
        }
        debug!(
            "Loaded {} CRD(s) from {}",
            out.manifests.len() - before,
            path.display()
        );
    }

    if out.manifests.is_empty() {
        return Err(Error::InvalidConfig(format!(
            "no CRDs found in {}",
            dir.display()
        )));
    }
    Ok(out)
}

/// `*.yaml` and `*.yml` files directly inside `dir`, in name order
fn yaml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        if path.is_file() && is_yaml {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CRD: &str = "apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: thanosqueries.monitoring.thanos.io
spec:
  group: monitoring.thanos.io
";

    #[test]
    fn test_reads_documents_in_name_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.yaml"), CRD).unwrap();
        fs::write(
            dir.path().join("a.yml"),
            "---\napiVersion: apiextensions.k8s.io/v1\nkind: CustomResourceDefinition\nmetadata:\n  name: lokistacks.loki.grafana.com\n---\n",
        )
        .unwrap();
        fs::write(dir.path().join("README.md"), "not a crd").unwrap();

        let out = build(dir.path(), THANOS_COMPONENT).unwrap();
        let names: Vec<_> = out.manifests.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "lokistacks.loki.grafana.com",
                "thanosqueries.monitoring.thanos.io"
            ]
        );
        assert!(out
            .manifests
            .iter()
            .all(|m| m.component == THANOS_COMPONENT && m.kind == "CustomResourceDefinition"));
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = build(&dir.path().join("absent"), LOKI_COMPONENT).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_empty_directory() {
        let dir = TempDir::new().unwrap();
        assert!(build(dir.path(), LOKI_COMPONENT).is_err());
    }

    #[test]
    fn test_document_without_name() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad.yaml"), "kind: CustomResourceDefinition\n").unwrap();
        let err = build(dir.path(), LOKI_COMPONENT).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
