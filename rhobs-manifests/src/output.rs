//! Manifest output
//!
//! Objects are written one per file under
//! `<root>/clusters/<environment>/<cluster>/<component>/<name>-<Kind>.<ext>`.

use crate::clusters::ClusterConfig;
use crate::error::{BuildError, BuildResult};
use crate::manifests::Manifest;
use rhobs_common::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Encoding of written manifests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
        }
    }

    pub fn render<T: Serialize>(&self, value: &T) -> rhobs_common::Result<String> {
        Ok(match self {
            Self::Yaml => serde_yaml::to_string(value)?,
            Self::Json => {
                let mut out = serde_json::to_string_pretty(value)?;
                out.push('\n');
                out
            }
        })
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            other => Err(Error::InvalidConfig(format!(
                "unknown output format '{other}', expected yaml or json"
            ))),
        }
    }
}

/// Writes rendered manifests below a root directory
#[derive(Debug, Clone)]
pub struct ManifestWriter {
    root: PathBuf,
    format: OutputFormat,
}

impl ManifestWriter {
    pub fn new(root: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            root: root.into(),
            format,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn cluster_dir(&self, cluster: &ClusterConfig) -> PathBuf {
        self.root
            .join("clusters")
            .join(cluster.environment.as_str())
            .join(cluster.name.as_str())
    }

    pub fn manifest_path(&self, cluster: &ClusterConfig, manifest: &Manifest) -> PathBuf {
        self.cluster_dir(cluster)
            .join(&manifest.component)
            .join(format!("{}.{}", manifest.file_stem(), self.format.extension()))
    }

    /// Write every manifest, returning the written paths in order
    pub fn write_all(
        &self,
        cluster: &ClusterConfig,
        manifests: &[Manifest],
    ) -> BuildResult<Vec<PathBuf>> {
        manifests
            .iter()
            .map(|manifest| {
                let path = self.manifest_path(cluster, manifest);
                self.write_file(&path, &manifest.object)?;
                Ok(path)
            })
            .collect()
    }

    /// Write a single document to `<root>/<file_name>`, e.g. the environment RBAC
    pub fn write_root_file<T: Serialize>(&self, file_name: &str, value: &T) -> BuildResult<PathBuf> {
        let path = self.root.join(file_name);
        let content = match Path::new(file_name).extension().and_then(|e| e.to_str()) {
            Some("json") => OutputFormat::Json.render(value)?,
            Some("yaml") | Some("yml") => OutputFormat::Yaml.render(value)?,
            _ => self.format.render(value)?,
        };
        self.write_content(&path, &content)?;
        Ok(path)
    }

    fn write_file<T: Serialize>(&self, path: &Path, value: &T) -> BuildResult<()> {
        let content = self.format.render(value)?;
        self.write_content(path, &content)
    }

    fn write_content(&self, path: &Path, content: &str) -> BuildResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::write(parent, e))?;
        }
        fs::write(path, content).map_err(|e| BuildError::write(path, e))?;

        tracing::info!(path = %path.display(), "Wrote manifest");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clusters::catalog::default_clusters;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_format_parse() {
        assert_eq!("YAML".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("toml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_manifest_path_layout() {
        let cluster = default_clusters().unwrap().remove(1);
        let writer = ManifestWriter::new("resources", OutputFormat::Yaml);
        let manifest = Manifest::from_value(
            "rhobs-gateway",
            json!({"kind": "Service", "metadata": {"name": "rhobs-gateway"}}),
        )
        .unwrap();

        assert_eq!(
            writer.manifest_path(&cluster, &manifest),
            PathBuf::from("resources/clusters/staging/rhobss01ue1/rhobs-gateway/rhobs-gateway-Service.yaml")
        );
    }

    #[test]
    fn test_write_all_creates_files() {
        let dir = TempDir::new().unwrap();
        let cluster = default_clusters().unwrap().remove(0);
        let writer = ManifestWriter::new(dir.path(), OutputFormat::Json);
        let manifest = Manifest::from_value(
            "synthetics-api",
            json!({"kind": "Service", "metadata": {"name": "synthetics-api"}}),
        )
        .unwrap();

        let paths = writer.write_all(&cluster, &[manifest]).unwrap();
        assert_eq!(paths.len(), 1);
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&paths[0]).unwrap()).unwrap();
        assert_eq!(written["metadata"]["name"], "synthetics-api");
    }

    #[test]
    fn test_root_file_uses_extension_format() {
        let dir = TempDir::new().unwrap();
        let writer = ManifestWriter::new(dir.path(), OutputFormat::Yaml);
        let path = writer
            .write_root_file("rbac.json", &json!({"roles": [], "roleBindings": []}))
            .unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert!(content.trim_start().starts_with('{'));
    }
}
