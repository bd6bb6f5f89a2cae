use crate::output::{self, OutputFormat, Printer};
use crate::TemplateCommands;
use anyhow::{bail, Result};
use rhobs_manifests::template::{production_maps, stage_maps, TemplateMaps};
use rhobs_manifests::ClusterRegistry;
use serde::Serialize;
use tabled::Tabled;

#[derive(Debug, Serialize, Tabled)]
struct TemplateRow {
    #[tabled(rename = "CATEGORY")]
    category: &'static str,
    #[tabled(rename = "KEY")]
    key: String,
    #[tabled(rename = "VALUE")]
    value: String,
}

fn rows(maps: &TemplateMaps) -> Vec<TemplateRow> {
    let mut rows = Vec::new();
    let mut add = |category: &'static str, key: &str, value: String| {
        rows.push(TemplateRow {
            category,
            key: key.to_string(),
            value: output::truncate(&value, 80),
        })
    };

    for (key, value) in maps.images.iter() {
        add("image", key, value.clone());
    }
    for (key, value) in maps.versions.iter() {
        add("version", key, value.clone());
    }
    for (key, value) in maps.log_levels.iter() {
        add("log level", key, value.clone());
    }
    for (key, value) in maps.replicas.iter() {
        add("replicas", key, value.to_string());
    }
    for (key, value) in maps.storage_size.iter() {
        add("storage", key, value.to_string());
    }
    for (key, value) in maps.object_storage_bucket.iter() {
        add("bucket", key, format!("{}/{}", value.name, value.key));
    }
    for (key, value) in maps.resource_requirements.iter() {
        let requests = value
            .requests
            .as_ref()
            .map(|r| {
                r.iter()
                    .map(|(name, q)| format!("{name}={}", q.0))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();
        add("requests", key, requests);
    }
    for key in maps.loki_overrides.keys() {
        add("loki", key, "see json/yaml output".to_string());
    }
    rows
}

pub fn handle_template_command(command: TemplateCommands, format: OutputFormat) -> Result<()> {
    match command {
        TemplateCommands::Show {
            cluster,
            environment,
        } => {
            let maps = match (cluster, environment.as_deref()) {
                (Some(name), _) => {
                    let registry = ClusterRegistry::with_default_clusters()?;
                    registry.get(&name)?.templates.clone()
                }
                (None, Some("staging")) => stage_maps(),
                (None, Some("production")) => production_maps(),
                (None, Some(other)) => {
                    bail!("no environment template for '{other}' (expected staging or production)")
                }
                (None, None) => bail!("either a cluster or --environment is required"),
            };

            let printer = Printer::new(format);
            match format {
                OutputFormat::Table => printer.rows(rows(&maps))?,
                _ => printer.document(&maps)?,
            }
        }
    }
    Ok(())
}
