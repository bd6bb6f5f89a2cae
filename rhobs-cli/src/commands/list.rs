use crate::output::{OutputFormat, Printer};
use crate::ListCommands;
use anyhow::Result;
use rhobs_manifests::{BuildStep, ClusterRegistry};
use serde::Serialize;
use tabled::Tabled;

#[derive(Debug, Serialize, Tabled)]
struct ClusterRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "ENVIRONMENT")]
    environment: String,
    #[tabled(rename = "NAMESPACE")]
    namespace: String,
    #[tabled(rename = "GATEWAY")]
    gateway: String,
    #[tabled(rename = "STEPS")]
    steps: usize,
}

#[derive(Debug, Serialize, Tabled)]
struct StepRow {
    #[tabled(rename = "STEP")]
    name: &'static str,
    #[tabled(rename = "DESCRIPTION")]
    description: &'static str,
}

pub fn handle_list_command(command: ListCommands, format: OutputFormat) -> Result<()> {
    let printer = Printer::new(format);
    match command {
        ListCommands::Clusters => {
            let registry = ClusterRegistry::with_default_clusters()?;
            let rows: Vec<ClusterRow> = registry
                .all()
                .into_iter()
                .map(|cluster| ClusterRow {
                    name: cluster.name.to_string(),
                    environment: cluster.environment.to_string(),
                    namespace: cluster.namespace.clone(),
                    gateway: cluster
                        .gateway
                        .as_ref()
                        .map(|gw| {
                            let signals: Vec<String> = [
                                ("metrics", gw.metrics),
                                ("logs", gw.logs),
                                ("synthetics", gw.synthetics),
                            ]
                            .into_iter()
                            .filter(|(_, enabled)| *enabled)
                            .map(|(name, _)| name.to_string())
                            .collect();
                            signals.join("+")
                        })
                        .unwrap_or_else(|| "-".to_string()),
                    steps: cluster.build_steps.len(),
                })
                .collect();
            printer.rows(rows)?;
        }
        ListCommands::Steps => {
            let rows: Vec<StepRow> = BuildStep::ALL
                .iter()
                .map(|step| StepRow {
                    name: step.as_str(),
                    description: step.description(),
                })
                .collect();
            printer.rows(rows)?;
        }
    }
    Ok(())
}
