use crate::output::{self, OutputFormat, Printer};
use crate::BuildCommands;
use anyhow::Result;
use rhobs_manifests::config::GeneratorConfig;
use rhobs_manifests::pipeline::{parse_steps, prune, ClusterReport};
use rhobs_manifests::{Builder, ClusterEnvironment, ClusterRegistry};
use serde::Serialize;
use tabled::Tabled;
use tracing::debug;

#[derive(Debug, Serialize, Tabled)]
struct BuildRow {
    #[tabled(rename = "CLUSTER")]
    cluster: String,
    #[tabled(rename = "ENVIRONMENT")]
    environment: String,
    #[tabled(rename = "STEPS")]
    #[serde(skip)]
    step_list: String,
    #[tabled(skip)]
    steps: Vec<String>,
    #[tabled(rename = "FILES")]
    files: usize,
}

impl From<ClusterReport> for BuildRow {
    fn from(report: ClusterReport) -> Self {
        let steps: Vec<String> = report.steps.iter().map(|s| s.to_string()).collect();
        Self {
            cluster: report.cluster.to_string(),
            environment: report.environment.to_string(),
            step_list: output::join_limited(&steps, 4),
            steps,
            files: report.files.len(),
        }
    }
}

fn print_reports(reports: Vec<ClusterReport>, printer: Printer) -> Result<()> {
    let files: usize = reports.iter().map(|r| r.files.len()).sum();
    let count = reports.len();
    printer.rows(reports.into_iter().map(BuildRow::from).collect())?;
    printer.success(&format!("Built {count} cluster(s), {files} file(s) written"));
    Ok(())
}

pub fn handle_build_command(
    command: BuildCommands,
    config: &GeneratorConfig,
    format: OutputFormat,
) -> Result<()> {
    let registry = ClusterRegistry::with_default_clusters()?;
    let builder = Builder::from_config(&registry, config);
    let printer = Printer::new(format);

    match command {
        BuildCommands::Clusters => {
            let reports = builder.build_clusters()?;
            print_reports(reports, printer)?;
        }
        BuildCommands::Cluster { name, steps, skip } => {
            let cluster = registry.get(&name)?;
            let mut selected = match steps {
                Some(list) => parse_steps(&list)?,
                None => cluster.build_steps.clone(),
            };
            if let Some(list) = skip {
                let skipped = parse_steps(&list)?;
                selected = prune(&selected, &[&skipped]);
            }
            if selected.is_empty() {
                printer.info(&format!("No build steps left for cluster {name}"));
                return Ok(());
            }

            debug!("Building {} with steps {:?}", name, selected);
            let report = builder.build_cluster_steps(&name, &selected)?;
            print_reports(vec![report], printer)?;
        }
        BuildCommands::Environment { environment } => {
            let environment: ClusterEnvironment = environment.parse()?;
            let reports = builder.build_environment(environment)?;
            print_reports(reports, printer)?;
        }
        BuildCommands::Rbac => {
            let path = builder.write_environment_rbac()?;
            printer.success(&format!("RBAC written to {}", path.display()));
        }
    }

    Ok(())
}
