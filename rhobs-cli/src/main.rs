//! RHOBS CLI
//!
//! Command-line interface for generating RHOBS cluster manifests

mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use output::OutputFormat;
use rhobs_manifests::config::GeneratorConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "RHOBS_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Root directory for generated manifests
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Output format (table, json, yaml)
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    output: OutputFormat,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate manifests
    Build {
        #[command(subcommand)]
        command: BuildCommands,
    },
    /// List registered clusters or build steps
    List {
        #[command(subcommand)]
        command: ListCommands,
    },
    /// Inspect template maps
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum BuildCommands {
    /// Build every registered cluster
    Clusters,
    /// Build a single cluster
    Cluster {
        /// Cluster name
        name: String,
        /// Comma-separated steps to run instead of the cluster's own
        #[arg(long)]
        steps: Option<String>,
        /// Comma-separated steps to leave out
        #[arg(long)]
        skip: Option<String>,
    },
    /// Build every cluster of an environment
    Environment {
        /// integration, staging or production
        environment: String,
    },
    /// Write the environment-wide RBAC document
    Rbac,
}

#[derive(Subcommand)]
pub enum ListCommands {
    /// List registered clusters
    Clusters,
    /// List build steps
    Steps,
}

#[derive(Subcommand)]
pub enum TemplateCommands {
    /// Show the template maps of a cluster or an environment
    Show {
        /// Cluster name
        #[arg(required_unless_present = "environment", conflicts_with = "environment")]
        cluster: Option<String>,
        /// staging or production
        #[arg(short, long)]
        environment: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print a sample configuration file
    Sample,
}

fn load_config(cli: &Cli) -> Result<GeneratorConfig> {
    let mut config = GeneratorConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(dir) = &cli.output_dir {
        config.output.root_dir = dir.clone();
    }
    config.logging = config.logging.clone().with_verbosity(cli.verbose);
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "rhobs", &mut std::io::stdout());
        return Ok(());
    }
    if let Commands::Config { command: ConfigCommands::Sample } = cli.command {
        print!("{}", GeneratorConfig::generate_sample()?);
        return Ok(());
    }

    let config = load_config(&cli)?;
    let _guard = config
        .logging
        .init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    let result = match cli.command {
        Commands::Build { command } => {
            commands::build::handle_build_command(command, &config, cli.output)
        }
        Commands::List { command } => commands::list::handle_list_command(command, cli.output),
        Commands::Template { command } => {
            commands::template::handle_template_command(command, cli.output)
        }
        Commands::Config { .. } | Commands::Completions { .. } => Ok(()),
    };

    if let Err(e) = result {
        output::print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
    Ok(())
}
