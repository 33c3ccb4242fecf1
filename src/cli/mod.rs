pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ecs-info")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Snapshot an ECS cluster's tasks, container instances and services", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Describe the first cluster matching a name pattern")]
    Describe {
        #[arg(help = "Cluster name fragment or regular expression")]
        name: String,

        #[arg(short, long, help = "Region to query")]
        region: Option<String>,

        #[arg(
            short,
            long,
            help = "Cluster document to serve requests from (JSON or YAML) instead of AWS"
        )]
        fixture: Option<PathBuf>,

        #[arg(long, help = "Treat NAME as an exact cluster name or ARN")]
        exact: bool,

        #[arg(long, value_enum, default_value_t = OutputFormat::Json, help = "Output format")]
        format: OutputFormat,
    },
    #[command(about = "List task starters, grouped by owning service")]
    Starters {
        #[arg(help = "Cluster name fragment or regular expression")]
        name: String,

        #[arg(short, long, help = "Region to query")]
        region: Option<String>,

        #[arg(
            short,
            long,
            help = "Cluster document to serve requests from (JSON or YAML) instead of AWS"
        )]
        fixture: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}
