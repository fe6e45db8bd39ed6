//! Command line definition

use crate::args::*;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "medpipe-cli")]
#[command(about = "Build, track and run merged clinical NLP pipelines", long_about = None)]
#[command(version = medpipe::VERSION)]
pub struct Cli {
    /// Configuration file (toml, yaml or json)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (table, json) - use json for tool integration
    #[arg(long, short, default_value = "table", global = true)]
    pub output: String,

    /// Use machine-readable output (alias for --output json)
    #[arg(long, global = true)]
    pub machine: bool,

    /// Verbose output (debug level logging)
    #[arg(long, short, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Quiet mode (errors only)
    #[arg(long, short, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build, log, register and check the combined pipeline
    Run(RunArgs),

    /// Build the combined pipeline without tracking it
    Build(BuildArgs),

    /// Run a tracked model or local package over text
    Predict(PredictArgs),

    /// List runs of an experiment, newest first
    Runs(RunsArgs),

    /// Describe an experiment
    Experiment(ExperimentArgs),

    /// Generate shell completion scripts
    Completions(CompletionsArgs),

    /// Display version information
    Version,
}
