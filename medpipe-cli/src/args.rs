//! Command argument structures

use clap::Args;
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub struct BuildArgs {
    /// Write the combined pipeline package to this directory
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Keep the vectorizer's static vectors enabled
    #[arg(long)]
    pub keep_static_vectors: bool,

    /// Run the built pipeline over this text and print the entities
    #[arg(long)]
    pub text: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Write the combined pipeline package to this directory as well
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Skip the inference check after registration
    #[arg(long)]
    pub skip_inference: bool,

    /// Registered version to run the inference check against
    #[arg(long)]
    pub model_version: Option<u64>,

    /// Override the experiment name
    #[arg(long)]
    pub experiment: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct PredictArgs {
    /// Text to annotate (defaults to the configured inference text)
    pub text: Option<String>,

    /// Model URI (`models:/<name>/<version>` or `runs:/<run_id>/<path>`)
    #[arg(long, short, conflicts_with = "package")]
    pub model: Option<String>,

    /// Version of the configured registered model
    #[arg(long, conflicts_with_all = ["model", "package"])]
    pub model_version: Option<u64>,

    /// Load a local pipeline package instead of a tracked model
    #[arg(long)]
    pub package: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RunsArgs {
    /// Experiment name (defaults to the configured one)
    #[arg(long, short)]
    pub experiment: Option<String>,

    /// Maximum number of runs
    #[arg(short, long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Args, Debug, Default)]
pub struct ExperimentArgs {
    /// Experiment name (defaults to the configured one)
    pub name: Option<String>,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
