//! Command handlers for the medpipe CLI

pub mod build;
pub mod experiment;
pub mod predict;
pub mod run;

pub use build::handle_build_command;
pub use experiment::{handle_experiment_command, handle_runs_command};
pub use predict::handle_predict_command;
pub use run::handle_run_command;
