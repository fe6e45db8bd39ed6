//! End-to-end orchestration: build the combined pipeline, then track,
//! register and check it.

pub mod build;
pub mod run;

pub use build::{BuildReport, BuildSummary, build_combined_pipeline, build_from_config, load_sources};
pub use run::{WorkflowOutcome, ensure_experiment, log_run, predict, run_workflow};
