//! `runs` and `experiment`: read-only tracking queries

use crate::args::{ExperimentArgs, RunsArgs};
use crate::context::MedpipeCliContext;
use crate::output::*;
use medpipe::MedpipeError;
use medpipe::tracking::{Experiment, Tracker};

async fn find_experiment(tracker: &dyn Tracker, name: &str) -> medpipe::Result<Experiment> {
    tracker
        .get_experiment_by_name(name)
        .await?
        .ok_or_else(|| MedpipeError::Other(format!("Experiment '{}' not found", name)))
}

pub async fn handle_runs_command(
    args: RunsArgs,
    ctx: &MedpipeCliContext,
    output_format: &str,
) -> medpipe::Result<()> {
    let tracker = ctx.tracker()?;
    let name = args
        .experiment
        .unwrap_or_else(|| ctx.config.tracking.experiment_name.clone());

    let experiment = find_experiment(tracker.as_ref(), &name).await?;
    let runs = tracker
        .search_runs(&[experiment.experiment_id.clone()], args.limit)
        .await?;

    if output_format == "json" {
        print_json(&runs);
    } else {
        print_runs(&runs);
    }
    Ok(())
}

pub async fn handle_experiment_command(
    args: ExperimentArgs,
    ctx: &MedpipeCliContext,
    output_format: &str,
) -> medpipe::Result<()> {
    let tracker = ctx.tracker()?;
    let name = args
        .name
        .unwrap_or_else(|| ctx.config.tracking.experiment_name.clone());

    let experiment = find_experiment(tracker.as_ref(), &name).await?;

    if output_format == "json" {
        print_json(&experiment);
    } else {
        print_experiment(&experiment);
    }
    Ok(())
}
