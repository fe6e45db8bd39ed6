//! `run`: the full tracked workflow

use crate::args::RunArgs;
use crate::context::MedpipeCliContext;
use crate::handlers::build::{build_pipeline, write_package};
use crate::output::*;
use medpipe::workflow::run_workflow;

pub async fn handle_run_command(
    args: RunArgs,
    ctx: &MedpipeCliContext,
    output_format: &str,
) -> medpipe::Result<()> {
    let tracker = ctx.tracker()?;

    let mut config = ctx.config.clone();
    if args.skip_inference {
        config.inference.enabled = false;
    }
    if let Some(version) = args.model_version {
        config.inference.model_version = Some(version);
    }
    if let Some(experiment) = args.experiment {
        config.tracking.experiment_name = experiment;
    }
    medpipe::config::validate_config(&config)?;

    let report = build_pipeline(ctx, &config.pipeline).await?;
    let output_dir = args.output_dir.or_else(|| config.pipeline.output_dir.clone());
    write_package(&report, output_dir.as_deref())?;

    let outcome = run_workflow(tracker.as_ref(), &report.pipeline, &config, &ctx.registry).await?;

    if output_format == "json" {
        print_json(&serde_json::json!({
            "pipeline": report.summary(),
            "outcome": outcome,
        }));
    } else {
        print_build_summary(&report.summary());
        println!();
        print_outcome(&outcome);
    }

    Ok(())
}
