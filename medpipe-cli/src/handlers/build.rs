//! `build`: combine the source pipelines locally

use crate::args::BuildArgs;
use crate::context::MedpipeCliContext;
use crate::output::*;
use medpipe::config::PipelineConfig;
use medpipe::workflow::{BuildReport, build_combined_pipeline, load_sources};
use serde_json::json;
use tracing::info;

/// Load the sources and build the combined pipeline
pub async fn build_pipeline(
    ctx: &MedpipeCliContext,
    pipeline: &PipelineConfig,
) -> medpipe::Result<BuildReport> {
    let sources = load_sources(&ctx.config.sources, ctx.tracker.as_ref(), &ctx.registry).await?;
    build_combined_pipeline(sources, pipeline, &ctx.config.rulers.0, &ctx.registry)
}

/// Write the package when an output directory is given
pub fn write_package(report: &BuildReport, dir: Option<&std::path::Path>) -> medpipe::Result<()> {
    if let Some(dir) = dir {
        report.pipeline.to_disk(dir)?;
        info!(path = %dir.display(), "Wrote pipeline package");
    }
    Ok(())
}

pub async fn handle_build_command(
    args: BuildArgs,
    ctx: &MedpipeCliContext,
    output_format: &str,
) -> medpipe::Result<()> {
    let mut pipeline_config = ctx.config.pipeline.clone();
    if args.keep_static_vectors {
        pipeline_config.disable_static_vectors = false;
    }
    let output_dir = args.output_dir.or_else(|| pipeline_config.output_dir.clone());

    let report = build_pipeline(ctx, &pipeline_config).await?;
    write_package(&report, output_dir.as_deref())?;

    let entities = match &args.text {
        Some(text) => Some(report.pipeline.process(text)?.ents().to_vec()),
        None => None,
    };

    if output_format == "json" {
        print_json(&json!({
            "pipeline": report.summary(),
            "output_dir": output_dir,
            "entities": entities,
        }));
    } else {
        print_build_summary(&report.summary());
        if let Some(dir) = &output_dir {
            println!(
                "{}",
                format_success(&format!("Package written to {}", dir.display()))
            );
        }
        if let Some(entities) = &entities {
            println!();
            print_entities(entities);
        }
    }

    Ok(())
}
