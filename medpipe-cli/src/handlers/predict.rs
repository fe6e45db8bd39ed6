//! `predict`: annotate text with a tracked model or a local package

use crate::args::PredictArgs;
use crate::context::MedpipeCliContext;
use crate::output::*;
use crate::utils::resolve_model_uri;
use medpipe::pipeline::load_package;
use medpipe::workflow::predict;
use serde_json::json;

pub async fn handle_predict_command(
    args: PredictArgs,
    ctx: &MedpipeCliContext,
    output_format: &str,
) -> medpipe::Result<()> {
    let text = args
        .text
        .unwrap_or_else(|| ctx.config.inference.text.clone());

    let (model, entities) = match &args.package {
        Some(dir) => {
            let pipeline = load_package(dir, &ctx.registry)?;
            let doc = pipeline.process(&text)?;
            (dir.display().to_string(), doc.ents().to_vec())
        }
        None => {
            let tracker = ctx.tracker()?;
            let uri = resolve_model_uri(&ctx.config, args.model.as_deref(), args.model_version)?;
            let entities = predict(tracker.as_ref(), &uri, &ctx.registry, &text).await?;
            (uri.to_string(), entities)
        }
    };

    if output_format == "json" {
        print_json(&json!({
            "model": model,
            "text": text,
            "entities": entities,
        }));
    } else {
        println!("{}", format_info(&format!("Model: {}", model)));
        print_entities(&entities);
    }

    Ok(())
}
