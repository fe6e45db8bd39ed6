use colored::*;
use medpipe::MedpipeError;
use medpipe::pipeline::Entity;
use medpipe::tracking::{Experiment, Run};
use medpipe::workflow::{BuildSummary, WorkflowOutcome};
use serde::Serialize;
use serde_json::json;

use crate::utils::truncate;

pub struct CliColors;

impl CliColors {
    pub fn success() -> Color {
        Color::TrueColor {
            r: 34,
            g: 197,
            b: 94,
        }
    }

    pub fn error() -> Color {
        Color::TrueColor {
            r: 239,
            g: 68,
            b: 68,
        }
    }

    pub fn warning() -> Color {
        Color::TrueColor {
            r: 245,
            g: 158,
            b: 11,
        }
    }

    pub fn info() -> Color {
        Color::TrueColor {
            r: 59,
            g: 130,
            b: 246,
        }
    }

    pub fn entity() -> Color {
        Color::TrueColor {
            r: 245,
            g: 158,
            b: 11,
        }
    }

    pub fn muted() -> Color {
        Color::TrueColor {
            r: 148,
            g: 163,
            b: 184,
        }
    }

    pub fn primary() -> Color {
        Color::White
    }

    pub fn accent() -> Color {
        Color::TrueColor {
            r: 59,
            g: 130,
            b: 246,
        }
    }
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    );
}

/// Stable code for each error kind in JSON output
pub fn error_code(error: &MedpipeError) -> &'static str {
    match error {
        MedpipeError::Pipeline(_) => "PIPELINE_ERROR",
        MedpipeError::Tracking(e) if e.is_not_found() => "NOT_FOUND",
        MedpipeError::Tracking(_) => "TRACKING_ERROR",
        MedpipeError::Configuration(_) => "CONFIGURATION_ERROR",
        MedpipeError::Logging(_) => "LOGGING_ERROR",
        MedpipeError::Io(_) => "IO_ERROR",
        MedpipeError::Other(_) => "OTHER_ERROR",
    }
}

/// Report a fatal error on stderr in the selected format
pub fn output_error(error: &MedpipeError, output_format: &str) {
    if output_format == "json" {
        let mut error_response = json!({
            "error": true,
            "code": error_code(error),
            "message": error.to_string(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        if let MedpipeError::Tracking(e) = error
            && let Some(code) = e.code()
        {
            error_response["details"] = json!({ "error_code": code });
        }
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&error_response).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        eprintln!("{}", format_error(&error.to_string()));
    }
}

pub fn format_success(msg: &str) -> String {
    format!(
        "{} {}",
        "✓".color(CliColors::success()).bold(),
        msg.color(CliColors::success())
    )
}

pub fn format_error(msg: &str) -> String {
    format!(
        "{} {}",
        "✗".color(CliColors::error()).bold(),
        msg.color(CliColors::error())
    )
}

pub fn format_warning(msg: &str) -> String {
    format!(
        "{} {}",
        "⚠".color(CliColors::warning()).bold(),
        msg.color(CliColors::warning())
    )
}

pub fn format_info(msg: &str) -> String {
    format!(
        "{} {}",
        "ℹ".color(CliColors::info()).bold(),
        msg.color(CliColors::info())
    )
}

fn field(name: &str, value: impl std::fmt::Display) {
    println!("{}: {}", name.color(CliColors::muted()), value);
}

fn format_millis(millis: Option<i64>) -> String {
    millis
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn print_build_summary(summary: &BuildSummary) {
    println!(
        "{}",
        "━━━ Combined Pipeline ━━━".color(CliColors::accent()).bold()
    );
    field("Name", summary.name.color(CliColors::accent()).bold());
    field("Language", &summary.lang);
    field(
        "Components",
        summary.components.join(" → ").color(CliColors::primary()),
    );
    if !summary.rulers_added.is_empty() {
        field("Rulers added", summary.rulers_added.join(", "));
    }
    field(
        "Static vectors",
        if summary.static_vectors_disabled {
            "disabled".color(CliColors::warning())
        } else {
            "unchanged".color(CliColors::muted())
        },
    );
    for skipped in &summary.skipped {
        println!(
            "{}",
            format_warning(&format!(
                "Skipped '{}' from {} (kept from {})",
                skipped.name, skipped.source, skipped.kept_from
            ))
        );
    }
}

pub fn print_entities(entities: &[Entity]) {
    if entities.is_empty() {
        println!("{}", format_info("No entities found."));
        return;
    }

    println!(
        "{}",
        format_info(&format!("Found {} entities:", entities.len()))
    );
    println!();
    println!(
        "{:<40} {:<12} {:<12} {:<16} {}",
        "Text".color(CliColors::muted()).bold(),
        "Label".color(CliColors::muted()).bold(),
        "Span".color(CliColors::muted()).bold(),
        "Source".color(CliColors::muted()).bold(),
        "Conf".color(CliColors::muted()).bold()
    );
    println!("{}", "─".repeat(90).color(CliColors::muted()));

    for ent in entities {
        println!(
            "{:<40} {:<12} {:<12} {:<16} {:.2}",
            truncate(&ent.text, 40),
            ent.label.color(CliColors::entity()),
            format!("{}..{}", ent.start_char, ent.end_char),
            ent.source.color(CliColors::muted()),
            ent.confidence
        );
    }
}

pub fn print_experiment(experiment: &Experiment) {
    println!(
        "{}",
        "━━━ Experiment ━━━".color(CliColors::accent()).bold()
    );
    field("ID", experiment.experiment_id.color(CliColors::accent()).bold());
    field("Name", &experiment.name);
    field(
        "Artifact location",
        experiment.artifact_location.as_deref().unwrap_or("-"),
    );
    field(
        "Lifecycle stage",
        experiment.lifecycle_stage.as_deref().unwrap_or("-"),
    );
    field("Created", format_millis(experiment.creation_time));
    if !experiment.tags.is_empty() {
        let tags = experiment
            .tags
            .iter()
            .filter(|(k, _)| !k.starts_with("mlflow."))
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");
        field("Tags", tags.color(CliColors::info()));
    }
}

pub fn print_runs(runs: &[Run]) {
    if runs.is_empty() {
        println!("{}", format_info("No runs found."));
        return;
    }

    println!("{}", format_info(&format!("Found {} runs:", runs.len())));
    println!();
    println!(
        "{:<34} {:<10} {:<24} {}",
        "Run ID".color(CliColors::muted()).bold(),
        "Status".color(CliColors::muted()).bold(),
        "Started".color(CliColors::muted()).bold(),
        "Params".color(CliColors::muted()).bold()
    );
    println!("{}", "─".repeat(90).color(CliColors::muted()));

    for run in runs {
        let params = run
            .data
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "{:<34} {:<10} {:<24} {}",
            run.info.run_id.color(CliColors::accent()),
            run.info.status.to_string(),
            format_millis(run.info.start_time),
            truncate(&params, 40)
        );
    }
}

pub fn print_outcome(outcome: &WorkflowOutcome) {
    println!("{}", format_success("Run finished"));
    field("Experiment", &outcome.experiment_id);
    field("Run", outcome.run_id.color(CliColors::accent()));
    field("Model", &outcome.model_uri);
    match &outcome.registered {
        Some(version) => field(
            "Registered",
            format!("{} v{}", version.name, version.version).color(CliColors::success()),
        ),
        None => field("Registered", "no".color(CliColors::error())),
    }
    for error in &outcome.errors {
        println!("{}", format_warning(error));
    }
    if let Some(predictions) = &outcome.predictions {
        println!();
        print_entities(predictions);
    }
    if let Some(experiment) = &outcome.experiment {
        println!();
        print_experiment(experiment);
    }
}
