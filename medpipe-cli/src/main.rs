use clap::{CommandFactory, Parser};
use medpipe::config::{LogLevel, load_config};
use medpipe_cli::handlers::*;
use medpipe_cli::{Cli, Commands, MedpipeCliContext, output_error, output_format};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let output = output_format(cli.machine, &cli.output);

    let runtime = match medpipe::runtime::create_runtime() {
        Ok(runtime) => runtime,
        Err(e) => {
            output_error(&medpipe::MedpipeError::from(e), &output);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli, &output)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output_error(&e, &output);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, output: &str) -> medpipe::Result<()> {
    match cli.command {
        Commands::Version => {
            println!("medpipe-cli v{}", medpipe::VERSION);
            return Ok(());
        }
        Commands::Completions(args) => {
            let mut command = Cli::command();
            clap_complete::generate(args.shell, &mut command, "medpipe-cli", &mut std::io::stdout());
            return Ok(());
        }
        _ => {}
    }

    let mut config = load_config(cli.config.as_deref())?;

    // Machine mode keeps stdout clean for JSON
    let quiet = cli.quiet
        || cli.machine
        || std::env::var("MEDPIPE_QUIET")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
    if quiet {
        config.logging.level = LogLevel::Error;
    } else if cli.verbose {
        config.logging.level = LogLevel::Debug;
    }
    if output == "json" {
        config.logging.stdout = false;
    }
    let _log_guard = medpipe::logging::init(&config.logging)?;

    let ctx = MedpipeCliContext::new(config)?;

    match cli.command {
        Commands::Run(args) => handle_run_command(args, &ctx, output).await,
        Commands::Build(args) => handle_build_command(args, &ctx, output).await,
        Commands::Predict(args) => handle_predict_command(args, &ctx, output).await,
        Commands::Runs(args) => handle_runs_command(args, &ctx, output).await,
        Commands::Experiment(args) => handle_experiment_command(args, &ctx, output).await,
        Commands::Version | Commands::Completions(_) => Ok(()),
    }
}
