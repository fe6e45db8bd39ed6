pub mod args;
pub mod commands;
pub mod context;
pub mod handlers;
pub mod output;
pub mod utils;

pub use commands::{Cli, Commands};
pub use context::MedpipeCliContext;
pub use output::{
    CliColors, error_code, format_error, format_info, format_success, format_warning,
    output_error, print_build_summary, print_entities, print_experiment, print_json,
    print_outcome, print_runs,
};
pub use utils::{output_format, resolve_model_uri};
