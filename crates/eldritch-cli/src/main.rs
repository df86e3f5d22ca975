//! Eldritch CLI
//!
//! Main entry point for the `eldritch` binary.

use std::ffi::OsString;
use std::process::ExitCode;

use clap::error::ErrorKind;
use eldritch_common_config::ConfigError;
use eldritch_common_log::LogConfig;
use eldritch_core::{render, CommandLine, ContextError, ExitStatus, RuntimeContext};
use tracing::{debug, warn};

mod args;
mod error;
mod plugins;

use args::GlobalArgs;
use error::CliError;

fn main() -> ExitCode {
    let argv: Vec<OsString> = std::env::args_os().collect();
    let globals = GlobalArgs::from_args(&argv);

    init_tracing(&globals);

    match run(&globals, argv) {
        Ok(status) => status.into(),
        Err(e) => {
            debug!(code = e.code(), error = %e, "eldritch failed");
            error::report(&e);
            e.exit_code()
        }
    }
}

fn run(globals: &GlobalArgs, argv: Vec<OsString>) -> Result<ExitStatus, CliError> {
    let project_dir = globals.project_dir();
    debug!(project_dir = %project_dir.display(), "loading project");

    let ctx = match RuntimeContext::load(&project_dir, plugins::catalog()) {
        Ok(ctx) => ctx,
        Err(ContextError::Config(err @ ConfigError::NotFound { .. })) => {
            return without_project(argv, err);
        }
        Err(e) => return Err(e.into()),
    };

    Ok(ctx.run(argv)?)
}

/// Outside a project only `--help` and `--version` can be served.
fn without_project(argv: Vec<OsString>, err: ConfigError) -> Result<ExitStatus, CliError> {
    let mut command_line = CommandLine::new();
    command_line
        .add_command(render::command())
        .map_err(|e| CliError::from(ContextError::Plugin(e)))?;

    match command_line.root().clone().try_get_matches_from(argv) {
        Err(parse)
            if matches!(
                parse.kind(),
                ErrorKind::DisplayHelp
                    | ErrorKind::DisplayVersion
                    | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            ) =>
        {
            print!("{parse}");
            Ok(ExitStatus::SUCCESS)
        }
        _ => Err(ContextError::Config(err).into()),
    }
}

fn init_tracing(globals: &GlobalArgs) {
    let mut config = LogConfig::from_env();
    if let Some(level) = globals.log_level() {
        config = config.with_level(level);
    }
    if let Err(e) = eldritch_common_log::init(config) {
        warn!("{e}");
    }
}
