//! Options read before the runtime context exists.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use eldritch_common_config::Environment;
use eldritch_common_log::LogLevel;

/// Global flags, picked out of the command line ahead of the full parse.
///
/// Logging and the project directory have to be known before plugins load,
/// so this pass tolerates everything it does not recognise. It stops at the
/// first subcommand; the full parse rejects these flags past that point.
#[derive(Debug, Default, Parser)]
#[command(
    name = "eldritch",
    disable_help_flag = true,
    disable_version_flag = true,
    ignore_errors = true,
    allow_external_subcommands = true
)]
pub struct GlobalArgs {
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short, long)]
    pub quiet: bool,

    #[arg(long, value_name = "DIR")]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    rest: Option<Rest>,
}

#[derive(Debug, Subcommand)]
enum Rest {
    #[command(external_subcommand)]
    Command(Vec<OsString>),
}

impl GlobalArgs {
    pub fn from_args(args: &[OsString]) -> Self {
        Self::try_parse_from(args).unwrap_or_default()
    }

    /// `--project-dir`, else `ELDRITCH_PROJECT_DIR`, else the working directory.
    pub fn project_dir(&self) -> PathBuf {
        self.project_dir.clone().unwrap_or_else(Environment::project_dir)
    }

    /// Level requested by `-v`/`-q`, if either was given.
    pub fn log_level(&self) -> Option<LogLevel> {
        (self.verbose > 0 || self.quiet).then(|| LogLevel::from_verbosity(self.verbose, self.quiet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> GlobalArgs {
        let args: Vec<OsString> = args.iter().map(OsString::from).collect();
        GlobalArgs::from_args(&args)
    }

    #[test]
    fn test_flags_before_subcommand() {
        let args = parse(&["eldritch", "-vv", "--project-dir", "/tmp/p", "license", "list"]);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.project_dir, Some(PathBuf::from("/tmp/p")));
        assert_eq!(args.log_level(), Some(LogLevel::Debug));
    }

    #[test]
    fn test_quiet() {
        let args = parse(&["eldritch", "-q", "render", "--all"]);
        assert!(args.quiet);
        assert_eq!(args.log_level(), Some(LogLevel::Error));
    }

    #[test]
    fn test_no_flags_leaves_level_to_environment() {
        let args = parse(&["eldritch", "render", "--all"]);
        assert_eq!(args.log_level(), None);
        assert!(args.project_dir.is_none());
    }

    #[test]
    fn test_flags_after_subcommand_are_left_to_the_full_parse() {
        let args = parse(&["eldritch", "license", "use", "--project-dir", "/elsewhere", "-v"]);
        assert!(args.project_dir.is_none());
        assert_eq!(args.log_level(), None);
    }

    #[test]
    fn test_unknown_options_are_tolerated() {
        let args = parse(&["eldritch", "--help"]);
        assert_eq!(args.verbose, 0);
        let args = parse(&["eldritch", "--version"]);
        assert!(!args.quiet);
    }
}
