//! The `eldritch` command-line root.
//!
//! Built-in commands and plugins attach subcommands here while the context is
//! being built. Each leaf command carries a handler that runs with the context
//! entered.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use clap::error::ErrorKind;
use clap::{Arg, ArgAction, ArgMatches, Command};
use eldritch_common_log::spans;
use tracing::debug;

use crate::context::RuntimeContext;
use crate::error::{ContextError, Result};
use crate::plugin::PluginError;

/// Process exit status returned by command handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitStatus(u8);

impl ExitStatus {
    pub const SUCCESS: Self = Self(0);
    pub const FAILURE: Self = Self(1);
    pub const CONFIG: Self = Self(2);
    pub const IO: Self = Self(3);
    pub const PLUGIN: Self = Self(4);
    pub const USAGE: Self = Self(5);
    pub const TEMPLATE: Self = Self(6);

    pub const fn new(code: u8) -> Self {
        Self(code)
    }

    pub const fn code(self) -> u8 {
        self.0
    }

    pub const fn is_success(self) -> bool {
        self.0 == 0
    }
}

impl From<ExitStatus> for std::process::ExitCode {
    fn from(status: ExitStatus) -> Self {
        std::process::ExitCode::from(status.0)
    }
}

/// Runs one leaf command.
pub type CommandHandler =
    Arc<dyn Fn(&Arc<RuntimeContext>, &ArgMatches) -> anyhow::Result<ExitStatus> + Send + Sync>;

/// A leaf command: its clap definition plus the handler that runs it.
#[derive(Clone)]
pub struct CommandSpec {
    command: Command,
    handler: CommandHandler,
}

impl CommandSpec {
    pub fn new<F>(command: Command, handler: F) -> Self
    where
        F: Fn(&Arc<RuntimeContext>, &ArgMatches) -> anyhow::Result<ExitStatus> + Send + Sync + 'static,
    {
        Self {
            command,
            handler: Arc::new(handler),
        }
    }

    pub fn name(&self) -> &str {
        self.command.get_name()
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec").field("name", &self.name()).finish_non_exhaustive()
    }
}

/// A named group of leaf commands, e.g. `license list` / `license use`.
#[derive(Debug, Clone)]
pub struct CommandGroup {
    name: String,
    about: String,
    commands: Vec<CommandSpec>,
}

impl CommandGroup {
    pub fn new(name: impl Into<String>, about: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            about: about.into(),
            commands: Vec::new(),
        }
    }

    /// Append a command; commands keep their insertion order in help output.
    pub fn command(mut self, spec: CommandSpec) -> Self {
        self.commands.push(spec);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Root command plus handlers keyed by their space-separated path.
#[derive(Clone)]
pub struct CommandLine {
    root: Command,
    handlers: BTreeMap<String, CommandHandler>,
}

impl CommandLine {
    pub fn new() -> Self {
        let root = Command::new("eldritch")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Welcome to Eldritch!")
            .arg_required_else_help(true)
            .subcommand_required(true)
            .args(global_args());
        Self {
            root,
            handlers: BTreeMap::new(),
        }
    }

    /// Attach a top-level command.
    pub fn add_command(&mut self, spec: CommandSpec) -> std::result::Result<(), PluginError> {
        self.ensure_free(spec.name())?;
        debug!(command = spec.name(), "command attached");
        self.handlers.insert(spec.name().to_string(), spec.handler);
        self.root = std::mem::take(&mut self.root).subcommand(spec.command);
        Ok(())
    }

    /// Attach a group of commands under one name.
    pub fn add_group(&mut self, group: CommandGroup) -> std::result::Result<(), PluginError> {
        self.ensure_free(&group.name)?;

        let mut parent = Command::new(group.name.clone())
            .about(group.about)
            .subcommand_required(true)
            .arg_required_else_help(true);
        let mut handlers = BTreeMap::new();
        for spec in group.commands {
            let path = format!("{} {}", group.name, spec.name());
            if handlers.insert(path, spec.handler).is_some() {
                return Err(PluginError::CommandConflict {
                    name: format!("{} {}", group.name, spec.command.get_name()),
                });
            }
            parent = parent.subcommand(spec.command);
        }

        debug!(group = %group.name, commands = handlers.len(), "command group attached");
        self.handlers.extend(handlers);
        self.root = std::mem::take(&mut self.root).subcommand(parent);
        Ok(())
    }

    /// Top-level subcommand names, in attachment order.
    pub fn subcommand_names(&self) -> Vec<String> {
        self.root
            .get_subcommands()
            .map(|c| c.get_name().to_string())
            .collect()
    }

    /// Find a (nested) subcommand by path, e.g. `&["license", "list"]`.
    pub fn find(&self, path: &[&str]) -> Option<&Command> {
        path.iter()
            .try_fold(&self.root, |command, name| command.find_subcommand(name))
            .filter(|_| !path.is_empty())
    }

    pub fn has_handler(&self, path: &str) -> bool {
        self.handlers.contains_key(path)
    }

    pub fn root(&self) -> &Command {
        &self.root
    }

    /// Rendered `--help` text for the root.
    pub fn render_help(&self) -> String {
        self.root.clone().render_help().to_string()
    }

    /// Parse `args` against the context's root and run the matched handler.
    pub(crate) fn execute<I, T>(ctx: &Arc<RuntimeContext>, args: I) -> Result<ExitStatus>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        // Parsing and the handler run without the lock held.
        let snapshot = ctx.command_line().clone();

        let matches = match snapshot.root.try_get_matches_from(args) {
            Ok(matches) => matches,
            Err(err) => return report_parse_error(ctx, &err),
        };

        let (path, leaf) = resolve(&matches);
        let handler = snapshot
            .handlers
            .get(&path)
            .ok_or_else(|| ContextError::UnknownCommand { path: path.clone() })?;

        let span = spans::command_span(&path);
        let _span = span.enter();
        let _scope = ctx.enter();

        debug!(command = %path, "running command");
        handler(ctx, leaf).map_err(|source| ContextError::Command { path, source })
    }

    fn ensure_free(&self, name: &str) -> std::result::Result<(), PluginError> {
        let taken = self
            .root
            .get_subcommands()
            .any(|c| c.get_name() == name || c.get_all_aliases().any(|a| a == name));
        if taken {
            return Err(PluginError::CommandConflict { name: name.to_string() });
        }
        Ok(())
    }
}

impl Default for CommandLine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandLine")
            .field("subcommands", &self.subcommand_names())
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Options of the root command, accepted only before the subcommand.
///
/// The binary reads them before the context exists, so a copy placed after
/// the subcommand would be ignored; clap rejects it as a usage error instead.
pub fn global_args() -> [Arg; 3] {
    [
        Arg::new("verbose")
            .short('v')
            .long("verbose")
            .action(ArgAction::Count)
            .help("Increase log verbosity (-v, -vv, -vvv)"),
        Arg::new("quiet")
            .short('q')
            .long("quiet")
            .action(ArgAction::SetTrue)
            .help("Only log errors"),
        Arg::new("project_dir")
            .long("project-dir")
            .value_name("DIR")
            .value_parser(clap::value_parser!(PathBuf))
            .help("Project directory (defaults to ELDRITCH_PROJECT_DIR or the working directory)"),
    ]
}

/// Walk to the deepest matched subcommand.
fn resolve(matches: &ArgMatches) -> (String, &ArgMatches) {
    let mut path = Vec::new();
    let mut current = matches;
    while let Some((name, sub)) = current.subcommand() {
        path.push(name);
        current = sub;
    }
    (path.join(" "), current)
}

fn report_parse_error(ctx: &RuntimeContext, err: &clap::Error) -> Result<ExitStatus> {
    let rendered = err.render().to_string();
    match err.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
            ctx.console().print(&rendered)?;
            Ok(ExitStatus::SUCCESS)
        }
        _ => {
            ctx.console().eprint(&rendered)?;
            Ok(ExitStatus::USAGE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::Console;
    use eldritch_common_config::PyProject;

    fn noop(_ctx: &Arc<RuntimeContext>, _matches: &ArgMatches) -> anyhow::Result<ExitStatus> {
        Ok(ExitStatus::SUCCESS)
    }

    fn group() -> CommandGroup {
        CommandGroup::new("license", "Manage the project license")
            .command(CommandSpec::new(Command::new("list"), noop))
            .command(CommandSpec::new(Command::new("use"), noop))
    }

    #[test]
    fn test_group_registers_nested_handlers() {
        let mut cli = CommandLine::new();
        cli.add_group(group()).unwrap();

        assert_eq!(cli.subcommand_names(), vec!["license".to_string()]);
        assert!(cli.find(&["license", "list"]).is_some());
        assert!(cli.find(&["license", "use"]).is_some());
        assert!(cli.find(&["license", "nope"]).is_none());
        assert!(cli.find(&[]).is_none());
        assert!(cli.has_handler("license list"));
        assert!(cli.has_handler("license use"));
    }

    #[test]
    fn test_name_conflicts_are_rejected() {
        let mut cli = CommandLine::new();
        cli.add_group(group()).unwrap();

        let err = cli.add_group(group()).unwrap_err();
        assert!(matches!(err, PluginError::CommandConflict { ref name } if name == "license"));

        let err = cli
            .add_command(CommandSpec::new(Command::new("license"), noop))
            .unwrap_err();
        assert!(matches!(err, PluginError::CommandConflict { .. }));
    }

    #[test]
    fn test_duplicate_command_in_group() {
        let mut cli = CommandLine::new();
        let twice = CommandGroup::new("g", "")
            .command(CommandSpec::new(Command::new("x"), noop))
            .command(CommandSpec::new(Command::new("x"), noop));
        let err = cli.add_group(twice).unwrap_err();
        assert!(matches!(err, PluginError::CommandConflict { ref name } if name == "g x"));
        assert!(cli.subcommand_names().is_empty());
    }

    #[test]
    fn test_exit_status_codes() {
        assert_eq!(ExitStatus::SUCCESS.code(), 0);
        assert!(ExitStatus::SUCCESS.is_success());
        assert_eq!(ExitStatus::USAGE.code(), 5);
        assert!(!ExitStatus::new(7).is_success());
    }

    #[test]
    fn test_help_text_lists_commands() {
        let mut cli = CommandLine::new();
        cli.add_group(group()).unwrap();
        let help = cli.render_help();
        assert!(help.contains("Welcome to Eldritch!"));
        assert!(help.contains("license"));
    }

    fn context() -> (Arc<RuntimeContext>, crate::console::ConsoleBuffer) {
        let (console, buffer) = Console::buffered();
        let ctx = RuntimeContext::builder("/project")
            .pyproject(PyProject::default())
            .console(console)
            .build()
            .unwrap();
        (ctx, buffer)
    }

    #[test]
    fn test_run_help_and_usage_errors() {
        let (ctx, buffer) = context();

        assert_eq!(ctx.run(["eldritch", "--help"]).unwrap(), ExitStatus::SUCCESS);
        assert!(buffer.contents().contains("Usage"));

        assert_eq!(ctx.run(["eldritch", "no-such-command"]).unwrap(), ExitStatus::USAGE);
        assert!(buffer.errors().contains("no-such-command"));
    }

    #[test]
    fn test_run_dispatches_to_handler_with_scope() {
        let (ctx, _buffer) = context();
        ctx.command_line()
            .add_command(CommandSpec::new(
                Command::new("exit-with").arg(Arg::new("value").required(true)),
                |ctx, matches| {
                    let ambient = crate::locate::current().ok_or_else(|| anyhow::anyhow!("no scope"))?;
                    anyhow::ensure!(Arc::ptr_eq(&ambient, ctx), "wrong scope");
                    let value = matches.get_one::<String>("value").cloned().unwrap_or_default();
                    Ok(ExitStatus::new(value.parse()?))
                },
            ))
            .unwrap();

        assert_eq!(ctx.run(["eldritch", "-v", "exit-with", "7"]).unwrap(), ExitStatus::new(7));

        let err = ctx.run(["eldritch", "exit-with", "not-a-number"]).unwrap_err();
        assert!(matches!(err, ContextError::Command { ref path, .. } if path == "exit-with"));
    }

    #[test]
    fn test_root_options_after_subcommand_are_rejected() {
        let (ctx, buffer) = context();
        ctx.command_line()
            .add_command(CommandSpec::new(Command::new("touch"), noop))
            .unwrap();

        assert_eq!(
            ctx.run(["eldritch", "--project-dir", "/elsewhere", "-q", "touch"]).unwrap(),
            ExitStatus::SUCCESS
        );

        assert_eq!(
            ctx.run(["eldritch", "touch", "--project-dir", "/elsewhere"]).unwrap(),
            ExitStatus::USAGE
        );
        assert!(buffer.errors().contains("--project-dir"));

        assert_eq!(ctx.run(["eldritch", "touch", "-v"]).unwrap(), ExitStatus::USAGE);
        assert_eq!(ctx.run(["eldritch", "touch", "--quiet"]).unwrap(), ExitStatus::USAGE);
    }
}
