//! Plugin loading and hook dispatch through a full context build.

use std::sync::{Arc, Mutex};

use eldritch_core::clap::Command;
use eldritch_core::{
    CommandGroup, CommandSpec, ContextError, ContextState, EldritchPlugin, ExitStatus,
    PluginCatalog, PluginError, PluginModule, RuntimeContext,
};
use eldritch_test_utils::{assert_err, assert_ok, TempProject};

type Calls = Arc<Mutex<Vec<String>>>;

/// Records its hook call and optionally fails.
struct Recorder {
    name: &'static str,
    calls: Calls,
    fail: bool,
}

impl EldritchPlugin for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn on_command_line_create(&self, ctx: &Arc<RuntimeContext>) -> anyhow::Result<()> {
        assert_eq!(ctx.state(), ContextState::PluginsLoaded);
        self.calls.lock().unwrap().push(self.name.to_string());
        if self.fail {
            anyhow::bail!("{} refused", self.name);
        }
        Ok(())
    }
}

struct RecorderModule {
    exports: Vec<(&'static str, bool)>,
    calls: Calls,
}

impl PluginModule for RecorderModule {
    fn load(&self) -> anyhow::Result<Vec<Box<dyn EldritchPlugin>>> {
        Ok(self
            .exports
            .iter()
            .map(|&(name, fail)| {
                Box::new(Recorder {
                    name,
                    calls: Arc::clone(&self.calls),
                    fail,
                }) as Box<dyn EldritchPlugin>
            })
            .collect())
    }
}

/// Adds a `license` group with `list` and `use`.
struct LicenseLike;

impl EldritchPlugin for LicenseLike {
    fn name(&self) -> &str {
        "LicensePlugin"
    }

    fn on_command_line_create(&self, ctx: &Arc<RuntimeContext>) -> anyhow::Result<()> {
        let group = CommandGroup::new("license", "Manage the project license")
            .command(CommandSpec::new(Command::new("list"), |ctx, _| {
                ctx.console().println("Available licenses:")?;
                Ok(ExitStatus::SUCCESS)
            }))
            .command(CommandSpec::new(Command::new("use"), |_, _| Ok(ExitStatus::SUCCESS)));
        ctx.command_line().add_group(group)?;
        Ok(())
    }
}

struct LicenseLikeModule;

impl PluginModule for LicenseLikeModule {
    fn load(&self) -> anyhow::Result<Vec<Box<dyn EldritchPlugin>>> {
        Ok(vec![Box::new(LicenseLike)])
    }
}

fn catalog(calls: &Calls) -> PluginCatalog {
    PluginCatalog::new()
        .with_module(
            "a",
            RecorderModule {
                exports: vec![("ModA", false)],
                calls: Arc::clone(calls),
            },
        )
        .with_module(
            "b",
            RecorderModule {
                exports: vec![("ModB", false)],
                calls: Arc::clone(calls),
            },
        )
        .with_module(
            "failing",
            RecorderModule {
                exports: vec![("First", false), ("Broken", true), ("Never", false)],
                calls: Arc::clone(calls),
            },
        )
        .with_module("license_plugin", LicenseLikeModule)
}

#[test]
fn hooks_run_in_configured_order() {
    let calls = Calls::default();
    let project = TempProject::with_plugins(&["a", "b"]);

    let ctx = assert_ok!(RuntimeContext::load(project.path(), catalog(&calls)));
    assert_eq!(*calls.lock().unwrap(), vec!["ModA", "ModB"]);
    assert_eq!(ctx.plugins().keys(), vec!["a.ModA", "b.ModB"]);

    let calls = Calls::default();
    let project = TempProject::with_plugins(&["b", "a"]);
    assert_ok!(RuntimeContext::load(project.path(), catalog(&calls)));
    assert_eq!(*calls.lock().unwrap(), vec!["ModB", "ModA"]);
}

#[test]
fn nonexistent_module_fails_construction() {
    let calls = Calls::default();
    let project = TempProject::with_plugins(&["nonexistent.module"]);

    let err = assert_err!(RuntimeContext::load(project.path(), catalog(&calls)));
    match err {
        ContextError::Plugin(PluginError::Load { module, .. }) => assert_eq!(module, "nonexistent.module"),
        other => panic!("Expected PluginError::Load, got {other:?}"),
    }
    assert!(calls.lock().unwrap().is_empty());
}

#[test]
fn empty_plugin_list_only_has_builtins() {
    let calls = Calls::default();
    let project = TempProject::with_plugins(&[]);

    let ctx = assert_ok!(RuntimeContext::load(project.path(), catalog(&calls)));
    assert_eq!(ctx.state(), ContextState::CommandLineReady);
    assert_eq!(ctx.command_line().subcommand_names(), vec!["render".to_string()]);
}

#[test]
fn plugin_attaches_license_group() {
    let calls = Calls::default();
    let project = TempProject::with_plugins(&["license_plugin"]);

    let ctx = assert_ok!(RuntimeContext::load(project.path(), catalog(&calls)));
    let command_line = ctx.command_line();
    assert!(command_line.subcommand_names().contains(&"license".to_string()));
    assert!(command_line.find(&["license", "list"]).is_some());
    assert!(command_line.find(&["license", "use"]).is_some());
    assert_eq!(ctx.plugins().keys(), vec!["license_plugin.LicensePlugin"]);
}

#[test]
fn failing_hook_aborts_dispatch_and_construction() {
    let calls = Calls::default();
    let project = TempProject::with_plugins(&["failing"]);

    let err = assert_err!(RuntimeContext::load(project.path(), catalog(&calls)));
    match err {
        ContextError::Plugin(PluginError::HookExecution { plugin_key, source, .. }) => {
            assert_eq!(plugin_key, "failing.Broken");
            assert!(source.to_string().contains("Broken refused"));
        }
        other => panic!("Expected HookExecution, got {other:?}"),
    }
    // Earlier hooks ran, later ones never did.
    assert_eq!(*calls.lock().unwrap(), vec!["First", "Broken"]);
}

#[test]
fn same_module_listed_twice_is_a_duplicate() {
    let calls = Calls::default();
    let project = TempProject::with_plugins(&["a", "a"]);

    let err = assert_err!(RuntimeContext::load(project.path(), catalog(&calls)));
    assert!(matches!(
        err,
        ContextError::Plugin(PluginError::Duplicate { ref key }) if key == "a.ModA"
    ));
}

#[test]
fn command_conflict_surfaces_as_hook_failure() {
    struct Squatter;
    impl EldritchPlugin for Squatter {
        fn name(&self) -> &str {
            "Squatter"
        }
        fn on_command_line_create(&self, ctx: &Arc<RuntimeContext>) -> anyhow::Result<()> {
            ctx.command_line()
                .add_command(CommandSpec::new(Command::new("render"), |_, _| Ok(ExitStatus::SUCCESS)))?;
            Ok(())
        }
    }
    struct SquatterModule;
    impl PluginModule for SquatterModule {
        fn load(&self) -> anyhow::Result<Vec<Box<dyn EldritchPlugin>>> {
            Ok(vec![Box::new(Squatter)])
        }
    }

    let project = TempProject::with_plugins(&["squat"]);
    let catalog = PluginCatalog::new().with_module("squat", SquatterModule);

    let err = assert_err!(RuntimeContext::load(project.path(), catalog));
    match err {
        ContextError::Plugin(PluginError::HookExecution { plugin_key, source, .. }) => {
            assert_eq!(plugin_key, "squat.Squatter");
            assert!(matches!(
                source.downcast_ref::<PluginError>(),
                Some(PluginError::CommandConflict { name }) if name == "render"
            ));
        }
        other => panic!("Expected HookExecution, got {other:?}"),
    }
}

#[test]
fn plugin_commands_run_through_the_context() {
    let (console, buffer) = eldritch_core::Console::buffered();
    let calls = Calls::default();
    let project = TempProject::with_plugins(&["license_plugin"]);

    let ctx = assert_ok!(RuntimeContext::builder(project.path())
        .catalog(catalog(&calls))
        .console(console)
        .build());

    let status = assert_ok!(ctx.run(["eldritch", "license", "list"]));
    assert_eq!(status, ExitStatus::SUCCESS);
    assert_eq!(buffer.contents(), "Available licenses:\n");
}
