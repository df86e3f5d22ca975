//! The runtime context.
//!
//! A [`RuntimeContext`] is built once per `eldritch` invocation (or per test)
//! and aggregates everything the commands share: the parsed project file, the
//! console, the plugin dispatcher and the command-line root. Construction walks
//! a fixed sequence of states and either reaches [`ContextState::CommandLineReady`]
//! or fails without handing out the half-built value.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use eldritch_common_config::{
    ConfigLoader, EldritchConfig, ProjectInfo, PyProject, DEFAULT_LOCK_TIMEOUT,
};
use eldritch_common_log::spans;
use tracing::{debug, info_span};

use crate::command_line::{CommandLine, ExitStatus};
use crate::console::Console;
use crate::error::Result;
use crate::locate::{ContextRef, ContextScope};
use crate::plugin::{Hook, PluginCatalog, PluginManager};
use crate::project::ProjectDirs;
use crate::render;
use crate::scoped::{ContextComponent, ScopedRegistry};
use crate::templates::{TemplateEngine, TemplateError};

/// Identity of a runtime context.
///
/// Every context gets a fresh id, so two contexts built from the same project
/// file still compare unequal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

impl ContextId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Construction progress of a [`RuntimeContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ContextState {
    Uninitialized,
    ConfigLoaded,
    PluginsLoaded,
    CommandLineReady,
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::ConfigLoaded => "config-loaded",
            Self::PluginsLoaded => "plugins-loaded",
            Self::CommandLineReady => "command-line-ready",
        };
        f.write_str(name)
    }
}

/// Shared state of one Eldritch run.
///
/// Contexts are only ever handled through `Arc`. Helpers that need to find their
/// way back keep a [`ContextRef`] rather than a strong reference.
pub struct RuntimeContext {
    id: ContextId,
    project_dir: PathBuf,
    pyproject: PyProject,
    console: Console,
    plugins: PluginManager,
    command_line: Mutex<CommandLine>,
    state: Mutex<ContextState>,
    registry: &'static ScopedRegistry,
}

impl RuntimeContext {
    /// Start building a context for the project in `project_dir`.
    pub fn builder(project_dir: impl Into<PathBuf>) -> ContextBuilder {
        ContextBuilder::new(project_dir)
    }

    /// Build a context with default settings.
    pub fn load(project_dir: impl Into<PathBuf>, catalog: PluginCatalog) -> Result<Arc<Self>> {
        Self::builder(project_dir).catalog(catalog).build()
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn state(&self) -> ContextState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// The whole parsed `pyproject.toml`.
    pub fn pyproject(&self) -> &PyProject {
        &self.pyproject
    }

    /// `[tool.eldritch]`
    pub fn config(&self) -> &EldritchConfig {
        &self.pyproject.eldritch
    }

    /// Configured plugin module names, in load order.
    pub fn plugin_names(&self) -> &[String] {
        &self.pyproject.eldritch.plugins
    }

    /// `[tool.poetry]`
    pub fn project(&self) -> &ProjectInfo {
        &self.pyproject.project
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn plugins(&self) -> &PluginManager {
        &self.plugins
    }

    /// The command-line root. Plugins add their subcommands through this guard
    /// while `on_command_line_create` runs.
    pub fn command_line(&self) -> MutexGuard<'_, CommandLine> {
        self.command_line
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn dirs(&self) -> ProjectDirs {
        ProjectDirs::new(&self.project_dir)
    }

    /// A fresh template engine, preloaded with the built-in templates and with
    /// anything under `.project/templates` in the project.
    pub fn templates(&self) -> std::result::Result<TemplateEngine, TemplateError> {
        let mut engine = TemplateEngine::with_builtins()?;
        let project_templates = self.dirs().templates_dir();
        if project_templates.is_dir() {
            engine.load_from_dir(&project_templates)?;
        }
        Ok(engine)
    }

    /// The instance of `T` belonging to this context, built on first use.
    pub fn component<T: ContextComponent>(self: &Arc<Self>) -> Result<Arc<T>> {
        self.registry.get_or_create(self.id, || T::create(self))
    }

    /// Make this context the ambient one for the current thread until the
    /// returned guard drops.
    pub fn enter(self: &Arc<Self>) -> ContextScope {
        ContextScope::push(Arc::clone(self))
    }

    /// A non-owning handle to this context.
    pub fn downgrade(self: &Arc<Self>) -> ContextRef {
        ContextRef::new(self)
    }

    /// Parse `args` (program name first) and run the matching subcommand.
    pub fn run<I, T>(self: &Arc<Self>, args: I) -> Result<ExitStatus>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let span = spans::context_span(self.id.as_u64());
        let _span = span.enter();
        CommandLine::execute(self, args)
    }

    fn set_state(&self, state: ContextState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
        debug!(context = %self.id, %state, "runtime context state changed");
    }
}

impl Drop for RuntimeContext {
    fn drop(&mut self) {
        self.registry.reset(self.id);
    }
}

impl fmt::Debug for RuntimeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeContext")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("project_dir", &self.project_dir)
            .field("plugins", &self.plugins.keys())
            .finish_non_exhaustive()
    }
}

/// Builder for [`RuntimeContext`].
#[derive(Debug)]
pub struct ContextBuilder {
    project_dir: PathBuf,
    catalog: PluginCatalog,
    console: Option<Console>,
    pyproject: Option<PyProject>,
    lock_timeout: Duration,
    registry: &'static ScopedRegistry,
}

impl ContextBuilder {
    fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            catalog: PluginCatalog::new(),
            console: None,
            pyproject: None,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            registry: ScopedRegistry::global(),
        }
    }

    /// Plugin modules that configuration may name.
    pub fn catalog(mut self, catalog: PluginCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn console(mut self, console: Console) -> Self {
        self.console = Some(console);
        self
    }

    /// Use an already parsed project file instead of reading one from disk.
    pub fn pyproject(mut self, pyproject: PyProject) -> Self {
        self.pyproject = Some(pyproject);
        self
    }

    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Keep components in `registry` instead of the process-wide one.
    pub fn registry(mut self, registry: &'static ScopedRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Load configuration, load plugins, then let every plugin extend the
    /// command line. Any failure drops the partially built context.
    pub fn build(self) -> Result<Arc<RuntimeContext>> {
        let id = ContextId::next();
        let span = info_span!("context_build", context = %id);
        let _span = span.enter();
        debug!(state = %ContextState::Uninitialized, project_dir = %self.project_dir.display(), "building runtime context");

        let pyproject = match self.pyproject {
            Some(pyproject) => pyproject,
            None => ConfigLoader::new(&self.project_dir)
                .with_lock_timeout(self.lock_timeout)
                .load()?,
        };
        debug!(state = %ContextState::ConfigLoaded, plugins = ?pyproject.eldritch.plugins, "configuration loaded");

        let mut plugins = PluginManager::new(self.catalog);
        plugins.load_plugins(&pyproject.eldritch.plugins)?;
        debug!(state = %ContextState::PluginsLoaded, registered = plugins.len(), "plugins loaded");

        let mut command_line = CommandLine::new();
        command_line.add_command(render::command())?;

        let ctx = Arc::new(RuntimeContext {
            id,
            project_dir: self.project_dir,
            pyproject,
            console: self.console.unwrap_or_default(),
            plugins,
            command_line: Mutex::new(command_line),
            state: Mutex::new(ContextState::PluginsLoaded),
            registry: self.registry,
        });

        ctx.plugins.dispatch(Hook::OnCommandLineCreate, &ctx)?;
        ctx.set_state(ContextState::CommandLineReady);

        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContextError;
    use eldritch_common_config::ConfigError;
    use tempfile::tempdir;

    fn empty_project() -> PyProject {
        PyProject::default()
    }

    #[test]
    fn test_context_ids_are_unique() {
        let a = ContextId::next();
        let b = ContextId::next();
        assert_ne!(a, b);
        assert!(b > a);
        assert_eq!(format!("{a}"), format!("#{}", a.as_u64()));
    }

    #[test]
    fn test_empty_plugin_list_reaches_ready() {
        let ctx = RuntimeContext::builder("/nonexistent")
            .pyproject(empty_project())
            .build()
            .unwrap();

        assert_eq!(ctx.state(), ContextState::CommandLineReady);
        assert!(ctx.plugins().is_empty());
        assert_eq!(ctx.command_line().subcommand_names(), vec!["render".to_string()]);
    }

    #[test]
    fn test_identical_configuration_gives_distinct_contexts() {
        let a = RuntimeContext::builder("/p").pyproject(empty_project()).build().unwrap();
        let b = RuntimeContext::builder("/p").pyproject(empty_project()).build().unwrap();
        assert_ne!(a.id(), b.id());
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_missing_config_fails_construction() {
        let dir = tempdir().unwrap();
        let err = RuntimeContext::builder(dir.path()).build().unwrap_err();
        assert!(matches!(err, ContextError::Config(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_loads_config_from_disk() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("pyproject.toml"),
            "[tool.poetry]\nname = \"demo\"\n[tool.eldritch]\nplugins = []\n",
        )
        .unwrap();

        let ctx = RuntimeContext::builder(dir.path()).build().unwrap();
        assert_eq!(ctx.project().name, "demo");
        assert!(ctx.plugin_names().is_empty());
        assert_eq!(ctx.project_dir(), dir.path());
    }

    #[test]
    fn test_unknown_plugin_fails_construction() {
        let mut pyproject = empty_project();
        pyproject.eldritch.plugins = vec!["nonexistent.module".into()];

        let err = RuntimeContext::builder("/p").pyproject(pyproject).build().unwrap_err();
        match err {
            ContextError::Plugin(crate::plugin::PluginError::Load { module, .. }) => {
                assert_eq!(module, "nonexistent.module")
            }
            other => panic!("Expected plugin load error, got {other:?}"),
        }
    }

    #[test]
    fn test_dropping_context_clears_components() {
        struct Marker;
        impl ContextComponent for Marker {
            fn create(_ctx: &Arc<RuntimeContext>) -> Result<Self> {
                Ok(Marker)
            }
        }

        let ctx = RuntimeContext::builder("/p").pyproject(empty_project()).build().unwrap();
        let id = ctx.id();
        ctx.component::<Marker>().unwrap();
        assert!(ScopedRegistry::global().contains::<Marker>(id));

        drop(ctx);
        assert!(!ScopedRegistry::global().contains::<Marker>(id));
    }
}
