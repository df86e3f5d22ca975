//! Rendering project files from templates.
//!
//! Each [`RenderEntry`] maps a template to a destination inside the project.
//! Templates see a [`RenderContext`]: the `.project/metadata.toml` table as
//! `metadata`, `[tool.poetry]` as `project` and the configured plugin list as
//! `plugins`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::builder::PossibleValuesParser;
use clap::{Arg, ArgAction, ArgMatches, Command};
use eldritch_common_config::ProjectInfo;
use serde::Serialize;
use tracing::info;

use crate::command_line::{CommandSpec, ExitStatus};
use crate::context::RuntimeContext;
use crate::error::ContextError;
use crate::locate::{ContextBound, ContextRef};
use crate::scoped::ContextComponent;
use crate::templates::TemplateError;

/// Rendering errors
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid metadata in {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    #[error("unknown file `{name}`; expected one of: {}", .known.join(", "))]
    UnknownEntry { name: String, known: Vec<String> },

    #[error(transparent)]
    Context(#[from] ContextError),
}

/// Variables available to templates.
#[derive(Debug, Clone, Serialize)]
pub struct RenderContext {
    pub metadata: serde_json::Value,
    pub project: ProjectInfo,
    pub plugins: Vec<String>,
}

impl RenderContext {
    /// Collect the variables for `ctx`, creating default metadata if the
    /// project has none.
    pub fn load(ctx: &RuntimeContext) -> Result<Self, RenderError> {
        let path = ctx.dirs().metadata_path().map_err(|source| RenderError::Io {
            path: ctx.dirs().root().join(crate::project::DOT_PROJECT),
            source,
        })?;
        let content = std::fs::read_to_string(&path).map_err(|source| RenderError::Io {
            path: path.clone(),
            source,
        })?;
        let table: toml::Table = content.parse().map_err(|e: toml::de::Error| RenderError::Metadata {
            path: path.clone(),
            message: e.message().to_string(),
        })?;
        let metadata = serde_json::to_value(table).map_err(|e| RenderError::Metadata {
            path,
            message: e.to_string(),
        })?;

        Ok(Self {
            metadata,
            project: ctx.project().clone(),
            plugins: ctx.plugin_names().to_vec(),
        })
    }
}

/// One renderable file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderEntry {
    /// Template name in the engine.
    pub template: String,
    /// Output path, relative to the project directory.
    pub destination: PathBuf,
}

impl RenderEntry {
    pub fn new(template: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            template: template.into(),
            destination: destination.into(),
        }
    }

    /// The name users pass to `render --file`.
    pub fn name(&self) -> String {
        self.destination.to_string_lossy().into_owned()
    }
}

/// Files Eldritch knows how to render.
pub fn default_entries() -> Vec<RenderEntry> {
    vec![RenderEntry::new("pyproject.toml", "pyproject.toml")]
}

/// A rendered file ready to be written
#[derive(Debug)]
pub struct RenderedFile {
    pub path: PathBuf,
    pub content: String,
}

impl RenderedFile {
    /// Write the file to disk
    pub fn write(&self) -> Result<(), RenderError> {
        let io_err = |source| RenderError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(&self.path, &self.content).map_err(io_err)?;
        info!(path = %self.path.display(), bytes = self.content.len(), "file rendered");
        Ok(())
    }
}

/// Renders the project's entries. One per context.
#[derive(Debug)]
pub struct Renderer {
    context: ContextRef,
    entries: Vec<RenderEntry>,
}

impl ContextComponent for Renderer {
    fn create(ctx: &Arc<RuntimeContext>) -> crate::Result<Self> {
        Ok(Self {
            context: ctx.downgrade(),
            entries: default_entries(),
        })
    }
}

impl ContextBound for Renderer {
    fn context_ref(&self) -> &ContextRef {
        &self.context
    }
}

impl Renderer {
    pub fn entries(&self) -> &[RenderEntry] {
        &self.entries
    }

    pub fn entry_names(&self) -> Vec<String> {
        self.entries.iter().map(RenderEntry::name).collect()
    }

    /// Render the entry whose destination is `name`, without writing it.
    pub fn render_entry(&self, name: &str) -> Result<RenderedFile, RenderError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.name() == name)
            .ok_or_else(|| RenderError::UnknownEntry {
                name: name.to_string(),
                known: self.entry_names(),
            })?;
        let ctx = self.ctx()?;
        let engine = ctx.templates()?;
        let variables = RenderContext::load(&ctx)?;
        render_one(&engine, &variables, entry, ctx.project_dir())
    }

    /// Render every entry, without writing.
    pub fn render_all(&self) -> Result<Vec<RenderedFile>, RenderError> {
        let ctx = self.ctx()?;
        let engine = ctx.templates()?;
        let variables = RenderContext::load(&ctx)?;
        self.entries
            .iter()
            .map(|entry| render_one(&engine, &variables, entry, ctx.project_dir()))
            .collect()
    }
}

fn render_one(
    engine: &crate::templates::TemplateEngine,
    variables: &RenderContext,
    entry: &RenderEntry,
    project_dir: &Path,
) -> Result<RenderedFile, RenderError> {
    Ok(RenderedFile {
        path: project_dir.join(&entry.destination),
        content: engine.render(&entry.template, variables)?,
    })
}

/// The built-in `render` command.
pub fn command() -> CommandSpec {
    let names: Vec<String> = default_entries().iter().map(RenderEntry::name).collect();
    let command = Command::new("render")
        .about("Render project files from templates")
        .arg(
            Arg::new("all")
                .short('a')
                .long("all")
                .action(ArgAction::SetTrue)
                .help("Render all defined files."),
        )
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .value_parser(PossibleValuesParser::new(names))
                .conflicts_with("all")
                .help("Render a single file."),
        );
    CommandSpec::new(command, run)
}

fn run(ctx: &Arc<RuntimeContext>, matches: &ArgMatches) -> anyhow::Result<ExitStatus> {
    let renderer = ctx.component::<Renderer>()?;

    let files = if matches.get_flag("all") {
        renderer.render_all()?
    } else if let Some(name) = matches.get_one::<String>("file") {
        vec![renderer.render_entry(name)?]
    } else {
        ctx.console().eprintln("Nothing to render: pass --all or --file <FILE>.")?;
        return Ok(ExitStatus::USAGE);
    };

    for file in &files {
        file.write()?;
        let shown = file.path.strip_prefix(ctx.project_dir()).unwrap_or(&file.path);
        ctx.console().println(&format!("Rendered {}", shown.display()))?;
    }
    Ok(ExitStatus::SUCCESS)
}
