//! Template engine
//!
//! Uses Handlebars templates. Strict mode is off and nothing is HTML-escaped:
//! the output is TOML, Markdown and source files.

use std::path::{Path, PathBuf};

use handlebars::Handlebars;
use serde::Serialize;
use walkdir::WalkDir;

/// Extensions stripped from file names to form template names.
pub const TEMPLATE_EXTENSIONS: [&str; 2] = ["hbs", "jinja2"];

const BUILTIN_TEMPLATES: [(&str, &str); 1] = [(
    "pyproject.toml",
    include_str!("../assets/templates/pyproject.toml.hbs"),
)];

/// Template errors
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("invalid template `{name}`: {message}")]
    Invalid { name: String, message: String },

    #[error("failed to render `{name}`: {message}")]
    Render { name: String, message: String },

    #[error("template not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handlebars registry plus the names it was loaded with.
#[derive(Debug)]
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
    loaded_templates: Vec<String>,
}

impl TemplateEngine {
    /// An empty engine.
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        handlebars.register_escape_fn(handlebars::no_escape);

        Self {
            handlebars,
            loaded_templates: Vec::new(),
        }
    }

    /// An engine preloaded with the templates shipped in this crate.
    pub fn with_builtins() -> Result<Self, TemplateError> {
        let mut engine = Self::new();
        for (name, source) in BUILTIN_TEMPLATES {
            engine.register_template(name, source)?;
        }
        Ok(engine)
    }

    /// Load every template under `dir`, recursively.
    ///
    /// `dir/license/NOTICE.hbs` is registered as `license/NOTICE`. A name that
    /// is already registered is replaced.
    pub fn load_from_dir(&mut self, dir: &Path) -> Result<usize, TemplateError> {
        if !dir.is_dir() {
            return Err(TemplateError::DirectoryNotFound(dir.to_path_buf()));
        }

        let mut loaded = 0;
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = template_name(dir, entry.path()) else {
                continue;
            };
            let content = std::fs::read_to_string(entry.path())?;
            self.register_template(&name, &content)?;
            loaded += 1;
        }

        tracing::debug!(dir = %dir.display(), loaded, "templates loaded");
        Ok(loaded)
    }

    /// Register a template from a string
    pub fn register_template(&mut self, name: &str, template: &str) -> Result<(), TemplateError> {
        self.handlebars
            .register_template_string(name, template)
            .map_err(|e| TemplateError::Invalid {
                name: name.to_string(),
                message: e.to_string(),
            })?;
        if !self.loaded_templates.iter().any(|t| t == name) {
            self.loaded_templates.push(name.to_string());
        }
        Ok(())
    }

    /// Render a template with the given data
    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String, TemplateError> {
        if !self.has_template(name) {
            return Err(TemplateError::NotFound(name.to_string()));
        }
        self.handlebars
            .render(name, data)
            .map_err(|e| TemplateError::Render {
                name: name.to_string(),
                message: e.to_string(),
            })
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.handlebars.has_template(name)
    }

    /// Template names, in registration order.
    pub fn list_templates(&self) -> &[String] {
        &self.loaded_templates
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// `root/a/b.toml.hbs` -> `a/b.toml`; `None` for files without a template
/// extension.
fn template_name(root: &Path, path: &Path) -> Option<String> {
    let extension = path.extension()?.to_str()?;
    if !TEMPLATE_EXTENSIONS.contains(&extension) {
        return None;
    }
    let relative = path.strip_prefix(root).ok()?.with_extension("");
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}
