//! License catalog and file placement.

use std::path::PathBuf;
use std::sync::Arc;

use eldritch_core::{
    ContextBound, ContextComponent, ContextError, ContextRef, RuntimeContext, TemplateEngine,
    TemplateError,
};
use serde_json::json;
use tracing::info;

/// Template files shipped with a license, as `(file name, content)`.
type Files = &'static [(&'static str, &'static str)];

const LGPL_3_0_OR_LATER: Files = &[
    ("LICENSE.hbs", include_str!("../templates/LGPL-3.0-or-later/LICENSE.hbs")),
    ("NOTICE.hbs", include_str!("../templates/LGPL-3.0-or-later/NOTICE.hbs")),
];

/// License errors
#[derive(Debug, thiserror::Error)]
pub enum LicenseError {
    #[error("unknown license `{name}`; available: {}", .known.join(", "))]
    Unknown { name: String, known: Vec<String> },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Context(#[from] ContextError),
}

/// A license the plugin can apply.
#[derive(Debug, Clone)]
pub struct License {
    name: String,
    namespace: String,
    files: Files,
    context: ContextRef,
}

impl ContextBound for License {
    fn context_ref(&self) -> &ContextRef {
        &self.context
    }
}

impl License {
    fn new(name: &str, files: Files, context: ContextRef) -> Self {
        Self {
            name: name.to_string(),
            namespace: name.to_string(),
            files,
            context,
        }
    }

    /// SPDX identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory the license's templates live under.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// File names shipped with this license.
    pub fn file_names(&self) -> impl Iterator<Item = &'static str> {
        self.files.iter().map(|(name, _)| *name)
    }

    /// The source-file notice for the current project.
    pub fn render_notice(&self) -> Result<String, LicenseError> {
        let ctx = self.ctx()?;
        let mut engine = TemplateEngine::new();
        for (file, content) in self.files {
            let stem = file.trim_end_matches(".hbs");
            engine.register_template(&format!("{}/{stem}", self.namespace), content)?;
        }
        let data = json!({
            "project": ctx.project(),
            "license": self.name,
        });
        Ok(engine.render(&format!("{}/NOTICE", self.namespace), &data)?)
    }
}

impl std::fmt::Display for License {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// License operations for one context.
#[derive(Debug)]
pub struct LicenseApi {
    context: ContextRef,
    licenses: Vec<License>,
}

impl ContextComponent for LicenseApi {
    fn create(ctx: &Arc<RuntimeContext>) -> eldritch_core::Result<Self> {
        let context = ctx.downgrade();
        Ok(Self {
            licenses: vec![License::new("LGPL-3.0-or-later", LGPL_3_0_OR_LATER, context.clone())],
            context,
        })
    }
}

impl ContextBound for LicenseApi {
    fn context_ref(&self) -> &ContextRef {
        &self.context
    }
}

impl LicenseApi {
    pub fn licenses(&self) -> &[License] {
        &self.licenses
    }

    pub fn license_names(&self) -> Vec<String> {
        self.licenses.iter().map(|l| l.name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Result<&License, LicenseError> {
        self.licenses
            .iter()
            .find(|l| l.name == name)
            .ok_or_else(|| LicenseError::Unknown {
                name: name.to_string(),
                known: self.license_names(),
            })
    }

    /// `scripts/templates/license` in the project.
    pub fn destination(&self) -> Result<PathBuf, LicenseError> {
        let ctx = self.ctx()?;
        Ok(ctx.dirs().root().join("scripts").join("templates").join("license"))
    }

    /// Replace the project's license templates with those of `name`.
    pub fn use_license(&self, name: &str) -> Result<PathBuf, LicenseError> {
        let license = self.get(name)?;
        let destination = self.destination()?;
        let io_err = |path: &PathBuf| {
            let path = path.clone();
            move |source| LicenseError::Io { path, source }
        };

        if destination.exists() {
            std::fs::remove_dir_all(&destination).map_err(io_err(&destination))?;
        }
        std::fs::create_dir_all(&destination).map_err(io_err(&destination))?;

        for (file, content) in license.files {
            let path = destination.join(file);
            std::fs::write(&path, content).map_err(io_err(&path))?;
        }

        info!(license = %license.name, destination = %destination.display(), "license templates copied");
        Ok(destination)
    }
}
