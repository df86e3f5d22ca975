//! Well-known paths inside a project.
//!
//! The directory accessors create what they return, so callers can write into
//! the result straight away.

use std::io;
use std::path::{Path, PathBuf};

/// Name of the per-project Eldritch directory.
pub const DOT_PROJECT: &str = ".project";

/// File created under `.project` when a project has no metadata yet.
pub const DEFAULT_METADATA: &str = include_str!("../assets/metadata.toml");

/// Path helpers rooted at a project directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDirs {
    root: PathBuf,
}

impl ProjectDirs {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `.project`
    pub fn dot_project(&self) -> io::Result<PathBuf> {
        self.ensure(DOT_PROJECT)
    }

    /// `.project/templates`; not created, it is optional.
    pub fn templates_dir(&self) -> PathBuf {
        self.root.join(DOT_PROJECT).join("templates")
    }

    /// `.project/metadata.toml`, written with default content if missing.
    pub fn metadata_path(&self) -> io::Result<PathBuf> {
        let path = self.dot_project()?.join("metadata.toml");
        if !path.exists() {
            tracing::debug!(path = %path.display(), "writing default metadata");
            std::fs::write(&path, DEFAULT_METADATA)?;
        }
        Ok(path)
    }

    pub fn scripts(&self) -> io::Result<PathBuf> {
        self.ensure("scripts")
    }

    pub fn docs(&self) -> io::Result<PathBuf> {
        self.ensure("docs")
    }

    pub fn src(&self) -> io::Result<PathBuf> {
        self.ensure("src")
    }

    pub fn test(&self) -> io::Result<PathBuf> {
        self.ensure("test")
    }

    pub fn unit_tests(&self) -> io::Result<PathBuf> {
        self.ensure("test/unit")
    }

    pub fn integration_tests(&self) -> io::Result<PathBuf> {
        self.ensure("test/integration")
    }

    pub fn e2e_tests(&self) -> io::Result<PathBuf> {
        self.ensure("test/e2e")
    }

    /// Any directory below the root, created if needed.
    pub fn ensure(&self, relative: impl AsRef<Path>) -> io::Result<PathBuf> {
        let path = self.root.join(relative);
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }
}
