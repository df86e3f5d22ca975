//! Test utilities for Eldritch crates.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Creates a temporary directory that is cleaned up on drop.
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// A throwaway project directory with a `pyproject.toml`.
pub struct TempProject {
    dir: TempDir,
}

impl TempProject {
    /// A project whose `[tool.eldritch]` lists `plugins`.
    pub fn with_plugins(plugins: &[&str]) -> Self {
        let listed: Vec<String> = plugins.iter().map(|p| format!("\"{p}\"")).collect();
        Self::with_pyproject(&format!(
            "[tool.poetry]\nname = \"sample\"\nversion = \"0.1.0\"\nlicense = \"LGPL-3.0-or-later\"\nauthors = [\"Sample Author <author@example.com>\"]\n\n[tool.eldritch]\nplugins = [{}]\n",
            listed.join(", ")
        ))
    }

    /// A project with exactly this `pyproject.toml`.
    pub fn with_pyproject(content: &str) -> Self {
        let project = Self { dir: temp_dir() };
        project.write("pyproject.toml", content);
        project
    }

    /// A directory without any project file.
    pub fn empty() -> Self {
        Self { dir: temp_dir() }
    }

    /// Write `.project/metadata.toml`.
    pub fn metadata(self, content: &str) -> Self {
        self.write(".project/metadata.toml", content);
        self
    }

    /// Write `.project/templates/<name>`.
    pub fn template(self, name: &str, content: &str) -> Self {
        self.write(&format!(".project/templates/{name}"), content);
        self
    }

    /// Write a file relative to the project root, creating parents.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::fs::write(&path, content).expect("Failed to write project file");
        path
    }

    /// Read a file relative to the project root.
    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(relative)).expect("Failed to read project file")
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Assert that a Result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Assert that a Result is Err and return the error.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(v) => panic!("Expected Err, got Ok: {:?}", v),
            Err(e) => e,
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_project_lists_plugins() {
        let project = TempProject::with_plugins(&["a.b", "c"]);
        let content = project.read("pyproject.toml");
        assert!(content.contains("plugins = [\"a.b\", \"c\"]"));
    }

    #[test]
    fn test_metadata_and_templates_are_nested() {
        let project = TempProject::with_plugins(&[])
            .metadata("x = 1\n")
            .template("README.md.hbs", "# {{project.name}}");
        assert!(project.path().join(".project/metadata.toml").is_file());
        assert!(project.path().join(".project/templates/README.md.hbs").is_file());
    }

    #[test]
    fn test_empty_project_has_no_pyproject() {
        let project = TempProject::empty();
        assert!(!project.path().join("pyproject.toml").exists());
    }

    #[test]
    fn test_assert_macros() {
        let ok: Result<u8, String> = Ok(3);
        assert_eq!(assert_ok!(ok), 3);
        let err: Result<u8, String> = Err("boom".into());
        assert_eq!(assert_err!(err), "boom");
    }

    proptest! {
        #[test]
        fn test_write_read_roundtrip(content in "\\PC*", name in "[a-z]{1,8}") {
            let project = TempProject::empty();
            project.write(&format!("nested/{name}.txt"), &content);
            prop_assert_eq!(project.read(&format!("nested/{name}.txt")), content);
        }
    }
}
