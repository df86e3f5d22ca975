//! Common test utilities for CLI testing.

#![allow(dead_code)]

use std::path::Path;

use assert_cmd::Command;
use eldritch_test_utils::TempProject;

/// Test context with a temporary project
pub struct TestContext {
    pub project: TempProject,
}

impl TestContext {
    /// A project with the license plugin enabled.
    pub fn new() -> Self {
        Self::with_plugins(&["eldritch.plugins.license"])
    }

    pub fn with_plugins(plugins: &[&str]) -> Self {
        Self {
            project: TempProject::with_plugins(plugins),
        }
    }

    /// A directory without `pyproject.toml`.
    pub fn without_project() -> Self {
        Self {
            project: TempProject::empty(),
        }
    }

    pub fn path(&self) -> &Path {
        self.project.path()
    }

    /// Create a command running inside this project
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("eldritch").expect("Binary not found");
        cmd.current_dir(self.path())
            .env_remove("ELDRITCH_PROJECT_DIR")
            .env_remove("ELDRITCH_LOG_FILE")
            .env_remove("RUST_LOG")
            .env("NO_COLOR", "1");
        cmd
    }
}
