//! Configuration types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Eldritch's own settings, read from the `[tool.eldritch]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EldritchConfig {
    /// Plugin module names, loaded in this order.
    pub plugins: Vec<String>,
}

/// The `readme` key accepts a single path or a list of paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Readme {
    Single(String),
    Many(Vec<String>),
}

impl Default for Readme {
    fn default() -> Self {
        Self::Single(String::new())
    }
}

/// Package metadata, read from the `[tool.poetry]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub license: String,
    pub authors: Vec<String>,
    pub maintainers: Vec<String>,
    pub readme: Readme,
    pub homepage: String,
    pub repository: String,
    pub documentation: String,
    pub keywords: Vec<String>,
    pub classifiers: Vec<String>,
    pub packages: Vec<BTreeMap<String, String>>,
    pub include: Vec<Value>,
    /// Dependency name to version string or detailed table.
    pub dependencies: BTreeMap<String, Value>,
    pub group: BTreeMap<String, Value>,
    pub scripts: BTreeMap<String, Value>,
    pub extras: BTreeMap<String, Vec<String>>,
    pub plugins: BTreeMap<String, Value>,
    pub urls: BTreeMap<String, String>,
}

/// A parsed `pyproject.toml` with typed views over the sections Eldritch reads.
#[derive(Debug, Clone, Default)]
pub struct PyProject {
    /// The whole document.
    pub document: toml::Table,
    /// `[tool.eldritch]`
    pub eldritch: EldritchConfig,
    /// `[tool.poetry]`
    pub project: ProjectInfo,
}

impl PyProject {
    /// Look up a `[tool.<name>]` table.
    pub fn tool_table(&self, name: &str) -> Option<&toml::Table> {
        self.document
            .get("tool")
            .and_then(toml::Value::as_table)
            .and_then(|tool| tool.get(name))
            .and_then(toml::Value::as_table)
    }
}
