//! Configuration for Eldritch.
//!
//! Eldritch keeps its settings in the project's own `pyproject.toml`, under
//! `[tool.eldritch]`, next to the `[tool.poetry]` package metadata it renders
//! templates from.

pub mod env;
pub mod loader;
pub mod lock;
pub mod types;

pub use env::*;
pub use loader::*;
pub use lock::FileLock;
pub use types::*;
