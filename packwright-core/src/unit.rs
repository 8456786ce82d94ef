//! Buildable project units.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::repository::RepositoryLocation;

/// One independently packaged project within the resolved graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectUnit {
    pub name: String,
    /// Absolute path of the project manifest.
    pub manifest_path: PathBuf,
    /// The unit's own top-level solution, a sibling of its project directory.
    pub solution_path: PathBuf,
    pub repository: RepositoryLocation,
    /// Direct dependencies, by unit name, in declaration order.
    pub dependencies: Vec<String>,
    /// Set when the unit references other local projects and so relies on
    /// their packages rather than building from source alone.
    pub has_local_references: bool,
}

impl ProjectUnit {
    /// Directory holding the project manifest.
    pub fn project_dir(&self) -> &Path {
        self.manifest_path
            .parent()
            .unwrap_or_else(|| self.repository.root())
    }

    pub fn manifest_file_name(&self) -> String {
        file_name(&self.manifest_path)
    }

    pub fn solution_file_name(&self) -> String {
        file_name(&self.solution_path)
    }

    /// File name the packaging tool produces for this unit at `version`.
    pub fn package_file_name(&self, version: &str, extension: &str) -> String {
        format!("{}.{}.{}", self.name, version, extension)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
