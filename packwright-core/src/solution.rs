//! Loading solution manifests into flat project listings.
//!
//! Parsing real solution/project files belongs to external tooling; the
//! pipeline only needs the [`SolutionLoader`] capability. The bundled
//! [`TomlSolutionLoader`] reads a TOML listing:
//!
//! ```toml
//! [[project]]
//! name = "Extensions"
//! path = "../Extensions/Extensions/Extensions.csproj"
//! dependencies = ["Core"]
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct SolutionFile {
    #[serde(default, rename = "project")]
    projects: Vec<ProjectConfig>,
}

#[derive(Debug, Deserialize)]
struct ProjectConfig {
    name: String,
    path: PathBuf,
    #[serde(default)]
    dependencies: Vec<String>,
}

/// One project as listed by a solution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionProject {
    pub name: String,
    /// Absolute path of the project's own manifest file.
    pub manifest_path: PathBuf,
    /// Names of the projects this one references directly.
    pub dependencies: Vec<String>,
}

/// A loaded solution: its location and the projects it lists.
#[derive(Debug, Clone)]
pub struct Solution {
    pub path: PathBuf,
    pub projects: Vec<SolutionProject>,
}

impl Solution {
    #[inline]
    pub fn project(&self, name: &str) -> Option<&SolutionProject> {
        self.projects.iter().find(|p| p.name == name)
    }

    pub fn project_names(&self) -> Vec<&str> {
        self.projects.iter().map(|p| p.name.as_str()).collect()
    }
}

/// Capability to read a solution manifest into its project graph.
pub trait SolutionLoader: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be read or parsed.
    fn load(&self, path: &Path) -> Result<Solution>;
}

/// Reads TOML project listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlSolutionLoader;

impl SolutionLoader for TomlSolutionLoader {
    fn load(&self, path: &Path) -> Result<Solution> {
        debug!("Getting projects in {}", path.display());

        let content = fs::read_to_string(path)?;
        let file: SolutionFile = toml::from_str(&content).map_err(|error| Error::Toml {
            error,
            context: path.display().to_string(),
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let mut seen = HashSet::new();
        let projects = file
            .projects
            .into_iter()
            .filter(|p| seen.insert(p.name.clone()))
            .map(|p| SolutionProject {
                manifest_path: absolutize(base, &p.path),
                name: p.name,
                dependencies: p.dependencies,
            })
            .collect();

        Ok(Solution {
            path: path.to_path_buf(),
            projects,
        })
    }
}

/// Joins `path` onto `base` unless absolute, resolving symlinks and `..`
/// when the target exists.
fn absolutize(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    fs::canonicalize(&joined).unwrap_or(joined)
}
