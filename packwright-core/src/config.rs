//! Configuration for tools, timeouts, version stamping and pipeline policy.
//!
//! Every field has a default, so an empty or partial `packwright.toml` is valid.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// File name looked up beside the hub manifest.
pub const CONFIG_FILE_NAME: &str = "packwright.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackwrightConfig {
    pub tools: ToolConfig,
    pub timeouts: TimeoutConfig,
    pub stamp: StampConfig,
    pub pipeline: PipelinePolicy,
}

impl PackwrightConfig {
    /// Reads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|error| Error::Toml {
            error,
            context: path.display().to_string(),
        })
    }
}

/// External programs and the conventions used to call them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub build: String,
    pub package: String,
    pub vcs: String,
    pub solution_extension: String,
    pub package_extension: String,
    pub configuration: String,
    pub include_referenced_projects: bool,
    pub registry_url: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            build: "msbuild".to_string(),
            package: "nuget".to_string(),
            vcs: "git".to_string(),
            solution_extension: "sln".to_string(),
            package_extension: "nupkg".to_string(),
            configuration: "Release".to_string(),
            include_referenced_projects: true,
            registry_url: "https://www.nuget.org/api/v2/package".to_string(),
        }
    }
}

/// Per-call timeouts, in minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub vcs: u64,
    pub clean: u64,
    pub restore: u64,
    pub build: u64,
    pub pack: u64,
    pub publish: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            vcs: 1,
            clean: 1,
            restore: 5,
            build: 5,
            pack: 5,
            publish: 5,
        }
    }
}

impl TimeoutConfig {
    #[inline]
    pub fn minutes(value: u64) -> Duration {
        Duration::from_secs(value.saturating_mul(60))
    }
}

/// Where the version declaration lives and how it is rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StampConfig {
    pub file_name: String,
    /// Regex matching the declaration regardless of its current value.
    pub pattern: String,
    /// Replacement text; `{version}` is substituted verbatim.
    pub replacement: String,
}

impl Default for StampConfig {
    fn default() -> Self {
        Self {
            file_name: "AssemblyInfo.cs".to_string(),
            pattern: r#"\[assembly:\s*AssemblyVersion\("[^"]*"\)\]"#.to_string(),
            replacement: r#"[assembly: AssemblyVersion("{version}")]"#.to_string(),
        }
    }
}

/// How a run ends once every unit is packaged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalMode {
    /// Commit the stamped versions, tag `v<version>` and push.
    #[default]
    Commit,
    /// Discard the stamped versions, leaving repositories as found.
    Revert,
}

/// What to do with units that reference other local projects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnresolvedDependencyPolicy {
    /// Package them from the already-restored dependency packages.
    #[default]
    Build,
    /// Leave them out with a diagnostic.
    Skip,
    /// Abort the run.
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelinePolicy {
    pub terminal_mode: TerminalMode,
    pub unresolved_dependencies: UnresolvedDependencyPolicy,
    /// Every repository must be checked out on this branch when set.
    pub branch: Option<String>,
    pub publish: bool,
    pub clean: bool,
    /// In commit mode, revert every repository after a failure that may have
    /// left stamped files. Revert mode always does.
    pub rollback_on_failure: bool,
    pub fetch_before_status: bool,
}

impl Default for PipelinePolicy {
    fn default() -> Self {
        Self {
            terminal_mode: TerminalMode::Commit,
            unresolved_dependencies: UnresolvedDependencyPolicy::Build,
            branch: None,
            publish: true,
            clean: true,
            rollback_on_failure: false,
            fetch_before_status: false,
        }
    }
}

impl PipelinePolicy {
    #[inline]
    pub fn requires_branch(&self) -> bool {
        self.branch.is_some()
    }
}
