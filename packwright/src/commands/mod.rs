//! Command implementations for the CLI.

mod package;
mod plan;
mod reporter;

use std::path::Path;

use anyhow::Result;
use packwright_core::{
    PackwrightConfig, PipelinePolicy, TerminalMode, UnresolvedDependencyPolicy, CONFIG_FILE_NAME,
};
use tracing::debug;

pub use package::cmd_package;
pub use plan::cmd_plan;
pub use reporter::CliPipelineReporter;

/// The command line itself was unusable; nothing was attempted.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct UsageError(pub String);

/// Pipeline settings given on the command line; they win over the config file.
#[derive(Debug, Default)]
pub struct PolicyOverrides {
    pub branch: Option<String>,
    pub terminal_mode: Option<TerminalMode>,
    pub unresolved_dependencies: Option<UnresolvedDependencyPolicy>,
    pub skip_publish: bool,
    pub no_clean: bool,
    pub rollback_on_failure: bool,
    pub fetch: bool,
}

impl PolicyOverrides {
    pub fn apply(&self, policy: &mut PipelinePolicy) {
        if let Some(branch) = &self.branch {
            policy.branch = Some(branch.clone());
        }
        if let Some(mode) = self.terminal_mode {
            policy.terminal_mode = mode;
        }
        if let Some(unresolved) = self.unresolved_dependencies {
            policy.unresolved_dependencies = unresolved;
        }
        if self.skip_publish {
            policy.publish = false;
        }
        if self.no_clean {
            policy.clean = false;
        }
        if self.rollback_on_failure {
            policy.rollback_on_failure = true;
        }
        if self.fetch {
            policy.fetch_before_status = true;
        }
    }
}

/// Loads `explicit`, else `packwright.toml` beside the manifest, else the
/// user-wide config file, else the defaults.
pub fn load_config(explicit: Option<&Path>, manifest: &Path) -> Result<PackwrightConfig> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(UsageError(format!("Config file {} does not exist.", path.display())).into());
        }
        return Ok(PackwrightConfig::from_file(path)?);
    }

    let beside_manifest = manifest.parent().map(|dir| dir.join(CONFIG_FILE_NAME));
    let user_wide = dirs::config_dir().map(|dir| dir.join("packwright").join("config.toml"));

    for candidate in beside_manifest.into_iter().chain(user_wide) {
        if candidate.is_file() {
            debug!("Using configuration from {}", candidate.display());
            return Ok(PackwrightConfig::from_file(&candidate)?);
        }
    }

    Ok(PackwrightConfig::default())
}

/// The hub manifest must be an existing file with the solution extension.
pub fn validate_manifest(manifest: &Path, extension: &str) -> std::result::Result<(), UsageError> {
    let has_extension = manifest
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));

    if has_extension && manifest.is_file() {
        Ok(())
    } else {
        Err(UsageError(format!(
            "Either {} does not exist or it is not a .{} file.",
            manifest.display(),
            extension
        )))
    }
}
