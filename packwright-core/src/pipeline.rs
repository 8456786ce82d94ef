//! The packaging pipeline: precondition gate, restore, stamp/build/pack,
//! publish, and the terminal commit or revert.
//!
//! Stages run strictly one after another and each stage walks every unit
//! (or every distinct repository) before the next stage begins. The first
//! failure aborts the run and is returned tagged with its stage.

use std::path::Path;

use indexmap::IndexSet;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{PackwrightConfig, TerminalMode, TimeoutConfig, UnresolvedDependencyPolicy};
use crate::error::{Error, PipelineError, Result, Stage};
use crate::graph::DependencyGraphResolver;
use crate::process::{CommandRunner, Invocation, ProcessRunner};
use crate::reporter::{PipelineReporter, SilentReporter};
use crate::repository::{RepositoryGateway, RepositoryLocation, RepositoryStatus};
use crate::solution::{SolutionLoader, TomlSolutionLoader};
use crate::stamper::VersionStamper;
use crate::unit::ProjectUnit;

/// What a successful run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub version: String,
    /// Every resolved unit, dependencies first.
    pub units: Vec<ProjectUnit>,
    pub repositories: Vec<RepositoryLocation>,
    /// Names of units that were stamped, built and packed.
    pub packaged: Vec<String>,
    pub skipped: Vec<String>,
    /// Package files pushed to the registry.
    pub published: Vec<String>,
    pub terminal_mode: TerminalMode,
}

/// Orchestrates one packaging run over a hub manifest.
pub struct PackagingPipeline {
    config: PackwrightConfig,
    stamper: VersionStamper,
    runner: Box<dyn CommandRunner>,
    loader: Box<dyn SolutionLoader>,
    reporter: Box<dyn PipelineReporter>,
}

impl PackagingPipeline {
    /// Creates a pipeline that runs real processes and reads TOML solutions.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured stamp pattern is not a valid regex.
    pub fn new(config: PackwrightConfig) -> Result<Self> {
        let stamper = VersionStamper::new(&config.stamp)?;
        Ok(Self {
            config,
            stamper,
            runner: Box::new(ProcessRunner::new()),
            loader: Box::new(TomlSolutionLoader),
            reporter: Box::new(SilentReporter),
        })
    }

    pub fn with_runner<R: CommandRunner + 'static>(mut self, runner: R) -> Self {
        self.runner = Box::new(runner);
        self
    }

    pub fn with_loader<L: SolutionLoader + 'static>(mut self, loader: L) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn with_reporter<R: PipelineReporter + 'static>(mut self, reporter: R) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    #[inline]
    pub fn config(&self) -> &PackwrightConfig {
        &self.config
    }

    /// Resolves the manifest without touching any repository.
    ///
    /// # Errors
    ///
    /// Returns the resolver's failure.
    pub fn plan(&self, manifest_path: &Path) -> Result<Vec<ProjectUnit>> {
        DependencyGraphResolver::new(self.loader.as_ref(), self.config.tools.solution_extension.as_str())
            .resolve(manifest_path)
    }

    /// Runs every stage for `version`.
    ///
    /// # Errors
    ///
    /// Returns the first failure, tagged with the stage it occurred in.
    pub fn run(&self, manifest_path: &Path, version: &str) -> std::result::Result<RunSummary, PipelineError> {
        let units = self.stage(Stage::Resolve, 1, || self.plan(manifest_path))?;
        let repositories = distinct_repositories(&units);

        self.stage(Stage::Precondition, repositories.len(), || {
            self.check_preconditions(&repositories)
        })?;

        if self.config.pipeline.clean {
            self.stage(Stage::Clean, units.len(), || self.clean(&units))?;
        }

        self.stage(Stage::Restore, units.len(), || self.restore(&units))?;

        let mut summary = RunSummary {
            version: version.to_string(),
            units: Vec::new(),
            repositories: repositories.clone(),
            packaged: Vec::new(),
            skipped: Vec::new(),
            published: Vec::new(),
            terminal_mode: self.config.pipeline.terminal_mode,
        };

        if let Err(err) = self.run_mutating_stages(&units, &repositories, version, &mut summary) {
            if self.should_roll_back(err.stage) {
                self.rollback(&repositories);
            }
            return Err(err);
        }

        summary.units = units;
        Ok(summary)
    }

    fn run_mutating_stages(
        &self,
        units: &[ProjectUnit],
        repositories: &[RepositoryLocation],
        version: &str,
        summary: &mut RunSummary,
    ) -> std::result::Result<(), PipelineError> {
        self.stage(Stage::Package, units.len(), || {
            self.package(units, version, summary)
        })?;

        if self.config.pipeline.publish {
            let packaged: Vec<&ProjectUnit> = units
                .iter()
                .filter(|u| summary.packaged.contains(&u.name))
                .collect();
            let published = self.stage(Stage::Publish, packaged.len(), || {
                self.publish(&packaged, version)
            })?;
            summary.published = published;
        }

        self.stage(Stage::Finalize, repositories.len(), || {
            match self.config.pipeline.terminal_mode {
                TerminalMode::Commit => {
                    let touched = touched_repositories(units, &summary.packaged);
                    self.commit_tag_and_push(&touched, version)
                }
                TerminalMode::Revert => self.revert(repositories),
            }
        })
    }

    /// Revert mode always undoes stamps left by a failed mutating stage;
    /// commit mode only when `rollback_on_failure` is set.
    fn should_roll_back(&self, stage: Stage) -> bool {
        let policy = &self.config.pipeline;
        stage.mutates_sources()
            && (policy.terminal_mode == TerminalMode::Revert || policy.rollback_on_failure)
    }

    fn stage<T>(
        &self,
        stage: Stage,
        items: usize,
        body: impl FnOnce() -> Result<T>,
    ) -> std::result::Result<T, PipelineError> {
        info!("Starting {} stage", stage);
        self.reporter.stage_started(stage, items);
        let value = body().map_err(|e| PipelineError::new(stage, e))?;
        self.reporter.stage_finished(stage);
        Ok(value)
    }

    fn gateway(&self) -> RepositoryGateway<'_> {
        RepositoryGateway::new(
            self.runner.as_ref(),
            self.config.tools.vcs.as_str(),
            TimeoutConfig::minutes(self.config.timeouts.vcs),
        )
    }

    fn check_preconditions(&self, repositories: &[RepositoryLocation]) -> Result<()> {
        let gateway = self.gateway();

        for repository in repositories {
            info!("Checking status of {}", repository);
            repository.validate()?;

            if self.config.pipeline.fetch_before_status {
                gateway.fetch(repository.root())?;
            }

            if let Some(branch) = &self.config.pipeline.branch {
                let current = gateway.current_branch(repository.root())?;
                if &current != branch {
                    return Err(Error::expectation(format!(
                        "{} is checked out to {}, expected {}.",
                        repository, current, branch
                    )));
                }
            }

            let status = gateway.status(repository.root())?;
            if status != RepositoryStatus::CleanAndUpToDate {
                return Err(Error::expectation(format!(
                    "{} is not clean and up to date: {}.",
                    repository, status
                )));
            }
        }

        Ok(())
    }

    fn clean(&self, units: &[ProjectUnit]) -> Result<()> {
        let tools = &self.config.tools;
        for unit in units {
            self.reporter.unit_started(Stage::Clean, unit);
            let invocation = Invocation::new(unit.repository.root(), tools.build.as_str())
                .arg(unit.solution_file_name())
                .arg("/t:Clean")
                .arg(format!("/p:Configuration={}", tools.configuration))
                .timeout(TimeoutConfig::minutes(self.config.timeouts.clean));
            self.runner.run(&invocation)?;
        }
        Ok(())
    }

    fn restore(&self, units: &[ProjectUnit]) -> Result<()> {
        for unit in units {
            self.reporter.unit_started(Stage::Restore, unit);
            let invocation = Invocation::new(unit.repository.root(), self.config.tools.package.as_str())
                .arg("restore")
                .arg(unit.solution_file_name())
                .timeout(TimeoutConfig::minutes(self.config.timeouts.restore));
            self.runner.run(&invocation)?;
        }
        Ok(())
    }

    fn package(&self, units: &[ProjectUnit], version: &str, summary: &mut RunSummary) -> Result<()> {
        let tools = &self.config.tools;
        let timeouts = &self.config.timeouts;
        let gateway = self.gateway();

        for unit in units {
            if unit.has_local_references {
                match self.config.pipeline.unresolved_dependencies {
                    UnresolvedDependencyPolicy::Build => {}
                    UnresolvedDependencyPolicy::Skip => {
                        let reason = format!("references local projects: {}", unit.dependencies.join(", "));
                        warn!("Skipping {}: {}", unit.name, reason);
                        self.reporter.unit_skipped(unit, &reason);
                        summary.skipped.push(unit.name.clone());
                        continue;
                    }
                    UnresolvedDependencyPolicy::Fail => {
                        return Err(Error::expectation(format!(
                            "Project {} references local projects ({}) that must be packaged first.",
                            unit.name,
                            unit.dependencies.join(", ")
                        )));
                    }
                }
            }

            self.reporter.unit_started(Stage::Package, unit);
            self.ensure_unit_in_own_solution(unit)?;

            let stamped = self.stamper.stamp(unit, version)?;
            self.reporter.version_stamped(unit, &stamped, version);
            if self.config.pipeline.terminal_mode == TerminalMode::Commit {
                gateway.stage(unit.repository.root(), &stamped.repository_relative)?;
            }

            let build = Invocation::new(unit.repository.root(), tools.build.as_str())
                .arg(unit.solution_file_name())
                .arg("/t:Build")
                .arg(format!("/p:Configuration={}", tools.configuration))
                .timeout(TimeoutConfig::minutes(timeouts.build));
            self.runner.run(&build)?;

            let mut pack = Invocation::new(unit.project_dir(), tools.package.as_str())
                .arg("pack")
                .arg(unit.manifest_file_name());
            if tools.include_referenced_projects {
                pack = pack.arg("-IncludeReferencedProjects");
            }
            let pack = pack
                .arg("-Prop")
                .arg(format!("Configuration={}", tools.configuration))
                .timeout(TimeoutConfig::minutes(timeouts.pack));
            self.runner.run(&pack)?;

            summary.packaged.push(unit.name.clone());
        }

        Ok(())
    }

    fn ensure_unit_in_own_solution(&self, unit: &ProjectUnit) -> Result<()> {
        let solution = self.loader.load(&unit.solution_path)?;
        if solution.project(&unit.name).is_none() {
            return Err(Error::expectation(format!(
                "Solution {} does not contain a project named {} (found: {}).",
                unit.solution_path.display(),
                unit.name,
                solution.project_names().join(", ")
            )));
        }
        Ok(())
    }

    fn publish(&self, units: &[&ProjectUnit], version: &str) -> Result<Vec<String>> {
        let tools = &self.config.tools;
        let mut published = Vec::with_capacity(units.len());

        for unit in units {
            self.reporter.unit_started(Stage::Publish, unit);
            let package_file = unit.package_file_name(version, &tools.package_extension);
            let invocation = Invocation::new(unit.project_dir(), tools.package.as_str())
                .arg("push")
                .arg(package_file.as_str())
                .arg("-Source")
                .arg(tools.registry_url.as_str())
                .timeout(TimeoutConfig::minutes(self.config.timeouts.publish));
            self.runner.run(&invocation)?;
            published.push(package_file);
        }

        Ok(published)
    }

    fn commit_tag_and_push(&self, repositories: &[RepositoryLocation], version: &str) -> Result<()> {
        let gateway = self.gateway();
        let message = format!("version {}", version);
        let tag = format!("v{}", version);

        for repository in repositories {
            gateway.commit_all(repository.root(), &message)?;
            gateway.tag(repository.root(), &tag, &message)?;
            gateway.push_with_tags(repository.root())?;
            self.reporter.committed(repository, &tag);
        }

        Ok(())
    }

    fn revert(&self, repositories: &[RepositoryLocation]) -> Result<()> {
        let gateway = self.gateway();

        for repository in repositories {
            if !RepositoryGateway::is_repository(repository.root()) {
                continue;
            }
            if gateway.has_uncommitted_changes(repository.root())? {
                gateway.revert_all_changes(repository.root())?;
                self.reporter.reverted(repository);
            }
        }

        Ok(())
    }

    /// Best effort: every repository is attempted and failures are only logged.
    fn rollback(&self, repositories: &[RepositoryLocation]) {
        let gateway = self.gateway();

        for repository in repositories {
            if !RepositoryGateway::is_repository(repository.root()) {
                continue;
            }
            warn!("Rolling back {}", repository);
            let result = gateway
                .unstage_all(repository.root())
                .and_then(|_| gateway.revert_all_changes(repository.root()));
            match result {
                Ok(()) => self.reporter.reverted(repository),
                Err(e) => warn!("Rollback of {} failed: {}", repository, e),
            }
        }
    }
}

/// Repositories in first-seen order; monorepo units share one entry.
pub fn distinct_repositories(units: &[ProjectUnit]) -> Vec<RepositoryLocation> {
    units
        .iter()
        .map(|u| u.repository.clone())
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

fn touched_repositories(units: &[ProjectUnit], packaged: &[String]) -> Vec<RepositoryLocation> {
    let touched: Vec<ProjectUnit> = units
        .iter()
        .filter(|u| packaged.contains(&u.name))
        .cloned()
        .collect();
    distinct_repositories(&touched)
}
