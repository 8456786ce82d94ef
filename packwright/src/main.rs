mod commands;
mod failure;
mod formatting;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use packwright_core::{PackagingPipeline, TerminalMode, UnresolvedDependencyPolicy};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use commands::{CliPipelineReporter, PolicyOverrides, UsageError};
use formatting::SpinnerSlot;

#[derive(Parser)]
#[command(name = "packwright", version)]
#[command(about = "Stamp, build, pack and publish a graph of interdependent projects")]
struct Cli {
    /// Hub solution listing every project to package
    manifest: PathBuf,

    /// Version stamped into every project
    #[arg(id = "version_arg", value_name = "VERSION", required_unless_present = "plan")]
    version: Option<String>,

    /// Branch every repository must be checked out on
    branch: Option<String>,

    #[arg(long)]
    config: Option<PathBuf>,

    /// How the run ends once everything is packed
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// What to do with projects that reference other local projects
    #[arg(long, value_enum)]
    unresolved: Option<UnresolvedArg>,

    #[arg(long, action)]
    skip_publish: bool,

    #[arg(long, action)]
    no_clean: bool,

    /// In commit mode, revert every repository if a stage fails after stamping started
    #[arg(long, action)]
    rollback_on_failure: bool,

    /// Fetch before checking whether repositories are up to date
    #[arg(long, action)]
    fetch: bool,

    /// Print the packaging order and exit
    #[arg(long, action)]
    plan: bool,

    #[arg(long, action)]
    json: bool,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(short, long, action)]
    quiet: bool,
}

#[derive(ValueEnum, Clone, Copy)]
enum ModeArg {
    Commit,
    Revert,
}

impl From<ModeArg> for TerminalMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Commit => TerminalMode::Commit,
            ModeArg::Revert => TerminalMode::Revert,
        }
    }
}

#[derive(ValueEnum, Clone, Copy)]
enum UnresolvedArg {
    Build,
    Skip,
    Fail,
}

impl From<UnresolvedArg> for UnresolvedDependencyPolicy {
    fn from(arg: UnresolvedArg) -> Self {
        match arg {
            UnresolvedArg::Build => UnresolvedDependencyPolicy::Build,
            UnresolvedArg::Skip => UnresolvedDependencyPolicy::Skip,
            UnresolvedArg::Fail => UnresolvedDependencyPolicy::Fail,
        }
    }
}

impl Cli {
    fn overrides(&self) -> PolicyOverrides {
        PolicyOverrides {
            branch: self.branch.clone(),
            terminal_mode: self.mode.map(Into::into),
            unresolved_dependencies: self.unresolved.map(Into::into),
            skip_publish: self.skip_publish,
            no_clean: self.no_clean,
            rollback_on_failure: self.rollback_on_failure,
            fetch: self.fetch,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.as_str()));
    let spinner = SpinnerSlot::default();
    let log_slot = spinner.clone();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(move || log_slot.log_writer())
        .with_target(false)
        .init();

    match run(cli, spinner) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            failure::report(&err);
            ExitCode::from(failure::exit_code(&err))
        }
    }
}

fn run(cli: Cli, spinner: SpinnerSlot) -> Result<()> {
    let mut config = commands::load_config(cli.config.as_deref(), &cli.manifest)?;
    commands::validate_manifest(&cli.manifest, &config.tools.solution_extension)?;
    cli.overrides().apply(&mut config.pipeline);

    let mut pipeline = PackagingPipeline::new(config)?;
    if !cli.json && !cli.quiet {
        pipeline = pipeline.with_reporter(CliPipelineReporter::new(spinner));
    }

    if cli.plan {
        return commands::cmd_plan(&pipeline, &cli.manifest, cli.json);
    }

    let version = cli
        .version
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| UsageError("A version to stamp is required.".to_string()))?;

    commands::cmd_package(&pipeline, &cli.manifest, version, cli.json, cli.quiet)
}
