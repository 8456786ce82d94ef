//! Core library for packaging graphs of interdependent projects.

pub mod config;
pub mod error;
pub mod graph;
pub mod pipeline;
pub mod process;
pub mod reporter;
pub mod repository;
pub mod solution;
pub mod stamper;
pub mod unit;

pub use config::{
    PackwrightConfig, PipelinePolicy, StampConfig, TerminalMode, TimeoutConfig, ToolConfig,
    UnresolvedDependencyPolicy, CONFIG_FILE_NAME,
};
pub use error::{Error, ErrorKind, PipelineError, Result, Stage};
pub use graph::{DependencyGraph, DependencyGraphResolver};
pub use pipeline::{distinct_repositories, PackagingPipeline, RunSummary};
pub use process::{CommandOutcome, CommandRunner, Invocation, ProcessRunner};
pub use reporter::{PipelineReporter, SilentReporter};
pub use repository::{RepositoryGateway, RepositoryLocation, RepositoryStatus};
pub use solution::{Solution, SolutionLoader, SolutionProject, TomlSolutionLoader};
pub use stamper::{StampedFile, TextEncoding, VersionStamper};
pub use unit::ProjectUnit;
