//! Error types and result aliases.

use std::fmt;

use thiserror::Error;

use crate::process::CommandOutcome;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error in {context}: {error}")]
    Toml {
        error: toml::de::Error,
        context: String,
    },

    #[error("{0}")]
    CommandFailed(Box<CommandOutcome>),

    #[error("Expectation failed: {0}")]
    Expectation(String),

    #[error("Project not found: {name}. Available projects: {available}")]
    ProjectNotFound { name: String, available: String },

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("Invalid version pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

impl Error {
    pub(crate) fn expectation(message: impl Into<String>) -> Self {
        Error::Expectation(message.into())
    }

    /// Classifies the error for user-facing reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::CommandFailed(outcome) if outcome.timed_out() => ErrorKind::CommandTimedOut,
            Error::CommandFailed(_) => ErrorKind::CommandExited,
            Error::Expectation(_) | Error::ProjectNotFound { .. } => ErrorKind::Expectation,
            _ => ErrorKind::Other,
        }
    }

    /// The captured command outcome, when the error came from a subprocess.
    pub fn outcome(&self) -> Option<&CommandOutcome> {
        match self {
            Error::CommandFailed(outcome) => Some(outcome),
            _ => None,
        }
    }
}

/// Coarse failure categories surfaced to the invoking environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    CommandExited,
    CommandTimedOut,
    Expectation,
    Other,
}

/// Stages of a packaging run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Resolve,
    Precondition,
    Clean,
    Restore,
    Package,
    Publish,
    Finalize,
}

impl Stage {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Resolve => "resolve",
            Stage::Precondition => "precondition",
            Stage::Clean => "clean",
            Stage::Restore => "restore",
            Stage::Package => "package",
            Stage::Publish => "publish",
            Stage::Finalize => "finalize",
        }
    }

    /// Whether this stage may leave modified files behind on failure.
    pub fn mutates_sources(&self) -> bool {
        matches!(self, Stage::Package | Stage::Publish | Stage::Finalize)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure that aborted a packaging run, tagged with the stage it happened in.
#[derive(Error, Debug)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: Error,
}

impl PipelineError {
    pub fn new(stage: Stage, source: Error) -> Self {
        Self { stage, source }
    }

    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
