//! Trait for reporting pipeline progress.

use crate::error::Stage;
use crate::repository::RepositoryLocation;
use crate::stamper::StampedFile;
use crate::unit::ProjectUnit;

/// Receives progress events from a packaging run.
///
/// This trait allows the core library to report what it is doing without
/// directly writing to stdout/stderr. Every method defaults to doing nothing.
pub trait PipelineReporter: Send + Sync {
    /// A stage is about to iterate over `items` units or repositories.
    fn stage_started(&self, _stage: Stage, _items: usize) {}

    fn stage_finished(&self, _stage: Stage) {}

    /// Work on one unit is starting within `stage`.
    fn unit_started(&self, _stage: Stage, _unit: &ProjectUnit) {}

    fn unit_skipped(&self, _unit: &ProjectUnit, _reason: &str) {}

    fn version_stamped(&self, _unit: &ProjectUnit, _file: &StampedFile, _version: &str) {}

    /// Working-tree changes in `repository` were discarded.
    fn reverted(&self, _repository: &RepositoryLocation) {}

    /// `repository` received its release commit and tag.
    fn committed(&self, _repository: &RepositoryLocation, _tag: &str) {}
}

/// Reporter that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReporter;

impl PipelineReporter for SilentReporter {}
