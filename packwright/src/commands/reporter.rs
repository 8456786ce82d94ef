//! Pipeline reporter implementation for the CLI.

use packwright_core::{PipelineReporter, ProjectUnit, RepositoryLocation, Stage, StampedFile};

use crate::formatting::{print_info, print_success, print_warning, SpinnerSlot};

/// Prints pipeline progress with a spinner per running stage.
///
/// Not installed under `--quiet` or `--json`; those runs stay silent.
pub struct CliPipelineReporter {
    spinner: SpinnerSlot,
}

impl CliPipelineReporter {
    pub fn new(spinner: SpinnerSlot) -> Self {
        Self { spinner }
    }
}

impl PipelineReporter for CliPipelineReporter {
    fn stage_started(&self, stage: Stage, items: usize) {
        let message = format!("{} stage ({} item{})", stage, items, if items == 1 { "" } else { "s" });
        self.spinner.start(message);
    }

    fn stage_finished(&self, stage: Stage) {
        self.spinner.finish();
        print_success(&format!("{} stage done", stage));
    }

    fn unit_started(&self, stage: Stage, unit: &ProjectUnit) {
        self.spinner.set_message(format!("{}: {}", stage, unit.name));
    }

    fn unit_skipped(&self, unit: &ProjectUnit, reason: &str) {
        self.spinner
            .suspend(|| print_warning(&format!("Skipped {}: {}", unit.name, reason)));
    }

    fn version_stamped(&self, unit: &ProjectUnit, file: &StampedFile, version: &str) {
        self.spinner.suspend(|| {
            print_success(&format!(
                "{} {} -> {}",
                unit.name,
                file.repository_relative.display(),
                version
            ))
        });
    }

    fn reverted(&self, repository: &RepositoryLocation) {
        self.spinner
            .suspend(|| print_info(&format!("Reverted {}", repository)));
    }

    fn committed(&self, repository: &RepositoryLocation, tag: &str) {
        self.spinner
            .suspend(|| print_success(&format!("Tagged {} as {}", repository, tag)));
    }
}

impl Drop for CliPipelineReporter {
    fn drop(&mut self) {
        self.spinner.finish();
    }
}
