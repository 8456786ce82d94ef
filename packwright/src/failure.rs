//! Failure reporting and exit codes.

use anyhow::Error as AnyError;
use owo_colors::OwoColorize;
use packwright_core::{CommandOutcome, Error, ErrorKind, PipelineError};

use crate::commands::UsageError;
use crate::formatting::eprint_error;

/// Lines of captured output shown under a failed command.
const OUTPUT_TAIL: usize = 20;

/// 0 success, 1 other, 2 invalid invocation, 3 expectation failed,
/// 4 command exited non-zero, 5 command timed out.
pub fn exit_code(err: &AnyError) -> u8 {
    if err.downcast_ref::<UsageError>().is_some() {
        return 2;
    }

    let kind = if let Some(err) = err.downcast_ref::<PipelineError>() {
        err.kind()
    } else if let Some(err) = err.downcast_ref::<Error>() {
        err.kind()
    } else {
        return 1;
    };

    match kind {
        ErrorKind::Other => 1,
        ErrorKind::Expectation => 3,
        ErrorKind::CommandExited => 4,
        ErrorKind::CommandTimedOut => 5,
    }
}

pub fn report(err: &AnyError) {
    eprintln!();

    if let Some(usage) = err.downcast_ref::<UsageError>() {
        eprint_error(&format!("Error: {}", usage));
    } else if let Some(failure) = err.downcast_ref::<PipelineError>() {
        eprint_error(&describe(&failure.source));
        eprintln!("  {} {}", "stage:".bright_black().bold(), failure.stage);
        if let Some(outcome) = failure.source.outcome() {
            print_outcome(outcome);
        }
    } else if let Some(core) = err.downcast_ref::<Error>() {
        eprint_error(&describe(core));
    } else {
        eprint_error(&format!("Error: {:#}", err));
    }
}

/// One line in the user-facing taxonomy: exited, timed out, expectation, other.
fn describe(err: &Error) -> String {
    match (err, err.kind()) {
        (Error::Expectation(_), _) => err.to_string(),
        (_, ErrorKind::CommandExited | ErrorKind::CommandTimedOut) => err.to_string(),
        (_, ErrorKind::Expectation) => format!("Expectation failed: {}", err),
        (_, ErrorKind::Other) => format!("Error: {}", err),
    }
}

fn print_outcome(outcome: &CommandOutcome) {
    eprintln!(
        "  {} {}",
        "directory:".bright_black().bold(),
        outcome.working_dir.display()
    );
    for (label, text) in [("stdout:", &outcome.stdout), ("stderr:", &outcome.stderr)] {
        let lines = tail(text, OUTPUT_TAIL);
        if lines.is_empty() {
            continue;
        }
        eprintln!("  {}", label.bright_black().bold());
        for line in lines {
            eprintln!("    {}", line);
        }
    }
}

fn tail(text: &str, count: usize) -> Vec<&str> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(count)..].to_vec()
}
