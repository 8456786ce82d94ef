use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use packwright_core::{PackagingPipeline, RunSummary, TerminalMode};

use crate::formatting::{
    format_duration, print_key_value, print_section_header, print_success, print_summary_box,
    SectionStyle,
};

/// Runs the whole pipeline and prints the outcome of a successful run.
///
/// `quiet` suppresses everything but the JSON summary and errors.
pub fn cmd_package(
    pipeline: &PackagingPipeline,
    manifest: &Path,
    version: &str,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let start = Instant::now();

    if !json && !quiet {
        let policy = &pipeline.config().pipeline;
        print_section_header(&format!("Packaging version {}", version), SectionStyle::Primary);
        print_key_value("Manifest:", &manifest.display().to_string());
        print_key_value("Finish:", terminal_mode_label(policy.terminal_mode));
        if let Some(branch) = &policy.branch {
            print_key_value("Branch:", branch);
        }
        println!();
    }

    let summary = pipeline.run(manifest, version)?;
    let elapsed = start.elapsed().as_secs_f64();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if !quiet {
        print_summary(&summary);
        println!();
        print_success(&format!("Finished in {}", format_duration(elapsed)));
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    let units = summary.units.len().to_string();
    let packaged = summary.packaged.len().to_string();
    let skipped = if summary.skipped.is_empty() {
        "none".to_string()
    } else {
        summary.skipped.join(", ")
    };
    let published = summary.published.len().to_string();
    let repositories = summary.repositories.len().to_string();

    println!();
    print_section_header("Summary", SectionStyle::Success);
    print_summary_box(
        &format!("Version {}", summary.version),
        &[
            ("Projects", &units),
            ("Packaged", &packaged),
            ("Skipped", &skipped),
            ("Published", &published),
            ("Repositories", &repositories),
            ("Finish", terminal_mode_label(summary.terminal_mode)),
        ],
    );
}

fn terminal_mode_label(mode: TerminalMode) -> &'static str {
    match mode {
        TerminalMode::Commit => "commit, tag and push",
        TerminalMode::Revert => "revert stamped versions",
    }
}
