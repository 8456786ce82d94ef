use std::path::Path;

use anyhow::Result;
use owo_colors::OwoColorize;
use packwright_core::PackagingPipeline;

use crate::formatting::{print_section_header, print_unit_table, print_warning, SectionStyle};

/// Prints the packaging order without touching any repository.
pub fn cmd_plan(pipeline: &PackagingPipeline, manifest: &Path, json: bool) -> Result<()> {
    let units = pipeline.plan(manifest)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&units)?);
        return Ok(());
    }

    print_section_header("Packaging plan", SectionStyle::Primary);
    if units.is_empty() {
        print_warning("No projects found");
    } else {
        println!(
            "  {} {} {}",
            "Order of".bright_black(),
            units.len().to_string().bold().cyan(),
            "projects:".bright_black()
        );
        println!();
        print_unit_table(&units);
    }
    println!();

    Ok(())
}
