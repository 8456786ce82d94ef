//! Table formatting utilities using comfy-table.

use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use packwright_core::ProjectUnit;

/// Prints resolved units in packaging order.
pub fn print_unit_table(units: &[ProjectUnit]) {
    let mut table = Table::new();
    table
        .set_header(vec![
            Cell::new("#").add_attribute(Attribute::Bold),
            Cell::new("Project").add_attribute(Attribute::Bold),
            Cell::new("Repository").add_attribute(Attribute::Bold),
            Cell::new("Local references").add_attribute(Attribute::Bold),
        ])
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);

    for (idx, unit) in units.iter().enumerate() {
        let references = if unit.dependencies.is_empty() {
            "(none)".to_string()
        } else {
            unit.dependencies.join(", ")
        };
        table.add_row(vec![
            Cell::new(idx + 1).fg(Color::DarkGrey),
            Cell::new(&unit.name).fg(Color::White),
            Cell::new(unit.repository.to_string()).fg(Color::DarkGrey),
            Cell::new(references),
        ]);
    }

    println!("{}", table);
}
