//! Console formatting for the CLI.
//!
//! Colours, section headers, status lines and tables share one visual style.

mod headers;
mod output;
mod progress;
mod status;
mod tables;

pub use headers::{print_section_header, SectionStyle};
pub use output::{format_duration, print_key_value, print_summary_box};
pub use progress::SpinnerSlot;
pub use status::{eprint_error, print_info, print_success, print_warning};
pub use tables::print_unit_table;
