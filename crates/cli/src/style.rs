//! Shared styling utilities for the CLI.

use comfy_table::{Cell, Color};
use console::Style;

use modqueue_core::models::EntryState;

/// Create a success-styled string (green with checkmark).
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Create an error-styled string (red with cross).
pub fn error(msg: &str) -> String {
    let style = Style::new().red();
    format!("{} {}", style.apply_to("✗"), msg)
}

/// Create a warning-styled string (yellow).
pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

/// Create a header-styled string (bold, white).
pub fn header(msg: &str) -> String {
    let style = Style::new().bold();
    style.apply_to(msg).to_string()
}

/// Create a dim-styled string.
pub fn dim(msg: &str) -> String {
    let style = Style::new().dim();
    style.apply_to(msg).to_string()
}

/// Colour a unified diff line by line.
pub fn diff(text: &str) -> String {
    let added = Style::new().green();
    let removed = Style::new().red();
    let hunk = Style::new().cyan();
    text.lines()
        .map(|line| {
            if line.starts_with("+++") || line.starts_with("---") {
                dim(line)
            } else if line.starts_with('+') {
                added.apply_to(line).to_string()
            } else if line.starts_with('-') {
                removed.apply_to(line).to_string()
            } else if line.starts_with("@@") {
                hunk.apply_to(line).to_string()
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Table cell for an entry state, with a conflict marker when flagged.
pub fn state_cell(state: EntryState, conflict: bool) -> Cell {
    match state {
        EntryState::Pending if conflict => Cell::new("⚠ conflict").fg(Color::Yellow),
        EntryState::Pending => Cell::new("⧗ pending"),
        EntryState::Approved => Cell::new("✓ approved").fg(Color::Green),
        EntryState::Merged => Cell::new("✓ merged").fg(Color::Green),
        EntryState::Rejected | EntryState::RejectedBatch | EntryState::Blocked => {
            Cell::new(format!("✗ {state}")).fg(Color::Red)
        }
    }
}
