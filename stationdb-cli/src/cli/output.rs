/// Standard output utilities for consistent command formatting
use colored::*;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color as TableColor, ContentArrangement, Table};

use stationdb_storage::ExtDb;

/// Display a section header
pub fn section_header(title: &str) {
    println!("\n{}", title.bold().cyan());
}

/// Display a success message
pub fn success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

pub fn info(message: &str) {
    println!("{} {}", "●".blue(), message);
}

pub fn warning(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}

/// Display an empty/none indicator
pub fn empty(message: &str) {
    println!("{} {}", "◌".dimmed(), message);
}

/// Tree structure item
pub fn tree_item(is_last: bool, label: &str, value: Option<&str>) {
    let prefix = if is_last { "└─" } else { "├─" };
    if let Some(val) = value {
        println!("{} {}: {}", prefix.dimmed(), label, val);
    } else {
        println!("{} {}", prefix.dimmed(), label);
    }
}

/// Render label/value pairs as one tree
pub fn tree_items(items: &[(&str, String)]) {
    for (i, (label, value)) in items.iter().enumerate() {
        tree_item(i + 1 == items.len(), label, Some(value));
    }
}

/// Create a standard table with our preferred styling
pub fn create_standard_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Create a standard header cell
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .add_attribute(Attribute::Bold)
        .fg(TableColor::Cyan)
}

/// Short state markers for a data set: download, locked, deleted
pub fn state_flags(handle: &ExtDb) -> String {
    let mut flags = Vec::new();
    if handle.is_live() {
        flags.push("live");
    }
    if handle.is_virtual() {
        flags.push("current");
    }
    if handle.is_download() {
        flags.push("download");
    }
    if handle.is_locked() {
        flags.push("locked");
    }
    if handle.is_deleted() {
        flags.push("deleted");
    }
    flags.join(", ")
}

/// Key as shown to users; virtual handles also show the data set behind them
pub fn key_label(handle: &ExtDb) -> String {
    if handle.is_virtual() {
        format!("{} → {}", handle.key(), handle.backing_key())
    } else {
        handle.key().to_string()
    }
}
