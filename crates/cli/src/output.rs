//! Terminal rendering of command results

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

/// How command results are printed
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Bordered table
    #[default]
    Table,
    /// Pretty-printed JSON, for piping into other tools
    Json,
    /// One `header: value` pair per line
    Plain,
}

/// A record that renders as a single table row
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;

    /// Color for the cell in column `index`, if it needs drawing attention
    fn highlight(&self, _index: usize) -> Option<Color> {
        None
    }
}

pub fn print_row<T: Serialize + TableDisplay>(record: &T, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let cells = record
                .row()
                .into_iter()
                .enumerate()
                .map(|(index, value)| match record.highlight(index) {
                    Some(color) => Cell::new(value).fg(color),
                    None => Cell::new(value),
                });

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(T::headers())
                .add_row(cells);
            println!("{table}");
        }
        OutputFormat::Json => match serde_json::to_string_pretty(record) {
            Ok(json) => println!("{}", json),
            Err(e) => print_warning(&format!("Could not encode output: {}", e)),
        },
        OutputFormat::Plain => {
            for (header, value) in T::headers().into_iter().zip(record.row()) {
                println!("{}: {}", header, value);
            }
        }
    }
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Warnings go to stderr so JSON output stays parseable
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "!".yellow(), message);
}
