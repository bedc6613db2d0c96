//! Output formatting utilities

use colored::*;
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format for query commands
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed table format
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print records, as a table of `R` rows or as JSON of the records themselves.
pub fn print_list<T, R>(items: &[T], format: OutputFormat) -> anyhow::Result<()>
where
    T: Serialize,
    R: Tabled + for<'a> From<&'a T>,
{
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No results".dimmed());
            } else {
                println!("{}", Table::new(items.iter().map(R::from)));
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(items)?),
    }
    Ok(())
}

/// Print a single item as JSON
pub fn print_single<T: Serialize>(data: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}
