mod cli;
mod json;

pub use cli::print_cli_table;
pub use json::{generate_json_string, print_json};

use crate::audit::FileAudit;
use anyhow::Result;

/// Output format for audit results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format
    Table,
    /// JSON format for programmatic use
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use 'table' or 'json'", s)),
        }
    }
}

pub fn print_results(audits: &[FileAudit], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => print_cli_table(audits),
        OutputFormat::Json => print_json(audits),
    }
}

/// Format results for file output. Files always get JSON.
pub fn format_results_to_string(audits: &[FileAudit]) -> Result<String> {
    generate_json_string(audits)
}
