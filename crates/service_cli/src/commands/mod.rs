//! CLI command implementations
//!
//! Each submodule implements a specific CLI command; [`table`] holds the
//! shared box-drawn report layout.

pub mod check;
pub mod compare;
pub mod run;
pub mod table;

use crate::{CliError, Result};

/// Output formats accepted by the running commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Box-drawn table on stdout.
    Table,
    /// Pretty-printed JSON on stdout.
    Json,
}

impl OutputFormat {
    /// Parses a `--format` value.
    pub fn parse(format: &str) -> Result<Self> {
        match format {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            other => Err(CliError::InvalidArgument(format!(
                "Unknown format: {}. Supported: json, table",
                other
            ))),
        }
    }
}
