//! Schema snapshot handed to query assistants as context

use crate::ingestion::ColumnDescriptor;
use crate::query::CellValue;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const NO_TABLE_CONTEXT: &str = "No table loaded.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSnapshot {
    pub row_count: u64,
    pub columns: Vec<ColumnDescriptor>,
    /// Rows requested for the sample; `sample_rows` may hold fewer
    pub sample_limit: usize,
    pub sample_rows: Vec<Vec<CellValue>>,
}

impl fmt::Display for SchemaSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Columns:")?;
        for column in &self.columns {
            writeln!(f, "  - \"{}\" ({})", column.name, column.column_type)?;
        }

        let header: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        writeln!(f)?;
        writeln!(f, "Sample data (first {} rows):", self.sample_limit)?;
        writeln!(f, "{}", header.join(" | "))?;
        for row in &self.sample_rows {
            let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            writeln!(f, "{}", cells.join(" | "))?;
        }

        writeln!(f)?;
        writeln!(f, "Total rows: {}", self.row_count)
    }
}

/// Render the assistant context, or the placeholder when nothing is loaded
pub fn schema_context(snapshot: Option<&SchemaSnapshot>) -> String {
    match snapshot {
        Some(s) => s.to_string(),
        None => NO_TABLE_CONTEXT.to_string(),
    }
}
