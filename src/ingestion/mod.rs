//! Ingestion Module
//!
//! Turns untyped CSV text into a typed, queryable table:
//! - Header sanitization and per-column type inference
//! - Tolerant CSV reading (loose quoting, ragged short rows)
//! - Column descriptors shared by both storage strategies

pub mod csv_reader;
pub mod schema_inference;

pub use csv_reader::{read_csv, CsvTable};
pub use schema_inference::{infer_column_type, infer_column_types, sanitize_column_names};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Scalar type of a column, narrowed to three kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Real)
    }

    /// Map an analytical engine's type name onto the three-way taxonomy.
    ///
    /// Case-insensitive substring match: anything containing `INT` is an
    /// integer, `FLOAT`/`DOUBLE`/`DECIMAL`/`NUMERIC` is real, the rest is text.
    pub fn from_engine_type_name(name: &str) -> Self {
        let upper = name.to_uppercase();
        if upper.contains("INT") {
            ColumnType::Integer
        } else if ["FLOAT", "DOUBLE", "DECIMAL", "NUMERIC"]
            .iter()
            .any(|t| upper.contains(t))
        {
            ColumnType::Real
        } else {
            ColumnType::Text
        }
    }

    /// Parse one of our own declared column types back
    pub fn from_declared(declared: &str) -> Option<Self> {
        match declared.trim().to_uppercase().as_str() {
            "INTEGER" => Some(ColumnType::Integer),
            "REAL" => Some(ColumnType::Real),
            "TEXT" => Some(ColumnType::Text),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Column name (sanitized) paired with its inferred type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Where the CSV comes from
#[derive(Debug, Clone)]
pub enum CsvSource {
    Bytes(Vec<u8>),
    Path(PathBuf),
}

impl CsvSource {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        CsvSource::Path(path.as_ref().to_path_buf())
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        CsvSource::Bytes(bytes.into())
    }

    pub fn describe(&self) -> String {
        match self {
            CsvSource::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
            CsvSource::Path(path) => path.display().to_string(),
        }
    }
}

/// Outcome of a successful load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSummary {
    /// Data rows loaded (header excluded)
    pub row_count: u64,
    pub column_count: usize,
    pub columns: Vec<ColumnDescriptor>,
}

impl LoadSummary {
    pub fn new(row_count: u64, columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            row_count,
            column_count: columns.len(),
            columns,
        }
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}
