//! Table stores - the two interchangeable ingestion backends
//!
//! Each store owns at most one table, always named [`TABLE_NAME`], and
//! replaces it wholesale on every load. The statistics engine and the query
//! surface only talk to the [`TableStore`] trait.

pub mod polars_store;
pub mod sqlite_store;

pub use polars_store::PolarsStore;
pub use sqlite_store::SqliteStore;

use crate::config::{Config, StorageStrategy};
use crate::error::Result;
use crate::ingestion::{ColumnDescriptor, CsvSource, LoadSummary};
use crate::query::{CellValue, QueryResult};
use crate::stats::{NumericAggregate, TextAggregate, ValueCount};

/// Fixed name of the single loaded table
pub const TABLE_NAME: &str = "tablename";

pub trait TableStore: Send + Sync {
    fn strategy(&self) -> StorageStrategy;

    /// Replace the table with the contents of `source`, all or nothing
    fn load(&mut self, source: &CsvSource) -> Result<LoadSummary>;

    /// Columns of the current table, `None` if nothing is loaded
    fn columns(&self) -> Result<Option<Vec<ColumnDescriptor>>>;

    fn row_count(&self) -> Result<u64>;

    fn numeric_aggregate(&self, column: &str) -> Result<NumericAggregate>;

    /// `(bucket index, count)` for the non-null values of `column`; indices
    /// past the last bucket are already folded into it
    fn bucket_counts(
        &self,
        column: &str,
        min: f64,
        width: f64,
        buckets: usize,
    ) -> Result<Vec<(usize, u64)>>;

    fn text_aggregate(&self, column: &str) -> Result<TextAggregate>;

    /// Most frequent non-null values, count descending, ties by first appearance
    fn top_values(&self, column: &str, limit: usize) -> Result<Vec<ValueCount>>;

    fn query(&self, sql: &str) -> Result<QueryResult>;

    fn sample_rows(&self, limit: usize) -> Result<Vec<Vec<CellValue>>>;
}

/// Open the store selected by configuration
pub fn open(config: &Config) -> Result<Box<dyn TableStore>> {
    match config.strategy {
        StorageStrategy::Native => Ok(Box::new(PolarsStore::new(config.infer_schema_length))),
        StorageStrategy::Manual => Ok(Box::new(SqliteStore::open_in_memory()?)),
    }
}

/// Double-quote an identifier for SQL, doubling embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
