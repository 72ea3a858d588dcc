pub mod config;
pub mod error;
pub mod ingestion;
pub mod query;
pub mod snapshot;
pub mod stats;
pub mod store;
pub mod workspace;

pub use config::{Config, StorageStrategy};
pub use error::{Result, ScopeError};
pub use ingestion::{ColumnDescriptor, ColumnType, CsvSource, LoadSummary};
pub use query::{CellValue, QueryResult};
pub use snapshot::{schema_context, SchemaSnapshot};
pub use stats::{ColumnStats, ColumnSummary, Distribution, TableSummary};
pub use workspace::Workspace;
