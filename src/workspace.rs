//! Workspace - the process-wide holder of the single loaded table
//!
//! Loads take the write lock for the whole replacement. Summaries, queries
//! and snapshots hold the read lock until they finish, so they always see
//! one committed table.

use crate::config::{Config, StorageStrategy};
use crate::error::{Result, ScopeError};
use crate::ingestion::{CsvSource, LoadSummary};
use crate::query::{ensure_read_only, QueryResult};
use crate::snapshot::SchemaSnapshot;
use crate::stats::{summarize, TableSummary};
use crate::store::{self, TableStore};
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

pub struct Workspace {
    config: Config,
    store: RwLock<Box<dyn TableStore>>,
}

impl Workspace {
    /// Create an empty workspace backed by the configured strategy
    pub fn new(config: Config) -> Result<Self> {
        let store = store::open(&config)?;
        info!("Workspace ready (strategy: {})", config.strategy);
        Ok(Self {
            config,
            store: RwLock::new(store),
        })
    }

    pub fn with_strategy(strategy: StorageStrategy) -> Result<Self> {
        Self::new(Config::with_strategy(strategy))
    }

    pub fn strategy(&self) -> StorageStrategy {
        self.config.strategy
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Box<dyn TableStore>>> {
        self.store
            .read()
            .map_err(|e| ScopeError::Lock(format!("table store lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Box<dyn TableStore>>> {
        self.store
            .write()
            .map_err(|e| ScopeError::Lock(format!("table store lock poisoned: {}", e)))
    }

    /// Replace the current table with `source`.
    ///
    /// On failure the previously loaded table (if any) is still in place.
    pub fn load(&self, source: &CsvSource) -> Result<LoadSummary> {
        info!("Loading CSV from {} ({} strategy)", source.describe(), self.config.strategy);
        let mut store = self.write()?;
        match store.load(source) {
            Ok(summary) => {
                info!(
                    "  Loaded {} rows x {} columns",
                    summary.row_count, summary.column_count
                );
                Ok(summary)
            }
            Err(e) => {
                warn!("  Load failed, keeping previous table: {}", e);
                Err(e)
            }
        }
    }

    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<LoadSummary> {
        self.load(&CsvSource::from_path(path))
    }

    pub fn load_bytes(&self, bytes: impl Into<Vec<u8>>) -> Result<LoadSummary> {
        self.load(&CsvSource::from_bytes(bytes))
    }

    pub fn summarize(&self) -> Result<TableSummary> {
        let store = self.read()?;
        summarize(&**store)
    }

    /// Run a read-only query against the loaded table
    pub fn query(&self, sql: &str) -> Result<QueryResult> {
        ensure_read_only(sql)?;
        let store = self.read()?;
        store.query(sql)
    }

    /// `None` when no table has been loaded yet
    pub fn schema_snapshot(&self) -> Result<Option<SchemaSnapshot>> {
        let store = self.read()?;
        let columns = match store.columns()? {
            Some(columns) => columns,
            None => return Ok(None),
        };
        Ok(Some(SchemaSnapshot {
            row_count: store.row_count()?,
            columns,
            sample_limit: self.config.sample_rows,
            sample_rows: store.sample_rows(self.config.sample_rows)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_workspace_is_empty() {
        let workspace = Workspace::with_strategy(StorageStrategy::Manual).unwrap();
        assert_eq!(workspace.summarize().unwrap(), TableSummary::empty());
        assert!(workspace.schema_snapshot().unwrap().is_none());
    }

    #[test]
    fn test_query_rejects_mutation_before_touching_store() {
        let workspace = Workspace::with_strategy(StorageStrategy::Manual).unwrap();
        workspace.load_bytes("a\n1\n").unwrap();
        assert!(matches!(
            workspace.query("DROP TABLE tablename"),
            Err(ScopeError::Query(_))
        ));
        assert_eq!(workspace.summarize().unwrap().row_count, 1);
    }

    #[test]
    fn test_snapshot_respects_sample_limit() {
        let config = Config {
            sample_rows: 2,
            ..Config::with_strategy(StorageStrategy::Manual)
        };
        let workspace = Workspace::new(config).unwrap();
        assert_eq!(workspace.config().sample_rows, 2);
        workspace.load_bytes("n\n1\n2\n3\n4\n").unwrap();

        let snapshot = workspace.schema_snapshot().unwrap().unwrap();
        assert_eq!(snapshot.row_count, 4);
        assert_eq!(snapshot.sample_limit, 2);
        assert_eq!(snapshot.sample_rows.len(), 2);
    }
}
