//! SQLite store - manual ingestion strategy
//!
//! CSV is parsed and typed by the ingestion module, then written into an
//! in-memory SQLite table. Drop, create and every insert share a single
//! transaction: SQLite DDL is transactional, so a failed load rolls back to
//! whatever table existed before.

use super::{quote_ident, TableStore, TABLE_NAME};
use crate::config::StorageStrategy;
use crate::error::{Result, ScopeError};
use crate::ingestion::{
    infer_column_types, read_csv, ColumnDescriptor, ColumnType, CsvSource, CsvTable, LoadSummary,
};
use crate::query::{CellValue, QueryResult};
use crate::stats::{NumericAggregate, TextAggregate, ValueCount};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection};
use std::fs::File;
use std::io::BufReader;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory()
            .map_err(|e| ScopeError::Database(format!("Failed to open sqlite: {}", e)))?;
        Ok(Self { db: Mutex::new(db) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| ScopeError::Lock("sqlite connection mutex poisoned".to_string()))
    }

    fn table() -> String {
        quote_ident(TABLE_NAME)
    }

    fn replace_table(&self, table: &CsvTable, types: &[ColumnType]) -> Result<()> {
        let mut db = self.lock()?;
        let tx = db.transaction()?;

        tx.execute(&format!("DROP TABLE IF EXISTS {}", Self::table()), [])
            .map_err(|e| ScopeError::TableCreation(e.to_string()))?;

        let column_defs: Vec<String> = table
            .headers
            .iter()
            .zip(types)
            .map(|(name, ty)| format!("{} {}", quote_ident(name), ty.as_sql()))
            .collect();
        let create_sql = format!("CREATE TABLE {} ({})", Self::table(), column_defs.join(", "));
        tx.execute(&create_sql, [])
            .map_err(|e| ScopeError::TableCreation(e.to_string()))?;

        {
            let placeholders = vec!["?"; table.width()].join(", ");
            let insert_sql = format!("INSERT INTO {} VALUES ({})", Self::table(), placeholders);
            let mut stmt = tx
                .prepare(&insert_sql)
                .map_err(|e| ScopeError::Insertion(format!("failed to prepare insert: {}", e)))?;

            for (idx, row) in table.rows.iter().enumerate() {
                let values: Vec<Value> = row
                    .iter()
                    .zip(types)
                    .map(|(cell, ty)| to_sql_value(cell.as_deref(), *ty))
                    .collect();
                stmt.execute(params_from_iter(values.iter())).map_err(|e| {
                    ScopeError::Insertion(format!("row {}: {}", idx + 1, e))
                })?;
            }
        }

        tx.commit()
            .map_err(|e| ScopeError::Insertion(format!("failed to commit: {}", e)))?;
        Ok(())
    }
}

impl TableStore for SqliteStore {
    fn strategy(&self) -> StorageStrategy {
        StorageStrategy::Manual
    }

    fn load(&mut self, source: &CsvSource) -> Result<LoadSummary> {
        let start = Instant::now();

        let table = match source {
            CsvSource::Bytes(bytes) => read_csv(bytes.as_slice())?,
            CsvSource::Path(path) => read_csv(BufReader::new(File::open(path)?))?,
        };
        let types = infer_column_types(table.width(), &table.rows);
        debug!(
            "  parsed {} rows, inferred types {:?}",
            table.rows.len(),
            types
        );

        if let Err(e) = self.replace_table(&table, &types) {
            warn!("Load rolled back, previous table kept: {}", e);
            return Err(e);
        }

        let columns = table
            .headers
            .iter()
            .zip(&types)
            .map(|(name, ty)| ColumnDescriptor::new(name.clone(), *ty))
            .collect();
        info!(
            "  CSV loaded into sqlite in {:.1}s",
            start.elapsed().as_secs_f64()
        );
        Ok(LoadSummary::new(table.rows.len() as u64, columns))
    }

    fn columns(&self) -> Result<Option<Vec<ColumnDescriptor>>> {
        let db = self.lock()?;
        let mut stmt = db.prepare(&format!("PRAGMA table_info({})", Self::table()))?;
        let columns = stmt
            .query_map([], |row| {
                let name: String = row.get(1)?;
                let declared: String = row.get(2)?;
                Ok((name, declared))
            })?
            .map(|r| -> Result<ColumnDescriptor> {
                let (name, declared) = r?;
                let column_type =
                    ColumnType::from_declared(&declared).unwrap_or(ColumnType::Text);
                Ok(ColumnDescriptor::new(name, column_type))
            })
            .collect::<Result<Vec<_>>>()?;

        if columns.is_empty() {
            Ok(None)
        } else {
            Ok(Some(columns))
        }
    }

    fn row_count(&self) -> Result<u64> {
        let db = self.lock()?;
        let count: i64 = db.query_row(
            &format!("SELECT COUNT(*) FROM {}", Self::table()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn numeric_aggregate(&self, column: &str) -> Result<NumericAggregate> {
        let db = self.lock()?;
        let c = quote_ident(column);
        let sql = format!(
            "SELECT MIN({c}), MAX({c}), AVG({c}), COUNT(*) - COUNT({c}), COUNT({c}) FROM {t}",
            c = c,
            t = Self::table()
        );
        let agg = db.query_row(&sql, [], |row| {
            Ok(NumericAggregate {
                min: row.get::<_, Option<f64>>(0)?,
                max: row.get::<_, Option<f64>>(1)?,
                mean: row.get::<_, Option<f64>>(2)?,
                null_count: row.get::<_, i64>(3)? as u64,
                non_null_count: row.get::<_, i64>(4)? as u64,
            })
        })?;
        Ok(agg)
    }

    fn bucket_counts(
        &self,
        column: &str,
        min: f64,
        width: f64,
        buckets: usize,
    ) -> Result<Vec<(usize, u64)>> {
        let db = self.lock()?;
        let c = quote_ident(column);
        // CAST truncates toward zero, which is floor for values >= min
        let sql = format!(
            "SELECT CASE WHEN CAST(({c} - ?1) / ?2 AS INTEGER) >= ?3 THEN ?3 - 1 \
             ELSE CAST(({c} - ?1) / ?2 AS INTEGER) END AS bucket, COUNT(*) \
             FROM {t} WHERE {c} IS NOT NULL GROUP BY bucket ORDER BY bucket",
            c = c,
            t = Self::table()
        );
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(params![min, width, buckets as i64], |row| {
            Ok((row.get::<_, Option<i64>>(0)?, row.get::<_, i64>(1)?))
        })?;

        // NaN arithmetic comes back as a NULL bucket; fold it like bucket_index
        let mut counts = Vec::new();
        for row in rows {
            let (bucket, count) = row?;
            let idx = match bucket {
                Some(b) if b > 0 => b as usize,
                _ => 0,
            };
            counts.push((idx, count as u64));
        }
        Ok(counts)
    }

    fn text_aggregate(&self, column: &str) -> Result<TextAggregate> {
        let db = self.lock()?;
        let c = quote_ident(column);
        let sql = format!(
            "SELECT COUNT(DISTINCT {c}), COUNT(*) - COUNT({c}) FROM {t}",
            c = c,
            t = Self::table()
        );
        let agg = db.query_row(&sql, [], |row| {
            Ok(TextAggregate {
                unique_count: row.get::<_, i64>(0)? as u64,
                null_count: row.get::<_, i64>(1)? as u64,
            })
        })?;
        Ok(agg)
    }

    fn top_values(&self, column: &str, limit: usize) -> Result<Vec<ValueCount>> {
        let db = self.lock()?;
        let c = quote_ident(column);
        let sql = format!(
            "SELECT {c}, COUNT(*) AS cnt FROM {t} WHERE {c} IS NOT NULL \
             GROUP BY {c} ORDER BY cnt DESC, MIN(rowid) ASC LIMIT ?1",
            c = c,
            t = Self::table()
        );
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            let value = CellValue::from(row.get_ref(0)?).to_string();
            let count: i64 = row.get(1)?;
            Ok(ValueCount::new(value, count as u64))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn query(&self, sql: &str) -> Result<QueryResult> {
        let db = self.lock()?;
        let mut stmt = db.prepare(sql).map_err(|e| ScopeError::Query(e.to_string()))?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut rows = stmt.query([]).map_err(|e| ScopeError::Query(e.to_string()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|e| ScopeError::Query(e.to_string()))? {
            let mut values = Vec::with_capacity(width);
            for idx in 0..width {
                let value = row
                    .get_ref(idx)
                    .map_err(|e| ScopeError::Query(e.to_string()))?;
                values.push(CellValue::from(value));
            }
            out.push(values);
        }

        Ok(QueryResult { columns, rows: out })
    }

    fn sample_rows(&self, limit: usize) -> Result<Vec<Vec<CellValue>>> {
        let sql = format!("SELECT * FROM {} LIMIT {}", Self::table(), limit);
        Ok(self.query(&sql)?.rows)
    }
}

/// Typed binding for one cell; inference guarantees the parse succeeds
fn to_sql_value(cell: Option<&str>, column_type: ColumnType) -> Value {
    let raw = match cell {
        Some(raw) => raw,
        None => return Value::Null,
    };
    match column_type {
        ColumnType::Integer => raw
            .parse::<i64>()
            .map(Value::Integer)
            .unwrap_or_else(|_| Value::Text(raw.to_string())),
        ColumnType::Real => raw
            .parse::<f64>()
            .map(Value::Real)
            .unwrap_or_else(|_| Value::Text(raw.to_string())),
        ColumnType::Text => Value::Text(raw.to_string()),
    }
}

impl From<ValueRef<'_>> for CellValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => CellValue::Null,
            ValueRef::Integer(i) => CellValue::Integer(i),
            ValueRef::Real(r) => CellValue::Real(r),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                CellValue::Text(String::from_utf8_lossy(bytes).into_owned())
            }
        }
    }
}
