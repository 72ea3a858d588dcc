//! Polars store - native ingestion strategy
//!
//! The polars CSV reader does the parsing, type inference and loading in one
//! step. The resulting frame only replaces the current one once it has been
//! read completely, so a failed load leaves the previous table in place.

use super::{TableStore, TABLE_NAME};
use crate::config::StorageStrategy;
use crate::error::{Result, ScopeError};
use crate::ingestion::{
    infer_column_type, sanitize_column_names, ColumnDescriptor, ColumnType, CsvSource, LoadSummary,
};
use crate::query::{CellValue, QueryResult};
use crate::stats::{bucket_index, NumericAggregate, TextAggregate, ValueCount};
use polars::prelude::*;
use polars::sql::SQLContext;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Instant;
use tempfile::NamedTempFile;
use tracing::{debug, info};

struct LoadedFrame {
    frame: DataFrame,
    columns: Vec<ColumnDescriptor>,
}

pub struct PolarsStore {
    infer_schema_length: Option<usize>,
    loaded: Option<LoadedFrame>,
}

impl PolarsStore {
    /// `infer_schema_length` of `None` scans every row before typing a column
    pub fn new(infer_schema_length: Option<usize>) -> Self {
        Self {
            infer_schema_length,
            loaded: None,
        }
    }

    fn frame(&self) -> Result<&DataFrame> {
        self.loaded
            .as_ref()
            .map(|l| &l.frame)
            .ok_or_else(|| ScopeError::Query("no table loaded".to_string()))
    }

    fn read_frame(&self, path: &Path) -> Result<DataFrame> {
        if is_blank_file(path)? {
            return Err(ScopeError::EmptyInput("CSV has no header row".to_string()));
        }

        LazyCsvReader::new(path)
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .finish()
            .and_then(|lf| lf.collect())
            .map_err(|e| ScopeError::Parse(format!("failed to load CSV: {}", e)))
    }

    /// Non-null, non-NaN values of a column as f64
    fn numeric_values(&self, column: &str) -> Result<Vec<Option<f64>>> {
        let series = self.frame()?.column(column)?.cast(&DataType::Float64)?;
        let values = series
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect();
        Ok(values)
    }

    fn text_values(&self, column: &str) -> Result<Vec<Option<String>>> {
        let series = self.frame()?.column(column)?.cast(&DataType::String)?;
        let values = series
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect();
        Ok(values)
    }
}

/// True when the file holds nothing but whitespace and line breaks
fn is_blank_file(path: &Path) -> Result<bool> {
    let mut file = File::open(path)?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            return Ok(true);
        }
        if buf[..n].iter().any(|b| !b.is_ascii_whitespace()) {
            return Ok(false);
        }
    }
}

/// Re-type a column the engine left as text.
///
/// Cells are trimmed and blanks become null, then the column is narrowed with
/// [`infer_column_type`]: `" 1 ", "  ", "3"` is an integer column with a null.
fn retype_text_column(series: &Series) -> Result<Series> {
    let cells: Vec<Option<String>> = series
        .str()?
        .into_iter()
        .map(|v| v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string))
        .collect();
    let name = series.name();

    let retyped = match infer_column_type(cells.iter().flatten().map(String::as_str)) {
        ColumnType::Integer => {
            let values: Vec<Option<i64>> = cells
                .iter()
                .map(|v| v.as_deref().and_then(|s| s.parse().ok()))
                .collect();
            Series::new(name, values)
        }
        ColumnType::Real => {
            let values: Vec<Option<f64>> = cells
                .iter()
                .map(|v| v.as_deref().and_then(|s| s.parse().ok()))
                .collect();
            Series::new(name, values)
        }
        ColumnType::Text => Series::new(name, cells),
    };
    Ok(retyped)
}

/// The native reader consumes a path, so in-memory uploads are spooled first
fn spool_to_tempfile(bytes: &[u8]) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("csvscope_upload_")
        .suffix(".csv")
        .tempfile()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}

impl TableStore for PolarsStore {
    fn strategy(&self) -> StorageStrategy {
        StorageStrategy::Native
    }

    fn load(&mut self, source: &CsvSource) -> Result<LoadSummary> {
        let start = Instant::now();

        // the spool file must outlive the read
        let (path, _spool) = match source {
            CsvSource::Path(path) => (path.clone(), None),
            CsvSource::Bytes(bytes) => {
                let file = spool_to_tempfile(bytes)?;
                (file.path().to_path_buf(), Some(file))
            }
        };

        let mut frame = self.read_frame(&path)?;
        info!("  CSV loaded in {:.1}s", start.elapsed().as_secs_f64());

        if frame.width() == 0 {
            return Err(ScopeError::EmptyInput("CSV header has no columns".to_string()));
        }

        let raw_names: Vec<String> = frame
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let names = sanitize_column_names(&raw_names);
        if names != raw_names {
            debug!("  renaming columns {:?} -> {:?}", raw_names, names);
            frame.set_column_names(&names[..])?;
        }

        let normalized = frame
            .get_columns()
            .iter()
            .map(|s| match s.dtype() {
                DataType::String => retype_text_column(s),
                _ => Ok(s.clone()),
            })
            .collect::<Result<Vec<Series>>>()?;
        let frame = DataFrame::new(normalized)?;

        let columns: Vec<ColumnDescriptor> = frame
            .get_columns()
            .iter()
            .map(|s| {
                let engine_type = format!("{:?}", s.dtype());
                ColumnDescriptor::new(s.name().to_string(), ColumnType::from_engine_type_name(&engine_type))
            })
            .collect();

        let summary = LoadSummary::new(frame.height() as u64, columns.clone());
        self.loaded = Some(LoadedFrame { frame, columns });
        Ok(summary)
    }

    fn columns(&self) -> Result<Option<Vec<ColumnDescriptor>>> {
        Ok(self.loaded.as_ref().map(|l| l.columns.clone()))
    }

    fn row_count(&self) -> Result<u64> {
        Ok(self.loaded.as_ref().map_or(0, |l| l.frame.height() as u64))
    }

    fn numeric_aggregate(&self, column: &str) -> Result<NumericAggregate> {
        let values = self.numeric_values(column)?;

        let mut agg = NumericAggregate::default();
        let mut sum = 0.0;
        for value in values {
            match value {
                Some(v) => {
                    agg.non_null_count += 1;
                    sum += v;
                    agg.min = Some(agg.min.map_or(v, |m| m.min(v)));
                    agg.max = Some(agg.max.map_or(v, |m| m.max(v)));
                }
                None => agg.null_count += 1,
            }
        }
        if agg.non_null_count > 0 {
            agg.mean = Some(sum / agg.non_null_count as f64);
        }
        Ok(agg)
    }

    fn bucket_counts(
        &self,
        column: &str,
        min: f64,
        width: f64,
        buckets: usize,
    ) -> Result<Vec<(usize, u64)>> {
        let mut counts = vec![0u64; buckets];
        for v in self.numeric_values(column)?.into_iter().flatten() {
            counts[bucket_index(v, min, width, buckets)] += 1;
        }
        Ok(counts
            .into_iter()
            .enumerate()
            .filter(|(_, count)| *count > 0)
            .collect())
    }

    fn text_aggregate(&self, column: &str) -> Result<TextAggregate> {
        let values = self.text_values(column)?;
        let mut distinct: HashSet<&str> = HashSet::new();
        let mut null_count = 0u64;
        for value in &values {
            match value {
                Some(v) => {
                    distinct.insert(v.as_str());
                }
                None => null_count += 1,
            }
        }
        Ok(TextAggregate {
            unique_count: distinct.len() as u64,
            null_count,
        })
    }

    fn top_values(&self, column: &str, limit: usize) -> Result<Vec<ValueCount>> {
        let values = self.text_values(column)?;

        // value -> (count, first row seen)
        let mut counts: HashMap<&str, (u64, usize)> = HashMap::new();
        for (row, value) in values.iter().enumerate() {
            if let Some(v) = value {
                counts.entry(v.as_str()).or_insert((0, row)).0 += 1;
            }
        }

        let mut ranked: Vec<(&str, u64, usize)> =
            counts.into_iter().map(|(v, (c, first))| (v, c, first)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

        Ok(ranked
            .into_iter()
            .take(limit)
            .map(|(v, c, _)| ValueCount::new(v, c))
            .collect())
    }

    fn query(&self, sql: &str) -> Result<QueryResult> {
        let mut ctx = SQLContext::new();
        if let Some(loaded) = &self.loaded {
            ctx.register(TABLE_NAME, loaded.frame.clone().lazy());
        }
        let result = ctx
            .execute(sql)
            .and_then(|lf| lf.collect())
            .map_err(|e| ScopeError::Query(e.to_string()))?;

        Ok(QueryResult {
            columns: result
                .get_column_names()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rows: frame_rows(&result)?,
        })
    }

    fn sample_rows(&self, limit: usize) -> Result<Vec<Vec<CellValue>>> {
        frame_rows(&self.frame()?.head(Some(limit)))
    }
}

fn frame_rows(df: &DataFrame) -> Result<Vec<Vec<CellValue>>> {
    let mut rows = Vec::with_capacity(df.height());
    for row_idx in 0..df.height() {
        let mut row = Vec::with_capacity(df.width());
        for series in df.get_columns() {
            row.push(series_value(series, row_idx)?);
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Convert a single value from a Polars Series to a result cell
fn series_value(series: &Series, row_idx: usize) -> Result<CellValue> {
    let value = series.get(row_idx)?;
    if matches!(value, AnyValue::Null) {
        return Ok(CellValue::Null);
    }

    let dtype = series.dtype();
    let cell = if dtype.is_integer() {
        match value.try_extract::<i64>() {
            Ok(v) => CellValue::Integer(v),
            Err(_) => CellValue::Text(value.to_string()),
        }
    } else if dtype.is_float() {
        match value.try_extract::<f64>() {
            Ok(v) => CellValue::Real(v),
            Err(_) => CellValue::Text(value.to_string()),
        }
    } else if let AnyValue::Boolean(b) = value {
        CellValue::Boolean(b)
    } else if let Some(s) = value.get_str() {
        CellValue::Text(s.to_string())
    } else {
        CellValue::Text(value.to_string())
    };
    Ok(cell)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded(csv: &str) -> PolarsStore {
        let mut store = PolarsStore::new(None);
        store.load(&CsvSource::from_bytes(csv)).unwrap();
        store
    }

    #[test]
    fn test_engine_types_are_mapped() {
        let store = loaded("id,price,name\n1,2.5,a\n2,3.0,b\n");
        let columns = store.columns().unwrap().unwrap();
        assert_eq!(
            columns,
            vec![
                ColumnDescriptor::new("id", ColumnType::Integer),
                ColumnDescriptor::new("price", ColumnType::Real),
                ColumnDescriptor::new("name", ColumnType::Text),
            ]
        );
    }

    #[test]
    fn test_header_names_are_sanitized() {
        let store = loaded("unit price,item-code\n1.5,a\n");
        let names: Vec<String> = store
            .columns()
            .unwrap()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["unit_price", "item_code"]);
    }

    #[test]
    fn test_numeric_aggregate_counts_nulls() {
        let store = loaded("v,k\n1,a\n,b\n3,c\n4,d\n");
        let agg = store.numeric_aggregate("v").unwrap();
        assert_eq!(agg.min, Some(1.0));
        assert_eq!(agg.max, Some(4.0));
        assert_eq!(agg.null_count, 1);
        assert_eq!(agg.non_null_count + agg.null_count, store.row_count().unwrap());
    }

    #[test]
    fn test_bucket_counts_clamp_top_value() {
        let store = loaded("v\n0\n5\n10\n");
        let counts = store.bucket_counts("v", 0.0, 1.0, 10).unwrap();
        assert_eq!(counts, vec![(0, 1), (5, 1), (9, 1)]);
    }

    #[test]
    fn test_top_values_ties_follow_first_appearance() {
        let store = loaded("k\nz\ny\nz\ny\nx\n");
        let top = store.top_values("k", 2).unwrap();
        assert_eq!(top, vec![ValueCount::new("z", 2), ValueCount::new("y", 2)]);
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let mut store = PolarsStore::new(None);
        for csv in ["", "\n\n", "  \r\n \n"] {
            let err = store.load(&CsvSource::from_bytes(csv)).unwrap_err();
            assert!(matches!(err, ScopeError::EmptyInput(_)), "{:?}: {}", csv, err);
        }
        assert!(store.columns().unwrap().is_none());
    }

    #[test]
    fn test_padded_numbers_are_retyped() {
        let store = loaded("v,w,k\n 1 ,2.5,a\n   , 3 ,b\n3,,c\n");
        let columns = store.columns().unwrap().unwrap();
        assert_eq!(columns[0].column_type, ColumnType::Integer);
        assert_eq!(columns[1].column_type, ColumnType::Real);
        assert_eq!(columns[2].column_type, ColumnType::Text);

        let agg = store.numeric_aggregate("v").unwrap();
        assert_eq!(agg.null_count, 1);
        assert_eq!(agg.max, Some(3.0));
    }
}
