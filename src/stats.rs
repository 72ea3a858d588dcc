//! Column Statistics Engine
//!
//! Turns the loaded table into per-column summaries for visualization:
//! numeric columns get min/max/mean and a 10-bucket equal-width histogram,
//! text columns get distinct/null counts and their most frequent values.
//! Nothing is cached; every call reads the current table.

use crate::error::Result;
use crate::ingestion::ColumnType;
use crate::store::TableStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const HISTOGRAM_BUCKETS: usize = 10;
pub const TOP_VALUES_LIMIT: usize = 10;

/// Summary of the whole table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSummary {
    pub row_count: u64,
    pub column_count: usize,
    pub columns: Vec<ColumnSummary>,
}

impl TableSummary {
    /// What callers see before anything has been uploaded
    pub fn empty() -> Self {
        Self {
            row_count: 0,
            column_count: 0,
            columns: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSummary> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Absent when the column's statistics could not be computed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<ColumnStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Distribution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnStats {
    Numeric(NumericStats),
    Categorical(CategoricalStats),
}

/// `min`/`max`/`mean` are all `None` when the column holds only nulls.
/// Infinite values are kept as-is and serialize as JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NumericStats {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub null_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoricalStats {
    pub unique_count: u64,
    pub null_count: u64,
    pub top_values: Vec<ValueCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Distribution {
    Histogram(Vec<HistogramBucket>),
    TopValues(Vec<ValueCount>),
}

impl Distribution {
    pub fn len(&self) -> usize {
        match self {
            Distribution::Histogram(buckets) => buckets.len(),
            Distribution::TopValues(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramBucket {
    pub bucket_min: f64,
    pub bucket_max: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: u64,
}

impl ValueCount {
    pub fn new(value: impl Into<String>, count: u64) -> Self {
        Self {
            value: value.into(),
            count,
        }
    }
}

/// One aggregate pass over a numeric column
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NumericAggregate {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub null_count: u64,
    pub non_null_count: u64,
}

/// One aggregate pass over a text column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextAggregate {
    pub unique_count: u64,
    pub null_count: u64,
}

/// Summarize every column of the current table.
///
/// A missing table is not an error: it yields [`TableSummary::empty`]. A
/// column whose statistics fail is still listed, just without stats.
pub fn summarize(store: &dyn TableStore) -> Result<TableSummary> {
    let columns = match store.columns()? {
        Some(columns) => columns,
        None => {
            debug!("No table loaded, returning empty summary");
            return Ok(TableSummary::empty());
        }
    };
    let row_count = store.row_count()?;

    let mut summaries = Vec::with_capacity(columns.len());
    for column in columns {
        let computed = if column.column_type.is_numeric() {
            numeric_column(store, &column.name)
        } else {
            text_column(store, &column.name)
        };

        let (stats, distribution) = match computed {
            Ok((stats, distribution)) => (Some(stats), Some(distribution)),
            Err(e) => {
                warn!("Statistics for column '{}' unavailable: {}", column.name, e);
                (None, None)
            }
        };

        summaries.push(ColumnSummary {
            name: column.name,
            column_type: column.column_type,
            stats,
            distribution,
        });
    }

    Ok(TableSummary {
        row_count,
        column_count: summaries.len(),
        columns: summaries,
    })
}

fn numeric_column(store: &dyn TableStore, column: &str) -> Result<(ColumnStats, Distribution)> {
    let agg = store.numeric_aggregate(column)?;

    let (min, max) = match (agg.min, agg.max) {
        (Some(min), Some(max)) => (min, max),
        _ => {
            let stats = NumericStats {
                min: None,
                max: None,
                mean: None,
                null_count: agg.null_count,
            };
            return Ok((ColumnStats::Numeric(stats), Distribution::Histogram(Vec::new())));
        }
    };

    let stats = NumericStats {
        min: Some(min),
        max: Some(max),
        mean: agg.mean.map(round3),
        null_count: agg.null_count,
    };

    // an infinite bound leaves no finite bucket width
    let histogram = if min == max || !min.is_finite() || !max.is_finite() {
        vec![HistogramBucket {
            bucket_min: min,
            bucket_max: max,
            count: agg.non_null_count,
        }]
    } else {
        let width = (max - min) / HISTOGRAM_BUCKETS as f64;
        let mut counts = vec![0u64; HISTOGRAM_BUCKETS];
        for (idx, count) in store.bucket_counts(column, min, width, HISTOGRAM_BUCKETS)? {
            if let Some(slot) = counts.get_mut(idx) {
                *slot += count;
            }
        }
        build_histogram(min, width, &counts)
    };

    Ok((ColumnStats::Numeric(stats), Distribution::Histogram(histogram)))
}

fn text_column(store: &dyn TableStore, column: &str) -> Result<(ColumnStats, Distribution)> {
    let agg = store.text_aggregate(column)?;
    let top_values = store.top_values(column, TOP_VALUES_LIMIT)?;

    let stats = CategoricalStats {
        unique_count: agg.unique_count,
        null_count: agg.null_count,
        top_values: top_values.clone(),
    };
    Ok((ColumnStats::Categorical(stats), Distribution::TopValues(top_values)))
}

/// Bucket a value falls into: `floor((value - min) / width)`, with the
/// column maximum (and anything past it) clamped into the last bucket.
pub fn bucket_index(value: f64, min: f64, width: f64, buckets: usize) -> usize {
    let raw = ((value - min) / width).floor();
    if raw.is_nan() || raw <= 0.0 {
        0
    } else {
        (raw as usize).min(buckets.saturating_sub(1))
    }
}

/// Equal-width buckets starting at `min`, one per entry of `counts`
pub fn build_histogram(min: f64, width: f64, counts: &[u64]) -> Vec<HistogramBucket> {
    counts
        .iter()
        .enumerate()
        .map(|(i, &count)| HistogramBucket {
            bucket_min: round3(min + i as f64 * width),
            bucket_max: round3(min + (i + 1) as f64 * width),
            count,
        })
        .collect()
}

/// Round to 3 decimal places, halves away from zero
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_index_spreads_range() {
        // [0, 100] in 10 buckets of width 10
        assert_eq!(bucket_index(0.0, 0.0, 10.0, 10), 0);
        assert_eq!(bucket_index(9.99, 0.0, 10.0, 10), 0);
        assert_eq!(bucket_index(10.0, 0.0, 10.0, 10), 1);
        assert_eq!(bucket_index(55.0, 0.0, 10.0, 10), 5);
    }

    #[test]
    fn test_bucket_index_clamps_maximum() {
        assert_eq!(bucket_index(100.0, 0.0, 10.0, 10), 9);
        // width that does not divide evenly in binary
        let (min, max) = (0.1, 0.7);
        let width = (max - min) / 10.0;
        assert_eq!(bucket_index(max, min, width, 10), 9);
    }

    #[test]
    fn test_bucket_index_never_negative() {
        assert_eq!(bucket_index(-1.0, 0.0, 10.0, 10), 0);
    }

    #[test]
    fn test_build_histogram_boundaries() {
        let counts = [1, 0, 0, 0, 0, 0, 0, 0, 0, 2];
        let buckets = build_histogram(1.0, 0.3333333, &counts);
        assert_eq!(buckets.len(), 10);
        assert_eq!(buckets[0].bucket_min, 1.0);
        assert_eq!(buckets[0].bucket_max, 1.333);
        assert_eq!(buckets[9].bucket_min, 4.0);
        assert_eq!(buckets[9].bucket_max, 4.333);
        assert_eq!(buckets.iter().map(|b| b.count).sum::<u64>(), 3);
    }

    #[test]
    fn test_bucket_index_nan_goes_to_first_bucket() {
        assert_eq!(bucket_index(f64::INFINITY, 0.0, f64::INFINITY, 10), 0);
    }

    #[test]
    fn test_round3() {
        assert_eq!(round3(2.0 / 3.0), 0.667);
        assert_eq!(round3(1.23456), 1.235);
        assert_eq!(round3(-1.2344), -1.234);
    }

    #[test]
    fn test_empty_summary_shape() {
        let json = serde_json::to_value(TableSummary::empty()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"rowCount": 0, "columnCount": 0, "columns": []})
        );
    }

    #[test]
    fn test_numeric_column_serializes_camel_case() {
        let summary = ColumnSummary {
            name: "age".to_string(),
            column_type: ColumnType::Integer,
            stats: Some(ColumnStats::Numeric(NumericStats {
                min: Some(5.0),
                max: Some(5.0),
                mean: Some(5.0),
                null_count: 1,
            })),
            distribution: Some(Distribution::Histogram(vec![HistogramBucket {
                bucket_min: 5.0,
                bucket_max: 5.0,
                count: 7,
            }])),
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["type"], "INTEGER");
        assert_eq!(json["stats"]["nullCount"], 1);
        assert_eq!(json["distribution"][0]["bucketMin"], 5.0);
        assert_eq!(json["distribution"][0]["count"], 7);
    }
}
