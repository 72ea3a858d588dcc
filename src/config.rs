//! Process configuration
//!
//! Read once at startup from the environment (after `.env` has been loaded)
//! and optionally overridden by CLI flags. The storage strategy chosen here
//! backs the whole process; it is never switched per request.

use crate::error::{Result, ScopeError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const STRATEGY_ENV: &str = "CSVSCOPE_STRATEGY";
pub const INFER_SCHEMA_LENGTH_ENV: &str = "CSVSCOPE_INFER_SCHEMA_LENGTH";
pub const SAMPLE_ROWS_ENV: &str = "CSVSCOPE_SAMPLE_ROWS";

const DEFAULT_SAMPLE_ROWS: usize = 3;

/// Which ingestion backend owns the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageStrategy {
    /// Polars' CSV reader parses, types and loads the file in one step
    Native,
    /// CSV is parsed and typed here, then inserted into SQLite
    #[default]
    Manual,
}

impl FromStr for StorageStrategy {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "native" | "polars" => Ok(StorageStrategy::Native),
            "manual" | "sqlite" => Ok(StorageStrategy::Manual),
            other => Err(ScopeError::Config(format!(
                "unknown storage strategy '{}' (expected 'native' or 'manual')",
                other
            ))),
        }
    }
}

impl fmt::Display for StorageStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageStrategy::Native => write!(f, "native"),
            StorageStrategy::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub strategy: StorageStrategy,

    /// Rows the native reader samples for type inference (`None` = whole file)
    pub infer_schema_length: Option<usize>,

    /// Rows included in the schema snapshot handed to query assistants
    pub sample_rows: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategy: StorageStrategy::default(),
            infer_schema_length: None,
            sample_rows: DEFAULT_SAMPLE_ROWS,
        }
    }
}

impl Config {
    pub fn with_strategy(strategy: StorageStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Build from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or blank keys keep defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(raw) = value(STRATEGY_ENV) {
            config.strategy = raw.parse()?;
        }

        if let Some(raw) = value(INFER_SCHEMA_LENGTH_ENV) {
            let rows = parse_count(INFER_SCHEMA_LENGTH_ENV, &raw)?;
            config.infer_schema_length = if rows == 0 { None } else { Some(rows) };
        }

        if let Some(raw) = value(SAMPLE_ROWS_ENV) {
            config.sample_rows = parse_count(SAMPLE_ROWS_ENV, &raw)?;
        }

        Ok(config)
    }
}

fn parse_count(key: &str, raw: &str) -> Result<usize> {
    raw.trim().parse::<usize>().map_err(|e| {
        ScopeError::Config(format!("{} must be a non-negative integer, got '{}': {}", key, raw, e))
    })
}
