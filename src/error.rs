use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScopeError {
    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Failed to parse CSV: {0}")]
    Parse(String),

    #[error("Failed to create table: {0}")]
    TableCreation(String),

    #[error("Failed to insert row: {0}")]
    Insertion(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl From<polars::error::PolarsError> for ScopeError {
    fn from(err: polars::error::PolarsError) -> Self {
        ScopeError::Polars(err.to_string())
    }
}

impl From<rusqlite::Error> for ScopeError {
    fn from(err: rusqlite::Error) -> Self {
        ScopeError::Database(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScopeError>;
