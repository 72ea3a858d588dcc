//! CSV Reader - tolerant parsing of raw CSV into a header + row grid

use super::sanitize_column_names;
use crate::error::{Result, ScopeError};
use csv::{ReaderBuilder, Trim};
use std::io::Read;

/// Parsed CSV with sanitized headers; every row is exactly header-width
#[derive(Debug, Clone, PartialEq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    /// Blank cells and cells missing from short rows are `None`
    pub rows: Vec<Vec<Option<String>>>,
}

impl CsvTable {
    pub fn width(&self) -> usize {
        self.headers.len()
    }
}

/// Read a whole CSV.
///
/// Quotes are handled permissively and every field is whitespace-trimmed.
/// Rows shorter than the header are padded with nulls; a row wider than the
/// header is rejected.
pub fn read_csv<R: Read>(reader: R) -> Result<CsvTable> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut records = rdr.records();

    let header = match records.next() {
        Some(result) => result.map_err(|e| ScopeError::Parse(e.to_string()))?,
        None => return Err(ScopeError::EmptyInput("CSV has no header row".to_string())),
    };
    if header.is_empty() {
        return Err(ScopeError::EmptyInput("CSV header has no columns".to_string()));
    }
    // a whitespace-only first line is not a header
    if header.iter().all(str::is_empty) {
        return Err(ScopeError::EmptyInput("CSV has no header row".to_string()));
    }

    let raw_headers: Vec<&str> = header.iter().collect();
    let headers = sanitize_column_names(&raw_headers);
    let width = headers.len();

    let mut rows = Vec::new();
    for (idx, result) in records.enumerate() {
        let record = result.map_err(|e| ScopeError::Parse(e.to_string()))?;
        if record.len() > width {
            // header is line 1
            return Err(ScopeError::Parse(format!(
                "row {} has {} fields but the header has {}",
                idx + 2,
                record.len(),
                width
            )));
        }

        let mut row: Vec<Option<String>> = record.iter().map(coerce_cell).collect();
        row.resize(width, None);
        rows.push(row);
    }

    Ok(CsvTable { headers, rows })
}

fn coerce_cell(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_header_and_rows() {
        let table = read_csv("id, name\n1, alice\n2,bob\n".as_bytes()).unwrap();
        assert_eq!(table.headers, vec!["id", "name"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], vec![Some("1".to_string()), Some("alice".to_string())]);
    }

    #[test]
    fn test_header_only_has_no_rows() {
        let table = read_csv("a,b,c\n".as_bytes()).unwrap();
        assert_eq!(table.width(), 3);
        assert!(table.rows.is_empty());
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(matches!(read_csv("".as_bytes()), Err(ScopeError::EmptyInput(_))));
        assert!(matches!(read_csv("\n\n".as_bytes()), Err(ScopeError::EmptyInput(_))));
        assert!(matches!(read_csv("  \r\n \n".as_bytes()), Err(ScopeError::EmptyInput(_))));
    }

    #[test]
    fn test_blank_cells_become_null() {
        let table = read_csv("a,b\n  ,x\n3,\n".as_bytes()).unwrap();
        assert_eq!(table.rows[0][0], None);
        assert_eq!(table.rows[1][1], None);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let table = read_csv("a,b,c\n1\n".as_bytes()).unwrap();
        assert_eq!(table.rows[0], vec![Some("1".to_string()), None, None]);
    }

    #[test]
    fn test_wide_rows_are_rejected() {
        let err = read_csv("a,b\n1,2,3\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ScopeError::Parse(_)));
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn test_loose_quotes_are_tolerated() {
        let table = read_csv("name,note\nbob,he said \"hi\" twice\n\"x, y\",ok\n".as_bytes()).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1][0].as_deref(), Some("x, y"));
    }

    #[test]
    fn test_quoted_empty_cell_is_null() {
        let table = read_csv("a\n1\n\"\"\n3\n".as_bytes()).unwrap();
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[1][0], None);
    }
}
