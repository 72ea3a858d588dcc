//! Schema Inference - column typing and header sanitization for raw CSV text

use super::ColumnType;
use std::collections::HashSet;

/// Classify one column from its raw values.
///
/// Blank entries are skipped. Integer wins if every remaining value parses as
/// a base-10 `i64`, otherwise Real if every value parses as `f64`, otherwise
/// Text. A column with nothing but blanks is Text.
pub fn infer_column_type<'a, I>(values: I) -> ColumnType
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen_any = false;
    let mut is_int = true;
    let mut is_real = true;

    for raw in values {
        let value = raw.trim();
        if value.is_empty() {
            continue;
        }
        seen_any = true;

        if is_int && value.parse::<i64>().is_err() {
            is_int = false;
        }
        if is_real && value.parse::<f64>().is_err() {
            is_real = false;
        }
        if !is_int && !is_real {
            break;
        }
    }

    if !seen_any {
        ColumnType::Text
    } else if is_int {
        ColumnType::Integer
    } else if is_real {
        ColumnType::Real
    } else {
        ColumnType::Text
    }
}

/// Infer every column of a row-major grid; missing cells count as blank
pub fn infer_column_types(width: usize, rows: &[Vec<Option<String>>]) -> Vec<ColumnType> {
    (0..width)
        .map(|col| {
            infer_column_type(
                rows.iter()
                    .filter_map(|row| row.get(col).and_then(|cell| cell.as_deref())),
            )
        })
        .collect()
}

/// Turn raw header cells into SQL-safe, unique column names.
///
/// Trims, maps spaces and hyphens to underscores, and falls back to
/// `col_<index>` when the result is empty or already taken.
pub fn sanitize_column_names<S: AsRef<str>>(headers: &[S]) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut names = Vec::with_capacity(headers.len());

    for (idx, header) in headers.iter().enumerate() {
        let cleaned = header.as_ref().trim().replace([' ', '-'], "_");
        let mut name = if cleaned.is_empty() || taken.contains(&cleaned.to_lowercase()) {
            format!("col_{}", idx)
        } else {
            cleaned
        };
        // a literal header may already be called col_<n>
        while taken.contains(&name.to_lowercase()) {
            name.push('_');
        }
        taken.insert(name.to_lowercase());
        names.push(name);
    }

    names
}
