//! Ingestion behaviour shared by both storage strategies

use csvscope::{ColumnDescriptor, ColumnType, ScopeError, StorageStrategy, Workspace};
use std::io::Write;

const STRATEGIES: [StorageStrategy; 2] = [StorageStrategy::Manual, StorageStrategy::Native];

fn workspace(strategy: StorageStrategy) -> Workspace {
    Workspace::with_strategy(strategy).unwrap()
}

fn column_names(workspace: &Workspace) -> Vec<String> {
    workspace
        .summarize()
        .unwrap()
        .columns
        .into_iter()
        .map(|c| c.name)
        .collect()
}

#[test]
fn test_load_infers_types_and_counts_rows() {
    for strategy in STRATEGIES {
        let workspace = workspace(strategy);
        let summary = workspace
            .load_bytes("id,score,name\n1,2.5,a\n2,3.5,b\n3,,c\n")
            .unwrap();

        assert_eq!(summary.row_count, 3, "{} strategy", strategy);
        assert_eq!(summary.column_count, 3);
        assert_eq!(
            summary.columns,
            vec![
                ColumnDescriptor::new("id", ColumnType::Integer),
                ColumnDescriptor::new("score", ColumnType::Real),
                ColumnDescriptor::new("name", ColumnType::Text),
            ],
            "{} strategy",
            strategy
        );
    }
}

#[test]
fn test_whole_numbers_stay_integer() {
    for strategy in STRATEGIES {
        let workspace = workspace(strategy);
        let summary = workspace.load_bytes("count\n10\n20\n-3\n").unwrap();
        assert_eq!(summary.columns[0].column_type, ColumnType::Integer, "{} strategy", strategy);
    }
}

#[test]
fn test_load_from_path() {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(b"city,population\nOslo,700000\nBergen,285000\n").unwrap();
    file.flush().unwrap();

    for strategy in STRATEGIES {
        let workspace = workspace(strategy);
        let summary = workspace.load_path(file.path()).unwrap();
        assert_eq!(summary.row_count, 2);
        assert_eq!(summary.column_names(), vec!["city", "population"]);
    }
}

#[test]
fn test_reload_replaces_table() {
    for strategy in STRATEGIES {
        let workspace = workspace(strategy);
        workspace.load_bytes("a,b,c\n1,2,3\n").unwrap();
        workspace.load_bytes("x,y\nfoo,1\nbar,2\n").unwrap();

        assert_eq!(column_names(&workspace), vec!["x", "y"], "{} strategy", strategy);
        assert_eq!(workspace.summarize().unwrap().row_count, 2);
    }
}

#[test]
fn test_empty_input_keeps_previous_table() {
    for strategy in STRATEGIES {
        let workspace = workspace(strategy);
        workspace.load_bytes("a,b\n1,2\n").unwrap();

        for csv in ["", "\n\n", " \r\n  \n"] {
            let err = workspace.load_bytes(csv).unwrap_err();
            assert!(
                matches!(err, ScopeError::EmptyInput(_)),
                "{} strategy, {:?}: {}",
                strategy,
                csv,
                err
            );
        }
        assert_eq!(column_names(&workspace), vec!["a", "b"]);
    }
}

#[test]
fn test_manual_wide_row_fails_and_keeps_previous_table() {
    let workspace = workspace(StorageStrategy::Manual);
    workspace.load_bytes("a\n1\n").unwrap();

    let err = workspace.load_bytes("x,y\n1,2\n3,4,5\n").unwrap_err();
    assert!(matches!(err, ScopeError::Parse(_)));
    assert_eq!(column_names(&workspace), vec!["a"]);
    assert_eq!(workspace.summarize().unwrap().row_count, 1);
}

#[test]
fn test_manual_short_rows_are_padded_with_nulls() {
    let workspace = workspace(StorageStrategy::Manual);
    workspace.load_bytes("a,b\n1,2\n3\n").unwrap();

    let result = workspace.query("SELECT b FROM tablename WHERE a = 3").unwrap();
    assert_eq!(result.rows.len(), 1);
    assert!(result.rows[0][0].is_null());
}

#[test]
fn test_manual_sanitizes_header_names() {
    let workspace = workspace(StorageStrategy::Manual);
    let summary = workspace
        .load_bytes("first name,first-name, ,x\n1,2,3,4\n")
        .unwrap();
    assert_eq!(summary.column_names(), vec!["first_name", "col_1", "col_2", "x"]);
}
