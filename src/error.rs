//! Error type shared by every pipeline stage

use std::io;

use polars::prelude::PolarsError;
use thiserror::Error;

/// Reasons a score file cannot be processed.
///
/// The `Display` text is the `<reason>` part of the user-facing
/// "cannot process this file: <reason>" message.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("missing required column '{0}'")]
    MissingColumn(String),
    #[error("cannot read spreadsheet: {0}")]
    Spreadsheet(String),
    #[error("the file contains no student rows")]
    EmptyDataset,
    #[error("no subject score columns found besides '{0}'")]
    NoSubjects(String),
    #[error("column '{column}' must contain numeric scores, found {dtype}")]
    NonNumericColumn { column: String, dtype: String },
    #[error("column '{column}' has {count} missing value(s)")]
    MissingValues { column: String, count: usize },
    #[error("column '{column}' has a non-finite score in row {row}")]
    InvalidScore { column: String, row: usize },
    #[error("student name is missing in row {0}")]
    MissingName(usize),
    #[error("duplicate student name '{name}' in rows {first} and {second}")]
    DuplicateName {
        name: String,
        first: usize,
        second: usize,
    },
    #[error("need at least {required} students to form {required} clusters, found {found}")]
    TooFewRecords { found: usize, required: usize },
    #[error("only {distinct} distinct score profile(s), need at least {required}")]
    TooFewDistinct { distinct: usize, required: usize },
    #[error("cluster {0} ended up with no students")]
    EmptyCluster(usize),
    #[error("clustering failed: {0}")]
    Clustering(String),
    #[error("expected {expected} score(s), got {found}")]
    ScoreCount { expected: usize, found: usize },
    #[error("invalid score value '{0}'")]
    InvalidInput(String),
    #[error("student '{0}' not found")]
    UnknownStudent(String),
    #[error("rendering failed: {0}")]
    Render(String),
    #[error(transparent)]
    Polars(#[from] PolarsError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
