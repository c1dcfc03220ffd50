//! Result table, label distribution and export artifacts

use std::collections::HashMap;
use std::path::Path;

use polars::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::config::NAME_COLUMN;
use crate::data::read_csv;
use crate::error::ScoreError;
use crate::pipeline::{LabeledRow, LabeledScores};
use crate::viz::render_student_document;

pub const CLUSTER_COLUMN: &str = "Cluster";
pub const LABEL_COLUMN: &str = "Label";

/// Number of students carrying one label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
}

/// Summary document for one student
#[derive(Debug, Clone)]
pub struct StudentDocument {
    pub file_name: String,
    /// SVG page content
    pub content: String,
}

pub fn table_rows(labeled: &LabeledScores) -> Vec<LabeledRow> {
    labeled.rows().collect()
}

/// Plain-text table of name, cluster id and label, in input order
pub fn render_table(rows: &[LabeledRow]) -> String {
    let name_width = rows
        .iter()
        .map(|r| r.name.chars().count())
        .chain(std::iter::once(NAME_COLUMN.len()))
        .max()
        .unwrap_or(0);

    let mut out = format!(
        "{:<name_width$} | {} | {}\n",
        NAME_COLUMN, CLUSTER_COLUMN, LABEL_COLUMN
    );
    out.push_str(&format!("{}-|-{}-|-{}\n", "-".repeat(name_width), "-".repeat(7), "-".repeat(20)));
    for row in rows {
        out.push_str(&format!(
            "{:<name_width$} | {:>7} | {}\n",
            row.name, row.cluster, row.label
        ));
    }
    out
}

pub fn render_table_json(rows: &[LabeledRow]) -> crate::Result<String> {
    Ok(serde_json::to_string_pretty(rows)?)
}

/// Students per label, most frequent first, ties in alphabetical order
pub fn label_distribution(labeled: &LabeledScores) -> Vec<LabelCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in 0..labeled.data.len() {
        *counts.entry(labeled.label_of(row)).or_default() += 1;
    }

    let mut counts: Vec<LabelCount> = counts
        .into_iter()
        .map(|(label, count)| LabelCount {
            label: label.to_string(),
            count,
        })
        .collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    counts
}

/// The parsed table with `Cluster` and `Label` columns appended, as CSV
pub fn export_csv(labeled: &LabeledScores) -> crate::Result<Vec<u8>> {
    let clusters: Vec<u32> = labeled
        .model
        .assignments
        .iter()
        .map(|&id| id as u32)
        .collect();
    let labels: Vec<&str> = (0..labeled.data.len()).map(|i| labeled.label_of(i)).collect();

    let mut frame = labeled.data.frame.clone();
    frame.with_column(Series::new(CLUSTER_COLUMN, clusters))?;
    frame.with_column(Series::new(LABEL_COLUMN, labels))?;

    let mut buf = Vec::new();
    CsvWriter::new(&mut buf)
        .include_header(true)
        .finish(&mut frame)?;
    Ok(buf)
}

pub fn write_export(labeled: &LabeledScores, path: &Path) -> crate::Result<()> {
    let bytes = export_csv(labeled)?;
    std::fs::write(path, bytes)?;
    info!(path = %path.display(), rows = labeled.data.len(), "labeled table exported");
    Ok(())
}

/// Read back the name, cluster and label columns of an exported table
pub fn load_labeled_table(bytes: Vec<u8>) -> crate::Result<Vec<LabeledRow>> {
    let frame = read_csv(bytes)?;

    for column in [NAME_COLUMN, CLUSTER_COLUMN, LABEL_COLUMN] {
        if frame.column(column).is_err() {
            return Err(ScoreError::MissingColumn(column.to_string()));
        }
    }

    let names = frame.column(NAME_COLUMN)?.cast(&DataType::String)?;
    let clusters = frame.column(CLUSTER_COLUMN)?.cast(&DataType::UInt32)?;
    let labels = frame.column(LABEL_COLUMN)?.cast(&DataType::String)?;

    names
        .str()?
        .into_iter()
        .zip(clusters.u32()?.into_iter())
        .zip(labels.str()?.into_iter())
        .enumerate()
        .map(|(i, ((name, cluster), label))| match (name, cluster, label) {
            (Some(name), Some(cluster), Some(label)) => Ok(LabeledRow {
                name: name.to_string(),
                cluster: cluster as usize,
                label: label.to_string(),
            }),
            _ => Err(ScoreError::MissingName(i + 1)),
        })
        .collect()
}

/// Summary document for the student with this name
pub fn student_document(labeled: &LabeledScores, name: &str) -> crate::Result<StudentDocument> {
    let row = labeled.find_student(name)?;
    let name = labeled.data.names[row].as_str();
    let cluster = labeled.cluster_of(row);
    let label = labeled.label_of(row);

    let content = render_student_document(name, cluster, label)?;
    Ok(StudentDocument {
        file_name: document_file_name(row, name),
        content,
    })
}

/// `report_<row>_<slug>.svg`; the row index keeps names that slug alike apart
fn document_file_name(row: usize, name: &str) -> String {
    let slug: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    format!("report_{}_{}.svg", row + 1, slug)
}
