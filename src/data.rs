//! Score table loading and min/max normalization using Polars

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_from_rs, Data, Range, Reader, Xlsx};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::ScoreError;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Scales each column independently into [0, 1] using the fitted min/max
#[derive(Debug, Clone)]
pub struct MinMaxScaler {
    pub min: Array1<f64>,
    pub max: Array1<f64>,
}

impl MinMaxScaler {
    /// Record the per-column minimum and maximum of `data`
    pub fn fit(data: &Array2<f64>) -> Self {
        let min = data.fold_axis(Axis(0), f64::INFINITY, |&acc, &v| acc.min(v));
        let max = data.fold_axis(Axis(0), f64::NEG_INFINITY, |&acc, &v| acc.max(v));
        Self { min, max }
    }

    /// Indices of columns whose min equals max
    pub fn degenerate_columns(&self) -> Vec<usize> {
        self.min
            .iter()
            .zip(self.max.iter())
            .enumerate()
            .filter(|(_, (lo, hi))| *hi - *lo <= 0.0)
            .map(|(j, _)| j)
            .collect()
    }

    /// Rescale `data` column by column. A constant column maps to 0.0.
    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        let mut scaled = data.clone();
        for (j, mut column) in scaled.axis_iter_mut(Axis(1)).enumerate() {
            let (lo, hi) = (self.min[j], self.max[j]);
            let range = hi - lo;
            if range <= 0.0 {
                column.fill(0.0);
            } else {
                column.mapv_inplace(|v| (v - lo) / range);
            }
        }
        scaled
    }
}

/// A single student's scores, aligned with `ScoreData::subjects`
#[derive(Debug, Clone, PartialEq)]
pub struct StudentRecord<'a> {
    pub name: &'a str,
    pub scores: ArrayView1<'a, f64>,
}

/// Parsed score table with its normalized feature matrix
#[derive(Debug, Clone)]
pub struct ScoreData {
    /// Student names in file order
    pub names: Vec<String>,
    /// Subject column names in file order
    pub subjects: Vec<String>,
    /// Raw scores (n_students, n_subjects)
    pub raw_scores: Array2<f64>,
    /// Min/max normalized scores (n_students, n_subjects)
    pub features: Array2<f64>,
    /// Scaler fitted on `raw_scores`
    pub scaler: MinMaxScaler,
    /// The table as parsed, used for the full export
    pub frame: DataFrame,
}

impl ScoreData {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate students in file order
    pub fn records(&self) -> impl Iterator<Item = StudentRecord<'_>> {
        self.names
            .iter()
            .zip(self.raw_scores.outer_iter())
            .map(|(name, scores)| StudentRecord { name, scores })
    }

    /// Scale a new score vector using the fitted scaler
    pub fn scale_new_scores(&self, scores: &[f64]) -> crate::Result<Array1<f64>> {
        if scores.len() != self.subjects.len() {
            return Err(ScoreError::ScoreCount {
                expected: self.subjects.len(),
                found: scores.len(),
            });
        }

        let input = Array2::from_shape_vec((1, scores.len()), scores.to_vec())
            .map_err(|e| ScoreError::InvalidInput(e.to_string()))?;
        let scaled = self.scaler.transform(&input);
        Ok(scaled.row(0).to_owned())
    }
}

/// Load a CSV or `.xlsx` score file from disk
pub fn load_scores(path: impl AsRef<Path>, config: &PipelineConfig) -> crate::Result<ScoreData> {
    let path = path.as_ref();
    debug!(path = %path.display(), "reading score file");
    let bytes = std::fs::read(path)?;
    load_scores_from_bytes(bytes, config)
}

/// Parse an in-memory score table and normalize its subject columns
///
/// Workbooks (zip containers) are read from their first sheet, anything
/// else is parsed as CSV.
pub fn load_scores_from_bytes(bytes: Vec<u8>, config: &PipelineConfig) -> crate::Result<ScoreData> {
    let mut frame = if bytes.starts_with(ZIP_MAGIC) {
        read_workbook(bytes)?
    } else {
        read_csv(bytes)?
    };

    let columns: Vec<String> = frame
        .get_column_names()
        .into_iter()
        .map(|c| c.to_string())
        .collect();

    if !columns.iter().any(|c| *c == config.name_column) {
        return Err(ScoreError::MissingColumn(config.name_column.clone()));
    }
    if frame.height() == 0 {
        return Err(ScoreError::EmptyDataset);
    }

    let subjects: Vec<String> = columns
        .into_iter()
        .filter(|c| *c != config.name_column)
        .collect();
    if subjects.is_empty() {
        return Err(ScoreError::NoSubjects(config.name_column.clone()));
    }

    let names = extract_names(&frame, &config.name_column)?;
    let raw_scores = extract_scores(&frame, &subjects)?;

    // Exports and lookups use the trimmed names
    let trimmed: Vec<&str> = names.iter().map(String::as_str).collect();
    frame.with_column(Series::new(&config.name_column, trimmed))?;

    let scaler = MinMaxScaler::fit(&raw_scores);
    for j in scaler.degenerate_columns() {
        warn!(
            subject = %subjects[j],
            value = scaler.min[j],
            "subject has the same score for every student, normalizing it to 0"
        );
    }
    let features = scaler.transform(&raw_scores);

    info!(
        students = names.len(),
        subjects = subjects.len(),
        "score table loaded"
    );

    Ok(ScoreData {
        names,
        subjects,
        raw_scores,
        features,
        scaler,
        frame,
    })
}

/// Parse CSV with every row taking part in dtype inference
pub(crate) fn read_csv(bytes: Vec<u8>) -> crate::Result<DataFrame> {
    Ok(CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()?)
}

fn read_workbook(bytes: Vec<u8>) -> crate::Result<DataFrame> {
    let mut workbook: Xlsx<Cursor<Vec<u8>>> =
        open_workbook_from_rs(Cursor::new(bytes)).map_err(|e: calamine::XlsxError| ScoreError::Spreadsheet(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ScoreError::EmptyDataset)?
        .map_err(|e| ScoreError::Spreadsheet(e.to_string()))?;
    frame_from_range(&range)
}

/// First row is the header; each column gets the narrowest dtype its cells allow
fn frame_from_range(range: &Range<Data>) -> crate::Result<DataFrame> {
    let mut rows = range.rows();
    let header = rows.next().ok_or(ScoreError::EmptyDataset)?;
    let body: Vec<&[Data]> = rows.collect();

    let columns: Vec<Series> = header
        .iter()
        .enumerate()
        .map(|(j, cell)| {
            let cells: Vec<Option<&Data>> = body
                .iter()
                .map(|row| row.get(j).filter(|c| !matches!(c, Data::Empty)))
                .collect();
            sheet_column(&cell.to_string(), &cells)
        })
        .collect();

    Ok(DataFrame::new(columns)?)
}

fn sheet_column(name: &str, cells: &[Option<&Data>]) -> Series {
    let mut filled = cells.iter().flatten();
    if filled.clone().all(|c| matches!(c, Data::Int(_))) {
        let values: Vec<Option<i64>> = cells
            .iter()
            .map(|c| match c {
                Some(Data::Int(v)) => Some(*v),
                _ => None,
            })
            .collect();
        Series::new(name, values)
    } else if filled.all(|c| matches!(c, Data::Int(_) | Data::Float(_))) {
        let values: Vec<Option<f64>> = cells
            .iter()
            .map(|c| match c {
                Some(Data::Int(v)) => Some(*v as f64),
                Some(Data::Float(v)) => Some(*v),
                _ => None,
            })
            .collect();
        Series::new(name, values)
    } else {
        let values: Vec<Option<String>> = cells.iter().map(|c| c.map(|d| d.to_string())).collect();
        Series::new(name, values)
    }
}

/// Read the name column, rejecting blank and duplicate names
fn extract_names(frame: &DataFrame, name_column: &str) -> crate::Result<Vec<String>> {
    let series = frame.column(name_column)?.cast(&DataType::String)?;
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut names = Vec::with_capacity(series.len());

    for (i, value) in series.str()?.into_iter().enumerate() {
        let row = i + 1;
        let name = match value.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(ScoreError::MissingName(row)),
        };
        if let Some(&first) = seen.get(&name) {
            return Err(ScoreError::DuplicateName {
                name,
                first,
                second: row,
            });
        }
        seen.insert(name.clone(), row);
        names.push(name);
    }

    Ok(names)
}

/// Collect the subject columns into a (n_students, n_subjects) matrix
fn extract_scores(frame: &DataFrame, subjects: &[String]) -> crate::Result<Array2<f64>> {
    let n_samples = frame.height();
    let mut raw_scores = Array2::<f64>::zeros((n_samples, subjects.len()));

    for (j, subject) in subjects.iter().enumerate() {
        let series = frame.column(subject)?;
        if !series.dtype().is_numeric() {
            return Err(ScoreError::NonNumericColumn {
                column: subject.clone(),
                dtype: series.dtype().to_string(),
            });
        }
        let missing = series.null_count();
        if missing > 0 {
            return Err(ScoreError::MissingValues {
                column: subject.clone(),
                count: missing,
            });
        }

        let values = series.cast(&DataType::Float64)?;
        for (i, value) in values.f64()?.into_no_null_iter().enumerate() {
            if !value.is_finite() {
                return Err(ScoreError::InvalidScore {
                    column: subject.clone(),
                    row: i + 1,
                });
            }
            raw_scores[[i, j]] = value;
        }
    }

    Ok(raw_scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Name,Math,Physics,Arts_Culture").unwrap();
        writeln!(file, "Ayu,90,85,40").unwrap();
        writeln!(file, "Budi,60,70,95").unwrap();
        writeln!(file, "Citra,75,55.5,70").unwrap();
        writeln!(file, "Dewi,30,40,80").unwrap();
        file
    }

    fn load_str(csv: &str) -> crate::Result<ScoreData> {
        load_scores_from_bytes(csv.as_bytes().to_vec(), &PipelineConfig::default())
    }

    #[test]
    fn test_load_scores() {
        let test_file = create_test_csv();
        let data = load_scores(test_file.path(), &PipelineConfig::default()).unwrap();

        assert_eq!(data.names, vec!["Ayu", "Budi", "Citra", "Dewi"]);
        assert_eq!(data.subjects, vec!["Math", "Physics", "Arts_Culture"]);
        assert_eq!(data.raw_scores.shape(), &[4, 3]);
        assert_eq!(data.features.shape(), &[4, 3]);
        assert_eq!(data.raw_scores[[2, 1]], 55.5);
        assert_eq!(data.frame.width(), 4);
    }

    #[test]
    fn test_normalized_range() {
        let test_file = create_test_csv();
        let data = load_scores(test_file.path(), &PipelineConfig::default()).unwrap();

        for column in data.features.axis_iter(Axis(1)) {
            assert!(column.iter().all(|&v| (0.0..=1.0).contains(&v)));
            assert!(column.iter().any(|&v| v == 0.0));
            assert!(column.iter().any(|&v| v == 1.0));
        }
        // Math: min 30, max 90
        assert!((data.features[[2, 0]] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_missing_name_column() {
        let result = load_str("Student,Math\nAyu,90\n");
        assert!(matches!(result, Err(ScoreError::MissingColumn(c)) if c == "Name"));
    }

    #[test]
    fn test_non_numeric_subject() {
        let result = load_str("Name,Math,Physics\nAyu,90,high\nBudi,80,70\n");
        assert!(matches!(
            result,
            Err(ScoreError::NonNumericColumn { column, .. }) if column == "Physics"
        ));
    }

    #[test]
    fn test_missing_cell() {
        let result = load_str("Name,Math,Physics\nAyu,90,\nBudi,80,70\n");
        assert!(matches!(
            result,
            Err(ScoreError::MissingValues { column, count: 1 }) if column == "Physics"
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = load_str("Name,Math\nAyu,90\nBudi,80\nAyu,70\n");
        assert!(matches!(
            result,
            Err(ScoreError::DuplicateName { name, first: 1, second: 3 }) if name == "Ayu"
        ));
    }

    #[test]
    fn test_blank_name_rejected() {
        let result = load_str("Name,Math\nAyu,90\n,80\n");
        assert!(matches!(result, Err(ScoreError::MissingName(2))));
    }

    #[test]
    fn test_no_subjects() {
        let result = load_str("Name\nAyu\nBudi\n");
        assert!(matches!(result, Err(ScoreError::NoSubjects(_))));
    }

    #[test]
    fn test_empty_table() {
        let result = load_str("Name,Math\n");
        assert!(matches!(result, Err(ScoreError::EmptyDataset)));
    }

    #[test]
    fn test_constant_column_maps_to_zero() {
        let raw = array![[10.0, 1.0], [20.0, 1.0], [30.0, 1.0]];
        let scaler = MinMaxScaler::fit(&raw);

        assert_eq!(scaler.degenerate_columns(), vec![1]);
        let scaled = scaler.transform(&raw);
        assert_eq!(scaled.column(0).to_vec(), vec![0.0, 0.5, 1.0]);
        assert_eq!(scaled.column(1).to_vec(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_scale_new_scores() {
        let test_file = create_test_csv();
        let data = load_scores(test_file.path(), &PipelineConfig::default()).unwrap();

        let scaled = data.scale_new_scores(&[60.0, 85.0, 40.0]).unwrap();
        assert_eq!(scaled.len(), 3);
        assert!((scaled[0] - 0.5).abs() < 1e-12);
        assert_eq!(scaled[1], 1.0);
        assert_eq!(scaled[2], 0.0);

        assert!(matches!(
            data.scale_new_scores(&[1.0]),
            Err(ScoreError::ScoreCount { expected: 3, found: 1 })
        ));
    }

    #[test]
    fn test_records_follow_file_order() {
        let test_file = create_test_csv();
        let data = load_scores(test_file.path(), &PipelineConfig::default()).unwrap();

        let records: Vec<_> = data.records().collect();
        assert_eq!(records.len(), 4);
        assert_eq!(records[1].name, "Budi");
        assert_eq!(records[1].scores.to_vec(), vec![60.0, 70.0, 95.0]);
    }

    fn long_csv(last_row: &str) -> String {
        let mut csv = String::from("Name,Math,Physics,Arts_Culture\n");
        for i in 0..120 {
            csv.push_str(&format!("s{},{},{},{}\n", i, 50 + i % 40, 60 + i % 3, 10 + i % 7));
        }
        csv.push_str(last_row);
        csv.push('\n');
        csv
    }

    #[test]
    fn test_late_decimal_score_after_many_rows() {
        let data = load_str(&long_csv("late,55.5,10,10")).unwrap();

        assert_eq!(data.len(), 121);
        assert_eq!(data.raw_scores[[120, 0]], 55.5);
        assert_eq!(data.raw_scores[[0, 0]], 50.0);
    }

    #[test]
    fn test_late_text_score_is_non_numeric() {
        let result = load_str(&long_csv("late,absent,10,10"));
        assert!(matches!(
            result,
            Err(ScoreError::NonNumericColumn { column, .. }) if column == "Math"
        ));
    }

    #[test]
    fn test_nan_score_rejected() {
        let result = load_str("Name,Math,Physics\na,NaN,1\nb,2.5,3\nc,4,5\n");
        assert!(matches!(
            result,
            Err(ScoreError::InvalidScore { column, row: 1 }) if column == "Math"
        ));
    }

    #[test]
    fn test_infinite_score_rejected() {
        let result = load_str("Name,Math,Physics\na,1,1.5\nb,2,inf\nc,4,5\n");
        assert!(matches!(
            result,
            Err(ScoreError::InvalidScore { column, row: 2 }) if column == "Physics"
        ));
    }

    #[test]
    fn test_padded_names_are_trimmed_in_frame() {
        let data = load_str("Name,Math\n Ayu ,90\nBudi  ,80\n").unwrap();

        assert_eq!(data.names, vec!["Ayu", "Budi"]);
        let frame_names: Vec<Option<&str>> = data
            .frame
            .column("Name")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(frame_names, vec![Some("Ayu"), Some("Budi")]);
    }

    #[test]
    fn test_constant_subject_through_loader() {
        let data = load_str("Name,Math,Music\na,10,70\nb,50,70\nc,90,70\n").unwrap();

        assert_eq!(data.scaler.degenerate_columns(), vec![1]);
        assert_eq!(data.features.column(0).to_vec(), vec![0.0, 0.5, 1.0]);
        assert!(data.features.column(1).iter().all(|&v| v == 0.0));
        assert_eq!(data.raw_scores[[2, 1]], 70.0);
    }

    #[test]
    fn test_sheet_columns_get_narrowest_dtype() {
        let mut range: Range<Data> = Range::new((0, 0), (2, 3));
        range.set_value((0, 0), Data::String("Name".into()));
        range.set_value((0, 1), Data::String("Math".into()));
        range.set_value((0, 2), Data::String("Physics".into()));
        range.set_value((0, 3), Data::String("Notes".into()));
        range.set_value((1, 0), Data::String("Ayu".into()));
        range.set_value((1, 1), Data::Int(90));
        range.set_value((1, 2), Data::Float(55.5));
        range.set_value((1, 3), Data::String("ok".into()));
        range.set_value((2, 0), Data::String("Budi".into()));
        range.set_value((2, 1), Data::Int(80));
        range.set_value((2, 2), Data::Int(70));
        range.set_value((2, 3), Data::Int(1));

        let frame = frame_from_range(&range).unwrap();

        assert_eq!(frame.shape(), (2, 4));
        assert_eq!(frame.column("Name").unwrap().dtype(), &DataType::String);
        assert_eq!(frame.column("Math").unwrap().dtype(), &DataType::Int64);
        assert_eq!(frame.column("Physics").unwrap().dtype(), &DataType::Float64);
        assert_eq!(frame.column("Notes").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_broken_workbook_reported() {
        let mut bytes = ZIP_MAGIC.to_vec();
        bytes.extend_from_slice(b"not really a workbook");

        let result = load_scores_from_bytes(bytes, &PipelineConfig::default());
        assert!(matches!(result, Err(ScoreError::Spreadsheet(_))));
    }
}
