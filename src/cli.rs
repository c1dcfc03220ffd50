//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::Parser;

use crate::config::{PipelineConfig, DEFAULT_MAX_ITERS, DEFAULT_TOLERANCE};
use crate::error::ScoreError;

/// Student interest and aptitude detection using K-Means on subject scores
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file (must have a "Name" column)
    #[arg(short, long, default_value = "scores.csv")]
    pub input: PathBuf,

    /// Output path for the label distribution chart (.png or .svg)
    #[arg(short, long, default_value = "label_distribution.png")]
    pub chart: PathBuf,

    /// Output path for the full labeled table
    #[arg(short, long, default_value = "labeled_scores.csv")]
    pub export: PathBuf,

    /// Write a summary document for this student
    #[arg(short, long)]
    pub student: Option<String>,

    /// Directory for student summary documents
    #[arg(long, default_value = ".")]
    pub report_dir: PathBuf,

    /// Prediction mode: scores for one new student, comma-separated in
    /// subject column order. Example: --predict "90,85,88,40,55,60,50"
    #[arg(short, long)]
    pub predict: Option<String>,

    /// Print the result table as JSON
    #[arg(long)]
    pub json: bool,

    /// Maximum iterations for K-Means algorithm
    #[arg(long, default_value_t = DEFAULT_MAX_ITERS)]
    pub max_iters: u64,

    /// Tolerance for K-Means convergence
    #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
    pub tolerance: f64,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Parse the comma-separated scores given to `--predict`
    pub fn parse_predict_scores(&self) -> crate::Result<Option<Vec<f64>>> {
        let Some(ref predict_str) = self.predict else {
            return Ok(None);
        };

        predict_str
            .split(',')
            .map(|part| {
                let part = part.trim();
                part.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| ScoreError::InvalidInput(part.to_string()))
            })
            .collect::<crate::Result<Vec<f64>>>()
            .map(Some)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            max_iters: self.max_iters,
            tolerance: self.tolerance,
            ..PipelineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_predict_scores() {
        let mut args = Args::parse_from(["aptiforge", "--predict", "90, 85.5,40"]);

        let result = args.parse_predict_scores().unwrap();
        assert_eq!(result, Some(vec![90.0, 85.5, 40.0]));

        args.predict = None;
        assert_eq!(args.parse_predict_scores().unwrap(), None);

        args.predict = Some("90,high".to_string());
        assert!(matches!(
            args.parse_predict_scores(),
            Err(ScoreError::InvalidInput(v)) if v == "high"
        ));
    }

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["aptiforge"]);
        assert_eq!(args.input, PathBuf::from("scores.csv"));
        assert_eq!(args.export, PathBuf::from("labeled_scores.csv"));
        assert!(args.student.is_none());

        let config = args.pipeline_config();
        assert_eq!(config.n_clusters, 3);
        assert_eq!(config.max_iters, DEFAULT_MAX_ITERS);
    }
}
