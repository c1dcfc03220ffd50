//! AptiForge: student interest and aptitude detection using K-Means clustering
//!
//! Scores are min/max normalized per subject, grouped into three clusters,
//! and each cluster is named after the subject its students score highest in.

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod label;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use config::{LabelRule, PipelineConfig, Taxonomy};
pub use data::{load_scores, load_scores_from_bytes, MinMaxScaler, ScoreData};
pub use error::ScoreError;
pub use label::{label_clusters, ClusterProfile};
pub use model::{fit_clusters, ClusterModel};
pub use pipeline::{predict_label, run_pipeline, LabeledRow, LabeledScores};
pub use report::{export_csv, label_distribution, student_document, LabelCount, StudentDocument};
pub use viz::create_distribution_chart;

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, ScoreError>;
