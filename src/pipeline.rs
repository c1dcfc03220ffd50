//! Normalize → cluster → label, in one pass

use serde::Serialize;
use tracing::info;

use crate::config::PipelineConfig;
use crate::data::ScoreData;
use crate::error::ScoreError;
use crate::label::{label_clusters, ClusterProfile};
use crate::model::{fit_clusters, ClusterModel};

/// One row of the result table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabeledRow {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Cluster")]
    pub cluster: usize,
    #[serde(rename = "Label")]
    pub label: String,
}

/// Scores plus their cluster assignment and cluster labels
#[derive(Debug)]
pub struct LabeledScores {
    pub data: ScoreData,
    pub model: ClusterModel,
    /// Indexed by cluster id
    pub profiles: Vec<ClusterProfile>,
}

impl LabeledScores {
    pub fn cluster_of(&self, row: usize) -> usize {
        self.model.assignments[row]
    }

    pub fn label_of(&self, row: usize) -> &str {
        &self.profiles[self.cluster_of(row)].label
    }

    /// Rows in input order
    pub fn rows(&self) -> impl Iterator<Item = LabeledRow> + '_ {
        self.data.names.iter().enumerate().map(|(i, name)| LabeledRow {
            name: name.clone(),
            cluster: self.cluster_of(i),
            label: self.label_of(i).to_string(),
        })
    }

    /// Row index of a student by name, ignoring surrounding whitespace
    pub fn find_student(&self, name: &str) -> crate::Result<usize> {
        let wanted = name.trim();
        self.data
            .names
            .iter()
            .position(|n| n == wanted)
            .ok_or_else(|| ScoreError::UnknownStudent(name.to_string()))
    }
}

/// Cluster the normalized scores and label every cluster
pub fn run_pipeline(data: ScoreData, config: &PipelineConfig) -> crate::Result<LabeledScores> {
    let model = fit_clusters(&data, config)?;
    let profiles = label_clusters(&data, &model.assignments, model.n_clusters, &config.taxonomy)?;

    info!(
        students = data.len(),
        clusters = profiles.len(),
        "students labeled"
    );

    Ok(LabeledScores {
        data,
        model,
        profiles,
    })
}

/// Cluster id and label for an unseen student's raw scores
pub fn predict_label<'a>(labeled: &'a LabeledScores, scores: &[f64]) -> crate::Result<(usize, &'a str)> {
    let scaled = labeled.data.scale_new_scores(scores)?;
    let cluster = labeled.model.predict(&scaled)?;
    Ok((cluster, labeled.profiles[cluster].label.as_str()))
}
