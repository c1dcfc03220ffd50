//! Naming clusters after their strongest subject

use ndarray::{Array1, Axis};
use tracing::debug;

use crate::config::Taxonomy;
use crate::data::ScoreData;
use crate::error::ScoreError;

/// Summary of one cluster, in original score units
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterProfile {
    pub cluster: usize,
    pub size: usize,
    /// Mean raw score per subject, aligned with `ScoreData::subjects`
    pub mean_scores: Vec<f64>,
    /// Subject with the highest mean; ties go to the earlier column
    pub dominant_subject: String,
    pub label: String,
}

/// Build one profile per cluster id in `0..n_clusters`
pub fn label_clusters(
    data: &ScoreData,
    assignments: &Array1<usize>,
    n_clusters: usize,
    taxonomy: &Taxonomy,
) -> crate::Result<Vec<ClusterProfile>> {
    let mut profiles = Vec::with_capacity(n_clusters);

    for cluster in 0..n_clusters {
        let members: Vec<usize> = assignments
            .iter()
            .enumerate()
            .filter(|(_, id)| **id == cluster)
            .map(|(i, _)| i)
            .collect();

        let mean_scores = data
            .raw_scores
            .select(Axis(0), &members)
            .mean_axis(Axis(0))
            .ok_or(ScoreError::EmptyCluster(cluster))?;

        let dominant = dominant_subject(&mean_scores);
        let dominant_subject = data.subjects[dominant].clone();
        let label = taxonomy.label_for(&dominant_subject).to_string();

        debug!(cluster, size = members.len(), %dominant_subject, %label, "cluster labeled");

        profiles.push(ClusterProfile {
            cluster,
            size: members.len(),
            mean_scores: mean_scores.to_vec(),
            dominant_subject,
            label,
        });
    }

    Ok(profiles)
}

/// Index of the largest mean; the first one wins on ties
fn dominant_subject(means: &Array1<f64>) -> usize {
    let mut best = 0;
    for (j, &value) in means.iter().enumerate() {
        if value > means[best] {
            best = j;
        }
    }
    best
}
