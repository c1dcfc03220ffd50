//! Pipeline constants and the subject → label taxonomy

/// Column holding the student display name.
pub const NAME_COLUMN: &str = "Name";
/// Number of interest groups.
pub const DEFAULT_CLUSTERS: usize = 3;
/// Seed for the K-Means initialisation.
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_MAX_ITERS: u64 = 300;
pub const DEFAULT_TOLERANCE: f64 = 1e-4;

pub const SCIENCE_TECHNOLOGY: &str = "Science & Technology";
pub const ARTS_CREATIVE: &str = "Arts & Creative";
pub const SOCIAL_BUSINESS: &str = "Social & Business";
pub const MIXED: &str = "Mixed";

/// Maps a set of subjects to one label.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelRule {
    /// Label given to clusters whose dominant subject is listed here.
    pub label: String,
    /// Subject column names, matched exactly.
    pub subjects: Vec<String>,
}

impl LabelRule {
    pub fn new(label: &str, subjects: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            subjects: subjects.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Ordered label rules with a fallback for unlisted subjects.
#[derive(Clone, Debug, PartialEq)]
pub struct Taxonomy {
    pub rules: Vec<LabelRule>,
    pub fallback: String,
}

impl Taxonomy {
    /// Label for a dominant subject. The first matching rule wins.
    pub fn label_for(&self, subject: &str) -> &str {
        self.rules
            .iter()
            .find(|rule| rule.subjects.iter().any(|s| s == subject))
            .map(|rule| rule.label.as_str())
            .unwrap_or(self.fallback.as_str())
    }

    /// Every label this taxonomy can produce, fallback last.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::with_capacity(self.rules.len() + 1);
        for label in self
            .rules
            .iter()
            .map(|r| r.label.as_str())
            .chain(std::iter::once(self.fallback.as_str()))
        {
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
        labels
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self {
            rules: vec![
                LabelRule::new(SCIENCE_TECHNOLOGY, &["Math", "Physics", "Biology"]),
                LabelRule::new(ARTS_CREATIVE, &["Arts_Culture", "National_Language"]),
                LabelRule::new(SOCIAL_BUSINESS, &["Economics", "Sociology"]),
            ],
            fallback: MIXED.to_string(),
        }
    }
}

/// Everything the Loader, Clusterer and Labeler need.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub name_column: String,
    pub n_clusters: usize,
    pub seed: u64,
    pub max_iters: u64,
    pub tolerance: f64,
    pub taxonomy: Taxonomy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name_column: NAME_COLUMN.to_string(),
            n_clusters: DEFAULT_CLUSTERS,
            seed: DEFAULT_SEED,
            max_iters: DEFAULT_MAX_ITERS,
            tolerance: DEFAULT_TOLERANCE,
            taxonomy: Taxonomy::default(),
        }
    }
}
