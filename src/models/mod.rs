use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical subject dimensions for interest vectors.
///
/// Every interest vector has exactly one weight per subject, in this order.
/// Interactions tagged with a subject outside this list are ignored.
pub const SUBJECT_DIMENSIONS: [&str; 12] = [
    "math",
    "physics",
    "chemistry",
    "biology",
    "history",
    "geography",
    "literature",
    "language",
    "computer_science",
    "art",
    "music",
    "economics",
];

/// Resolve a subject name to its vector index.
pub fn subject_index(subject: &str) -> Option<usize> {
    SUBJECT_DIMENSIONS.iter().position(|s| *s == subject)
}

/// A user's interest profile used for feed ranking.
///
/// There is at most one valid vector per user at any time; the cache layer
/// enforces this by keying vectors on a single `uiv:{user_id}` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestVector {
    /// Decayed engagement weight per subject, indexed by [`SUBJECT_DIMENSIONS`].
    pub weights: Vec<f64>,
    /// Grade cohort the vector was computed for.
    pub grade: Option<String>,
    /// When the vector was last (re)computed.
    pub computed_at: DateTime<Utc>,
}

impl InterestVector {
    /// Zeroed vector for a grade cohort.
    pub fn empty(grade: Option<String>) -> Self {
        Self {
            weights: vec![0.0; SUBJECT_DIMENSIONS.len()],
            grade,
            computed_at: Utc::now(),
        }
    }

    /// Sum of absolute weights. Zero means the profile carries no signal.
    pub fn magnitude(&self) -> f64 {
        self.weights.iter().map(|w| w.abs()).sum()
    }

    /// Cosine distance to another vector, in `[0.0, 2.0]`.
    ///
    /// Returns 1.0 (maximal topical divergence) when either vector carries
    /// no signal, so a drifted-to-empty profile still registers.
    pub fn cosine_distance(&self, other: &InterestVector) -> f64 {
        let dot: f64 = self
            .weights
            .iter()
            .zip(other.weights.iter())
            .map(|(a, b)| a * b)
            .sum();
        let norm_a: f64 = self.weights.iter().map(|w| w * w).sum::<f64>().sqrt();
        let norm_b: f64 = other.weights.iter().map(|w| w * w).sum::<f64>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 1.0;
        }

        1.0 - dot / (norm_a * norm_b)
    }
}

/// Engagement kind with its contribution to interest weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Like,
    Comment,
    Share,
    Save,
    View,
}

impl InteractionKind {
    pub fn weight(&self) -> f64 {
        match self {
            InteractionKind::Like => 1.0,
            InteractionKind::Comment => 2.0,
            InteractionKind::Share => 3.0,
            InteractionKind::Save => 2.5,
            InteractionKind::View => 0.3,
        }
    }
}

impl std::str::FromStr for InteractionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(InteractionKind::Like),
            "comment" => Ok(InteractionKind::Comment),
            "share" => Ok(InteractionKind::Share),
            "save" => Ok(InteractionKind::Save),
            "view" => Ok(InteractionKind::View),
            other => Err(format!("unknown interaction kind: {}", other)),
        }
    }
}

/// A single user/content interaction within the analysis window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub subject: Option<String>,
    pub grade: Option<String>,
    pub kind: InteractionKind,
    pub occurred_at: DateTime<Utc>,
}

/// Minimal view of newly published content, used only to resolve the set of
/// interested users for invalidation. The full content entity lives in
/// the content service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub id: String,
    pub subject: Option<String>,
    pub grade: Option<String>,
}

/// Result of a single drift detection call. Ephemeral: consumed immediately
/// by the caller to decide whether to recompute, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftAnalysis {
    pub has_drift: bool,
    /// Cosine distance between the recent interaction profile and the
    /// stored vector. 1.0 when no stored vector exists.
    pub drift_score: f64,
    pub threshold: f64,
    pub interactions_analyzed: usize,
    pub computed_at: DateTime<Utc>,
}

/// A user eligible for a maintenance sweep, with the counts the activity
/// classifier needs.
#[derive(Debug, Clone)]
pub struct ActiveUser {
    pub user_id: String,
    pub interaction_count: u64,
    pub account_age_days: i64,
}
