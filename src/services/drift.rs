//! Concept drift detection and grade-transition handling.
//!
//! A user's stored interest vector goes stale when their recent interaction
//! mix no longer resembles it. Drift is measured as the cosine distance
//! between the stored vector and a recent-profile vector built from the
//! interaction window with time decay:
//!
//!   weight(subject) = SUM(kind_weight * decay_rate^days_ago)
//!
//! Detection is read-only; recomputation and caching are separate calls so
//! the route and the maintenance job decide when to mutate.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, error, info};

use crate::config::AlgorithmConfig;
use crate::error::Result;
use crate::models::{subject_index, DriftAnalysis, Interaction, InterestVector};
use crate::services::{FeedInvalidator, InteractionSource, VectorStore};

pub struct DriftDetector {
    config: AlgorithmConfig,
}

impl DriftDetector {
    pub fn new(config: AlgorithmConfig) -> Self {
        Self { config }
    }

    pub fn threshold(&self) -> f64 {
        self.config.drift_threshold
    }

    /// Build a profile vector from an interaction window.
    ///
    /// Interactions older than the window or tagged with unknown subjects
    /// contribute nothing. The grade tag is the most frequent grade seen.
    pub fn build_profile_vector(
        &self,
        interactions: &[Interaction],
        now: DateTime<Utc>,
    ) -> InterestVector {
        let mut vector = InterestVector::empty(None);
        let mut grade_counts: HashMap<&str, u32> = HashMap::new();

        for interaction in interactions {
            let days_ago = (now - interaction.occurred_at).num_days();
            if days_ago < 0 || days_ago > self.config.window_days {
                continue;
            }

            if let Some(grade) = interaction.grade.as_deref() {
                *grade_counts.entry(grade).or_insert(0) += 1;
            }

            let Some(idx) = interaction.subject.as_deref().and_then(subject_index) else {
                continue;
            };

            let decay = self.config.daily_decay_rate.powf(days_ago as f64);
            vector.weights[idx] += interaction.kind.weight() * decay;
        }

        vector.grade = grade_counts
            .into_iter()
            .max_by_key(|(_, count)| *count)
            .map(|(grade, _)| grade.to_string());
        vector.computed_at = now;
        vector
    }

    /// Decide whether the user's stored vector has drifted from recent
    /// behavior. Read-only: no stored state is mutated.
    pub async fn detect_concept_drift(
        &self,
        user_id: &str,
        source: &dyn InteractionSource,
        vectors: &dyn VectorStore,
    ) -> Result<DriftAnalysis> {
        let interactions = source
            .recent_interactions(user_id, self.config.window_days)
            .await?;
        let now = Utc::now();

        if interactions.len() < self.config.min_interactions {
            debug!(
                user_id = user_id,
                interactions = interactions.len(),
                min = self.config.min_interactions,
                "Too few interactions for drift analysis"
            );
            return Ok(DriftAnalysis {
                has_drift: false,
                drift_score: 0.0,
                threshold: self.config.drift_threshold,
                interactions_analyzed: interactions.len(),
                computed_at: now,
            });
        }

        let recent = self.build_profile_vector(&interactions, now);
        if recent.magnitude() == 0.0 {
            // Enough interactions, but none mapped onto a known subject.
            return Ok(DriftAnalysis {
                has_drift: false,
                drift_score: 0.0,
                threshold: self.config.drift_threshold,
                interactions_analyzed: interactions.len(),
                computed_at: now,
            });
        }

        let stored = vectors.get_vector(user_id).await?;
        let drift_score = match &stored {
            Some(vector) if vector.magnitude() > 0.0 => recent.cosine_distance(vector),
            // No usable profile while the user is demonstrably active.
            _ => 1.0,
        };

        let has_drift = drift_score > self.config.drift_threshold;

        debug!(
            user_id = user_id,
            drift_score = drift_score,
            threshold = self.config.drift_threshold,
            has_drift = has_drift,
            "Drift analysis completed"
        );

        Ok(DriftAnalysis {
            has_drift,
            drift_score,
            threshold: self.config.drift_threshold,
            interactions_analyzed: interactions.len(),
            computed_at: now,
        })
    }

    /// Rebuild the user's vector from the current interaction window.
    pub async fn recompute_vector(
        &self,
        user_id: &str,
        source: &dyn InteractionSource,
    ) -> Result<InterestVector> {
        let interactions = source
            .recent_interactions(user_id, self.config.window_days)
            .await?;
        let vector = self.build_profile_vector(&interactions, Utc::now());

        info!(
            user_id = user_id,
            interactions = interactions.len(),
            magnitude = vector.magnitude(),
            "Recomputed interest vector"
        );

        Ok(vector)
    }

    /// Apply a grade change to the user's profile.
    ///
    /// A cohort change invalidates the profile's grade-specific weighting:
    /// subject weights are damped by the carryover factor, the grade tag is
    /// replaced, the adjusted vector is cached and the feed invalidated.
    /// Calls `put_vector` and `invalidate_user_feed` exactly once each.
    pub async fn handle_grade_transition(
        &self,
        user_id: &str,
        old_grade: &str,
        new_grade: &str,
        vectors: &dyn VectorStore,
        feeds: &dyn FeedInvalidator,
    ) -> Result<InterestVector> {
        let vector = match vectors.get_vector(user_id).await? {
            Some(mut vector) => {
                for weight in &mut vector.weights {
                    *weight *= self.config.grade_carryover;
                }
                vector.grade = Some(new_grade.to_string());
                vector.computed_at = Utc::now();
                vector
            }
            None => InterestVector::empty(Some(new_grade.to_string())),
        };

        vectors.put_vector(user_id, &vector).await?;

        if let Err(e) = feeds.invalidate_user_feed(user_id).await {
            // Vector is already cached; the feed may keep serving rankings
            // from the old cohort until its TTL lapses.
            error!(
                user_id = user_id,
                old_grade = old_grade,
                new_grade = new_grade,
                error = %e,
                "Feed invalidation failed after grade-transition vector reset"
            );
            return Err(e);
        }

        info!(
            user_id = user_id,
            old_grade = old_grade,
            new_grade = new_grade,
            "Grade transition applied to interest profile"
        );

        Ok(vector)
    }
}
