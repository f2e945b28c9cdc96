//! Fitted model artifact
//!
//! Scaler, forest, schema and class labels travel as one unit. A published artifact is
//! never mutated; retraining produces a new one.

use crate::error::StressError;
use crate::forest::{ForestConfig, RandomForest};
use crate::scaler::StandardScaler;
use crate::schema::{Feature, FeatureSchema, FEATURE_COUNT};
use crate::types::{FeatureWeights, StressLevel, CLASS_COUNT};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How the artifact was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactOrigin {
    /// Requested configuration
    Primary,
    /// Deterministic recovery construction after a failed primary fit
    Fallback,
}

/// Everything inference and evaluation need from training
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub artifact_id: Uuid,
    pub trained_at: DateTime<Utc>,
    /// Corpus seed actually used
    pub seed: u64,
    pub origin: ArtifactOrigin,
    pub feature_names: Vec<String>,
    pub class_labels: Vec<String>,
    pub scaler: StandardScaler,
    pub forest: RandomForest,
    pub n_samples: usize,
    pub class_distribution: [usize; CLASS_COUNT],
}

impl ModelArtifact {
    /// Assemble a freshly fitted artifact for the current schema
    pub fn new(
        seed: u64,
        origin: ArtifactOrigin,
        scaler: StandardScaler,
        forest: RandomForest,
        n_samples: usize,
        class_distribution: [usize; CLASS_COUNT],
    ) -> Self {
        Self {
            artifact_id: Uuid::new_v4(),
            trained_at: Utc::now(),
            seed,
            origin,
            feature_names: FeatureSchema::names().iter().map(|s| s.to_string()).collect(),
            class_labels: StressLevel::labels(),
            scaler,
            forest,
            n_samples,
            class_distribution,
        }
    }

    /// Check that the artifact was trained against the current schema
    pub fn validate(&self) -> Result<(), StressError> {
        if !FeatureSchema::matches(&self.feature_names) {
            return Err(StressError::SchemaMismatch {
                expected: FEATURE_COUNT,
                got: self.feature_names.len(),
            });
        }
        if self.class_labels != StressLevel::labels() {
            return Err(StressError::InvalidInput(format!(
                "Unexpected class labels: {:?}",
                self.class_labels
            )));
        }
        if self.scaler.width() != FEATURE_COUNT || self.forest.n_features() != FEATURE_COUNT {
            return Err(StressError::SchemaMismatch {
                expected: FEATURE_COUNT,
                got: self.forest.n_features(),
            });
        }
        if self.forest.n_classes() != CLASS_COUNT || !self.forest.is_well_formed() {
            return Err(StressError::InvalidInput(
                "Artifact forest is malformed".to_string(),
            ));
        }
        Ok(())
    }

    /// Global importance per feature (sums to 1)
    pub fn global_importance(&self) -> FeatureWeights {
        Feature::ALL
            .iter()
            .zip(self.forest.feature_importances())
            .map(|(&f, &w)| (f, w))
            .collect()
    }

    pub fn importance(&self, feature: Feature) -> f64 {
        self.forest
            .feature_importances()
            .get(feature.index())
            .copied()
            .unwrap_or(0.0)
    }

    /// Features ranked by global importance, descending
    pub fn ranked_features(&self) -> Vec<(Feature, f64)> {
        let mut ranked: Vec<(Feature, f64)> = self.global_importance().into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    pub fn oob_accuracy(&self) -> Option<f64> {
        self.forest.oob_score()
    }

    pub fn forest_config(&self) -> &ForestConfig {
        self.forest.config()
    }

    /// Deserialize and validate an artifact
    pub fn from_json(json: &str) -> Result<Self, StressError> {
        let artifact: ModelArtifact = serde_json::from_str(json)?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
