//! Per-request scoring
//!
//! Clamps the vector to the schema, scales it with the artifact's scaler, averages the
//! forest's class distributions, and explains the result with personalized importances
//! and risk factors. Any fault while scoring yields a labeled fallback result instead of
//! an error; only schema errors in named input are surfaced to the caller.

use crate::artifact::ModelArtifact;
use crate::error::StressError;
use crate::labeler::{bucket, raw_score};
use crate::risk::{personalized_importance, risk_factors, top_features};
use crate::schema::{FeatureSchema, FEATURE_COUNT};
use crate::types::{
    ActivityRecord, ClassProbabilities, FeatureVector, FeatureWeights, PredictionResult,
    StressLevel,
};
use rayon::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

/// Number of personalized features reported in `top_features`
pub const TOP_FEATURES: usize = 5;

/// Fixed probability triple returned when scoring fails, keyed by best-guess class
pub fn fallback_probabilities(level: StressLevel) -> ClassProbabilities {
    match level {
        StressLevel::Low => ClassProbabilities::new(0.65, 0.25, 0.10),
        StressLevel::Medium => ClassProbabilities::new(0.20, 0.60, 0.20),
        StressLevel::High => ClassProbabilities::new(0.10, 0.30, 0.60),
    }
}

/// Degraded result for a vector that could not be scored.
///
/// The best guess is the heuristic bucket of the clamped vector, or Medium when the
/// vector holds NaN.
pub fn fallback_prediction(
    vector: &FeatureVector,
    global_importance: FeatureWeights,
    artifact_id: Option<Uuid>,
) -> PredictionResult {
    let clamped = vector.clamped();
    let level = if clamped.as_array().iter().any(|v| v.is_nan()) {
        StressLevel::Medium
    } else {
        let score = raw_score(&clamped);
        if score.is_finite() {
            bucket(score)
        } else {
            StressLevel::Medium
        }
    };
    let probabilities = fallback_probabilities(level);

    PredictionResult {
        predicted_class: level.index(),
        predicted_label: level,
        confidence: probabilities.max(),
        probabilities,
        global_importance,
        personalized_importance: FeatureWeights::new(),
        top_features: Vec::new(),
        risk_factors: risk_factors(&clamped),
        fallback: true,
        artifact_id,
    }
}

/// Stateless scorer bound to one published artifact
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    artifact: Arc<ModelArtifact>,
}

impl InferenceEngine {
    pub fn new(artifact: Arc<ModelArtifact>) -> Self {
        Self { artifact }
    }

    pub fn artifact(&self) -> &Arc<ModelArtifact> {
        &self.artifact
    }

    /// Score a vector; never fails
    pub fn predict(&self, vector: &FeatureVector) -> PredictionResult {
        match self.score(vector) {
            Ok(result) => result,
            Err(e) => {
                log::error!("Scoring failed: {e}; returning fallback prediction");
                fallback_prediction(
                    vector,
                    self.artifact.global_importance(),
                    Some(self.artifact.artifact_id),
                )
            }
        }
    }

    /// Score `(name, value)` pairs; missing or unknown names are rejected
    pub fn predict_named<I, K>(&self, pairs: I) -> Result<PredictionResult, StressError>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let vector = FeatureVector::from_named(pairs)?;
        Ok(self.predict(&vector))
    }

    /// Score a positional slice in schema order; arity must be exact
    pub fn predict_slice(&self, values: &[f64]) -> Result<PredictionResult, StressError> {
        let vector = FeatureVector::from_slice(values)?;
        Ok(self.predict(&vector))
    }

    /// Score a request record (its `screen_time_total` is ignored)
    pub fn predict_record(&self, record: &ActivityRecord) -> PredictionResult {
        self.predict(&record.to_feature_vector())
    }

    pub fn predict_batch(&self, vectors: &[FeatureVector]) -> Vec<PredictionResult> {
        vectors.par_iter().map(|v| self.predict(v)).collect()
    }

    /// Class probabilities for an already clamped vector
    pub fn probabilities(&self, clamped: &FeatureVector) -> Result<ClassProbabilities, StressError> {
        let artifact = &self.artifact;
        if !FeatureSchema::matches(&artifact.feature_names) {
            return Err(StressError::ScoringFailure(format!(
                "Artifact was trained on a different schema ({} features)",
                artifact.feature_names.len()
            )));
        }
        let scaled = artifact
            .scaler
            .transform_vector(clamped)
            .map_err(|e| StressError::ScoringFailure(e.to_string()))?;
        let raw = artifact
            .forest
            .predict_proba(&scaled)
            .map_err(|e| StressError::ScoringFailure(e.to_string()))?;
        ClassProbabilities::from_scores(&raw).ok_or_else(|| {
            StressError::ScoringFailure(format!("Invalid class probabilities {raw:?}"))
        })
    }

    /// Strict scoring without the fallback
    pub fn score(&self, vector: &FeatureVector) -> Result<PredictionResult, StressError> {
        if vector.as_array().iter().any(|v| v.is_nan()) {
            return Err(StressError::ScoringFailure(
                "Feature vector contains NaN".to_string(),
            ));
        }
        let clamped = vector.clamped();
        let probabilities = self.probabilities(&clamped)?;
        let level = probabilities.argmax();

        let global = self.artifact.global_importance();
        if global.len() != FEATURE_COUNT {
            return Err(StressError::ScoringFailure(
                "Artifact importances do not cover the schema".to_string(),
            ));
        }
        let personal = personalized_importance(&global, &clamped);
        let top = top_features(&personal, TOP_FEATURES);
        let factors = risk_factors(&clamped);

        log::debug!(
            "Prediction: {} (confidence: {:.3})",
            level,
            probabilities.max()
        );
        if !factors.is_empty() {
            let shown: Vec<&str> = factors.iter().take(3).map(String::as_str).collect();
            log::debug!("Risk factors: {}", shown.join(", "));
        }

        Ok(PredictionResult {
            predicted_class: level.index(),
            predicted_label: level,
            confidence: probabilities.max(),
            probabilities,
            global_importance: global,
            personalized_importance: personal,
            top_features: top,
            risk_factors: factors,
            fallback: false,
            artifact_id: Some(self.artifact.artifact_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::ForestConfig;
    use crate::schema::Feature;
    use crate::trainer::{ClassifierTrainer, TrainConfig};
    use pretty_assertions::assert_eq;
    use std::sync::OnceLock;

    fn engine() -> InferenceEngine {
        static ARTIFACT: OnceLock<Arc<ModelArtifact>> = OnceLock::new();
        let artifact = ARTIFACT.get_or_init(|| {
            let config = TrainConfig {
                seed: Some(42),
                n_samples: 1500,
                forest: ForestConfig {
                    n_estimators: 60,
                    ..ForestConfig::default()
                },
            };
            Arc::new(ClassifierTrainer::new().train(&config).unwrap())
        });
        InferenceEngine::new(Arc::clone(artifact))
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let result = engine().predict(&FeatureVector::example());
        assert!(!result.fallback);
        assert!((result.probabilities.sum() - 1.0).abs() < 1e-6);
        assert_eq!(result.confidence, result.probabilities.max());
        assert_eq!(result.predicted_class, result.predicted_label.index());
        assert_eq!(result.top_features.len(), TOP_FEATURES);
        assert_eq!(result.personalized_importance.len(), FEATURE_COUNT);
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let engine = engine();
        let at_max = FeatureVector::example().with(Feature::DurasiPemakaian, 16.0);
        let beyond = FeatureVector::example().with(Feature::DurasiPemakaian, 40.0);
        let a = engine.predict(&at_max);
        let b = engine.predict(&beyond);
        assert!(!b.fallback);
        assert_eq!(a.probabilities, b.probabilities);
        assert_eq!(a.risk_factors, b.risk_factors);
        assert_eq!(b.risk_factors[0], "Excessive screen time (16.0h)");
    }

    #[test]
    fn test_nan_yields_fallback() {
        let v = FeatureVector::example().with(Feature::DurasiTidur, f64::NAN);
        let result = engine().predict(&v);
        assert!(result.fallback);
        assert_eq!(result.predicted_label, StressLevel::Medium);
        assert_eq!(result.probabilities, ClassProbabilities::new(0.20, 0.60, 0.20));
        assert_eq!(result.confidence, 0.60);
        assert!(result.risk_factors.contains(&"Night-time device usage".to_string()));
    }

    #[test]
    fn test_fallback_uses_heuristic_guess() {
        let extreme = FeatureVector::example()
            .with(Feature::DurasiPemakaian, 15.0)
            .with(Feature::BukaSosmed, 7.0)
            .with(Feature::DurasiTidur, 4.0);
        let result = fallback_prediction(&extreme, FeatureWeights::new(), None);
        assert_eq!(result.predicted_label, StressLevel::High);
        assert_eq!(result.confidence, 0.60);
        assert!(result.fallback);
    }

    #[test]
    fn test_schema_drift_yields_fallback() {
        let mut artifact = (**engine().artifact()).clone();
        artifact.feature_names.reverse();
        let drifted = InferenceEngine::new(Arc::new(artifact));
        assert!(matches!(
            drifted.score(&FeatureVector::example()),
            Err(StressError::ScoringFailure(_))
        ));
        assert!(drifted.predict(&FeatureVector::example()).fallback);
    }

    #[test]
    fn test_named_input_errors_are_surfaced() {
        let engine = engine();
        let err = engine
            .predict_named(vec![("durasi_tidur", 7.0)])
            .unwrap_err();
        assert!(err.is_schema_error());

        let err = engine.predict_slice(&[1.0; 18]).unwrap_err();
        assert!(matches!(err, StressError::SchemaMismatch { expected: 19, got: 18 }));
    }

    #[test]
    fn test_record_ignores_screen_time_total() {
        let engine = engine();
        let mut record = ActivityRecord::example();
        let a = engine.predict_record(&record);
        record.screen_time_total = 1.0;
        let b = engine.predict_record(&record);
        assert_eq!(a.probabilities, b.probabilities);
    }

    #[test]
    fn test_batch_matches_single() {
        let engine = engine();
        let vectors = vec![
            FeatureVector::example(),
            FeatureVector::example().with(Feature::DurasiTidur, 4.5),
        ];
        let batch = engine.predict_batch(&vectors);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1].probabilities, engine.predict(&vectors[1]).probabilities);
    }
}
