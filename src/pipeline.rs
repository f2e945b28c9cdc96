//! Pipeline orchestration
//!
//! Public entry points that tie training, inference, encoding and evaluation together.
//! [`predict_stress`] is a one-shot stateless call; [`StressEngine`] keeps a published
//! artifact that can be swapped atomically by retraining or loading.

use crate::artifact::ModelArtifact;
use crate::encoder::PredictionEncoder;
use crate::error::StressError;
use crate::evaluator::{EvaluationConfig, EvaluationReport, Evaluator};
use crate::inference::InferenceEngine;
use crate::schema::FEATURE_COUNT;
use crate::trainer::{ClassifierTrainer, TrainConfig};
use crate::types::{ActivityRecord, FeatureVector, PredictionResult, TrainingCorpus};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Parse one request value.
///
/// Accepts an activity record (an object carrying `screen_time_total`), a feature map
/// keyed by feature name, or a positional array of 19 features or 20 legacy values.
pub fn parse_request(value: Value) -> Result<FeatureVector, StressError> {
    if value.get("screen_time_total").is_some() {
        let record: ActivityRecord = serde_json::from_value(value)?;
        record.validate()?;
        return Ok(record.to_feature_vector());
    }
    match value {
        Value::Object(_) => {
            // Decode the map first so schema errors keep their own variants
            let map: BTreeMap<String, f64> = serde_json::from_value(value)?;
            FeatureVector::try_from(map)
        }
        Value::Array(items) => {
            let values = numeric_values(&items)?;
            if values.len() == FEATURE_COUNT {
                FeatureVector::from_slice(&values)
            } else {
                let record = ActivityRecord::from_legacy(&values)?;
                record.validate()?;
                Ok(record.to_feature_vector())
            }
        }
        other => Err(StressError::InvalidInput(format!(
            "Expected an object or array request, got {other}"
        ))),
    }
}

fn numeric_values(items: &[Value]) -> Result<Vec<f64>, StressError> {
    items
        .iter()
        .map(|item| {
            item.as_f64().ok_or_else(|| {
                StressError::InvalidInput(format!("Non-numeric feature value {item}"))
            })
        })
        .collect()
}

/// Parse a JSON document holding one request or an array of requests
pub fn parse_requests(raw_json: &str) -> Result<Vec<FeatureVector>, StressError> {
    let value: Value = serde_json::from_str(raw_json)?;
    match value {
        Value::Array(items) => {
            // A flat numeric array is a single positional request
            if !items.is_empty() && items.iter().all(Value::is_number) {
                Ok(vec![parse_request(Value::Array(items))?])
            } else {
                items.into_iter().map(parse_request).collect()
            }
        }
        single => Ok(vec![parse_request(single)?]),
    }
}

/// Train a model and score the requests in `raw_json`, returning one JSON payload per request.
///
/// # Example
/// ```ignore
/// let payloads = predict_stress(
///     r#"{"durasi_pemakaian": 7.0, ...}"#,
///     &TrainConfig::seeded(42),
/// )?;
/// ```
pub fn predict_stress(raw_json: &str, config: &TrainConfig) -> Result<Vec<String>, StressError> {
    let requests = parse_requests(raw_json)?;
    if requests.is_empty() {
        return Ok(Vec::new());
    }
    let engine = StressEngine::train(config)?;
    engine.encode_all(&requests)
}

/// Long-lived handle owning the published artifact.
///
/// Readers take a cheap `Arc` snapshot, so a retrain never blocks or tears an in-flight
/// prediction: the new artifact is built off to the side and swapped in one write.
pub struct StressEngine {
    artifact: RwLock<Arc<ModelArtifact>>,
    trainer: ClassifierTrainer,
    config: TrainConfig,
    encoder: PredictionEncoder,
    evaluator: Evaluator,
}

impl StressEngine {
    /// Train the initial artifact with the default trainer
    pub fn train(config: &TrainConfig) -> Result<Self, StressError> {
        Self::with_trainer(ClassifierTrainer::new(), config)
    }

    pub fn with_trainer(trainer: ClassifierTrainer, config: &TrainConfig) -> Result<Self, StressError> {
        let artifact = trainer.train(config)?;
        log::info!("Published artifact {}", artifact.artifact_id);
        Ok(Self {
            artifact: RwLock::new(Arc::new(artifact)),
            trainer,
            config: config.clone(),
            encoder: PredictionEncoder::new(),
            evaluator: Evaluator::new(),
        })
    }

    /// Wrap an already fitted artifact
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, StressError> {
        artifact.validate()?;
        Ok(Self {
            artifact: RwLock::new(Arc::new(artifact)),
            trainer: ClassifierTrainer::new(),
            config: TrainConfig::default(),
            encoder: PredictionEncoder::new(),
            evaluator: Evaluator::new(),
        })
    }

    pub fn with_evaluation_config(mut self, config: EvaluationConfig) -> Self {
        self.evaluator = Evaluator::with_config(config);
        self
    }

    /// Snapshot of the published artifact
    pub fn current(&self) -> Arc<ModelArtifact> {
        Arc::clone(&self.artifact.read())
    }

    pub fn train_config(&self) -> &TrainConfig {
        &self.config
    }

    fn publish(&self, artifact: ModelArtifact) -> Arc<ModelArtifact> {
        let artifact = Arc::new(artifact);
        let previous = {
            let mut slot = self.artifact.write();
            std::mem::replace(&mut *slot, Arc::clone(&artifact))
        };
        log::info!(
            "Swapped artifact {} -> {}",
            previous.artifact_id,
            artifact.artifact_id
        );
        artifact
    }

    /// Retrain with the engine's configuration and a new seed (`None` = time-derived)
    pub fn retrain(&self, seed: Option<u64>) -> Result<Arc<ModelArtifact>, StressError> {
        let config = TrainConfig {
            seed,
            ..self.config.clone()
        };
        self.retrain_with(&config)
    }

    /// Retrain with an explicit configuration; the old artifact stays live on failure
    pub fn retrain_with(&self, config: &TrainConfig) -> Result<Arc<ModelArtifact>, StressError> {
        let artifact = self.trainer.train(config)?;
        Ok(self.publish(artifact))
    }

    pub fn predict(&self, vector: &FeatureVector) -> PredictionResult {
        InferenceEngine::new(self.current()).predict(vector)
    }

    pub fn predict_named<I, K>(&self, pairs: I) -> Result<PredictionResult, StressError>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        InferenceEngine::new(self.current()).predict_named(pairs)
    }

    /// Score the requests in `raw_json` and return encoded payloads
    pub fn predict_json(&self, raw_json: &str) -> Result<Vec<String>, StressError> {
        let requests = parse_requests(raw_json)?;
        self.encode_all(&requests)
    }

    fn encode_all(&self, requests: &[FeatureVector]) -> Result<Vec<String>, StressError> {
        // One snapshot for the whole batch
        let artifact = self.current();
        let engine = InferenceEngine::new(Arc::clone(&artifact));
        requests
            .iter()
            .map(|vector| {
                let prediction = engine.predict(vector);
                self.encoder.encode_to_json(&artifact, vector, &prediction)
            })
            .collect()
    }

    pub fn evaluate(&self, test_set: Option<&TrainingCorpus>) -> Result<EvaluationReport, StressError> {
        self.evaluator.evaluate(&self.current(), test_set)
    }

    /// Replace the published artifact with one read from JSON
    pub fn load_artifact(&self, json: &str) -> Result<Arc<ModelArtifact>, StressError> {
        let artifact = ModelArtifact::from_json(json)?;
        Ok(self.publish(artifact))
    }

    pub fn save_artifact(&self) -> Result<String, StressError> {
        self.current().to_json().map_err(StressError::JsonError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::ForestConfig;
    use crate::schema::Feature;
    use pretty_assertions::assert_eq;

    fn quick(seed: u64) -> TrainConfig {
        TrainConfig {
            seed: Some(seed),
            n_samples: 500,
            forest: ForestConfig {
                n_estimators: 15,
                ..ForestConfig::default()
            },
        }
    }

    fn feature_map_json() -> String {
        serde_json::to_string(&FeatureVector::example()).unwrap()
    }

    #[test]
    fn test_parse_request_shapes() {
        let record = serde_json::to_value(ActivityRecord::example()).unwrap();
        let from_record = parse_request(record).unwrap();
        assert_eq!(from_record, FeatureVector::example());

        let from_map = parse_requests(&feature_map_json()).unwrap();
        assert_eq!(from_map, vec![FeatureVector::example()]);

        let positional = serde_json::to_string(&FeatureVector::example().to_vec()).unwrap();
        assert_eq!(parse_requests(&positional).unwrap(), vec![FeatureVector::example()]);

        let batch = format!("[{0},{0}]", feature_map_json());
        assert_eq!(parse_requests(&batch).unwrap().len(), 2);
    }

    #[test]
    fn test_parse_request_errors() {
        assert!(parse_requests("not valid json").is_err());
        assert!(parse_requests(r#"{"durasi_tidur": 7.0}"#)
            .unwrap_err()
            .is_schema_error());
        assert!(parse_requests("[1.0, 2.0]").is_err());
        assert!(matches!(
            parse_requests("42"),
            Err(StressError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_predict_stress_one_shot() {
        let payloads = predict_stress(&feature_map_json(), &quick(4)).unwrap();
        assert_eq!(payloads.len(), 1);
        let payload: serde_json::Value = serde_json::from_str(&payloads[0]).unwrap();
        assert_eq!(payload["producer"]["name"], "synheart-stress");
        assert_eq!(payload["provenance"]["seed"], 4);

        assert!(predict_stress("[]", &quick(4)).unwrap().is_empty());
    }

    #[test]
    fn test_retrain_swaps_artifact() {
        let engine = StressEngine::train(&quick(1)).unwrap();
        let before = engine.current();
        let after = engine.retrain(Some(2)).unwrap();

        assert_ne!(before.artifact_id, after.artifact_id);
        assert_eq!(engine.current().artifact_id, after.artifact_id);
        assert_eq!(after.seed, 2);
        // The old snapshot remains usable
        assert!(InferenceEngine::new(before).predict(&FeatureVector::example()).artifact_id.is_some());
    }

    #[test]
    fn test_failed_retrain_keeps_current() {
        let engine = StressEngine::train(&quick(1)).unwrap();
        let id = engine.current().artifact_id;
        let bad = TrainConfig {
            n_samples: 0,
            ..quick(3)
        };
        assert!(engine.retrain_with(&bad).is_err());
        assert_eq!(engine.current().artifact_id, id);
    }

    #[test]
    fn test_save_and_load_artifact() {
        let engine = StressEngine::train(&quick(6)).unwrap();
        let saved = engine.save_artifact().unwrap();
        let v = FeatureVector::example().with(Feature::DurasiTidur, 5.0);
        let expected = engine.predict(&v);

        let other = StressEngine::train(&quick(7)).unwrap();
        let loaded = other.load_artifact(&saved).unwrap();
        assert_eq!(loaded.artifact_id, engine.current().artifact_id);
        assert_eq!(other.predict(&v).predicted_label, expected.predicted_label);

        assert!(other.load_artifact("{}").is_err());
        assert_eq!(other.current().artifact_id, loaded.artifact_id);
    }

    #[test]
    fn test_predict_json_and_named() {
        let engine = StressEngine::train(&quick(8)).unwrap();
        let payloads = engine.predict_json(&feature_map_json()).unwrap();
        assert_eq!(payloads.len(), 1);

        let named = engine
            .predict_named(FeatureVector::example().iter().map(|(f, v)| (f.as_str(), v)))
            .unwrap();
        assert_eq!(named, engine.predict(&FeatureVector::example()));
    }

    #[test]
    fn test_engine_evaluate() {
        let engine = StressEngine::train(&quick(9))
            .unwrap()
            .with_evaluation_config(EvaluationConfig {
                n_test_samples: 100,
                ..EvaluationConfig::default()
            });
        let report = engine.evaluate(None).unwrap();
        assert_eq!(report.n_samples, 100);
        assert_eq!(report.artifact_id, engine.current().artifact_id);
    }
}
