//! Prediction payload encoder
//!
//! Wraps a [`PredictionResult`] with producer metadata, model provenance and the
//! rule-based insights into a self-describing JSON payload.

use crate::artifact::{ArtifactOrigin, ModelArtifact};
use crate::error::StressError;
use crate::insights::{clinical_notes, recommendations, RiskAssessment, WellnessIndicators};
use crate::types::{FeatureVector, PredictionResult};
use crate::{PRODUCER_NAME, STRESS_VERSION};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current payload schema version
pub const PAYLOAD_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Which artifact produced the prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProvenance {
    pub artifact_id: Uuid,
    pub trained_at_utc: String,
    pub seed: u64,
    pub origin: ArtifactOrigin,
    pub oob_accuracy: Option<f64>,
    pub computed_at_utc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressPayload {
    pub payload_version: String,
    pub producer: PayloadProducer,
    pub provenance: ModelProvenance,
    pub prediction: PredictionResult,
    pub wellness: WellnessIndicators,
    pub risk_assessment: RiskAssessment,
    pub clinical_notes: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Stress prediction encoder
pub struct PredictionEncoder {
    instance_id: String,
}

impl Default for PredictionEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictionEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Encode a prediction made by `artifact` for `vector`
    pub fn encode(
        &self,
        artifact: &ModelArtifact,
        vector: &FeatureVector,
        prediction: &PredictionResult,
    ) -> Result<StressPayload, StressError> {
        if let Some(id) = prediction.artifact_id {
            if id != artifact.artifact_id {
                return Err(StressError::InvalidInput(format!(
                    "Prediction from artifact {id} encoded against artifact {}",
                    artifact.artifact_id
                )));
            }
        }

        // Insights are derived from the same clamped view the model scored
        let clamped = vector.clamped();
        let level = prediction.predicted_label;

        Ok(StressPayload {
            payload_version: PAYLOAD_VERSION.to_string(),
            producer: PayloadProducer {
                name: PRODUCER_NAME.to_string(),
                version: STRESS_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            provenance: ModelProvenance {
                artifact_id: artifact.artifact_id,
                trained_at_utc: artifact.trained_at.to_rfc3339(),
                seed: artifact.seed,
                origin: artifact.origin,
                oob_accuracy: artifact.oob_accuracy(),
                computed_at_utc: Utc::now().to_rfc3339(),
            },
            wellness: WellnessIndicators::from_vector(&clamped),
            risk_assessment: RiskAssessment::assess(&clamped),
            clinical_notes: clinical_notes(level, &clamped),
            recommendations: recommendations(level, &prediction.top_features, &clamped),
            prediction: prediction.clone(),
        })
    }

    pub fn encode_to_json(
        &self,
        artifact: &ModelArtifact,
        vector: &FeatureVector,
        prediction: &PredictionResult,
    ) -> Result<String, StressError> {
        let payload = self.encode(artifact, vector, prediction)?;
        serde_json::to_string_pretty(&payload).map_err(StressError::JsonError)
    }
}
