//! Synheart Stress - On-device digital stress risk scoring and classification
//!
//! Stress classifies a person's stress level (Rendah / Sedang / Tinggi) from 19
//! digital-behavior features through a deterministic pipeline: synthetic corpus
//! generation → heuristic labeling → random-forest training → per-request inference
//! with personalized importance → evaluation.
//!
//! ## Modules
//!
//! - **Training**: `generator`, `labeler`, `scaler`, `forest`, `trainer` produce a
//!   [`ModelArtifact`]
//! - **Inference**: `inference`, `risk`, `insights`, `encoder` score and explain requests
//! - **Evaluation**: `metrics`, `evaluator` measure accuracy, reliability and safety
//! - **Engine**: `pipeline` keeps the published artifact and swaps it on retrain

pub mod artifact;
pub mod encoder;
pub mod error;
pub mod evaluator;
pub mod forest;
pub mod generator;
pub mod inference;
pub mod insights;
pub mod labeler;
pub mod metrics;
pub mod pipeline;
pub mod risk;
pub mod scaler;
pub mod schema;
pub mod trainer;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use artifact::{ArtifactOrigin, ModelArtifact};
pub use error::StressError;
pub use evaluator::{EvaluationConfig, EvaluationReport, Evaluator};
pub use generator::{CorpusGenerator, SyntheticCorpusGenerator};
pub use inference::InferenceEngine;
pub use labeler::{HeuristicLabeler, StressLabeler};
pub use pipeline::{predict_stress, StressEngine};
pub use schema::{Feature, FeatureSchema, FEATURE_COUNT};
pub use trainer::{ClassifierTrainer, TrainConfig};
pub use types::{
    ActivityRecord, ClassProbabilities, FeatureVector, PredictionResult, StressLevel,
    TrainingCorpus,
};

/// Engine version embedded in all prediction payloads
pub const STRESS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for prediction payloads
pub const PRODUCER_NAME: &str = "synheart-stress";
