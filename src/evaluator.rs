//! Model evaluation
//!
//! Scores an artifact against a labeled test set (a freshly synthesized one by default),
//! cross-validates the artifact's forest configuration on that set, and summarizes
//! confidence and clinical-safety statistics into an [`EvaluationReport`].

use crate::artifact::ModelArtifact;
use crate::error::StressError;
use crate::forest::{ForestConfig, RandomForest};
use crate::generator::SyntheticCorpusGenerator;
use crate::inference::InferenceEngine;
use crate::labeler::{synthesize_corpus, HeuristicLabeler};
use crate::metrics::{
    accuracy, class_scores, confusion_matrix, entropy, macro_average, mean_std, weighted_f1,
    ClassScores,
};
use crate::types::{ClassProbabilities, StressLevel, TrainingCorpus, CLASS_COUNT};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use uuid::Uuid;

/// Confidence above which a prediction counts as high-confidence
pub const HIGH_CONFIDENCE: f64 = 0.8;

/// Minimum accuracy for deployment
pub const DEPLOYMENT_ACCURACY: f64 = 0.75;

/// Minimum safety score for deployment
pub const DEPLOYMENT_SAFETY: f64 = 0.80;

/// Mixed into the test seed when it collides with the training seed
const TEST_SEED_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Seed of the generated test set; differs from the usual training seeds
    pub test_seed: u64,
    pub n_test_samples: usize,
    pub cv_folds: usize,
    pub cv_seed: u64,
    /// Boundary between low and medium confidence
    pub confidence_threshold: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            test_seed: 123,
            n_test_samples: 500,
            cv_folds: 5,
            cv_seed: 42,
            confidence_threshold: 0.6,
        }
    }
}

impl EvaluationConfig {
    pub fn validate(&self) -> Result<(), StressError> {
        if self.n_test_samples == 0 {
            return Err(StressError::InvalidConfig(
                "n_test_samples must be positive".to_string(),
            ));
        }
        if self.cv_folds < 2 {
            return Err(StressError::InvalidConfig(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if !(0.0..HIGH_CONFIDENCE).contains(&self.confidence_threshold) {
            return Err(StressError::InvalidConfig(format!(
                "confidence_threshold must lie in [0, {HIGH_CONFIDENCE}), got {}",
                self.confidence_threshold
            )));
        }
        Ok(())
    }
}

/// Per-class breakdown row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassReport {
    pub label: StressLevel,
    #[serde(flatten)]
    pub scores: ClassScores,
}

/// Fold scores with their mean and population standard deviation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub std: f64,
    pub scores: Vec<f64>,
}

impl MetricSummary {
    fn from_scores(scores: Vec<f64>) -> Self {
        let (mean, std) = mean_std(&scores);
        Self { mean, std, scores }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidation {
    pub folds: usize,
    pub accuracy: MetricSummary,
    pub f1_macro: MetricSummary,
    pub precision_macro: MetricSummary,
    pub recall_macro: MetricSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityMetrics {
    pub average_confidence: f64,
    /// Share with confidence > 0.8
    pub high_confidence_rate: f64,
    /// Share with confidence in (threshold, 0.8]
    pub medium_confidence_rate: f64,
    /// Share with confidence <= threshold
    pub low_confidence_rate: f64,
    pub average_entropy: f64,
    pub confidence_threshold_recommended: f64,
}

/// Safety-oriented agreement statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalMetrics {
    /// Accuracy restricted to truly High samples; 0 when there are none
    pub high_stress_detection_accuracy: f64,
    /// Predicted level above the true level
    pub conservative_prediction_rate: f64,
    /// Predicted level below the true level
    pub underestimation_rate: f64,
    pub clinical_accuracy: f64,
    /// Within one level of the truth
    pub adjacent_accuracy: f64,
    /// `1 - underestimation_rate`
    pub safety_score: f64,
}

/// Everything `evaluate` measured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub artifact_id: Uuid,
    pub evaluated_at: DateTime<Utc>,
    pub n_samples: usize,
    /// Seed of the test set, when it was synthesized
    pub test_seed: Option<u64>,
    pub accuracy: f64,
    pub f1_macro: f64,
    pub f1_weighted: f64,
    pub classification: Vec<ClassReport>,
    /// `confusion_matrix[actual][predicted]`
    pub confusion_matrix: Vec<Vec<usize>>,
    pub cross_validation: Option<CrossValidation>,
    pub reliability: ReliabilityMetrics,
    pub clinical: ClinicalMetrics,
    pub deployment_ready: bool,
}

/// Deployment rule: accuracy >= 0.75 and safety score >= 0.80
pub fn deployment_ready(accuracy: f64, safety_score: f64) -> bool {
    accuracy >= DEPLOYMENT_ACCURACY && safety_score >= DEPLOYMENT_SAFETY
}

pub fn reliability_metrics(
    probabilities: &[ClassProbabilities],
    confidence_threshold: f64,
) -> ReliabilityMetrics {
    let n = probabilities.len().max(1) as f64;
    let confidences: Vec<f64> = probabilities.iter().map(ClassProbabilities::max).collect();
    let share = |pred: &dyn Fn(f64) -> bool| {
        confidences.iter().filter(|&&c| pred(c)).count() as f64 / n
    };

    ReliabilityMetrics {
        average_confidence: confidences.iter().sum::<f64>() / n,
        high_confidence_rate: share(&|c| c > HIGH_CONFIDENCE),
        medium_confidence_rate: share(&|c| c > confidence_threshold && c <= HIGH_CONFIDENCE),
        low_confidence_rate: share(&|c| c <= confidence_threshold),
        average_entropy: probabilities
            .iter()
            .map(|p| entropy(&p.as_array()))
            .sum::<f64>()
            / n,
        confidence_threshold_recommended: confidence_threshold,
    }
}

pub fn clinical_metrics(y_true: &[usize], y_pred: &[usize]) -> ClinicalMetrics {
    let n = y_true.len().max(1) as f64;
    let pairs = || y_true.iter().zip(y_pred);
    let rate = |pred: &dyn Fn(usize, usize) -> bool| {
        pairs().filter(|&(&t, &p)| pred(t, p)).count() as f64 / n
    };

    let high = StressLevel::High.index();
    let (high_total, high_hit) = pairs()
        .filter(|&(&t, _)| t == high)
        .fold((0usize, 0usize), |(total, hit), (_, &p)| {
            (total + 1, hit + usize::from(p == high))
        });

    let underestimation_rate = rate(&|t, p| p < t);
    ClinicalMetrics {
        high_stress_detection_accuracy: if high_total == 0 {
            0.0
        } else {
            high_hit as f64 / high_total as f64
        },
        conservative_prediction_rate: rate(&|t, p| p > t),
        underestimation_rate,
        clinical_accuracy: rate(&|t, p| p == t),
        adjacent_accuracy: rate(&|t, p| t.abs_diff(p) <= 1),
        safety_score: 1.0 - underestimation_rate,
    }
}

/// Shuffled stratified fold assignment: each class is dealt round-robin across folds
fn stratified_folds(labels: &[usize], folds: usize, seed: u64) -> Vec<Vec<usize>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut assignment = vec![Vec::new(); folds];
    let mut offset = 0;
    for class in 0..CLASS_COUNT {
        let mut members: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        members.shuffle(&mut rng);
        let count = members.len();
        for (j, index) in members.into_iter().enumerate() {
            assignment[(offset + j) % folds].push(index);
        }
        // Continue where the previous class stopped so fold sizes stay balanced
        offset += count;
    }
    for fold in &mut assignment {
        fold.sort_unstable();
    }
    assignment
}

/// Evaluates artifacts against labeled test sets
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    config: EvaluationConfig,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EvaluationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Test set drawn from the synthetic generator with `test_seed`
    pub fn default_test_set(&self) -> Result<TrainingCorpus, StressError> {
        self.generated_test_set(self.config.test_seed)
    }

    /// Seed for the generated test set of `artifact`.
    ///
    /// A test seed equal to the training seed would replay the first training vectors,
    /// so it is replaced by a derived seed.
    pub fn test_seed_for(&self, artifact: &ModelArtifact) -> u64 {
        let seed = self.config.test_seed;
        if seed != artifact.seed {
            return seed;
        }
        let derived = seed ^ TEST_SEED_SALT;
        log::warn!(
            "Test seed {seed} equals the training seed; using derived test seed {derived}"
        );
        derived
    }

    fn generated_test_set(&self, seed: u64) -> Result<TrainingCorpus, StressError> {
        synthesize_corpus(
            &SyntheticCorpusGenerator::new(),
            &HeuristicLabeler::new(),
            self.config.n_test_samples,
            seed,
        )
    }

    pub fn evaluate(
        &self,
        artifact: &Arc<ModelArtifact>,
        test_set: Option<&TrainingCorpus>,
    ) -> Result<EvaluationReport, StressError> {
        self.config.validate()?;
        artifact
            .validate()
            .map_err(|e| StressError::EvaluationFailure(format!("Invalid artifact: {e}")))?;

        let generated;
        let corpus = match test_set {
            Some(corpus) => corpus,
            None => {
                let seed = self.test_seed_for(artifact);
                log::info!(
                    "Generating {} test samples with seed {}",
                    self.config.n_test_samples,
                    seed
                );
                generated = self.generated_test_set(seed)?;
                &generated
            }
        };
        if corpus.is_empty() {
            return Err(StressError::EvaluationFailure("Empty test set".to_string()));
        }

        let engine = InferenceEngine::new(Arc::clone(artifact));
        let probabilities = corpus
            .samples()
            .iter()
            .map(|s| engine.probabilities(&s.features.clamped()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StressError::EvaluationFailure(e.to_string()))?;

        let y_true = corpus.label_indices();
        let y_pred: Vec<usize> = probabilities.iter().map(|p| p.argmax().index()).collect();

        let (_, _, f1_macro) = macro_average(&y_true, &y_pred, CLASS_COUNT);
        let accuracy = accuracy(&y_true, &y_pred);
        let classification = StressLevel::ALL
            .iter()
            .zip(class_scores(&y_true, &y_pred, CLASS_COUNT))
            .map(|(&label, scores)| ClassReport { label, scores })
            .collect();

        let cross_validation = self.cross_validate(artifact, corpus);
        let reliability = reliability_metrics(&probabilities, self.config.confidence_threshold);
        let clinical = clinical_metrics(&y_true, &y_pred);

        log::info!("Evaluation accuracy: {accuracy:.3}");
        log::info!("Evaluation F1 (macro): {f1_macro:.3}");
        log::info!("Clinical accuracy: {:.3}", clinical.clinical_accuracy);

        Ok(EvaluationReport {
            artifact_id: artifact.artifact_id,
            evaluated_at: Utc::now(),
            n_samples: corpus.len(),
            test_seed: corpus.seed(),
            accuracy,
            f1_macro,
            f1_weighted: weighted_f1(&y_true, &y_pred, CLASS_COUNT),
            classification,
            confusion_matrix: confusion_matrix(&y_true, &y_pred, CLASS_COUNT),
            cross_validation,
            deployment_ready: deployment_ready(accuracy, clinical.safety_score),
            reliability,
            clinical,
        })
    }

    /// Cross-validation is advisory: failures are logged and omitted from the report
    fn cross_validate(
        &self,
        artifact: &ModelArtifact,
        corpus: &TrainingCorpus,
    ) -> Option<CrossValidation> {
        let folds = self.config.cv_folds;
        if corpus.len() < folds {
            log::warn!(
                "Skipping cross-validation: {} samples for {folds} folds",
                corpus.len()
            );
            return None;
        }
        match self.run_folds(artifact, corpus) {
            Ok(cv) => Some(cv),
            Err(e) => {
                log::warn!("Cross-validation failed: {e}");
                None
            }
        }
    }

    fn run_folds(
        &self,
        artifact: &ModelArtifact,
        corpus: &TrainingCorpus,
    ) -> Result<CrossValidation, StressError> {
        let rows: Vec<Vec<f64>> = corpus
            .samples()
            .iter()
            .map(|s| artifact.scaler.transform_vector(&s.features.clamped()))
            .collect::<Result<_, _>>()?;
        let labels = corpus.label_indices();
        let forest_config = ForestConfig {
            oob_score: false,
            ..artifact.forest_config().clone()
        };

        let mut acc = Vec::new();
        let mut f1 = Vec::new();
        let mut precision = Vec::new();
        let mut recall = Vec::new();

        for (k, held_out) in stratified_folds(&labels, self.config.cv_folds, self.config.cv_seed)
            .iter()
            .enumerate()
        {
            if held_out.is_empty() || held_out.len() == labels.len() {
                return Err(StressError::EvaluationFailure(format!("Fold {k} is degenerate")));
            }
            let mut in_fold = vec![false; labels.len()];
            held_out.iter().for_each(|&i| in_fold[i] = true);

            let (train_x, train_y): (Vec<Vec<f64>>, Vec<usize>) = (0..labels.len())
                .filter(|&i| !in_fold[i])
                .map(|i| (rows[i].clone(), labels[i]))
                .unzip();
            let forest = RandomForest::fit(&train_x, &train_y, CLASS_COUNT, &forest_config)?;

            let truth: Vec<usize> = held_out.iter().map(|&i| labels[i]).collect();
            let predicted = held_out
                .iter()
                .map(|&i| forest.predict(&rows[i]))
                .collect::<Result<Vec<_>, _>>()?;

            let (p, r, f) = macro_average(&truth, &predicted, CLASS_COUNT);
            acc.push(accuracy(&truth, &predicted));
            f1.push(f);
            precision.push(p);
            recall.push(r);
        }

        Ok(CrossValidation {
            folds: self.config.cv_folds,
            accuracy: MetricSummary::from_scores(acc),
            f1_macro: MetricSummary::from_scores(f1),
            precision_macro: MetricSummary::from_scores(precision),
            recall_macro: MetricSummary::from_scores(recall),
        })
    }
}

fn pct(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

impl EvaluationReport {
    /// Qualitative recommendations derived from the headline metrics
    pub fn recommendations(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        out.push(if self.accuracy >= 0.85 {
            "Model performance is excellent for clinical use"
        } else if self.accuracy >= DEPLOYMENT_ACCURACY {
            "Model performance is good but needs monitoring"
        } else {
            "Model needs improvement before clinical deployment"
        });
        if self.clinical.underestimation_rate > 0.15 {
            out.push("High underestimation rate - consider threshold adjustment");
        }
        if self.reliability.low_confidence_rate > 0.20 {
            out.push("Many low-confidence predictions - consider model retraining");
        }
        out
    }

    /// Human-readable report
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = self.write_report(&mut out);
        out
    }

    fn write_report(&self, out: &mut String) -> std::fmt::Result {
        let rule = "=".repeat(60);
        writeln!(out, "{rule}")?;
        writeln!(out, "STRESS CLASSIFIER EVALUATION REPORT")?;
        writeln!(out, "{rule}")?;
        writeln!(out, "Artifact: {}", self.artifact_id)?;
        writeln!(out, "Evaluated at: {}", self.evaluated_at.to_rfc3339())?;
        writeln!(out, "Test samples: {}", self.n_samples)?;
        writeln!(out)?;

        writeln!(out, "CORE PERFORMANCE")?;
        writeln!(out, "  Overall Accuracy: {}", pct(self.accuracy))?;
        writeln!(out, "  F1-Score (Macro): {}", pct(self.f1_macro))?;
        writeln!(out, "  F1-Score (Weighted): {}", pct(self.f1_weighted))?;
        for row in &self.classification {
            writeln!(
                out,
                "  {:<7} precision {:.3}  recall {:.3}  f1 {:.3}  support {}",
                row.label.label(),
                row.scores.precision,
                row.scores.recall,
                row.scores.f1,
                row.scores.support
            )?;
        }
        writeln!(out)?;

        writeln!(out, "CLINICAL RELEVANCE")?;
        writeln!(
            out,
            "  High-Stress Detection: {}",
            pct(self.clinical.high_stress_detection_accuracy)
        )?;
        writeln!(out, "  Safety Score: {}", pct(self.clinical.safety_score))?;
        writeln!(out, "  Adjacent Accuracy: {}", pct(self.clinical.adjacent_accuracy))?;
        writeln!(out)?;

        writeln!(out, "MODEL RELIABILITY")?;
        writeln!(
            out,
            "  Average Confidence: {}",
            pct(self.reliability.average_confidence)
        )?;
        writeln!(
            out,
            "  High Confidence Predictions: {}",
            pct(self.reliability.high_confidence_rate)
        )?;
        writeln!(
            out,
            "  Low Confidence Predictions: {}",
            pct(self.reliability.low_confidence_rate)
        )?;
        writeln!(out)?;

        if let Some(cv) = &self.cross_validation {
            writeln!(out, "CROSS-VALIDATION ROBUSTNESS")?;
            writeln!(
                out,
                "  CV Accuracy: {} (±{})",
                pct(cv.accuracy.mean),
                pct(cv.accuracy.std)
            )?;
            writeln!(
                out,
                "  CV F1-Score: {} (±{})",
                pct(cv.f1_macro.mean),
                pct(cv.f1_macro.std)
            )?;
            writeln!(out)?;
        }

        writeln!(out, "RECOMMENDATIONS")?;
        for line in self.recommendations() {
            writeln!(out, "  - {line}")?;
        }
        writeln!(
            out,
            "  Deployment ready: {}",
            if self.deployment_ready { "YES" } else { "NO" }
        )?;
        writeln!(out, "{rule}")
    }
}
