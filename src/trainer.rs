//! Classifier training
//!
//! Generates and labels a corpus, fits the scaler and forest, and packages the result as
//! a [`ModelArtifact`]. A failed fit is retried once with a fixed, deterministic
//! construction so the service is never left without a model.

use crate::artifact::{ArtifactOrigin, ModelArtifact};
use crate::error::StressError;
use crate::forest::{ForestConfig, RandomForest};
use crate::generator::{resolve_seed, CorpusGenerator, SyntheticCorpusGenerator};
use crate::labeler::{synthesize_corpus, HeuristicLabeler, StressLabeler};
use crate::scaler::StandardScaler;
use crate::types::{StressLevel, TrainingCorpus, CLASS_COUNT};
use serde::{Deserialize, Serialize};

/// Default corpus size
pub const DEFAULT_N_SAMPLES: usize = 3000;

/// Corpus seed of the fallback construction
pub const FALLBACK_SEED: u64 = 42;

/// Training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Corpus seed; `None` derives one from the wall clock
    pub seed: Option<u64>,
    pub n_samples: usize,
    pub forest: ForestConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            seed: None,
            n_samples: DEFAULT_N_SAMPLES,
            forest: ForestConfig::default(),
        }
    }
}

impl TrainConfig {
    /// Pinned-seed configuration
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    /// Smaller, shallower construction used when the primary fit fails
    pub fn fallback() -> Self {
        Self {
            seed: Some(FALLBACK_SEED),
            n_samples: DEFAULT_N_SAMPLES,
            forest: ForestConfig {
                n_estimators: 100,
                max_depth: Some(10),
                ..ForestConfig::default()
            },
        }
    }

    pub fn validate(&self) -> Result<(), StressError> {
        if self.n_samples < 2 {
            return Err(StressError::InvalidConfig(format!(
                "n_samples must be at least 2, got {}",
                self.n_samples
            )));
        }
        self.forest.validate()
    }
}

/// Fits artifacts from pluggable corpus and label strategies
pub struct ClassifierTrainer {
    generator: Box<dyn CorpusGenerator>,
    labeler: Box<dyn StressLabeler>,
}

impl Default for ClassifierTrainer {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassifierTrainer {
    /// Synthetic generator with the heuristic labeler
    pub fn new() -> Self {
        Self {
            generator: Box::new(SyntheticCorpusGenerator::new()),
            labeler: Box::new(HeuristicLabeler::new()),
        }
    }

    pub fn with_strategies(
        generator: Box<dyn CorpusGenerator>,
        labeler: Box<dyn StressLabeler>,
    ) -> Self {
        Self { generator, labeler }
    }

    pub fn generator(&self) -> &dyn CorpusGenerator {
        self.generator.as_ref()
    }

    pub fn labeler(&self) -> &dyn StressLabeler {
        self.labeler.as_ref()
    }

    /// Train, falling back to [`TrainConfig::fallback`] if the primary fit fails
    pub fn train(&self, config: &TrainConfig) -> Result<ModelArtifact, StressError> {
        config.validate()?;

        match self.train_with_origin(config, ArtifactOrigin::Primary) {
            Ok(artifact) => Ok(artifact),
            Err(primary) => {
                log::warn!("Primary training failed ({primary}); using fallback construction");
                self.train_with_origin(&TrainConfig::fallback(), ArtifactOrigin::Fallback)
                    .map_err(|fallback| {
                        StressError::TrainingFailure(format!(
                            "primary fit failed: {primary}; fallback fit failed: {fallback}"
                        ))
                    })
            }
        }
    }

    /// Train exactly as configured, without the fallback retry
    pub fn train_primary(&self, config: &TrainConfig) -> Result<ModelArtifact, StressError> {
        config.validate()?;
        self.train_with_origin(config, ArtifactOrigin::Primary)
    }

    fn train_with_origin(
        &self,
        config: &TrainConfig,
        origin: ArtifactOrigin,
    ) -> Result<ModelArtifact, StressError> {
        let (seed, time_derived) = resolve_seed(config.seed);
        if time_derived {
            log::info!("Using time-derived training seed {seed}");
        } else {
            log::info!("Using training seed {seed}");
        }

        let corpus = synthesize_corpus(
            self.generator.as_ref(),
            self.labeler.as_ref(),
            config.n_samples,
            seed,
        )?;
        self.fit_corpus(&corpus, seed, origin, &config.forest)
    }

    /// Fit scaler and forest on an already labeled corpus
    pub fn fit_corpus(
        &self,
        corpus: &TrainingCorpus,
        seed: u64,
        origin: ArtifactOrigin,
        forest_config: &ForestConfig,
    ) -> Result<ModelArtifact, StressError> {
        if corpus.is_empty() {
            return Err(StressError::TrainingFailure("Empty training corpus".to_string()));
        }

        let distribution = corpus.class_distribution();
        log_distribution(&distribution, corpus.len());

        let rows = corpus.feature_matrix();
        let scaler = StandardScaler::fit(&rows)?;
        let scaled = scaler.transform(&rows)?;
        let forest = RandomForest::fit(&scaled, &corpus.label_indices(), CLASS_COUNT, forest_config)?;

        let importance_total: f64 = forest.feature_importances().iter().sum();
        if importance_total <= 0.0 {
            return Err(StressError::TrainingFailure(
                "Degenerate corpus: no informative split found".to_string(),
            ));
        }

        let artifact = ModelArtifact::new(seed, origin, scaler, forest, corpus.len(), distribution);

        match artifact.oob_accuracy() {
            Some(oob) => log::info!("Model OOB score: {oob:.3}"),
            None => log::info!("Model trained without OOB scoring"),
        }
        let top: Vec<String> = artifact
            .ranked_features()
            .iter()
            .take(5)
            .map(|(f, w)| format!("{f}({w:.3})"))
            .collect();
        log::info!("Top features: {}", top.join(", "));

        Ok(artifact)
    }
}

fn log_distribution(distribution: &[usize; CLASS_COUNT], total: usize) {
    let parts: Vec<String> = StressLevel::ALL
        .iter()
        .map(|level| {
            let count = distribution[level.index()];
            format!(
                "{}={} ({:.1}%)",
                level.english(),
                count,
                count as f64 / total.max(1) as f64 * 100.0
            )
        })
        .collect();
    log::info!("Training distribution: {}", parts.join(", "));
}
