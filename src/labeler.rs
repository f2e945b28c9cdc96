//! Heuristic stress labeling
//!
//! An additive point system over the feature vector. It is the ground truth the
//! classifier reconstructs, so every threshold and weight below is a fixed constant.

use crate::error::StressError;
use crate::generator::CorpusGenerator;
use crate::schema::Feature;
use crate::types::{FeatureVector, LabeledSample, StressLevel, TrainingCorpus};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Score at or above which a sample is labeled High
pub const HIGH_THRESHOLD: f64 = 7.5;

/// Score at or above which a sample is labeled Medium
pub const MEDIUM_THRESHOLD: f64 = 4.0;

/// Standard deviation of label-smoothing noise
pub const LABEL_NOISE_STD: f64 = 0.3;

/// Tiered increments, strongest first; the first threshold exceeded wins
const SCREEN_TIERS: [(f64, f64); 4] = [(12.0, 4.5), (9.0, 3.0), (6.0, 1.5), (3.0, 0.5)];
const SOCIAL_TIERS: [(f64, f64); 3] = [(5.0, 4.0), (3.0, 2.5), (1.5, 1.0)];
const SCROLL_TIERS: [(f64, f64); 3] = [(4.0, 3.5), (2.0, 2.0), (1.0, 1.0)];
const NOTIFICATION_TIERS: [(f64, f64); 4] = [(150.0, 3.0), (100.0, 2.0), (60.0, 1.2), (30.0, 0.5)];
const MULTITASK_TIERS: [(f64, f64); 3] = [(2.5, 2.0), (1.8, 1.2), (1.2, 0.6)];
const FREQUENCY_TIERS: [(f64, f64); 3] = [(200.0, 2.5), (120.0, 1.5), (80.0, 0.8)];
const ENTERTAINMENT_TIERS: [(f64, f64); 2] = [(6.0, 1.8), (3.0, 1.0)];

fn tier(value: f64, tiers: &[(f64, f64)]) -> f64 {
    tiers
        .iter()
        .find(|(threshold, _)| value > *threshold)
        .map(|(_, points)| *points)
        .unwrap_or(0.0)
}

/// U-shaped: both deprivation and oversleeping add points
fn sleep_points(hours: f64) -> f64 {
    if hours < 5.0 {
        4.0
    } else if hours < 6.5 {
        2.5
    } else if hours < 7.0 {
        1.5
    } else if hours > 10.0 {
        1.0
    } else {
        0.0
    }
}

fn exercise_points(hours: f64) -> f64 {
    if hours < 0.2 {
        2.0
    } else if hours < 0.5 {
        1.0
    } else if hours > 2.5 {
        -0.8
    } else {
        0.0
    }
}

/// Deterministic heuristic score (no noise)
pub fn raw_score(v: &FeatureVector) -> f64 {
    let night = v.flag(Feature::WaktuMalam);
    let morning = v.flag(Feature::WaktuPagi);

    let mut score = 0.0;

    score += tier(v[Feature::DurasiPemakaian], &SCREEN_TIERS);
    score += tier(v[Feature::BukaSosmed], &SOCIAL_TIERS);
    score += tier(v[Feature::ScrollTime], &SCROLL_TIERS);
    score += sleep_points(v[Feature::DurasiTidur]);
    score += tier(v[Feature::NotifikasiCount], &NOTIFICATION_TIERS);

    if night {
        score += 2.0;
    }
    score += exercise_points(v[Feature::DurasiOlahraga]);

    let multitask = v[Feature::JumlahAplikasi] / 10.0 + v[Feature::JumlahAktivitas] / 8.0;
    score += tier(multitask, &MULTITASK_TIERS);
    score += tier(v[Feature::FrekuensiPenggunaan], &FREQUENCY_TIERS);

    let entertainment = v[Feature::MainGame] + v[Feature::Streaming];
    score += tier(entertainment, &ENTERTAINMENT_TIERS);

    // Protective patterns
    let meal = v[Feature::DurasiMakan];
    if (2.0..=3.5).contains(&meal) {
        score -= 0.3;
    }
    if morning && !night {
        score -= 0.5;
    }
    let learning = v[Feature::BelajarOnline];
    if (0.5..=3.0).contains(&learning) {
        score -= 0.3;
    }

    score
}

/// Map a score to its ordinal class
pub fn bucket(score: f64) -> StressLevel {
    if score >= HIGH_THRESHOLD {
        StressLevel::High
    } else if score >= MEDIUM_THRESHOLD {
        StressLevel::Medium
    } else {
        StressLevel::Low
    }
}

/// Assigns a training label to one vector
pub trait StressLabeler: Send + Sync {
    fn label(&self, features: &FeatureVector, rng: &mut StdRng) -> StressLevel;
}

/// Additive rule labeler with Gaussian label smoothing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicLabeler {
    noise_std: f64,
}

impl Default for HeuristicLabeler {
    fn default() -> Self {
        Self {
            noise_std: LABEL_NOISE_STD,
        }
    }
}

impl HeuristicLabeler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Labeler without smoothing noise
    pub fn noiseless() -> Self {
        Self { noise_std: 0.0 }
    }

    pub fn noise_std(&self) -> f64 {
        self.noise_std
    }
}

impl StressLabeler for HeuristicLabeler {
    fn label(&self, features: &FeatureVector, rng: &mut StdRng) -> StressLevel {
        let mut score = raw_score(features);
        if self.noise_std > 0.0 {
            if let Ok(noise) = Normal::new(0.0, self.noise_std) {
                score += noise.sample(rng);
            }
        }
        bucket(score)
    }
}

/// Generate and label a corpus from one seed
pub fn synthesize_corpus(
    generator: &dyn CorpusGenerator,
    labeler: &dyn StressLabeler,
    n_samples: usize,
    seed: u64,
) -> Result<TrainingCorpus, StressError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let vectors = generator.generate_corpus(n_samples, &mut rng)?;
    let samples = vectors
        .into_iter()
        .map(|features| LabeledSample {
            label: labeler.label(&features, &mut rng),
            features,
        })
        .collect();
    Ok(TrainingCorpus::new(samples, Some(seed)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::SyntheticCorpusGenerator;
    use crate::types::ActivityRecord;
    use pretty_assertions::assert_eq;

    /// Vector with every risk contribution switched off
    fn calm() -> FeatureVector {
        FeatureVector::example()
            .with(Feature::DurasiPemakaian, 2.0)
            .with(Feature::BukaSosmed, 0.5)
            .with(Feature::ScrollTime, 0.5)
            .with(Feature::DurasiTidur, 8.0)
            .with(Feature::NotifikasiCount, 10.0)
            .with(Feature::WaktuMalam, 0.0)
            .with(Feature::WaktuPagi, 0.0)
            .with(Feature::DurasiOlahraga, 1.0)
            .with(Feature::JumlahAplikasi, 5.0)
            .with(Feature::JumlahAktivitas, 4.0)
            .with(Feature::FrekuensiPenggunaan, 20.0)
            .with(Feature::MainGame, 0.5)
            .with(Feature::Streaming, 0.5)
            .with(Feature::DurasiMakan, 1.5)
            .with(Feature::BelajarOnline, 0.0)
    }

    #[test]
    fn test_calm_vector_scores_zero() {
        assert_eq!(raw_score(&calm()), 0.0);
    }

    #[test]
    fn test_example_vector_score() {
        // screen 1.5, social 1.0, notif 0.5, night 2.0, multitask 1.2,
        // entertainment 1.0, meal -0.3, learning -0.3
        let score = raw_score(&FeatureVector::example());
        assert!((score - 6.6).abs() < 1e-9, "score {score}");
        assert_eq!(bucket(score), StressLevel::Medium);
    }

    #[test]
    fn test_screen_tiers() {
        let base = calm();
        let cases = [(3.0, 0.0), (3.5, 0.5), (6.5, 1.5), (9.5, 3.0), (12.5, 4.5)];
        for (hours, points) in cases {
            let v = base.with(Feature::DurasiPemakaian, hours);
            assert!((raw_score(&v) - points).abs() < 1e-9, "{hours}h");
        }
    }

    #[test]
    fn test_sleep_is_u_shaped() {
        let base = calm();
        let at = |h: f64| raw_score(&base.with(Feature::DurasiTidur, h));
        assert_eq!(at(4.0), 4.0);
        assert_eq!(at(6.0), 2.5);
        assert_eq!(at(6.8), 1.5);
        assert_eq!(at(7.0), 0.0);
        assert_eq!(at(10.5), 1.0);
        assert!(at(7.0) <= at(4.0) && at(7.0) <= at(11.0));
    }

    #[test]
    fn test_partial_flag_is_unset_everywhere() {
        let partial = calm().with(Feature::WaktuMalam, 0.7);
        assert!(!partial.flag(Feature::WaktuMalam));
        assert_eq!(raw_score(&partial), raw_score(&calm()));
        assert_eq!(ActivityRecord::from_vector(&partial).waktu_malam, 0);
        assert!(crate::risk::risk_factors(&partial)
            .iter()
            .all(|f| !f.contains("Night")));
    }

    #[test]
    fn test_protective_patterns() {
        let base = calm();
        let morning_only = base.with(Feature::WaktuPagi, 1.0);
        assert!((raw_score(&morning_only) + 0.5).abs() < 1e-9);

        // Night usage cancels the morning bonus and adds its own points
        let both = morning_only.with(Feature::WaktuMalam, 1.0);
        assert!((raw_score(&both) - 2.0).abs() < 1e-9);

        let fit = base.with(Feature::DurasiOlahraga, 3.0);
        assert!((raw_score(&fit) + 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(bucket(3.999), StressLevel::Low);
        assert_eq!(bucket(4.0), StressLevel::Medium);
        assert_eq!(bucket(7.499), StressLevel::Medium);
        assert_eq!(bucket(7.5), StressLevel::High);
        assert_eq!(bucket(-2.0), StressLevel::Low);
    }

    #[test]
    fn test_noiseless_label_matches_bucket() {
        let labeler = HeuristicLabeler::noiseless();
        let mut rng = StdRng::seed_from_u64(0);
        let v = FeatureVector::example();
        assert_eq!(labeler.label(&v, &mut rng), bucket(raw_score(&v)));
    }

    #[test]
    fn test_synthesized_corpus_has_all_classes() {
        let corpus = synthesize_corpus(
            &SyntheticCorpusGenerator::new(),
            &HeuristicLabeler::new(),
            3000,
            42,
        )
        .unwrap();
        assert_eq!(corpus.len(), 3000);
        assert_eq!(corpus.seed(), Some(42));
        let dist = corpus.class_distribution();
        assert!(dist.iter().all(|&c| c > 0), "{dist:?}");
        assert!(dist[2] > dist[0], "{dist:?}");

        let again = synthesize_corpus(
            &SyntheticCorpusGenerator::new(),
            &HeuristicLabeler::new(),
            3000,
            42,
        )
        .unwrap();
        assert_eq!(again.label_indices(), corpus.label_indices());
    }
}
