//! Property tests for the labeling heuristic, risk weighting and inference bounds

use proptest::prelude::*;
use std::sync::{Arc, OnceLock};

use synheart_stress::forest::ForestConfig;
use synheart_stress::labeler::raw_score;
use synheart_stress::risk::risk_multiplier;
use synheart_stress::{
    ClassifierTrainer, Feature, FeatureVector, InferenceEngine, ModelArtifact, TrainConfig,
    FEATURE_COUNT,
};

fn small_engine() -> InferenceEngine {
    static ARTIFACT: OnceLock<Arc<ModelArtifact>> = OnceLock::new();
    let artifact = ARTIFACT.get_or_init(|| {
        let config = TrainConfig {
            seed: Some(17),
            n_samples: 600,
            forest: ForestConfig {
                n_estimators: 20,
                ..ForestConfig::default()
            },
        };
        Arc::new(ClassifierTrainer::new().train(&config).unwrap())
    });
    InferenceEngine::new(Arc::clone(artifact))
}

/// Any in-range vector
fn in_range_vector() -> impl Strategy<Value = FeatureVector> {
    let ranges: Vec<_> = Feature::ALL
        .iter()
        .map(|f| {
            let (lo, hi) = f.range();
            lo..=hi
        })
        .collect();
    ranges.prop_map(|values| FeatureVector::from_slice(&values).unwrap())
}

/// Finite values well outside every range
fn wild_vector() -> impl Strategy<Value = FeatureVector> {
    prop::collection::vec(-1_000.0f64..1_000.0, FEATURE_COUNT)
        .prop_map(|values| FeatureVector::from_slice(&values).unwrap())
}

fn raised(feature: Feature) -> impl Strategy<Value = (FeatureVector, f64, f64)> {
    let (lo, hi) = feature.range();
    (in_range_vector(), lo..=hi, lo..=hi).prop_map(|(v, a, b)| (v, a.min(b), a.max(b)))
}

proptest! {
    #[test]
    fn screen_time_never_lowers_score((v, lo, hi) in raised(Feature::DurasiPemakaian)) {
        prop_assert!(
            raw_score(&v.with(Feature::DurasiPemakaian, lo))
                <= raw_score(&v.with(Feature::DurasiPemakaian, hi))
        );
    }

    #[test]
    fn social_media_never_lowers_score((v, lo, hi) in raised(Feature::BukaSosmed)) {
        prop_assert!(
            raw_score(&v.with(Feature::BukaSosmed, lo)) <= raw_score(&v.with(Feature::BukaSosmed, hi))
        );
    }

    #[test]
    fn notifications_never_lower_score((v, lo, hi) in raised(Feature::NotifikasiCount)) {
        prop_assert!(
            raw_score(&v.with(Feature::NotifikasiCount, lo))
                <= raw_score(&v.with(Feature::NotifikasiCount, hi))
        );
    }

    #[test]
    fn scrolling_never_lowers_score((v, lo, hi) in raised(Feature::ScrollTime)) {
        prop_assert!(
            raw_score(&v.with(Feature::ScrollTime, lo)) <= raw_score(&v.with(Feature::ScrollTime, hi))
        );
    }

    #[test]
    fn sleep_is_u_shaped(v in in_range_vector()) {
        let at = |h| raw_score(&v.with(Feature::DurasiTidur, h));
        prop_assert!(at(7.0) <= at(4.0));
        prop_assert!(at(7.0) <= at(11.0));

        let m = |h| risk_multiplier(Feature::DurasiTidur, h);
        prop_assert!(m(7.0) <= m(4.0));
        prop_assert!(m(7.0) <= m(11.0));
    }

    #[test]
    fn exercise_multiplier_is_non_increasing(a in 0.0f64..4.0, b in 0.0f64..4.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let m = |h| risk_multiplier(Feature::DurasiOlahraga, h);
        prop_assert!(m(hi) <= m(lo), "{} -> {}, {} -> {}", lo, m(lo), hi, m(hi));
    }

    #[test]
    fn clamping_lands_in_range(v in wild_vector()) {
        let clamped = v.clamped();
        for (feature, value) in clamped.iter() {
            let (lo, hi) = feature.range();
            prop_assert!(value >= lo && value <= hi, "{} = {}", feature, value);
        }
        prop_assert_eq!(clamped, clamped.clamped());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn probabilities_are_normalized(v in wild_vector()) {
        let result = small_engine().predict(&v);
        prop_assert!(!result.fallback);
        prop_assert!((result.probabilities.sum() - 1.0).abs() < 1e-9);
        prop_assert!(result.probabilities.as_array().iter().all(|p| (0.0..=1.0).contains(p)));
        prop_assert_eq!(result.confidence, result.probabilities.max());
        prop_assert_eq!(result.predicted_label, result.probabilities.argmax());
    }
}
