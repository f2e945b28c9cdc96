//! End-to-end classification scenarios against the reference ensemble

use std::sync::{Arc, OnceLock};
use synheart_stress::forest::ForestConfig;
use synheart_stress::{
    ActivityRecord, ClassifierTrainer, Feature, FeatureVector, InferenceEngine, ModelArtifact,
    StressLevel, TrainConfig,
};

fn reference_engine() -> InferenceEngine {
    static ARTIFACT: OnceLock<Arc<ModelArtifact>> = OnceLock::new();
    let artifact = ARTIFACT.get_or_init(|| {
        Arc::new(
            ClassifierTrainer::new()
                .train(&TrainConfig::seeded(42))
                .expect("reference training"),
        )
    });
    InferenceEngine::new(Arc::clone(artifact))
}

#[test]
fn typical_evening_user_is_medium() {
    let record = ActivityRecord {
        screen_time_total: 8.5,
        ..ActivityRecord::example()
    };
    assert!(record.validate().is_ok());

    let result = reference_engine().predict_record(&record);

    assert!(!result.fallback);
    assert_eq!(result.predicted_label, StressLevel::Medium);
    assert_eq!(result.predicted_label.label(), "Sedang");
    assert!(result.confidence > 0.33 && result.confidence < 1.0);
    assert!(result
        .risk_factors
        .iter()
        .any(|f| f.to_lowercase().contains("night")));
}

#[test]
fn typical_evening_user_is_medium_across_corpus_seeds() {
    let record = ActivityRecord {
        screen_time_total: 8.5,
        ..ActivityRecord::example()
    };
    for seed in [7, 2024] {
        let config = TrainConfig {
            forest: ForestConfig {
                n_estimators: 100,
                ..ForestConfig::default()
            },
            ..TrainConfig::seeded(seed)
        };
        let artifact = ClassifierTrainer::new().train(&config).unwrap();
        let result = InferenceEngine::new(Arc::new(artifact)).predict_record(&record);

        assert!(!result.fallback);
        assert_eq!(result.predicted_label, StressLevel::Medium, "corpus seed {seed}");
    }
}

#[test]
fn extreme_user_is_high() {
    let vector = FeatureVector::example()
        .with(Feature::DurasiPemakaian, 15.0)
        .with(Feature::BukaSosmed, 7.0)
        .with(Feature::ScrollTime, 5.0)
        .with(Feature::NotifikasiCount, 280.0)
        .with(Feature::DurasiTidur, 4.0);

    let result = reference_engine().predict(&vector);

    assert!(!result.fallback);
    assert_eq!(result.predicted_label, StressLevel::High);
    assert_eq!(result.predicted_label.label(), "Tinggi");
    assert!(result.confidence >= 0.5);
    assert!(result.risk_factors.len() >= 5);
}

#[test]
fn personalized_importance_tracks_risky_values() {
    let engine = reference_engine();
    let calm = engine.predict(&FeatureVector::example());
    let heavy = engine.predict(&FeatureVector::example().with(Feature::DurasiPemakaian, 13.0));

    let global = engine.artifact().importance(Feature::DurasiPemakaian);
    assert!((calm.personalized_importance[&Feature::DurasiPemakaian] - global).abs() < 1e-12);
    assert!((heavy.personalized_importance[&Feature::DurasiPemakaian] - global * 2.5).abs() < 1e-12);
    assert_eq!(calm.global_importance, heavy.global_importance);
}

#[test]
fn out_of_range_input_is_clamped_not_rejected() {
    let engine = reference_engine();
    let wild = FeatureVector::example()
        .with(Feature::DurasiPemakaian, 30.0)
        .with(Feature::NotifikasiCount, -12.0)
        .with(Feature::DurasiTidur, 0.0);
    let bounded = wild.clamped();

    let a = engine.predict(&wild);
    let b = engine.predict(&bounded);
    assert!(!a.fallback);
    assert_eq!(a.probabilities, b.probabilities);
    assert!((a.probabilities.sum() - 1.0).abs() < 1e-9);
}

#[test]
fn arity_mismatch_is_an_input_error() {
    let engine = reference_engine();
    assert!(engine.predict_slice(&[1.0; 20]).is_err());
    assert!(engine
        .predict_named(vec![("durasi_pemakaian", 7.0), ("screen_time", 3.0)])
        .is_err());
}
