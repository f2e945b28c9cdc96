//! Training determinism and artifact publication under concurrent inference

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use synheart_stress::forest::ForestConfig;
use synheart_stress::{
    ArtifactOrigin, ClassifierTrainer, EvaluationConfig, FeatureVector, StressEngine,
    TrainConfig,
};

fn quick(seed: Option<u64>) -> TrainConfig {
    TrainConfig {
        seed,
        n_samples: 800,
        forest: ForestConfig {
            n_estimators: 40,
            ..ForestConfig::default()
        },
    }
}

#[test]
fn pinned_seed_reproduces_oob_and_importance() {
    let trainer = ClassifierTrainer::new();
    let a = trainer.train(&quick(Some(42))).unwrap();
    let b = trainer.train(&quick(Some(42))).unwrap();

    assert_eq!(a.origin, ArtifactOrigin::Primary);
    assert_eq!(a.oob_accuracy(), b.oob_accuracy());
    assert_eq!(a.global_importance(), b.global_importance());
    assert_eq!(a.class_distribution, b.class_distribution);

    let v = FeatureVector::example();
    assert_eq!(
        a.forest.predict_proba(&a.scaler.transform_vector(&v).unwrap()).unwrap(),
        b.forest.predict_proba(&b.scaler.transform_vector(&v).unwrap()).unwrap()
    );
}

#[test]
fn unpinned_seed_is_resolved_and_recorded() {
    let artifact = ClassifierTrainer::new().train(&quick(None)).unwrap();
    assert_eq!(artifact.origin, ArtifactOrigin::Primary);
    assert!(artifact.validate().is_ok());
}

#[test]
fn importance_is_a_distribution() {
    let artifact = ClassifierTrainer::new().train(&quick(Some(5))).unwrap();
    let total: f64 = artifact.global_importance().values().sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert!(artifact.global_importance().values().all(|w| *w >= 0.0));
}

#[test]
fn retrain_swaps_atomically_under_concurrent_predictions() {
    let engine = Arc::new(StressEngine::train(&quick(Some(1))).unwrap());
    let first = engine.current().artifact_id;
    let stop = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let v = FeatureVector::example()
                    .with(synheart_stress::Feature::DurasiTidur, 5.0 + i as f64);
                let mut seen = HashSet::new();
                let mut calls = 0usize;
                while !stop.load(Ordering::Acquire) || calls == 0 {
                    let result = engine.predict(&v);
                    assert!(!result.fallback);
                    assert!((result.probabilities.sum() - 1.0).abs() < 1e-9);
                    seen.insert(result.artifact_id.unwrap());
                    calls += 1;
                }
                seen
            })
        })
        .collect();

    let second = engine.retrain(Some(2)).unwrap().artifact_id;
    let third = engine.retrain(Some(3)).unwrap().artifact_id;
    stop.store(true, Ordering::Release);

    let allowed: HashSet<_> = [first, second, third].into_iter().collect();
    for reader in readers {
        let seen = reader.join().unwrap();
        assert!(seen.is_subset(&allowed));
    }
    assert_eq!(engine.current().artifact_id, third);
}

#[test]
fn evaluation_report_follows_deployment_rule() {
    let engine = StressEngine::train(&quick(Some(42)))
        .unwrap()
        .with_evaluation_config(EvaluationConfig {
            n_test_samples: 300,
            ..EvaluationConfig::default()
        });
    let report = engine.evaluate(None).unwrap();

    assert_eq!(report.test_seed, Some(123));
    assert_eq!(
        report.deployment_ready,
        report.accuracy >= 0.75 && report.clinical.safety_score >= 0.80
    );
    assert!((report.clinical.safety_score + report.clinical.underestimation_rate - 1.0).abs() < 1e-12);
    assert!(report.render_report().contains("Deployment ready"));
}
