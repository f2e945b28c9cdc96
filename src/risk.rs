//! Per-value risk weighting
//!
//! Personalized importance rescales a feature's global importance by how risky this
//! person's value is. Risk-increasing tables are processed in ascending order and the
//! last threshold reached wins, so a boundary value takes the higher multiplier. The
//! inverse exercise table picks the first band the value falls below, so the multiplier
//! never grows with more exercise and a boundary value takes the lower multiplier.

use crate::schema::Feature;
use crate::types::{FeatureVector, FeatureWeights};

/// How a feature's value maps to a risk multiplier
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MultiplierRule {
    /// `value >= threshold` selects the multiplier
    AtLeast(&'static [(f64, f64)]),
    /// The first `value < threshold` band selects the multiplier; values at or past the
    /// last threshold keep the last multiplier (inverse risk)
    Below(&'static [(f64, f64)]),
    /// Values outside `[low, high]` take `multiplier`
    OutsideBand { low: f64, high: f64, multiplier: f64 },
    /// Always 1.0
    Neutral,
}

const SCREEN: [(f64, f64); 3] = [(8.0, 1.5), (10.0, 2.0), (12.0, 2.5)];
const SOCIAL: [(f64, f64); 3] = [(2.0, 1.2), (4.0, 1.8), (6.0, 2.2)];
const NOTIFICATIONS: [(f64, f64); 3] = [(50.0, 1.2), (80.0, 1.5), (120.0, 2.0)];
const NIGHT: [(f64, f64); 1] = [(1.0, 1.5)];
const EXERCISE: [(f64, f64); 3] = [(0.5, 1.5), (1.0, 1.0), (2.0, 0.8)];
const SCROLL: [(f64, f64); 3] = [(1.5, 1.3), (3.0, 1.8), (4.0, 2.0)];
const APPS: [(f64, f64); 3] = [(10.0, 1.2), (15.0, 1.5), (20.0, 1.8)];

impl MultiplierRule {
    pub fn for_feature(feature: Feature) -> MultiplierRule {
        match feature {
            Feature::DurasiPemakaian => MultiplierRule::AtLeast(&SCREEN),
            Feature::BukaSosmed => MultiplierRule::AtLeast(&SOCIAL),
            Feature::NotifikasiCount => MultiplierRule::AtLeast(&NOTIFICATIONS),
            Feature::DurasiTidur => MultiplierRule::OutsideBand {
                low: 6.0,
                high: 9.0,
                multiplier: 1.8,
            },
            Feature::WaktuMalam => MultiplierRule::AtLeast(&NIGHT),
            Feature::DurasiOlahraga => MultiplierRule::Below(&EXERCISE),
            Feature::ScrollTime => MultiplierRule::AtLeast(&SCROLL),
            Feature::JumlahAplikasi => MultiplierRule::AtLeast(&APPS),
            _ => MultiplierRule::Neutral,
        }
    }

    pub fn apply(&self, value: f64) -> f64 {
        match self {
            MultiplierRule::AtLeast(table) => table
                .iter()
                .filter(|(threshold, _)| value >= *threshold)
                .last()
                .map(|(_, m)| *m)
                .unwrap_or(1.0),
            MultiplierRule::Below(table) => table
                .iter()
                .find(|(threshold, _)| value < *threshold)
                .or(table.last())
                .map(|(_, m)| *m)
                .unwrap_or(1.0),
            MultiplierRule::OutsideBand {
                low,
                high,
                multiplier,
            } => {
                if value < *low || value > *high {
                    *multiplier
                } else {
                    1.0
                }
            }
            MultiplierRule::Neutral => 1.0,
        }
    }
}

pub fn risk_multiplier(feature: Feature, value: f64) -> f64 {
    MultiplierRule::for_feature(feature).apply(value)
}

/// `global[f] * risk_multiplier(f, value[f])` for every feature
pub fn personalized_importance(global: &FeatureWeights, vector: &FeatureVector) -> FeatureWeights {
    vector
        .iter()
        .map(|(feature, value)| {
            let weight = global.get(&feature).copied().unwrap_or(0.0);
            (feature, weight * risk_multiplier(feature, value))
        })
        .collect()
}

/// Highest-weighted features, descending; ties keep schema order
pub fn top_features(weights: &FeatureWeights, k: usize) -> Vec<(Feature, f64)> {
    let mut ranked: Vec<(Feature, f64)> = weights.iter().map(|(f, w)| (*f, *w)).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(k);
    ranked
}

/// Human-readable descriptions of triggered risk conditions, in schema order
pub fn risk_factors(vector: &FeatureVector) -> Vec<String> {
    let mut factors = Vec::new();
    for (feature, value) in vector.iter() {
        let factor = match feature {
            Feature::DurasiPemakaian if value > 8.0 => {
                Some(format!("Excessive screen time ({value:.1}h)"))
            }
            Feature::BukaSosmed if value > 3.0 => {
                Some(format!("High social media usage ({value:.1}h)"))
            }
            Feature::NotifikasiCount if value > 80.0 => {
                Some(format!("Notification overload ({})", value.trunc() as i64))
            }
            Feature::DurasiTidur if value < 6.0 || value > 9.5 => {
                Some(format!("Poor sleep pattern ({value:.1}h)"))
            }
            Feature::WaktuMalam if vector.flag(feature) => {
                Some("Night-time device usage".to_string())
            }
            Feature::DurasiOlahraga if value < 0.5 => {
                Some("Insufficient physical activity".to_string())
            }
            Feature::ScrollTime if value > 2.0 => {
                Some(format!("Excessive scrolling ({value:.1}h)"))
            }
            _ => None,
        };
        factors.extend(factor);
    }
    factors
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_screen_time_tiers() {
        let at = |v| risk_multiplier(Feature::DurasiPemakaian, v);
        assert_eq!(at(7.9), 1.0);
        assert_eq!(at(8.0), 1.5);
        assert_eq!(at(10.0), 2.0);
        assert_eq!(at(11.9), 2.0);
        assert_eq!(at(12.0), 2.5);
        assert_eq!(at(16.0), 2.5);
    }

    #[test]
    fn test_sleep_is_u_shaped() {
        let at = |v| risk_multiplier(Feature::DurasiTidur, v);
        assert_eq!(at(4.0), 1.8);
        assert_eq!(at(6.0), 1.0);
        assert_eq!(at(7.0), 1.0);
        assert_eq!(at(9.0), 1.0);
        assert_eq!(at(11.0), 1.8);
    }

    #[test]
    fn test_more_exercise_never_raises_the_multiplier() {
        let at = |v| risk_multiplier(Feature::DurasiOlahraga, v);
        assert_eq!(at(0.0), 1.5);
        assert_eq!(at(0.1), 1.5);
        // Boundaries fall into the calmer band
        assert_eq!(at(0.5), 1.0);
        assert_eq!(at(0.9), 1.0);
        assert_eq!(at(1.0), 0.8);
        assert_eq!(at(2.0), 0.8);
        assert_eq!(at(3.5), 0.8);
        assert!(at(0.1) > at(3.5));

        let samples: Vec<f64> = (0..=40).map(|i| i as f64 * 0.1).collect();
        assert!(samples.windows(2).all(|w| at(w[0]) >= at(w[1])));
    }

    #[test]
    fn test_risk_increasing_boundaries_take_higher_multiplier() {
        assert_eq!(risk_multiplier(Feature::DurasiPemakaian, 7.9), 1.0);
        assert_eq!(risk_multiplier(Feature::DurasiPemakaian, 8.0), 1.5);
        assert_eq!(risk_multiplier(Feature::DurasiPemakaian, 12.0), 2.5);
    }

    #[test]
    fn test_neutral_features() {
        assert_eq!(risk_multiplier(Feature::EmailTime, 4.0), 1.0);
        assert_eq!(risk_multiplier(Feature::WaktuMalam, 0.0), 1.0);
        assert_eq!(risk_multiplier(Feature::WaktuMalam, 1.0), 1.5);
    }

    #[test]
    fn test_personalized_importance_scales_global() {
        let global: FeatureWeights = Feature::ALL.iter().map(|&f| (f, 1.0 / 19.0)).collect();
        let v = FeatureVector::example().with(Feature::DurasiPemakaian, 12.5);
        let personal = personalized_importance(&global, &v);

        assert_eq!(personal.len(), 19);
        assert!((personal[&Feature::DurasiPemakaian] - 2.5 / 19.0).abs() < 1e-12);
        assert!((personal[&Feature::EmailTime] - 1.0 / 19.0).abs() < 1e-12);

        let top = top_features(&personal, 5);
        assert_eq!(top.len(), 5);
        assert_eq!(top[0].0, Feature::DurasiPemakaian);
        assert!(top.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_risk_factors_for_example_vector() {
        let factors = risk_factors(&FeatureVector::example());
        assert_eq!(factors, vec!["Night-time device usage".to_string()]);
    }

    #[test]
    fn test_risk_factors_for_extreme_vector() {
        let v = FeatureVector::example()
            .with(Feature::DurasiPemakaian, 15.0)
            .with(Feature::BukaSosmed, 7.0)
            .with(Feature::ScrollTime, 5.0)
            .with(Feature::NotifikasiCount, 280.0)
            .with(Feature::DurasiTidur, 4.0)
            .with(Feature::DurasiOlahraga, 0.1);
        assert_eq!(
            risk_factors(&v),
            vec![
                "Excessive screen time (15.0h)",
                "Notification overload (280)",
                "Poor sleep pattern (4.0h)",
                "Insufficient physical activity",
                "High social media usage (7.0h)",
                "Excessive scrolling (5.0h)",
                "Night-time device usage",
            ]
        );
    }
}
