//! Interpretive layers on top of a prediction
//!
//! Wellness indicators, a rule-based risk assessment with clinical notes, lifestyle
//! recommendations, and a ranked reading of the model's global importances. None of
//! these feed back into the classifier.

use crate::schema::Feature;
use crate::types::{FeatureVector, FeatureWeights, StressLevel};
use serde::{Deserialize, Serialize};

/// Three-level qualitative rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Low,
    Moderate,
    High,
}

impl RiskBand {
    fn from_thresholds(value: f64, high: f64, moderate: f64) -> RiskBand {
        if value > high {
            RiskBand::High
        } else if value > moderate {
            RiskBand::Moderate
        } else {
            RiskBand::Low
        }
    }
}

/// Digital wellness snapshot of one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellnessIndicators {
    /// Sleep within 7-9 hours
    pub sleep_optimal: bool,
    pub screen_time_risk: RiskBand,
    pub social_media_risk: RiskBand,
    pub notification_burden: RiskBand,
    /// At least 30 minutes of exercise
    pub physical_activity_sufficient: bool,
    pub night_usage: bool,
}

impl WellnessIndicators {
    pub fn from_vector(v: &FeatureVector) -> Self {
        let sleep = v[Feature::DurasiTidur];
        Self {
            sleep_optimal: (7.0..=9.0).contains(&sleep),
            screen_time_risk: RiskBand::from_thresholds(v[Feature::DurasiPemakaian], 8.0, 4.0),
            social_media_risk: RiskBand::from_thresholds(v[Feature::BukaSosmed], 3.0, 1.5),
            notification_burden: RiskBand::from_thresholds(v[Feature::NotifikasiCount], 80.0, 40.0),
            physical_activity_sufficient: v[Feature::DurasiOlahraga] >= 0.5,
            night_usage: v.flag(Feature::WaktuMalam),
        }
    }
}

/// Overall rule-based risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallRisk {
    Low,
    Normal,
    Moderate,
    High,
}

/// How urgently recommendations should be acted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationPriority {
    Immediate,
    Moderate,
    Maintenance,
}

/// Additive rule assessment independent of the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub overall_risk: OverallRisk,
    pub risk_score: i32,
    pub risk_factors: Vec<String>,
    pub protective_factors: Vec<String>,
    pub priority: RecommendationPriority,
}

impl RiskAssessment {
    pub fn assess(v: &FeatureVector) -> Self {
        let mut risk_factors = Vec::new();
        let mut protective_factors = Vec::new();
        let mut score = 0i32;

        let screen = v[Feature::DurasiPemakaian];
        if screen > 10.0 {
            risk_factors.push(format!("Excessive screen time ({screen:.1}h)"));
            score += 3;
        } else if screen > 6.0 {
            risk_factors.push(format!("High screen time ({screen:.1}h)"));
            score += 1;
        }

        let social = v[Feature::BukaSosmed];
        if social > 3.0 {
            risk_factors.push(format!("Heavy social media use ({social:.1}h)"));
            score += 2;
        }

        let sleep = v[Feature::DurasiTidur];
        if sleep < 6.0 {
            risk_factors.push(format!("Sleep deprivation ({sleep:.1}h)"));
            score += 3;
        } else if (7.0..=9.0).contains(&sleep) {
            protective_factors.push(format!("Adequate sleep ({sleep:.1}h)"));
            score -= 1;
        }

        let exercise = v[Feature::DurasiOlahraga];
        if exercise >= 0.5 {
            protective_factors.push(format!("Regular exercise ({exercise:.1}h)"));
            score -= 1;
        } else {
            risk_factors.push("Insufficient physical activity".to_string());
            score += 1;
        }

        if v.flag(Feature::WaktuMalam) {
            risk_factors.push("Night-time device usage".to_string());
            score += 2;
        }

        let notifications = v[Feature::NotifikasiCount];
        if notifications > 100.0 {
            risk_factors.push(format!("Notification overload ({})", notifications.trunc() as i64));
            score += 2;
        }

        let overall_risk = match score {
            s if s >= 6 => OverallRisk::High,
            s if s >= 3 => OverallRisk::Moderate,
            s if s <= -1 => OverallRisk::Low,
            _ => OverallRisk::Normal,
        };
        let priority = match overall_risk {
            OverallRisk::High => RecommendationPriority::Immediate,
            OverallRisk::Moderate => RecommendationPriority::Moderate,
            _ => RecommendationPriority::Maintenance,
        };

        Self {
            overall_risk,
            risk_score: score,
            risk_factors,
            protective_factors,
            priority,
        }
    }
}

/// Notes for a reviewing clinician: a level summary followed by specific observations
pub fn clinical_notes(level: StressLevel, v: &FeatureVector) -> Vec<String> {
    let mut notes: Vec<String> = match level {
        StressLevel::High => vec![
            "HIGH STRESS ALERT: Immediate intervention recommended".to_string(),
            "Consider referral to a mental health professional if symptoms persist".to_string(),
        ],
        StressLevel::Medium => vec![
            "MODERATE STRESS: Preventive measures should be implemented".to_string(),
            "Monitor for progression to high stress levels".to_string(),
        ],
        StressLevel::Low => vec![
            "LOW STRESS: Current patterns appear sustainable".to_string(),
            "Maintain current healthy digital habits".to_string(),
        ],
    };

    let screen = v[Feature::DurasiPemakaian];
    if screen > 8.0 {
        notes.push(format!("Digital overexposure: {screen:.1}h exceeds healthy limits"));
    }
    let sleep = v[Feature::DurasiTidur];
    if sleep < 6.0 {
        notes.push(format!("Sleep deficit: {sleep:.1}h insufficient for stress recovery"));
    }
    let social = v[Feature::BukaSosmed];
    if social > 2.0 {
        notes.push(format!("Social media risk: {social:.1}h may contribute to comparison stress"));
    }
    if v.flag(Feature::WaktuMalam) {
        notes.push("Circadian disruption: night usage affects sleep quality".to_string());
    }
    if v[Feature::DurasiOlahraga] < 0.5 {
        notes.push("Activity deficit: increase physical activity for stress relief".to_string());
    }

    notes
}

/// Lifestyle recommendations for a predicted level.
///
/// For High stress, the three most important personalized features add targeted advice.
pub fn recommendations(
    level: StressLevel,
    top_features: &[(Feature, f64)],
    v: &FeatureVector,
) -> Vec<String> {
    let mut out: Vec<String> = match level {
        StressLevel::High => vec![
            "Take a complete break from digital devices as soon as possible",
            "Practice deep breathing or meditation for 10-15 minutes",
            "Drastically reduce screen and social media exposure",
            "Do light physical activity such as walking",
            "Make sure to get at least 7-8 hours of quality sleep",
        ],
        StressLevel::Medium => vec![
            "Pay attention to your digital usage patterns",
            "Schedule regular breaks away from screens",
            "Focus on one digital activity at a time",
            "Increase physical activity to balance screen time",
        ],
        StressLevel::Low => vec![
            "Your digital usage patterns are fairly healthy",
            "Keep maintaining your digital wellness balance",
            "Keep monitoring your digital activity",
        ],
    }
    .into_iter()
    .map(String::from)
    .collect();

    if level == StressLevel::High {
        for (feature, _) in top_features.iter().take(3) {
            match feature {
                Feature::BukaSosmed if v[Feature::BukaSosmed] > 3.0 => {
                    out.push("Limit social media to at most 1 hour per day".to_string())
                }
                Feature::WaktuMalam if v.flag(Feature::WaktuMalam) => {
                    out.push("Avoid using devices for 2 hours before bed".to_string())
                }
                Feature::NotifikasiCount if v[Feature::NotifikasiCount] > 50.0 => {
                    out.push("Turn off non-essential notifications".to_string())
                }
                _ => {}
            }
        }
    }

    out
}

/// Tier of a global importance weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportanceTier {
    Critical,
    Important,
    Supporting,
}

impl ImportanceTier {
    pub fn classify(importance: f64) -> ImportanceTier {
        if importance > 0.15 {
            ImportanceTier::Critical
        } else if importance > 0.08 {
            ImportanceTier::Important
        } else {
            ImportanceTier::Supporting
        }
    }

    fn describe(self) -> &'static str {
        match self {
            ImportanceTier::Critical => "CRITICAL FACTOR - high predictive power",
            ImportanceTier::Important => "Important factor - moderate influence",
            ImportanceTier::Supporting => "Supporting factor - low influence",
        }
    }
}

/// One ranked feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedFeature {
    pub rank: usize,
    pub feature: Feature,
    pub importance: f64,
    pub percentage: f64,
    pub cumulative_percentage: f64,
    pub tier: ImportanceTier,
    pub interpretation: String,
}

/// What the model attends to overall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFocus {
    DigitalWellness,
    LifestyleBalance,
}

/// Ranked reading of global feature importances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceAnalysis {
    pub features: Vec<RankedFeature>,
    pub most_important: Option<Feature>,
    pub top3_cumulative_percentage: f64,
    pub focus: ModelFocus,
}

impl ImportanceAnalysis {
    pub fn from_weights(global: &FeatureWeights) -> Self {
        let mut sorted: Vec<(Feature, f64)> = global.iter().map(|(f, w)| (*f, *w)).collect();
        sorted.sort_by(|a, b| b.1.total_cmp(&a.1));

        let total: f64 = sorted.iter().map(|(_, w)| w).sum();
        let pct = |w: f64| if total > 0.0 { w / total * 100.0 } else { 0.0 };

        let mut cumulative = 0.0;
        let features = sorted
            .iter()
            .enumerate()
            .map(|(i, &(feature, importance))| {
                cumulative += importance;
                let tier = ImportanceTier::classify(importance);
                RankedFeature {
                    rank: i + 1,
                    feature,
                    importance,
                    percentage: pct(importance),
                    cumulative_percentage: pct(cumulative),
                    tier,
                    interpretation: format!("{} ({})", feature.interpretation(), tier.describe()),
                }
            })
            .collect();

        let top3 = &sorted[..sorted.len().min(3)];
        let focus = if top3
            .iter()
            .any(|(f, _)| matches!(f, Feature::BukaSosmed | Feature::DurasiPemakaian))
        {
            ModelFocus::DigitalWellness
        } else {
            ModelFocus::LifestyleBalance
        };

        Self {
            features,
            most_important: sorted.first().map(|(f, _)| *f),
            top3_cumulative_percentage: pct(top3.iter().map(|(_, w)| w).sum()),
            focus,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stressed() -> FeatureVector {
        FeatureVector::example()
            .with(Feature::DurasiPemakaian, 11.0)
            .with(Feature::BukaSosmed, 4.0)
            .with(Feature::DurasiTidur, 5.0)
            .with(Feature::DurasiOlahraga, 0.2)
            .with(Feature::NotifikasiCount, 150.0)
    }

    #[test]
    fn test_wellness_indicators() {
        let w = WellnessIndicators::from_vector(&FeatureVector::example());
        assert!(w.sleep_optimal);
        assert_eq!(w.screen_time_risk, RiskBand::Moderate);
        assert_eq!(w.social_media_risk, RiskBand::Moderate);
        assert_eq!(w.notification_burden, RiskBand::Moderate);
        assert!(w.physical_activity_sufficient);
        assert!(w.night_usage);

        let w = WellnessIndicators::from_vector(&stressed());
        assert!(!w.sleep_optimal);
        assert_eq!(w.screen_time_risk, RiskBand::High);
        assert_eq!(w.notification_burden, RiskBand::High);
        assert!(!w.physical_activity_sufficient);
    }

    #[test]
    fn test_risk_assessment_example_is_normal() {
        // screen +1, sleep -1, exercise -1, night +2
        let a = RiskAssessment::assess(&FeatureVector::example());
        assert_eq!(a.risk_score, 1);
        assert_eq!(a.overall_risk, OverallRisk::Normal);
        assert_eq!(a.priority, RecommendationPriority::Maintenance);
        assert_eq!(a.protective_factors.len(), 2);
    }

    #[test]
    fn test_risk_assessment_high() {
        // screen +3, social +2, sleep +3, exercise +1, night +2, notifications +2
        let a = RiskAssessment::assess(&stressed());
        assert_eq!(a.risk_score, 13);
        assert_eq!(a.overall_risk, OverallRisk::High);
        assert_eq!(a.priority, RecommendationPriority::Immediate);
        assert!(a.protective_factors.is_empty());
    }

    #[test]
    fn test_risk_assessment_low() {
        let calm = FeatureVector::example()
            .with(Feature::DurasiPemakaian, 3.0)
            .with(Feature::WaktuMalam, 0.0);
        let a = RiskAssessment::assess(&calm);
        assert_eq!(a.risk_score, -2);
        assert_eq!(a.overall_risk, OverallRisk::Low);
    }

    #[test]
    fn test_clinical_notes() {
        let notes = clinical_notes(StressLevel::High, &stressed());
        assert!(notes[0].starts_with("HIGH STRESS ALERT"));
        assert!(notes.iter().any(|n| n.starts_with("Digital overexposure: 11.0h")));
        assert!(notes.iter().any(|n| n.starts_with("Sleep deficit")));
        assert!(notes.iter().any(|n| n.starts_with("Activity deficit")));

        let notes = clinical_notes(StressLevel::Low, &FeatureVector::example());
        assert!(notes[0].starts_with("LOW STRESS"));
    }

    #[test]
    fn test_recommendation_counts() {
        let v = FeatureVector::example();
        assert_eq!(recommendations(StressLevel::Low, &[], &v).len(), 3);
        assert_eq!(recommendations(StressLevel::Medium, &[], &v).len(), 4);
        assert_eq!(recommendations(StressLevel::High, &[], &v).len(), 5);
    }

    #[test]
    fn test_high_recommendations_use_top_features() {
        let v = stressed();
        let top = vec![
            (Feature::BukaSosmed, 0.3),
            (Feature::WaktuMalam, 0.2),
            (Feature::NotifikasiCount, 0.1),
            (Feature::DurasiTidur, 0.05),
        ];
        let recs = recommendations(StressLevel::High, &top, &v);
        assert_eq!(recs.len(), 8);
        assert_eq!(recs[5], "Limit social media to at most 1 hour per day");

        // Targeted advice is only added for High
        assert_eq!(recommendations(StressLevel::Medium, &top, &v).len(), 4);
    }

    #[test]
    fn test_importance_analysis() {
        let mut weights: FeatureWeights = Feature::ALL.iter().map(|&f| (f, 0.02)).collect();
        weights.insert(Feature::DurasiTidur, 0.3);
        weights.insert(Feature::DurasiOlahraga, 0.1);
        let analysis = ImportanceAnalysis::from_weights(&weights);

        assert_eq!(analysis.features.len(), 19);
        assert_eq!(analysis.most_important, Some(Feature::DurasiTidur));
        assert_eq!(analysis.features[0].tier, ImportanceTier::Critical);
        assert_eq!(analysis.features[1].tier, ImportanceTier::Important);
        assert_eq!(analysis.features[2].tier, ImportanceTier::Supporting);
        assert!((analysis.features[18].cumulative_percentage - 100.0).abs() < 1e-9);
        // Ties keep schema order, so the third entry is durasi_pemakaian
        assert_eq!(analysis.features[2].feature, Feature::DurasiPemakaian);
        assert_eq!(analysis.focus, ModelFocus::DigitalWellness);
        assert!(analysis.features[0].interpretation.contains("CRITICAL"));
    }
}
