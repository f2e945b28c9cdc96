//! Core types for the Synheart Stress engine
//!
//! This module defines the data structures that flow between stages: feature vectors,
//! labeled corpora, stress levels, and prediction results.

use crate::error::StressError;
use crate::schema::{Feature, FEATURE_COUNT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;
use uuid::Uuid;

/// Per-feature weights keyed by feature (global or personalized importance)
pub type FeatureWeights = BTreeMap<Feature, f64>;

/// One person's 19 digital-behavior measurements
///
/// Serialized as a `name -> value` map. Deserialization is strict: every schema feature
/// must be present and no other names are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, f64>",
    into = "BTreeMap<String, f64>"
)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    /// Vector populated with every feature's example value
    pub fn example() -> Self {
        let mut values = [0.0; FEATURE_COUNT];
        for feature in Feature::ALL {
            values[feature.index()] = feature.spec().example;
        }
        Self { values }
    }

    /// Build from values in schema order; arity must match exactly
    pub fn from_slice(values: &[f64]) -> Result<Self, StressError> {
        if values.len() != FEATURE_COUNT {
            return Err(StressError::SchemaMismatch {
                expected: FEATURE_COUNT,
                got: values.len(),
            });
        }
        let mut out = [0.0; FEATURE_COUNT];
        out.copy_from_slice(values);
        Ok(Self { values: out })
    }

    /// Build from `(name, value)` pairs, requiring every schema feature exactly once
    pub fn from_named<I, K>(pairs: I) -> Result<Self, StressError>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let mut values = [f64::NAN; FEATURE_COUNT];
        let mut seen = [false; FEATURE_COUNT];
        let mut count = 0usize;

        for (name, value) in pairs {
            let name = name.as_ref();
            let feature = Feature::from_name(name)
                .ok_or_else(|| StressError::UnknownFeature(name.to_string()))?;
            if seen[feature.index()] {
                return Err(StressError::InvalidInput(format!(
                    "Feature supplied more than once: {name}"
                )));
            }
            seen[feature.index()] = true;
            values[feature.index()] = value;
            count += 1;
        }

        if count != FEATURE_COUNT {
            let missing = Feature::ALL
                .iter()
                .find(|f| !seen[f.index()])
                .map(|f| f.as_str().to_string())
                .unwrap_or_default();
            return Err(StressError::MissingFeature(missing));
        }

        Ok(Self { values })
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    pub fn set(&mut self, feature: Feature, value: f64) {
        self.values[feature.index()] = value;
    }

    /// Copy with one feature replaced
    pub fn with(mut self, feature: Feature, value: f64) -> Self {
        self.set(feature, value);
        self
    }

    /// Values in schema order
    pub fn as_array(&self) -> &[f64; FEATURE_COUNT] {
        &self.values
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.values.to_vec()
    }

    /// Copy with every field clamped to its schema range
    pub fn clamped(&self) -> Self {
        let mut values = self.values;
        for feature in Feature::ALL {
            values[feature.index()] = feature.clamp(values[feature.index()]);
        }
        Self { values }
    }

    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }

    /// `(feature, value)` pairs in schema order
    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        Feature::ALL.iter().map(move |&f| (f, self.values[f.index()]))
    }

    /// Whether a binary time-of-day flag is set; only an exact 1 counts
    pub fn flag(&self, feature: Feature) -> bool {
        self.get(feature) == 1.0
    }
}

impl Index<Feature> for FeatureVector {
    type Output = f64;

    fn index(&self, feature: Feature) -> &f64 {
        &self.values[feature.index()]
    }
}

impl TryFrom<BTreeMap<String, f64>> for FeatureVector {
    type Error = StressError;

    fn try_from(map: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        FeatureVector::from_named(map)
    }
}

impl From<FeatureVector> for BTreeMap<String, f64> {
    fn from(vector: FeatureVector) -> Self {
        vector
            .iter()
            .map(|(f, v)| (f.as_str().to_string(), v))
            .collect()
    }
}

/// Ordinal stress class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StressLevel {
    #[serde(rename = "Rendah")]
    Low,
    #[serde(rename = "Sedang")]
    Medium,
    #[serde(rename = "Tinggi")]
    High,
}

/// Number of stress classes
pub const CLASS_COUNT: usize = 3;

impl StressLevel {
    pub const ALL: [StressLevel; CLASS_COUNT] =
        [StressLevel::Low, StressLevel::Medium, StressLevel::High];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<StressLevel> {
        StressLevel::ALL.get(index).copied()
    }

    /// Class label as published to the surrounding service
    pub fn label(self) -> &'static str {
        match self {
            StressLevel::Low => "Rendah",
            StressLevel::Medium => "Sedang",
            StressLevel::High => "Tinggi",
        }
    }

    pub fn english(self) -> &'static str {
        match self {
            StressLevel::Low => "Low",
            StressLevel::Medium => "Medium",
            StressLevel::High => "High",
        }
    }

    pub fn labels() -> Vec<String> {
        StressLevel::ALL.iter().map(|l| l.label().to_string()).collect()
    }
}

impl fmt::Display for StressLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Class probability triple
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    #[serde(rename = "Rendah")]
    pub low: f64,
    #[serde(rename = "Sedang")]
    pub medium: f64,
    #[serde(rename = "Tinggi")]
    pub high: f64,
}

impl ClassProbabilities {
    pub fn new(low: f64, medium: f64, high: f64) -> Self {
        Self { low, medium, high }
    }

    /// Build from raw per-class scores, renormalizing to sum to 1
    pub fn from_scores(scores: &[f64]) -> Option<Self> {
        if scores.len() != CLASS_COUNT || scores.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return None;
        }
        let total: f64 = scores.iter().sum();
        if total <= 0.0 {
            return None;
        }
        Some(Self::new(scores[0] / total, scores[1] / total, scores[2] / total))
    }

    pub fn as_array(&self) -> [f64; CLASS_COUNT] {
        [self.low, self.medium, self.high]
    }

    pub fn get(&self, level: StressLevel) -> f64 {
        self.as_array()[level.index()]
    }

    /// Most probable class; ties resolve to the lower class
    pub fn argmax(&self) -> StressLevel {
        let probs = self.as_array();
        let mut best = 0;
        for i in 1..CLASS_COUNT {
            if probs[i] > probs[best] {
                best = i;
            }
        }
        StressLevel::ALL[best]
    }

    pub fn max(&self) -> f64 {
        self.get(self.argmax())
    }

    pub fn sum(&self) -> f64 {
        self.low + self.medium + self.high
    }
}

/// Output of one inference call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Class index (0 = Rendah, 1 = Sedang, 2 = Tinggi)
    pub predicted_class: usize,
    pub predicted_label: StressLevel,
    pub probabilities: ClassProbabilities,
    /// Maximum of `probabilities`
    pub confidence: f64,
    pub global_importance: FeatureWeights,
    pub personalized_importance: FeatureWeights,
    /// Top features by personalized importance, descending
    pub top_features: Vec<(Feature, f64)>,
    pub risk_factors: Vec<String>,
    /// Whether this result came from the degraded fallback path
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<Uuid>,
}

/// One labeled synthetic sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    pub features: FeatureVector,
    pub label: StressLevel,
}

/// Labeled corpus, immutable once built
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingCorpus {
    samples: Vec<LabeledSample>,
    seed: Option<u64>,
}

impl TrainingCorpus {
    pub fn new(samples: Vec<LabeledSample>, seed: Option<u64>) -> Self {
        Self { samples, seed }
    }

    pub fn samples(&self) -> &[LabeledSample] {
        &self.samples
    }

    /// Seed the corpus was generated from, if synthetic
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Row-major feature matrix in schema order
    pub fn feature_matrix(&self) -> Vec<Vec<f64>> {
        self.samples.iter().map(|s| s.features.to_vec()).collect()
    }

    /// Class indices
    pub fn label_indices(&self) -> Vec<usize> {
        self.samples.iter().map(|s| s.label.index()).collect()
    }

    /// Sample count per class
    pub fn class_distribution(&self) -> [usize; CLASS_COUNT] {
        let mut counts = [0usize; CLASS_COUNT];
        for sample in &self.samples {
            counts[sample.label.index()] += 1;
        }
        counts
    }
}

/// Request record as produced by the surrounding service
///
/// Carries `screen_time_total` for compatibility; it is not a model feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub screen_time_total: f64,
    pub durasi_pemakaian: f64,
    pub frekuensi_penggunaan: f64,
    pub jumlah_aplikasi: u32,
    pub notifikasi_count: u32,
    pub durasi_tidur: f64,
    pub durasi_makan: f64,
    pub durasi_olahraga: f64,
    pub main_game: f64,
    pub belajar_online: f64,
    pub buka_sosmed: f64,
    pub streaming: f64,
    pub scroll_time: f64,
    pub email_time: f64,
    pub panggilan_time: f64,
    #[serde(default)]
    pub waktu_pagi: u8,
    #[serde(default)]
    pub waktu_siang: u8,
    #[serde(default)]
    pub waktu_sore: u8,
    #[serde(default)]
    pub waktu_malam: u8,
    pub jumlah_aktivitas: u32,
}

impl ActivityRecord {
    /// Documentation example record
    pub fn example() -> Self {
        let v = FeatureVector::example();
        let mut record = Self::from_vector(&v);
        record.screen_time_total = 8.5;
        record
    }

    /// Lift a feature vector into a record, estimating screen_time_total from usage
    pub fn from_vector(v: &FeatureVector) -> Self {
        Self {
            screen_time_total: v[Feature::DurasiPemakaian],
            durasi_pemakaian: v[Feature::DurasiPemakaian],
            frekuensi_penggunaan: v[Feature::FrekuensiPenggunaan],
            jumlah_aplikasi: v[Feature::JumlahAplikasi].max(0.0).round() as u32,
            notifikasi_count: v[Feature::NotifikasiCount].max(0.0).round() as u32,
            durasi_tidur: v[Feature::DurasiTidur],
            durasi_makan: v[Feature::DurasiMakan],
            durasi_olahraga: v[Feature::DurasiOlahraga],
            main_game: v[Feature::MainGame],
            belajar_online: v[Feature::BelajarOnline],
            buka_sosmed: v[Feature::BukaSosmed],
            streaming: v[Feature::Streaming],
            scroll_time: v[Feature::ScrollTime],
            email_time: v[Feature::EmailTime],
            panggilan_time: v[Feature::PanggilanTime],
            waktu_pagi: u8::from(v.flag(Feature::WaktuPagi)),
            waktu_siang: u8::from(v.flag(Feature::WaktuSiang)),
            waktu_sore: u8::from(v.flag(Feature::WaktuSore)),
            waktu_malam: u8::from(v.flag(Feature::WaktuMalam)),
            jumlah_aktivitas: v[Feature::JumlahAktivitas].max(0.0).round() as u32,
        }
    }

    /// Accept the legacy positional array: 19 model features, or 20 values with
    /// `screen_time_total` first
    pub fn from_legacy(values: &[f64]) -> Result<Self, StressError> {
        match values.len() {
            n if n == FEATURE_COUNT => Ok(Self::from_vector(&FeatureVector::from_slice(values)?)),
            n if n == FEATURE_COUNT + 1 => {
                let mut record = Self::from_vector(&FeatureVector::from_slice(&values[1..])?);
                record.screen_time_total = values[0];
                Ok(record)
            }
            n => Err(StressError::SchemaMismatch {
                expected: FEATURE_COUNT,
                got: n,
            }),
        }
    }

    /// Structural validation performed by the request layer
    pub fn validate(&self) -> Result<(), StressError> {
        let hours = [
            ("screen_time_total", self.screen_time_total, 24.0),
            ("durasi_pemakaian", self.durasi_pemakaian, 24.0),
            ("durasi_tidur", self.durasi_tidur, 24.0),
            ("durasi_makan", self.durasi_makan, 5.0),
            ("durasi_olahraga", self.durasi_olahraga, 10.0),
            ("main_game", self.main_game, 24.0),
            ("belajar_online", self.belajar_online, 24.0),
            ("buka_sosmed", self.buka_sosmed, 24.0),
            ("streaming", self.streaming, 24.0),
            ("scroll_time", self.scroll_time, 24.0),
            ("email_time", self.email_time, 24.0),
            ("panggilan_time", self.panggilan_time, 24.0),
        ];
        for (name, value, max) in hours {
            if !value.is_finite() || value < 0.0 || value > max {
                return Err(StressError::InvalidInput(format!(
                    "{name} must be between 0 and {max}, got {value}"
                )));
            }
        }

        if self.frekuensi_penggunaan < 0.0 || !self.frekuensi_penggunaan.is_finite() {
            return Err(StressError::InvalidInput(
                "frekuensi_penggunaan must be non-negative".to_string(),
            ));
        }

        for (name, flag) in [
            ("waktu_pagi", self.waktu_pagi),
            ("waktu_siang", self.waktu_siang),
            ("waktu_sore", self.waktu_sore),
            ("waktu_malam", self.waktu_malam),
        ] {
            if flag > 1 {
                return Err(StressError::InvalidInput(format!(
                    "{name} must be 0 or 1, got {flag}"
                )));
            }
        }

        if self.screen_time_total > 16.0 {
            return Err(StressError::InvalidInput(
                "screen_time_total cannot exceed 16 hours per day".to_string(),
            ));
        }
        if self.durasi_tidur < 3.0 || self.durasi_tidur > 12.0 {
            return Err(StressError::InvalidInput(
                "durasi_tidur must be between 3 and 12 hours".to_string(),
            ));
        }
        if self.notifikasi_count > 500 {
            return Err(StressError::InvalidInput(
                "notifikasi_count is unrealistic (>500)".to_string(),
            ));
        }
        for (name, value) in [
            ("buka_sosmed", self.buka_sosmed),
            ("streaming", self.streaming),
            ("scroll_time", self.scroll_time),
            ("main_game", self.main_game),
        ] {
            if value > 12.0 {
                return Err(StressError::InvalidInput(format!(
                    "{name} cannot exceed 12 hours"
                )));
            }
        }
        if self.durasi_olahraga > 6.0 {
            return Err(StressError::InvalidInput(
                "durasi_olahraga cannot exceed 6 hours per day".to_string(),
            ));
        }
        if self.jumlah_aplikasi > 100 {
            return Err(StressError::InvalidInput(
                "jumlah_aplikasi must be at most 100".to_string(),
            ));
        }
        if self.jumlah_aktivitas < 1 || self.jumlah_aktivitas > 20 {
            return Err(StressError::InvalidInput(
                "jumlah_aktivitas must be between 1 and 20".to_string(),
            ));
        }

        Ok(())
    }

    /// Model features addressed by name (screen_time_total is dropped)
    pub fn to_feature_vector(&self) -> FeatureVector {
        let pairs = [
            (Feature::DurasiPemakaian, self.durasi_pemakaian),
            (Feature::FrekuensiPenggunaan, self.frekuensi_penggunaan),
            (Feature::JumlahAplikasi, f64::from(self.jumlah_aplikasi)),
            (Feature::NotifikasiCount, f64::from(self.notifikasi_count)),
            (Feature::DurasiTidur, self.durasi_tidur),
            (Feature::DurasiMakan, self.durasi_makan),
            (Feature::DurasiOlahraga, self.durasi_olahraga),
            (Feature::MainGame, self.main_game),
            (Feature::BelajarOnline, self.belajar_online),
            (Feature::BukaSosmed, self.buka_sosmed),
            (Feature::Streaming, self.streaming),
            (Feature::ScrollTime, self.scroll_time),
            (Feature::EmailTime, self.email_time),
            (Feature::PanggilanTime, self.panggilan_time),
            (Feature::WaktuPagi, f64::from(self.waktu_pagi)),
            (Feature::WaktuSiang, f64::from(self.waktu_siang)),
            (Feature::WaktuSore, f64::from(self.waktu_sore)),
            (Feature::WaktuMalam, f64::from(self.waktu_malam)),
            (Feature::JumlahAktivitas, f64::from(self.jumlah_aktivitas)),
        ];
        let mut vector = FeatureVector::example();
        for (feature, value) in pairs {
            vector.set(feature, value);
        }
        vector
    }

    /// Total time spent in specific digital activities (hours)
    pub fn total_digital_time(&self) -> f64 {
        self.main_game
            + self.belajar_online
            + self.buka_sosmed
            + self.streaming
            + self.scroll_time
            + self.email_time
            + self.panggilan_time
    }
}
