//! Feature schema
//!
//! The canonical, ordered list of the 19 digital-behavior features the classifier
//! consumes. Every other stage addresses features through [`Feature`], never by a bare
//! position, so the order below is defined exactly once.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of model features
pub const FEATURE_COUNT: usize = 19;

/// Semantic role of a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureRole {
    /// Duration in hours per day
    ContinuousHours,
    /// Events or apps per day
    Count,
    /// Binary flag for a time-of-day slot
    TimeOfDayFlag,
    /// Number of simultaneous digital activities
    MultitaskCount,
}

impl FeatureRole {
    /// Granularity a device logs this kind of value at: quarter hours for durations,
    /// whole units for everything else
    pub fn resolution(self) -> f64 {
        match self {
            FeatureRole::ContinuousHours => 0.25,
            FeatureRole::Count | FeatureRole::MultitaskCount | FeatureRole::TimeOfDayFlag => 1.0,
        }
    }
}

/// Model feature identifier
///
/// Variant order is load-bearing: it is the column order of every flattened matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    DurasiPemakaian,
    FrekuensiPenggunaan,
    JumlahAplikasi,
    NotifikasiCount,
    DurasiTidur,
    DurasiMakan,
    DurasiOlahraga,
    MainGame,
    BelajarOnline,
    BukaSosmed,
    Streaming,
    ScrollTime,
    EmailTime,
    PanggilanTime,
    WaktuPagi,
    WaktuSiang,
    WaktuSore,
    WaktuMalam,
    JumlahAktivitas,
}

/// Static description of one feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureSpec {
    pub feature: Feature,
    pub name: &'static str,
    pub role: FeatureRole,
    /// Inclusive lower bound of the valid range
    pub min: f64,
    /// Inclusive upper bound of the valid range
    pub max: f64,
    /// Example value used by request documentation and tests
    pub example: f64,
    /// Human-readable description
    pub description: &'static str,
}

const fn spec(
    feature: Feature,
    name: &'static str,
    role: FeatureRole,
    min: f64,
    max: f64,
    example: f64,
    description: &'static str,
) -> FeatureSpec {
    FeatureSpec {
        feature,
        name,
        role,
        min,
        max,
        example,
        description,
    }
}

use FeatureRole::{ContinuousHours, Count, MultitaskCount, TimeOfDayFlag};

static SPECS: [FeatureSpec; FEATURE_COUNT] = [
    spec(Feature::DurasiPemakaian, "durasi_pemakaian", ContinuousHours, 0.5, 16.0, 7.0, "Device usage duration (hours)"),
    spec(Feature::FrekuensiPenggunaan, "frekuensi_penggunaan", Count, 5.0, 200.0, 12.0, "Device pickups per day"),
    spec(Feature::JumlahAplikasi, "jumlah_aplikasi", MultitaskCount, 1.0, 25.0, 15.0, "Apps used per day"),
    spec(Feature::NotifikasiCount, "notifikasi_count", Count, 0.0, 300.0, 45.0, "Notifications received per day"),
    spec(Feature::DurasiTidur, "durasi_tidur", ContinuousHours, 4.0, 11.0, 7.0, "Sleep duration (hours)"),
    spec(Feature::DurasiMakan, "durasi_makan", ContinuousHours, 1.0, 5.0, 2.0, "Meal time (hours)"),
    spec(Feature::DurasiOlahraga, "durasi_olahraga", ContinuousHours, 0.0, 4.0, 1.0, "Exercise (hours)"),
    spec(Feature::MainGame, "main_game", ContinuousHours, 0.0, 8.0, 2.5, "Gaming (hours)"),
    spec(Feature::BelajarOnline, "belajar_online", ContinuousHours, 0.0, 8.0, 3.0, "Online learning (hours)"),
    spec(Feature::BukaSosmed, "buka_sosmed", ContinuousHours, 0.0, 8.0, 2.0, "Social media (hours)"),
    spec(Feature::Streaming, "streaming", ContinuousHours, 0.0, 8.0, 1.5, "Video streaming (hours)"),
    spec(Feature::ScrollTime, "scroll_time", ContinuousHours, 0.0, 6.0, 1.0, "Feed scrolling (hours)"),
    spec(Feature::EmailTime, "email_time", ContinuousHours, 0.0, 4.0, 0.5, "Email (hours)"),
    spec(Feature::PanggilanTime, "panggilan_time", ContinuousHours, 0.0, 4.0, 0.3, "Calls (hours)"),
    spec(Feature::WaktuPagi, "waktu_pagi", TimeOfDayFlag, 0.0, 1.0, 1.0, "Morning usage (0/1)"),
    spec(Feature::WaktuSiang, "waktu_siang", TimeOfDayFlag, 0.0, 1.0, 1.0, "Midday usage (0/1)"),
    spec(Feature::WaktuSore, "waktu_sore", TimeOfDayFlag, 0.0, 1.0, 1.0, "Evening usage (0/1)"),
    spec(Feature::WaktuMalam, "waktu_malam", TimeOfDayFlag, 0.0, 1.0, 1.0, "Night usage (0/1)"),
    spec(Feature::JumlahAktivitas, "jumlah_aktivitas", MultitaskCount, 1.0, 20.0, 8.0, "Simultaneous digital activities"),
];

impl Feature {
    /// All features in schema order
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::DurasiPemakaian,
        Feature::FrekuensiPenggunaan,
        Feature::JumlahAplikasi,
        Feature::NotifikasiCount,
        Feature::DurasiTidur,
        Feature::DurasiMakan,
        Feature::DurasiOlahraga,
        Feature::MainGame,
        Feature::BelajarOnline,
        Feature::BukaSosmed,
        Feature::Streaming,
        Feature::ScrollTime,
        Feature::EmailTime,
        Feature::PanggilanTime,
        Feature::WaktuPagi,
        Feature::WaktuSiang,
        Feature::WaktuSore,
        Feature::WaktuMalam,
        Feature::JumlahAktivitas,
    ];

    /// Column position in flattened matrices
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn spec(self) -> &'static FeatureSpec {
        &SPECS[self.index()]
    }

    pub fn as_str(self) -> &'static str {
        self.spec().name
    }

    pub fn role(self) -> FeatureRole {
        self.spec().role
    }

    /// Inclusive valid range `(min, max)`
    pub fn range(self) -> (f64, f64) {
        let spec = self.spec();
        (spec.min, spec.max)
    }

    /// Look up a feature by its canonical name
    pub fn from_name(name: &str) -> Option<Feature> {
        SPECS.iter().find(|s| s.name == name).map(|s| s.feature)
    }

    /// Clamp a value to this feature's valid range
    pub fn clamp(self, value: f64) -> f64 {
        let (min, max) = self.range();
        value.clamp(min, max)
    }

    /// Snap a raw measurement to the recording resolution, then clamp it
    pub fn record(self, value: f64) -> f64 {
        let step = self.role().resolution();
        self.clamp((value / step).round() * step)
    }

    /// Interpretation used when explaining global importances
    pub fn interpretation(self) -> &'static str {
        match self {
            Feature::DurasiPemakaian => "Total screen time - key indicator of digital overwhelm",
            Feature::BukaSosmed => "Social media usage - linked to anxiety and comparison stress",
            Feature::NotifikasiCount => "Notification frequency - causes constant interruption stress",
            Feature::DurasiTidur => "Sleep quality - fundamental for stress resilience",
            Feature::WaktuMalam => "Night-time usage - disrupts circadian rhythm and recovery",
            Feature::ScrollTime => "Mindless scrolling - indicates compulsive usage patterns",
            Feature::DurasiOlahraga => "Physical activity - natural stress reducer",
            Feature::JumlahAplikasi => "App multitasking - cognitive overload indicator",
            Feature::FrekuensiPenggunaan => "Usage frequency - shows addiction-like patterns",
            Feature::MainGame => "Gaming time - can be stress relief or source of frustration",
            _ => "Digital activity factor",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view over the feature table
pub struct FeatureSchema;

impl FeatureSchema {
    pub fn specs() -> &'static [FeatureSpec] {
        &SPECS
    }

    /// Feature names in schema order
    pub fn names() -> Vec<&'static str> {
        SPECS.iter().map(|s| s.name).collect()
    }

    /// Whether a list of names matches the schema exactly, in order
    pub fn matches(names: &[String]) -> bool {
        names.len() == FEATURE_COUNT && names.iter().zip(SPECS.iter()).all(|(n, s)| n == s.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specs_follow_enum_order() {
        for (i, spec) in SPECS.iter().enumerate() {
            assert_eq!(spec.feature.index(), i);
            assert_eq!(Feature::ALL[i], spec.feature);
        }
    }

    #[test]
    fn test_serde_name_matches_schema_name() {
        for feature in Feature::ALL {
            let json = serde_json::to_string(&feature).unwrap();
            assert_eq!(json, format!("\"{}\"", feature.as_str()));
        }
    }

    #[test]
    fn test_from_name_round_trip() {
        for feature in Feature::ALL {
            assert_eq!(Feature::from_name(feature.as_str()), Some(feature));
        }
        assert_eq!(Feature::from_name("screen_time_total"), None);
    }

    #[test]
    fn test_record_snaps_then_clamps() {
        assert_eq!(Feature::DurasiTidur.record(6.93), 7.0);
        assert_eq!(Feature::DurasiTidur.record(7.12), 7.0);
        assert_eq!(Feature::DurasiTidur.record(7.13), 7.25);
        assert_eq!(Feature::DurasiTidur.record(2.6), 4.0);
        assert_eq!(Feature::FrekuensiPenggunaan.record(47.4), 47.0);
        assert_eq!(Feature::FrekuensiPenggunaan.record(900.0), 200.0);
        assert_eq!(Feature::WaktuMalam.record(1.0), 1.0);
    }

    #[test]
    fn test_examples_within_range() {
        for spec in FeatureSchema::specs() {
            assert!(spec.min < spec.max, "{}", spec.name);
            assert!(spec.example >= spec.min && spec.example <= spec.max, "{}", spec.name);
        }
    }

    #[test]
    fn test_clamp() {
        assert_eq!(Feature::DurasiTidur.clamp(2.0), 4.0);
        assert_eq!(Feature::DurasiTidur.clamp(13.0), 11.0);
        assert_eq!(Feature::DurasiTidur.clamp(7.5), 7.5);
        assert_eq!(Feature::NotifikasiCount.clamp(999.0), 300.0);
    }

    #[test]
    fn test_time_flags_are_binary_range() {
        for f in [
            Feature::WaktuPagi,
            Feature::WaktuSiang,
            Feature::WaktuSore,
            Feature::WaktuMalam,
        ] {
            assert_eq!(f.role(), FeatureRole::TimeOfDayFlag);
            assert_eq!(f.range(), (0.0, 1.0));
        }
    }

    #[test]
    fn test_schema_matches() {
        let names: Vec<String> = FeatureSchema::names().iter().map(|s| s.to_string()).collect();
        assert!(FeatureSchema::matches(&names));

        let mut swapped = names.clone();
        swapped.swap(0, 1);
        assert!(!FeatureSchema::matches(&swapped));
        assert!(!FeatureSchema::matches(&names[..18]));
    }
}
