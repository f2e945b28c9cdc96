//! Synthetic corpus generation
//!
//! Samples feature vectors whose marginals approximate published digital-behavior
//! statistics. Each feature is drawn from its own distribution family, snapped to the
//! resolution a device records it at (quarter hours, whole counts) and clamped to the schema
//! range.

use crate::error::StressError;
use crate::schema::{Feature, FEATURE_COUNT};
use crate::types::FeatureVector;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Bernoulli, Distribution, Exp, Gamma, LogNormal, Normal, Pareto, Poisson};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Distribution family used for one feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum SamplingDistribution {
    /// Heavy right tail (parameters of the underlying normal)
    LogNormal { mu: f64, sigma: f64 },
    /// Right-skewed durations
    Gamma { shape: f64, scale: f64 },
    /// Bursty counts: number of failures before `successes` successes
    NegativeBinomial { successes: f64, p: f64 },
    /// Poisson base count plus a Poisson boost for a heavy-user sub-population
    HeavyUserPoisson {
        base_rate: f64,
        heavy_probability: f64,
        boost_rate: f64,
    },
    /// Independent 0/1 flag
    Bernoulli { p: f64 },
    Normal { mean: f64, std_dev: f64 },
    Exponential { mean: f64 },
    /// Shifted Pareto (Lomax): `(Pareto(1, shape) - 1) * scale + offset`
    Lomax { shape: f64, scale: f64, offset: f64 },
    /// Casual users ~ Exp(casual_mean), heavy users ~ Gamma(heavy_shape, heavy_scale)
    CasualHeavyMixture {
        heavy_probability: f64,
        heavy_shape: f64,
        heavy_scale: f64,
        casual_mean: f64,
    },
}

impl SamplingDistribution {
    /// Calibrated default for a feature
    pub fn for_feature(feature: Feature) -> SamplingDistribution {
        use SamplingDistribution::*;
        match feature {
            Feature::DurasiPemakaian => LogNormal { mu: 1.8, sigma: 0.8 },
            Feature::BukaSosmed => Gamma { shape: 2.5, scale: 1.2 },
            Feature::ScrollTime => Gamma { shape: 2.0, scale: 1.0 },
            Feature::NotifikasiCount => NegativeBinomial {
                successes: 15.0,
                p: 0.2,
            },
            Feature::JumlahAplikasi | Feature::JumlahAktivitas => HeavyUserPoisson {
                base_rate: 6.0,
                heavy_probability: 0.3,
                boost_rate: 8.0,
            },
            Feature::WaktuPagi => Bernoulli { p: 0.65 },
            Feature::WaktuSiang => Bernoulli { p: 0.85 },
            Feature::WaktuSore => Bernoulli { p: 0.90 },
            Feature::WaktuMalam => Bernoulli { p: 0.45 },
            Feature::DurasiTidur => Normal {
                mean: 7.1,
                std_dev: 1.3,
            },
            Feature::DurasiOlahraga => Exponential { mean: 0.6 },
            Feature::DurasiMakan => Gamma { shape: 5.0, scale: 0.5 },
            Feature::FrekuensiPenggunaan => Lomax {
                shape: 1.5,
                scale: 20.0,
                offset: 10.0,
            },
            Feature::MainGame | Feature::Streaming => CasualHeavyMixture {
                heavy_probability: 0.25,
                heavy_shape: 3.0,
                heavy_scale: 1.5,
                casual_mean: 0.8,
            },
            Feature::BelajarOnline | Feature::EmailTime => Gamma { shape: 2.0, scale: 1.0 },
            Feature::PanggilanTime => Gamma { shape: 1.5, scale: 0.8 },
        }
    }

    fn build(&self, feature: Feature) -> Result<Sampler, StressError> {
        let err = |e: &dyn Debug| {
            StressError::Sampling(format!("{feature}: invalid distribution parameters ({e:?})"))
        };
        let sampler = match *self {
            SamplingDistribution::LogNormal { mu, sigma } => {
                Sampler::LogNormal(LogNormal::new(mu, sigma).map_err(|e| err(&e))?)
            }
            SamplingDistribution::Gamma { shape, scale } => {
                Sampler::Gamma(Gamma::new(shape, scale).map_err(|e| err(&e))?)
            }
            SamplingDistribution::NegativeBinomial { successes, p } => {
                if !(p > 0.0 && p < 1.0) {
                    return Err(err(&format!("p = {p}")));
                }
                // Gamma-Poisson mixture
                let mixing = Gamma::new(successes, (1.0 - p) / p).map_err(|e| err(&e))?;
                Sampler::NegativeBinomial(mixing)
            }
            SamplingDistribution::HeavyUserPoisson {
                base_rate,
                heavy_probability,
                boost_rate,
            } => Sampler::HeavyUserPoisson {
                base: Poisson::new(base_rate).map_err(|e| err(&e))?,
                heavy: Bernoulli::new(heavy_probability).map_err(|e| err(&e))?,
                boost: Poisson::new(boost_rate).map_err(|e| err(&e))?,
            },
            SamplingDistribution::Bernoulli { p } => {
                Sampler::Bernoulli(Bernoulli::new(p).map_err(|e| err(&e))?)
            }
            SamplingDistribution::Normal { mean, std_dev } => {
                // rand_distr accepts a negative std_dev and mirrors the distribution
                if !(std_dev > 0.0 && std_dev.is_finite()) {
                    return Err(err(&format!("std_dev = {std_dev}")));
                }
                Sampler::Normal(Normal::new(mean, std_dev).map_err(|e| err(&e))?)
            }
            SamplingDistribution::Exponential { mean } => {
                if !(mean > 0.0) {
                    return Err(err(&format!("mean = {mean}")));
                }
                Sampler::Exponential(Exp::new(1.0 / mean).map_err(|e| err(&e))?)
            }
            SamplingDistribution::Lomax {
                shape,
                scale,
                offset,
            } => Sampler::Lomax {
                pareto: Pareto::new(1.0, shape).map_err(|e| err(&e))?,
                scale,
                offset,
            },
            SamplingDistribution::CasualHeavyMixture {
                heavy_probability,
                heavy_shape,
                heavy_scale,
                casual_mean,
            } => {
                if !(casual_mean > 0.0) {
                    return Err(err(&format!("casual_mean = {casual_mean}")));
                }
                Sampler::Mixture {
                    heavy: Bernoulli::new(heavy_probability).map_err(|e| err(&e))?,
                    heavy_dist: Gamma::new(heavy_shape, heavy_scale).map_err(|e| err(&e))?,
                    casual: Exp::new(1.0 / casual_mean).map_err(|e| err(&e))?,
                }
            }
        };
        Ok(sampler)
    }
}

/// Ready-to-draw distribution
enum Sampler {
    LogNormal(LogNormal<f64>),
    Gamma(Gamma<f64>),
    NegativeBinomial(Gamma<f64>),
    HeavyUserPoisson {
        base: Poisson<f64>,
        heavy: Bernoulli,
        boost: Poisson<f64>,
    },
    Bernoulli(Bernoulli),
    Normal(Normal<f64>),
    Exponential(Exp<f64>),
    Lomax {
        pareto: Pareto<f64>,
        scale: f64,
        offset: f64,
    },
    Mixture {
        heavy: Bernoulli,
        heavy_dist: Gamma<f64>,
        casual: Exp<f64>,
    },
}

impl Sampler {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Sampler::LogNormal(d) => d.sample(rng),
            Sampler::Gamma(d) => d.sample(rng),
            Sampler::NegativeBinomial(mixing) => {
                let lambda = mixing.sample(rng);
                match Poisson::new(lambda) {
                    Ok(poisson) => poisson.sample(rng),
                    Err(_) => 0.0,
                }
            }
            Sampler::HeavyUserPoisson { base, heavy, boost } => {
                let count = base.sample(rng);
                let boosted = boost.sample(rng);
                if heavy.sample(rng) {
                    count + boosted
                } else {
                    count
                }
            }
            Sampler::Bernoulli(d) => {
                if d.sample(rng) {
                    1.0
                } else {
                    0.0
                }
            }
            Sampler::Normal(d) => d.sample(rng),
            Sampler::Exponential(d) => d.sample(rng),
            Sampler::Lomax {
                pareto,
                scale,
                offset,
            } => (pareto.sample(rng) - 1.0) * scale + offset,
            Sampler::Mixture {
                heavy,
                heavy_dist,
                casual,
            } => {
                let casual_value = casual.sample(rng);
                let heavy_value = heavy_dist.sample(rng);
                if heavy.sample(rng) {
                    heavy_value
                } else {
                    casual_value
                }
            }
        }
    }
}

/// Source of unlabeled feature vectors
///
/// A measured-data pipeline can implement this to replace the synthetic corpus without
/// touching training or inference.
pub trait CorpusGenerator: Send + Sync {
    fn generate_corpus(
        &self,
        n_samples: usize,
        rng: &mut StdRng,
    ) -> Result<Vec<FeatureVector>, StressError>;
}

/// Per-feature distribution table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticCorpusGenerator {
    distributions: Vec<SamplingDistribution>,
}

impl Default for SyntheticCorpusGenerator {
    fn default() -> Self {
        Self {
            distributions: Feature::ALL
                .iter()
                .map(|&f| SamplingDistribution::for_feature(f))
                .collect(),
        }
    }
}

impl SyntheticCorpusGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace one feature's distribution
    pub fn with_distribution(mut self, feature: Feature, distribution: SamplingDistribution) -> Self {
        self.distributions[feature.index()] = distribution;
        self
    }

    pub fn distribution(&self, feature: Feature) -> SamplingDistribution {
        self.distributions[feature.index()]
    }

    fn samplers(&self) -> Result<Vec<Sampler>, StressError> {
        if self.distributions.len() != FEATURE_COUNT {
            return Err(StressError::SchemaMismatch {
                expected: FEATURE_COUNT,
                got: self.distributions.len(),
            });
        }
        Feature::ALL
            .iter()
            .zip(self.distributions.iter())
            .map(|(&f, d)| d.build(f))
            .collect()
    }
}

impl CorpusGenerator for SyntheticCorpusGenerator {
    fn generate_corpus(
        &self,
        n_samples: usize,
        rng: &mut StdRng,
    ) -> Result<Vec<FeatureVector>, StressError> {
        let samplers = self.samplers()?;
        let mut vectors = Vec::with_capacity(n_samples);

        for _ in 0..n_samples {
            let mut vector = FeatureVector::example();
            for (&feature, sampler) in Feature::ALL.iter().zip(samplers.iter()) {
                vector.set(feature, feature.record(sampler.sample(rng)));
            }
            vectors.push(vector);
        }

        Ok(vectors)
    }
}

/// Resolve an optional seed; `None` derives one from the wall clock.
///
/// Returns the seed and whether it was time-derived.
pub fn resolve_seed(seed: Option<u64>) -> (u64, bool) {
    match seed {
        Some(seed) => (seed, false),
        None => {
            let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
            (nanos as u64, true)
        }
    }
}
