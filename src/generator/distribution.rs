//! Value Picker: draws values from a fixed list under a configured distribution.
//!
//! Non-uniform distributions precompute a cumulative distribution over the
//! value indices and sample it by binary search. Uniform sampling uses the
//! closed form of the same lookup.

use super::SqlValue;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const DEFAULT_ZIPF_S: f64 = 1.0;
pub const DEFAULT_NORMAL_MEAN: f64 = 0.5;
pub const DEFAULT_NORMAL_STDDEV: f64 = 0.15;

fn default_zipf_s() -> f64 {
    DEFAULT_ZIPF_S
}

fn default_mean() -> f64 {
    DEFAULT_NORMAL_MEAN
}

fn default_stddev() -> f64 {
    DEFAULT_NORMAL_STDDEV
}

/// How a column's values are spread over its candidate list
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Distribution {
    #[default]
    Uniform,
    /// Rank-based power law, weight `1 / (rank + 1)^s`
    Zipf {
        #[serde(default = "default_zipf_s")]
        s: f64,
    },
    /// Gaussian over the index range; both parameters are fractions of the list length
    Normal {
        #[serde(default = "default_mean")]
        mean: f64,
        #[serde(default = "default_stddev")]
        stddev: f64,
    },
    /// Explicit weight per value string, unlisted values weigh 1
    Weighted {
        #[serde(default)]
        weights: BTreeMap<String, f64>,
    },
}

/// Selects values from a shared list
#[derive(Debug, Clone)]
pub struct ValuePicker {
    values: Arc<Vec<SqlValue>>,
    /// Normalised cumulative weights; `None` means uniform
    cdf: Option<Vec<f64>>,
}

impl ValuePicker {
    pub fn uniform(values: Arc<Vec<SqlValue>>) -> Self {
        Self { values, cdf: None }
    }

    /// Build a picker; the rng is only used to permute Zipf ranks
    pub fn new<R: Rng + ?Sized>(
        values: Arc<Vec<SqlValue>>,
        distribution: &Distribution,
        rng: &mut R,
    ) -> Self {
        let n = values.len();
        if n < 2 {
            return Self::uniform(values);
        }

        let weights = match distribution {
            Distribution::Uniform => return Self::uniform(values),
            Distribution::Zipf { s } => zipf_weights(n, *s, rng),
            Distribution::Normal { mean, stddev } => normal_weights(n, *mean, *stddev),
            Distribution::Weighted { weights } => values
                .iter()
                .map(|v| weights.get(&v.key()).copied().unwrap_or(1.0).max(0.0))
                .collect(),
        };

        Self {
            cdf: build_cdf(&weights),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn pick_index<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let n = self.values.len();
        let r: f64 = rng.random();
        match &self.cdf {
            Some(cdf) => cdf.partition_point(|&c| c <= r).min(n - 1),
            None => ((r * n as f64) as usize).min(n - 1),
        }
    }

    /// Draw one value, NULL for an empty list
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> SqlValue {
        if self.values.is_empty() {
            return SqlValue::Null;
        }
        self.values[self.pick_index(rng)].clone()
    }
}

fn zipf_weights<R: Rng + ?Sized>(n: usize, s: f64, rng: &mut R) -> Vec<f64> {
    let s = if s <= 0.0 { DEFAULT_ZIPF_S } else { s };
    let mut ranks: Vec<usize> = (0..n).collect();
    ranks.shuffle(rng);

    let mut weights = vec![0.0; n];
    for (rank, &index) in ranks.iter().enumerate() {
        weights[index] = 1.0 / ((rank + 1) as f64).powf(s);
    }
    weights
}

/// Probability mass of each index under a normal distribution whose tails
/// are clamped onto the first and last index.
fn normal_weights(n: usize, mean: f64, stddev: f64) -> Vec<f64> {
    let stddev = if stddev <= 0.0 {
        DEFAULT_NORMAL_STDDEV
    } else {
        stddev
    };
    let mu = mean * n as f64;
    let sigma = stddev * n as f64;
    let phi = |x: f64| normal_cdf((x - mu) / sigma);

    (0..n)
        .map(|i| {
            let lower = if i == 0 { 0.0 } else { phi(i as f64) };
            let upper = if i == n - 1 { 1.0 } else { phi((i + 1) as f64) };
            (upper - lower).max(0.0)
        })
        .collect()
}

fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Abramowitz-Stegun 7.1.26
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + 0.327_591_1 * x);
    let poly = t
        * (0.254_829_592
            + t * (-0.284_496_736 + t * (1.421_413_741 + t * (-1.453_152_027 + t * 1.061_405_429))));
    sign * (1.0 - poly * (-x * x).exp())
}

/// `None` when all weights are zero, which falls back to uniform
fn build_cdf(weights: &[f64]) -> Option<Vec<f64>> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return None;
    }
    let mut acc = 0.0;
    let mut cdf: Vec<f64> = weights
        .iter()
        .map(|w| {
            acc += w;
            acc / total
        })
        .collect();
    if let Some(last) = cdf.last_mut() {
        *last = 1.0;
    }
    Some(cdf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_normal_weights_sum_to_one_and_peak_at_mean() {
        let w = normal_weights(21, 0.5, 0.15);
        let total: f64 = w.iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
        let peak = w
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        assert_eq!(peak, 10);
    }

    #[test]
    fn test_zipf_weights_are_a_permutation_of_ranks() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut w = zipf_weights(5, 0.0, &mut rng);
        w.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_eq!(w[0], 1.0);
        assert_eq!(w[1], 0.5);
        assert!((w[4] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_all_zero_weights_fall_back_to_uniform() {
        assert!(build_cdf(&[0.0, 0.0]).is_none());
    }

    #[test]
    fn test_deserialize_distribution() {
        let d: Distribution = serde_yaml_ng::from_str("type: zipf").unwrap();
        assert_eq!(d, Distribution::Zipf { s: 1.0 });
        let d: Distribution = serde_yaml_ng::from_str("type: normal\nmean: 0.2").unwrap();
        assert_eq!(
            d,
            Distribution::Normal {
                mean: 0.2,
                stddev: 0.15
            }
        );
    }
}
