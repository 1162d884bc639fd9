use super::features::{FeatureVector, FEATURE_COUNT};

/// Pure mapping from a validated feature vector to an approval probability.
pub trait Scorer: Send + Sync {
    fn score(&self, features: &FeatureVector) -> f64;
}

impl<F> Scorer for F
where
    F: Fn(&FeatureVector) -> f64 + Send + Sync,
{
    fn score(&self, features: &FeatureVector) -> f64 {
        self(features)
    }
}

const BASELINE_INTERCEPT: f64 = 0.5;
const BASELINE_WEIGHTS: [f64; FEATURE_COUNT] = [
    0.2,  // age
    0.6,  // log income
    0.3,  // employment experience
    2.0,  // credit score
    0.25, // credit history length
    -4.0, // loan-to-income ratio
    -0.3, // rent
    0.4,  // own
    0.2,  // mortgage
    -0.2, // other
    -2.5, // previous default
];

/// Logistic model over [`FeatureVector::encode`].
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticScorer {
    intercept: f64,
    weights: [f64; FEATURE_COUNT],
}

impl LogisticScorer {
    pub const fn new(intercept: f64, weights: [f64; FEATURE_COUNT]) -> Self {
        Self { intercept, weights }
    }
}

impl Default for LogisticScorer {
    fn default() -> Self {
        Self::new(BASELINE_INTERCEPT, BASELINE_WEIGHTS)
    }
}

impl Scorer for LogisticScorer {
    fn score(&self, features: &FeatureVector) -> f64 {
        let z = features
            .encode()
            .iter()
            .zip(self.weights.iter())
            .fold(self.intercept, |acc, (value, weight)| acc + value * weight);
        1.0 / (1.0 + (-z).exp())
    }
}
