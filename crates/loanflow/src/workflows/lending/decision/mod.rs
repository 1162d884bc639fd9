//! Threshold decisions over a scored feature vector.
//!
//! The engine never touches a store. Its outcome is applied through the lifecycle
//! service's status transition.

mod config;
mod features;
mod policy;
mod scorer;

pub use config::{DecisionConfig, DEFAULT_DECISION_THRESHOLD};
pub use features::{FeatureVector, FEATURE_COUNT};
pub use policy::Decision;
pub use scorer::{LogisticScorer, Scorer};

use std::sync::Arc;

use serde::Serialize;

use config::validate_threshold;
use policy::classify;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecisionError {
    #[error("invalid feature vector: {feature} {reason}")]
    InvalidFeatureVector {
        feature: &'static str,
        reason: String,
    },
    #[error("decision threshold {0} must lie strictly between 0 and 1")]
    InvalidThreshold(f64),
    #[error("scorer returned {0}, expected a probability within 0..=1")]
    InvalidProbability(f64),
}

/// Scorer output together with the threshold that produced the decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionOutcome {
    pub decision: Decision,
    pub probability: f64,
    pub threshold: f64,
    pub summary: String,
}

/// Deterministic evaluator: the same features and threshold always give the same decision.
pub struct DecisionEngine {
    config: DecisionConfig,
    scorer: Arc<dyn Scorer>,
}

impl DecisionEngine {
    pub fn new(config: DecisionConfig) -> Self {
        Self::with_scorer(config, Arc::new(LogisticScorer::default()))
    }

    pub fn with_scorer(config: DecisionConfig, scorer: Arc<dyn Scorer>) -> Self {
        Self { config, scorer }
    }

    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    pub fn decide(&self, features: &FeatureVector) -> Result<DecisionOutcome, DecisionError> {
        self.decide_with_threshold(features, self.config.threshold())
    }

    /// `Approved` iff the score is at least `threshold`.
    pub fn decide_with_threshold(
        &self,
        features: &FeatureVector,
        threshold: f64,
    ) -> Result<DecisionOutcome, DecisionError> {
        let threshold = validate_threshold(threshold)?;
        features.validate()?;

        let probability = self.scorer.score(features);
        if !(0.0..=1.0).contains(&probability) {
            return Err(DecisionError::InvalidProbability(probability));
        }

        let decision = classify(probability, threshold);
        Ok(DecisionOutcome {
            decision,
            probability,
            threshold,
            summary: decision.summary(probability, threshold),
        })
    }
}

impl std::fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
