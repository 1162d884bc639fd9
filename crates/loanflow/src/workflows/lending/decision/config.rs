use super::DecisionError;

pub const DEFAULT_DECISION_THRESHOLD: f64 = 0.75;

/// Approval threshold applied to scorer probabilities. Always strictly inside (0, 1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionConfig {
    threshold: f64,
}

impl DecisionConfig {
    pub fn new(threshold: f64) -> Result<Self, DecisionError> {
        Ok(Self {
            threshold: validate_threshold(threshold)?,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_DECISION_THRESHOLD,
        }
    }
}

pub(crate) fn validate_threshold(threshold: f64) -> Result<f64, DecisionError> {
    if threshold.is_finite() && threshold > 0.0 && threshold < 1.0 {
        Ok(threshold)
    } else {
        Err(DecisionError::InvalidThreshold(threshold))
    }
}
