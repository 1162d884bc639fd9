use serde::{Deserialize, Serialize};

use super::super::domain::LoanStatus;

/// Binary outcome of a threshold decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub const fn status(self) -> LoanStatus {
        match self {
            Self::Approved => LoanStatus::Approved,
            Self::Rejected => LoanStatus::Rejected,
        }
    }

    pub fn summary(&self, probability: f64, threshold: f64) -> String {
        match self {
            Self::Approved => format!("approved: probability {probability:.2} >= {threshold:.2}"),
            Self::Rejected => format!("rejected: probability {probability:.2} < {threshold:.2}"),
        }
    }
}

pub(crate) fn classify(probability: f64, threshold: f64) -> Decision {
    if probability >= threshold {
        Decision::Approved
    } else {
        Decision::Rejected
    }
}
