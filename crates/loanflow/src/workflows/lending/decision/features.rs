use serde::{Deserialize, Serialize};

use super::super::domain::{ApplicantProfile, HomeOwnership, Loan};
use super::super::intake::{MAX_CREDIT_SCORE, MIN_CREDIT_SCORE};
use super::DecisionError;

pub const FEATURE_COUNT: usize = 11;

const MIN_AGE: f64 = 18.0;
const MAX_AGE: f64 = 120.0;

/// Fixed input to the scorer, read from the canonical person and loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub age: f64,
    pub income: f64,
    pub employment_experience: f64,
    pub credit_score: f64,
    pub credit_history_length: f64,
    pub loan_percent_income: f64,
    pub home_ownership: HomeOwnership,
    pub previous_loan_defaults: bool,
}

impl FeatureVector {
    pub fn from_record(profile: &ApplicantProfile, loan: &Loan) -> Self {
        Self {
            age: f64::from(profile.age),
            income: profile.income,
            employment_experience: f64::from(profile.employment_experience),
            credit_score: f64::from(profile.credit_score),
            credit_history_length: f64::from(profile.credit_history_length),
            loan_percent_income: loan.terms.loan_percent_income,
            home_ownership: profile.home_ownership,
            previous_loan_defaults: loan.terms.previous_loan_defaults,
        }
    }

    /// Rejects non-finite (missing) and out-of-range values.
    pub fn validate(&self) -> Result<(), DecisionError> {
        in_range("age", self.age, MIN_AGE, MAX_AGE)?;
        in_range("income", self.income, 0.0, f64::MAX)?;
        in_range("employment_experience", self.employment_experience, 0.0, self.age)?;
        in_range(
            "credit_score",
            self.credit_score,
            f64::from(MIN_CREDIT_SCORE),
            f64::from(MAX_CREDIT_SCORE),
        )?;
        in_range("credit_history_length", self.credit_history_length, 0.0, self.age)?;
        in_range("loan_percent_income", self.loan_percent_income, 0.0, f64::MAX)?;
        Ok(())
    }

    /// Normalized numeric encoding. Home ownership is one-hot in RENT, OWN, MORTGAGE,
    /// OTHER order.
    pub fn encode(&self) -> [f64; FEATURE_COUNT] {
        let ownership = |category: HomeOwnership| {
            if self.home_ownership == category {
                1.0
            } else {
                0.0
            }
        };

        [
            (self.age - MIN_AGE) / 50.0,
            (self.income / 10_000.0).ln_1p(),
            self.employment_experience / 10.0,
            (self.credit_score - 650.0) / 100.0,
            self.credit_history_length / 10.0,
            self.loan_percent_income,
            ownership(HomeOwnership::Rent),
            ownership(HomeOwnership::Own),
            ownership(HomeOwnership::Mortgage),
            ownership(HomeOwnership::Other),
            if self.previous_loan_defaults { 1.0 } else { 0.0 },
        ]
    }
}

fn in_range(feature: &'static str, value: f64, min: f64, max: f64) -> Result<(), DecisionError> {
    if !value.is_finite() {
        return Err(DecisionError::InvalidFeatureVector {
            feature,
            reason: "value is missing".to_string(),
        });
    }
    if value < min || value > max {
        return Err(DecisionError::InvalidFeatureVector {
            feature,
            reason: format!("{value} outside {min}..={max}"),
        });
    }
    Ok(())
}
