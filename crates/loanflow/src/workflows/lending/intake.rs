use super::domain::{
    ApplicantProfile, ApplicationSubmission, LoanRequest, LoanStatus, LoanTerms,
    UnknownLoanStatus,
};

/// Validation errors raised before any store is touched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must be a finite, non-negative amount (found {value})")]
    InvalidAmount { field: &'static str, value: f64 },
    #[error("applicant age {found} is outside the accepted range {min}..={max}")]
    AgeOutOfRange { found: u16, min: u16, max: u16 },
    #[error("credit score {0} is outside the accepted range 300..=850")]
    CreditScoreOutOfRange(u16),
    #[error("{field} of {years} years exceeds applicant age {age}")]
    TenureExceedsAge {
        field: &'static str,
        years: u16,
        age: u16,
    },
    #[error("interest rate {0} must lie within 0..=100 percent")]
    InterestRateOutOfRange(f64),
    #[error("loan amount {loan_amount} against income {income} gives no finite loan-to-income ratio")]
    UnboundedRatio { loan_amount: f64, income: f64 },
    #[error("loan status must be Approved or Rejected (found {0})")]
    NonTerminalTarget(LoanStatus),
    #[error(transparent)]
    UnknownStatus(#[from] UnknownLoanStatus),
}

pub const MIN_CREDIT_SCORE: u16 = 300;
pub const MAX_CREDIT_SCORE: u16 = 850;
const DEFAULT_MINIMUM_AGE: u16 = 18;
const DEFAULT_MAXIMUM_AGE: u16 = 120;

/// Age window accepted at intake.
#[derive(Debug, Clone)]
pub struct IntakePolicy {
    minimum_age: u16,
    maximum_age: u16,
}

impl IntakePolicy {
    pub fn new(minimum_age: u16, maximum_age: u16) -> Self {
        if minimum_age == 0 || minimum_age > maximum_age {
            return Self::default();
        }

        Self {
            minimum_age,
            maximum_age,
        }
    }

}

impl Default for IntakePolicy {
    fn default() -> Self {
        Self {
            minimum_age: DEFAULT_MINIMUM_AGE,
            maximum_age: DEFAULT_MAXIMUM_AGE,
        }
    }
}

/// A submission that passed validation, split into identity-store rows.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedApplication {
    pub applicant: ApplicantProfile,
    pub loan: LoanTerms,
}

/// Ratio of the requested amount to annual income; zero when there is no income.
pub fn loan_to_income_ratio(loan_amount: f64, income: f64) -> f64 {
    if income > 0.0 {
        loan_amount / income
    } else {
        0.0
    }
}

/// Guard responsible for turning raw submissions into canonical rows.
#[derive(Debug, Clone, Default)]
pub struct IntakeGuard {
    policy: IntakePolicy,
}

impl IntakeGuard {
    pub fn with_policy(policy: IntakePolicy) -> Self {
        Self { policy }
    }

    pub fn prepare(
        &self,
        submission: ApplicationSubmission,
    ) -> Result<PreparedApplication, ValidationError> {
        let applicant = ApplicantProfile {
            age: submission.age,
            gender: submission.gender,
            education: submission.education,
            income: submission.income,
            employment_experience: submission.employment_experience,
            home_ownership: submission.home_ownership,
            credit_score: submission.credit_score,
            credit_history_length: submission.credit_history_length,
        };

        self.check_applicant(&applicant)?;
        let loan = self.loan_terms(applicant.income, submission.loan)?;

        Ok(PreparedApplication { applicant, loan })
    }

    /// Validate a loan request against the income of the person it will belong to.
    pub fn loan_terms(
        &self,
        income: f64,
        request: LoanRequest,
    ) -> Result<LoanTerms, ValidationError> {
        non_negative("loan_amount", request.loan_amount)?;
        if !request.loan_interest_rate.is_finite()
            || !(0.0..=100.0).contains(&request.loan_interest_rate)
        {
            return Err(ValidationError::InterestRateOutOfRange(
                request.loan_interest_rate,
            ));
        }

        let loan_percent_income = loan_to_income_ratio(request.loan_amount, income);
        if !loan_percent_income.is_finite() {
            return Err(ValidationError::UnboundedRatio {
                loan_amount: request.loan_amount,
                income,
            });
        }

        Ok(LoanTerms {
            loan_amount: request.loan_amount,
            loan_interest_rate: request.loan_interest_rate,
            loan_percent_income,
            loan_intent: request.loan_intent,
            previous_loan_defaults: request.previous_loan_defaults,
        })
    }

    fn check_applicant(&self, applicant: &ApplicantProfile) -> Result<(), ValidationError> {
        non_negative("income", applicant.income)?;

        let (min, max) = (self.policy.minimum_age, self.policy.maximum_age);
        if !(min..=max).contains(&applicant.age) {
            return Err(ValidationError::AgeOutOfRange {
                found: applicant.age,
                min,
                max,
            });
        }

        if !(MIN_CREDIT_SCORE..=MAX_CREDIT_SCORE).contains(&applicant.credit_score) {
            return Err(ValidationError::CreditScoreOutOfRange(applicant.credit_score));
        }

        for (field, years) in [
            ("employment_experience", applicant.employment_experience),
            ("credit_history_length", applicant.credit_history_length),
        ] {
            if years > applicant.age {
                return Err(ValidationError::TenureExceedsAge {
                    field,
                    years,
                    age: applicant.age,
                });
            }
        }

        Ok(())
    }
}

/// Transition targets must be terminal; `Pending` is only ever assigned at creation.
pub fn require_terminal(status: LoanStatus) -> Result<LoanStatus, ValidationError> {
    if status.is_terminal() {
        Ok(status)
    } else {
        Err(ValidationError::NonTerminalTarget(status))
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidAmount { field, value })
    }
}
