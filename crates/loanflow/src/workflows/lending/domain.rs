use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier assigned by the identity store when a person is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(pub i64);

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier assigned by the identity store when a loan is created.
///
/// The audit store keeps this value as `sqlLoanId`; it is the only link between a
/// snapshot and its canonical loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoanId(pub i64);

impl fmt::Display for LoanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a loan. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoanStatus {
    Pending,
    Approved,
    Rejected,
}

impl LoanStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown loan status '{0}'")]
pub struct UnknownLoanStatus(pub String);

impl FromStr for LoanStatus {
    type Err = UnknownLoanStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Pending" => Ok(Self::Pending),
            "Approved" => Ok(Self::Approved),
            "Rejected" => Ok(Self::Rejected),
            other => Err(UnknownLoanStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HomeOwnership {
    Rent,
    Own,
    Mortgage,
    Other,
}

impl HomeOwnership {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Rent => "RENT",
            Self::Own => "OWN",
            Self::Mortgage => "MORTGAGE",
            Self::Other => "OTHER",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value {
            "RENT" => Some(Self::Rent),
            "OWN" => Some(Self::Own),
            "MORTGAGE" => Some(Self::Mortgage),
            "OTHER" => Some(Self::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Female => "female",
            Self::Male => "male",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value {
            "female" => Some(Self::Female),
            "male" => Some(Self::Male),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Education {
    #[serde(rename = "High School")]
    HighSchool,
    Associate,
    Bachelor,
    Master,
    Doctorate,
}

impl Education {
    pub const fn label(self) -> &'static str {
        match self {
            Self::HighSchool => "High School",
            Self::Associate => "Associate",
            Self::Bachelor => "Bachelor",
            Self::Master => "Master",
            Self::Doctorate => "Doctorate",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value {
            "High School" => Some(Self::HighSchool),
            "Associate" => Some(Self::Associate),
            "Bachelor" => Some(Self::Bachelor),
            "Master" => Some(Self::Master),
            "Doctorate" => Some(Self::Doctorate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoanIntent {
    Education,
    Medical,
    Venture,
    Personal,
    DebtConsolidation,
    HomeImprovement,
}

impl LoanIntent {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Education => "EDUCATION",
            Self::Medical => "MEDICAL",
            Self::Venture => "VENTURE",
            Self::Personal => "PERSONAL",
            Self::DebtConsolidation => "DEBTCONSOLIDATION",
            Self::HomeImprovement => "HOMEIMPROVEMENT",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value {
            "EDUCATION" => Some(Self::Education),
            "MEDICAL" => Some(Self::Medical),
            "VENTURE" => Some(Self::Venture),
            "PERSONAL" => Some(Self::Personal),
            "DEBTCONSOLIDATION" => Some(Self::DebtConsolidation),
            "HOMEIMPROVEMENT" => Some(Self::HomeImprovement),
            _ => None,
        }
    }
}

/// Applicant attributes held on the canonical person row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicantProfile {
    pub age: u16,
    pub gender: Gender,
    pub education: Education,
    pub income: f64,
    pub employment_experience: u16,
    pub home_ownership: HomeOwnership,
    pub credit_score: u16,
    pub credit_history_length: u16,
}

/// Loan attributes fixed at creation. Only the status changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub loan_amount: f64,
    pub loan_interest_rate: f64,
    pub loan_percent_income: f64,
    pub loan_intent: LoanIntent,
    pub previous_loan_defaults: bool,
}

/// Canonical loan as stored by the identity store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub loan_id: LoanId,
    pub person_id: PersonId,
    #[serde(flatten)]
    pub terms: LoanTerms,
    pub loan_status: LoanStatus,
}

/// Canonical person with every loan that references it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub person_id: PersonId,
    #[serde(flatten)]
    pub profile: ApplicantProfile,
    pub loans: Vec<Loan>,
}

/// Inbound payload for a new application: a new person plus their first loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    pub age: u16,
    pub gender: Gender,
    pub education: Education,
    pub income: f64,
    pub employment_experience: u16,
    pub home_ownership: HomeOwnership,
    pub credit_score: u16,
    pub credit_history_length: u16,
    #[serde(flatten)]
    pub loan: LoanRequest,
}

/// Loan portion of a submission. The loan-to-income ratio is derived, never supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRequest {
    pub loan_amount: f64,
    pub loan_interest_rate: f64,
    pub loan_intent: LoanIntent,
    pub previous_loan_defaults: bool,
}
