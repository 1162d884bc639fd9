//! Denormalized application document kept by the audit store.
//!
//! A snapshot copies the person and loan as they were at ingestion. Only `loanStatus`
//! changes afterwards, and `sqlLoanId` is the weak back-reference to the canonical loan.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::domain::{
    ApplicantProfile, Education, Gender, HomeOwnership, Loan, LoanId, LoanIntent, LoanStatus,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSnapshot {
    pub sql_loan_id: LoanId,
    pub person_details: PersonDetails,
    pub loan_details: LoanDetails,
    pub credit_details: CreditDetails,
    pub loan_status: LoanStatus,
    pub ingestion_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonDetails {
    pub age: u16,
    pub gender: Gender,
    pub education: Education,
    pub income: f64,
    pub employment_experience_years: u16,
    pub home_ownership: HomeOwnership,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanDetails {
    pub amount: f64,
    pub intent: LoanIntent,
    pub interest_rate: f64,
    pub percent_income: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditDetails {
    pub credit_history_length_years: u16,
    pub credit_score: u16,
    #[serde(
        serialize_with = "serialize_yes_no",
        deserialize_with = "deserialize_yes_no"
    )]
    pub previous_loan_defaults: bool,
}

impl ApplicationSnapshot {
    /// Build the document for `loan` from the canonical rows. The snapshot takes the
    /// loan's current status, so a repair pass can rebuild a missing document faithfully.
    pub fn capture(profile: &ApplicantProfile, loan: &Loan, ingested_at: DateTime<Utc>) -> Self {
        Self {
            sql_loan_id: loan.loan_id,
            person_details: PersonDetails {
                age: profile.age,
                gender: profile.gender,
                education: profile.education,
                income: profile.income,
                employment_experience_years: profile.employment_experience,
                home_ownership: profile.home_ownership,
            },
            loan_details: LoanDetails {
                amount: loan.terms.loan_amount,
                intent: loan.terms.loan_intent,
                interest_rate: loan.terms.loan_interest_rate,
                percent_income: loan.terms.loan_percent_income,
            },
            credit_details: CreditDetails {
                credit_history_length_years: profile.credit_history_length,
                credit_score: profile.credit_score,
                previous_loan_defaults: loan.terms.previous_loan_defaults,
            },
            loan_status: loan.loan_status,
            ingestion_timestamp: ingested_at,
        }
    }
}

fn serialize_yes_no<S>(value: &bool, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(if *value { "Yes" } else { "No" })
}

fn deserialize_yes_no<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim() {
        "Yes" | "Y" => Ok(true),
        "No" | "N" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "expected 'Yes' or 'No' for previousLoanDefaults, found '{other}'"
        ))),
    }
}
