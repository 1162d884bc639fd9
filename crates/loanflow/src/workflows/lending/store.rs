use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::domain::{ApplicantProfile, Loan, LoanId, LoanStatus, LoanTerms, Person, PersonId};
use super::snapshot::ApplicationSnapshot;

pub const DEFAULT_PAGE_LIMIT: u32 = 100;
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Which of the two stores an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Identity,
    Audit,
}

impl StoreKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Audit => "audit",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error enumeration shared by both store contracts.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("loan status is {current}, update required {expected}")]
    StatusConflict {
        current: LoanStatus,
        expected: LoanStatus,
    },
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("stored record is malformed: {0}")]
    Malformed(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Skip/limit window used when listing persons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub skip: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// Per-call deadlines applied by the lifecycle service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreTimeouts {
    pub identity: Duration,
    pub audit: Duration,
}

impl Default for StoreTimeouts {
    fn default() -> Self {
        Self {
            identity: DEFAULT_STORE_TIMEOUT,
            audit: DEFAULT_STORE_TIMEOUT,
        }
    }
}

/// Relational source of truth. Allocates identifiers and owns the person/loan link.
///
/// Each call commits atomically on its own; nothing spans calls.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Insert a person together with its initial loans as one row group. Every loan
    /// starts out `Pending`.
    async fn insert_person(
        &self,
        profile: ApplicantProfile,
        loans: Vec<LoanTerms>,
    ) -> Result<Person, StoreError>;

    /// Insert a `Pending` loan under an existing person; `NotFound` when the person is absent.
    async fn insert_loan(&self, person_id: PersonId, terms: LoanTerms) -> Result<Loan, StoreError>;

    async fn get_person(&self, person_id: PersonId) -> Result<Option<Person>, StoreError>;

    async fn get_loan(&self, loan_id: LoanId) -> Result<Option<Loan>, StoreError>;

    async fn list_persons(&self, page: PageRequest) -> Result<Vec<Person>, StoreError>;

    /// Conditional status write: applies only while the stored status equals `expected`.
    /// Returns `NotFound` for an unknown loan and `StatusConflict` when another writer
    /// got there first.
    async fn update_loan_status(
        &self,
        loan_id: LoanId,
        expected: LoanStatus,
        next: LoanStatus,
    ) -> Result<Loan, StoreError>;

    /// Remove a person and its loans. Returns the removed record, if any.
    async fn delete_person(&self, person_id: PersonId) -> Result<Option<Person>, StoreError>;
}

/// Best-effort document store. No uniqueness is enforced on `sqlLoanId`.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn insert_snapshot(&self, snapshot: ApplicationSnapshot) -> Result<(), StoreError>;

    /// Overwrite `loanStatus` on every document for `loan_id`, returning the matched count.
    async fn update_status_by_loan_id(
        &self,
        loan_id: LoanId,
        status: LoanStatus,
    ) -> Result<u64, StoreError>;

    async fn find_by_loan_id(&self, loan_id: LoanId)
        -> Result<Vec<ApplicationSnapshot>, StoreError>;
}
