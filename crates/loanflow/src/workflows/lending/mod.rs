//! Loan application intake, dual-store persistence, and threshold decisions.
//!
//! Every application lives canonically in the identity store and is mirrored as a
//! denormalized snapshot in the audit store. Writes go to the identity store first; the
//! audit store is best-effort and repaired through reconciliation.

pub mod decision;
pub mod domain;
pub mod intake;
pub mod memory;
pub mod postgres;
pub mod router;
pub mod service;
pub mod snapshot;
pub mod store;

#[cfg(test)]
mod tests;

pub use decision::{
    Decision, DecisionConfig, DecisionEngine, DecisionError, DecisionOutcome, FeatureVector,
    LogisticScorer, Scorer, DEFAULT_DECISION_THRESHOLD,
};
pub use domain::{
    ApplicantProfile, ApplicationSubmission, Education, Gender, HomeOwnership, Loan, LoanId,
    LoanIntent, LoanRequest, LoanStatus, LoanTerms, Person, PersonId,
};
pub use intake::{loan_to_income_ratio, IntakeGuard, IntakePolicy, ValidationError};
pub use memory::{InMemoryAuditStore, InMemoryIdentityStore};
pub use postgres::{PgAuditStore, PgIdentityStore};
pub use router::{lending_router, AUDIT_SYNC_HEADER};
pub use service::{
    AuditSync, Committed, Evaluation, LendingError, LoanApplicationService, ReconcileOutcome,
};
pub use snapshot::ApplicationSnapshot;
pub use store::{
    AuditStore, IdentityStore, PageRequest, StoreError, StoreKind, StoreTimeouts,
};
