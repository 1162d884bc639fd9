use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use super::decision::{DecisionEngine, DecisionError, DecisionOutcome, FeatureVector};
use super::domain::{
    ApplicationSubmission, Loan, LoanId, LoanRequest, LoanStatus, Person, PersonId,
};
use super::intake::{require_terminal, IntakeGuard, ValidationError};
use super::snapshot::ApplicationSnapshot;
use super::store::{AuditStore, IdentityStore, PageRequest, StoreError, StoreKind, StoreTimeouts};

/// Whether the audit store caught up with an identity-store commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AuditSync {
    Synced,
    Stale { reason: String },
}

impl AuditSync {
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }
}

/// An authoritative record plus the audit outcome of the same operation.
///
/// `audit` is `Stale` for a partial success: the identity store committed, the audit
/// store did not, and nothing was rolled back.
#[derive(Debug, Clone, PartialEq)]
pub struct Committed<T> {
    pub record: T,
    pub audit: AuditSync,
}

impl<T> Committed<T> {
    pub fn is_partial(&self) -> bool {
        self.audit.is_stale()
    }
}

/// A scored decision and the transition it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub outcome: DecisionOutcome,
    pub loan: Committed<Loan>,
}

/// Result of a repair pass for a single loan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    InSync,
    SnapshotInserted,
    StatusRepaired { matched: u64 },
}

/// Error raised by the lending lifecycle service.
#[derive(Debug, thiserror::Error)]
pub enum LendingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("loan {loan_id} was already decided as {status}")]
    AlreadyDecided { loan_id: LoanId, status: LoanStatus },
    #[error("loan {loan_id} is already {current}; cannot move to {requested}")]
    InvalidTransition {
        loan_id: LoanId,
        current: LoanStatus,
        requested: LoanStatus,
    },
    #[error("{kind} store failure: {source}")]
    Store {
        kind: StoreKind,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Decision(#[from] DecisionError),
}

impl LendingError {
    fn identity(source: StoreError) -> Self {
        Self::Store {
            kind: StoreKind::Identity,
            source,
        }
    }

    fn audit(source: StoreError) -> Self {
        Self::Store {
            kind: StoreKind::Audit,
            source,
        }
    }

    fn person_not_found(person_id: PersonId) -> Self {
        Self::NotFound {
            entity: "person",
            id: person_id.0,
        }
    }

    fn loan_not_found(loan_id: LoanId) -> Self {
        Self::NotFound {
            entity: "loan",
            id: loan_id.0,
        }
    }
}

async fn within<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(StoreError::Timeout(limit)))
}

/// Orchestrates intake, the ordered dual-store writes, and decisions.
///
/// The identity store is always written first and is authoritative. Audit-store
/// failures after a successful identity write are reported as partial success and
/// left for [`LoanApplicationService::reconcile`].
pub struct LoanApplicationService<I: ?Sized, A: ?Sized> {
    guard: IntakeGuard,
    identity: Arc<I>,
    audit: Arc<A>,
    engine: Arc<DecisionEngine>,
    timeouts: StoreTimeouts,
    snapshot_locks: Mutex<HashMap<LoanId, Arc<Mutex<()>>>>,
}

impl<I, A> LoanApplicationService<I, A>
where
    I: IdentityStore + ?Sized + 'static,
    A: AuditStore + ?Sized + 'static,
{
    pub fn new(
        identity: Arc<I>,
        audit: Arc<A>,
        engine: Arc<DecisionEngine>,
        timeouts: StoreTimeouts,
    ) -> Self {
        Self::with_guard(IntakeGuard::default(), identity, audit, engine, timeouts)
    }

    pub(crate) fn with_guard(
        guard: IntakeGuard,
        identity: Arc<I>,
        audit: Arc<A>,
        engine: Arc<DecisionEngine>,
        timeouts: StoreTimeouts,
    ) -> Self {
        Self {
            guard,
            identity,
            audit,
            engine,
            timeouts,
            snapshot_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Validate, write person and loan to the identity store, then write the snapshot.
    pub async fn create_application(
        &self,
        submission: ApplicationSubmission,
    ) -> Result<Committed<Person>, LendingError> {
        let prepared = self.guard.prepare(submission)?;

        let person = within(
            self.timeouts.identity,
            self.identity
                .insert_person(prepared.applicant, vec![prepared.loan]),
        )
        .await
        .map_err(LendingError::identity)?;

        let loan = person.loans.first().ok_or_else(|| {
            LendingError::identity(StoreError::Malformed(format!(
                "person {} stored without its loan",
                person.person_id
            )))
        })?;
        info!(person_id = %person.person_id, loan_id = %loan.loan_id, "application stored");

        let snapshot = ApplicationSnapshot::capture(&person.profile, loan, Utc::now());
        let audit = self.write_snapshot(snapshot).await;

        Ok(Committed {
            record: person,
            audit,
        })
    }

    /// Add a `Pending` loan for an existing person and snapshot it.
    pub async fn submit_loan(
        &self,
        person_id: PersonId,
        request: LoanRequest,
    ) -> Result<Committed<Loan>, LendingError> {
        let person = self.get_person(person_id).await?;
        let terms = self.guard.loan_terms(person.profile.income, request)?;

        let loan = match within(
            self.timeouts.identity,
            self.identity.insert_loan(person_id, terms),
        )
        .await
        {
            Ok(loan) => loan,
            Err(StoreError::NotFound) => return Err(LendingError::person_not_found(person_id)),
            Err(other) => return Err(LendingError::identity(other)),
        };
        info!(%person_id, loan_id = %loan.loan_id, "loan stored");

        let snapshot = ApplicationSnapshot::capture(&person.profile, &loan, Utc::now());
        let audit = self.write_snapshot(snapshot).await;

        Ok(Committed { record: loan, audit })
    }

    /// Move a `Pending` loan to `Approved` or `Rejected` in both stores.
    pub async fn transition_status(
        &self,
        loan_id: LoanId,
        new_status: LoanStatus,
    ) -> Result<Committed<Loan>, LendingError> {
        let requested = require_terminal(new_status)?;

        let loan = match within(
            self.timeouts.identity,
            self.identity
                .update_loan_status(loan_id, LoanStatus::Pending, requested),
        )
        .await
        {
            Ok(loan) => loan,
            Err(StoreError::NotFound) => return Err(LendingError::loan_not_found(loan_id)),
            Err(StoreError::StatusConflict { current, .. }) => {
                return Err(LendingError::InvalidTransition {
                    loan_id,
                    current,
                    requested,
                })
            }
            Err(other) => return Err(LendingError::identity(other)),
        };
        info!(%loan_id, status = %requested, "loan status committed");

        let audit = match within(
            self.timeouts.audit,
            self.audit.update_status_by_loan_id(loan_id, requested),
        )
        .await
        {
            Ok(0) => stale(loan_id, "no audit snapshot matched the loan".to_string()),
            Ok(matched) => {
                if matched > 1 {
                    warn!(%loan_id, matched, "multiple audit snapshots share one loan id");
                }
                AuditSync::Synced
            }
            Err(err) => stale(loan_id, err.to_string()),
        };

        Ok(Committed { record: loan, audit })
    }

    /// Score the canonical record and apply the resulting status.
    pub async fn evaluate(&self, loan_id: LoanId) -> Result<Evaluation, LendingError> {
        let loan = within(self.timeouts.identity, self.identity.get_loan(loan_id))
            .await
            .map_err(LendingError::identity)?
            .ok_or_else(|| LendingError::loan_not_found(loan_id))?;

        if loan.loan_status.is_terminal() {
            return Err(LendingError::AlreadyDecided {
                loan_id,
                status: loan.loan_status,
            });
        }

        let person = self.get_person(loan.person_id).await?;
        let features = FeatureVector::from_record(&person.profile, &loan);
        let outcome = self.engine.decide(&features)?;
        debug!(%loan_id, probability = outcome.probability, "loan scored");

        let loan = self
            .transition_status(loan_id, outcome.decision.status())
            .await?;

        Ok(Evaluation { outcome, loan })
    }

    pub async fn get_person(&self, person_id: PersonId) -> Result<Person, LendingError> {
        within(self.timeouts.identity, self.identity.get_person(person_id))
            .await
            .map_err(LendingError::identity)?
            .ok_or_else(|| LendingError::person_not_found(person_id))
    }

    pub async fn list_persons(&self, page: PageRequest) -> Result<Vec<Person>, LendingError> {
        within(self.timeouts.identity, self.identity.list_persons(page))
            .await
            .map_err(LendingError::identity)
    }

    /// Administrative removal from the identity store only. Snapshots of the removed
    /// loans stay behind in the audit store.
    pub async fn delete_person(&self, person_id: PersonId) -> Result<Person, LendingError> {
        let removed = within(self.timeouts.identity, self.identity.delete_person(person_id))
            .await
            .map_err(LendingError::identity)?
            .ok_or_else(|| LendingError::person_not_found(person_id))?;

        warn!(
            %person_id,
            orphaned_snapshots = removed.loans.len(),
            "person deleted; audit snapshots left in place"
        );
        Ok(removed)
    }

    /// Bring the audit store in line with the canonical loan. Safe to repeat: a
    /// snapshot is only inserted when none exists for the loan id, and snapshot writes
    /// for one loan id never overlap within this service.
    pub async fn reconcile(&self, loan_id: LoanId) -> Result<ReconcileOutcome, LendingError> {
        let guard = self.lock_snapshots(loan_id).await;
        let outcome = self.reconcile_locked(loan_id).await;
        self.release_snapshots(loan_id, guard).await;
        outcome
    }

    async fn reconcile_locked(&self, loan_id: LoanId) -> Result<ReconcileOutcome, LendingError> {
        let loan = within(self.timeouts.identity, self.identity.get_loan(loan_id))
            .await
            .map_err(LendingError::identity)?
            .ok_or_else(|| LendingError::loan_not_found(loan_id))?;

        let documents = within(self.timeouts.audit, self.audit.find_by_loan_id(loan_id))
            .await
            .map_err(LendingError::audit)?;

        if documents.is_empty() {
            let person = self.get_person(loan.person_id).await?;
            let snapshot = ApplicationSnapshot::capture(&person.profile, &loan, Utc::now());
            within(self.timeouts.audit, self.audit.insert_snapshot(snapshot))
                .await
                .map_err(LendingError::audit)?;
            info!(%loan_id, "missing audit snapshot restored");
            return Ok(ReconcileOutcome::SnapshotInserted);
        }

        if documents
            .iter()
            .all(|document| document.loan_status == loan.loan_status)
        {
            return Ok(ReconcileOutcome::InSync);
        }

        let matched = within(
            self.timeouts.audit,
            self.audit.update_status_by_loan_id(loan_id, loan.loan_status),
        )
        .await
        .map_err(LendingError::audit)?;
        info!(%loan_id, status = %loan.loan_status, matched, "audit status repaired");

        Ok(ReconcileOutcome::StatusRepaired { matched })
    }

    async fn write_snapshot(&self, snapshot: ApplicationSnapshot) -> AuditSync {
        let loan_id = snapshot.sql_loan_id;
        let guard = self.lock_snapshots(loan_id).await;
        let written = within(self.timeouts.audit, self.audit.insert_snapshot(snapshot)).await;
        self.release_snapshots(loan_id, guard).await;

        match written {
            Ok(()) => AuditSync::Synced,
            Err(err) => stale(loan_id, err.to_string()),
        }
    }

    async fn lock_snapshots(&self, loan_id: LoanId) -> OwnedMutexGuard<()> {
        let lock = self
            .snapshot_locks
            .lock()
            .await
            .entry(loan_id)
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    async fn release_snapshots(&self, loan_id: LoanId, guard: OwnedMutexGuard<()>) {
        drop(guard);
        let mut locks = self.snapshot_locks.lock().await;
        if locks
            .get(&loan_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&loan_id);
        }
    }
}

fn stale(loan_id: LoanId, reason: String) -> AuditSync {
    warn!(%loan_id, %reason, "audit store behind identity store; reconciliation required");
    AuditSync::Stale { reason }
}
