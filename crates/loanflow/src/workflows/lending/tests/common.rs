use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;

use crate::workflows::lending::decision::{DecisionConfig, DecisionEngine, FeatureVector};
use crate::workflows::lending::domain::{
    ApplicantProfile, ApplicationSubmission, Education, Gender, HomeOwnership, Loan, LoanId,
    LoanIntent, LoanRequest, LoanStatus, LoanTerms, Person, PersonId,
};
use crate::workflows::lending::memory::{InMemoryAuditStore, InMemoryIdentityStore};
use crate::workflows::lending::service::LoanApplicationService;
use crate::workflows::lending::snapshot::ApplicationSnapshot;
use crate::workflows::lending::store::{
    AuditStore, IdentityStore, PageRequest, StoreError, StoreTimeouts,
};

pub(super) const SAMPLE_PROBABILITY: f64 = 0.80;

pub(super) fn submission() -> ApplicationSubmission {
    ApplicationSubmission {
        age: 30,
        gender: Gender::Female,
        education: Education::Bachelor,
        income: 60_000.0,
        employment_experience: 5,
        home_ownership: HomeOwnership::Rent,
        credit_score: 720,
        credit_history_length: 6,
        loan: LoanRequest {
            loan_amount: 15_000.0,
            loan_interest_rate: 11.5,
            loan_intent: LoanIntent::Education,
            previous_loan_defaults: false,
        },
    }
}

pub(super) fn zero_income_submission() -> ApplicationSubmission {
    let mut submission = submission();
    submission.income = 0.0;
    submission.loan.loan_amount = 5_000.0;
    submission
}

pub(super) fn profile() -> ApplicantProfile {
    ApplicantProfile {
        age: 30,
        gender: Gender::Female,
        education: Education::Bachelor,
        income: 60_000.0,
        employment_experience: 5,
        home_ownership: HomeOwnership::Rent,
        credit_score: 720,
        credit_history_length: 6,
    }
}

pub(super) fn loan(loan_id: i64, person_id: i64) -> Loan {
    Loan {
        loan_id: LoanId(loan_id),
        person_id: PersonId(person_id),
        terms: LoanTerms {
            loan_amount: 15_000.0,
            loan_interest_rate: 11.5,
            loan_percent_income: 0.25,
            loan_intent: LoanIntent::Education,
            previous_loan_defaults: false,
        },
        loan_status: LoanStatus::Pending,
    }
}

pub(super) fn features() -> FeatureVector {
    FeatureVector::from_record(&profile(), &loan(1, 1))
}

pub(super) fn fixed_engine(probability: f64) -> Arc<DecisionEngine> {
    Arc::new(DecisionEngine::with_scorer(
        DecisionConfig::default(),
        Arc::new(move |_: &FeatureVector| probability),
    ))
}

pub(super) fn short_timeouts() -> StoreTimeouts {
    StoreTimeouts {
        identity: Duration::from_millis(50),
        audit: Duration::from_millis(50),
    }
}

pub(super) type MemoryService = LoanApplicationService<InMemoryIdentityStore, InMemoryAuditStore>;

pub(super) fn build_service_scoring(
    probability: f64,
) -> (
    MemoryService,
    Arc<InMemoryIdentityStore>,
    Arc<InMemoryAuditStore>,
) {
    let identity = Arc::new(InMemoryIdentityStore::default());
    let audit = Arc::new(InMemoryAuditStore::default());
    let service = LoanApplicationService::new(
        identity.clone(),
        audit.clone(),
        fixed_engine(probability),
        StoreTimeouts::default(),
    );
    (service, identity, audit)
}

pub(super) fn build_service() -> (
    MemoryService,
    Arc<InMemoryIdentityStore>,
    Arc<InMemoryAuditStore>,
) {
    build_service_scoring(SAMPLE_PROBABILITY)
}

pub(super) fn flaky_service() -> (
    LoanApplicationService<InMemoryIdentityStore, FlakyAuditStore>,
    Arc<InMemoryIdentityStore>,
    Arc<FlakyAuditStore>,
) {
    let identity = Arc::new(InMemoryIdentityStore::default());
    let audit = Arc::new(FlakyAuditStore::default());
    let service = LoanApplicationService::new(
        identity.clone(),
        audit.clone(),
        fixed_engine(SAMPLE_PROBABILITY),
        StoreTimeouts::default(),
    );
    (service, identity, audit)
}

/// Audit store that can be switched into a failing state and back.
#[derive(Default)]
pub(super) struct FlakyAuditStore {
    inner: InMemoryAuditStore,
    failing: AtomicBool,
}

impl FlakyAuditStore {
    pub(super) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(super) fn documents(&self) -> Vec<ApplicationSnapshot> {
        self.inner.documents()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("audit cluster unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AuditStore for FlakyAuditStore {
    async fn insert_snapshot(&self, snapshot: ApplicationSnapshot) -> Result<(), StoreError> {
        self.check()?;
        self.inner.insert_snapshot(snapshot).await
    }

    async fn update_status_by_loan_id(
        &self,
        loan_id: LoanId,
        status: LoanStatus,
    ) -> Result<u64, StoreError> {
        self.check()?;
        self.inner.update_status_by_loan_id(loan_id, status).await
    }

    async fn find_by_loan_id(
        &self,
        loan_id: LoanId,
    ) -> Result<Vec<ApplicationSnapshot>, StoreError> {
        self.check()?;
        self.inner.find_by_loan_id(loan_id).await
    }
}

/// Audit store that answers only after `delay`.
pub(super) struct SlowAuditStore {
    pub(super) inner: InMemoryAuditStore,
    pub(super) delay: Duration,
}

#[async_trait]
impl AuditStore for SlowAuditStore {
    async fn insert_snapshot(&self, snapshot: ApplicationSnapshot) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.insert_snapshot(snapshot).await
    }

    async fn update_status_by_loan_id(
        &self,
        loan_id: LoanId,
        status: LoanStatus,
    ) -> Result<u64, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.update_status_by_loan_id(loan_id, status).await
    }

    async fn find_by_loan_id(
        &self,
        loan_id: LoanId,
    ) -> Result<Vec<ApplicationSnapshot>, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.find_by_loan_id(loan_id).await
    }
}

/// Identity store whose every call fails, optionally after a delay.
pub(super) struct UnavailableIdentityStore {
    pub(super) delay: Option<Duration>,
}

impl UnavailableIdentityStore {
    async fn fail<T>(&self) -> Result<T, StoreError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

#[async_trait]
impl IdentityStore for UnavailableIdentityStore {
    async fn insert_person(
        &self,
        _profile: ApplicantProfile,
        _loans: Vec<LoanTerms>,
    ) -> Result<Person, StoreError> {
        self.fail().await
    }

    async fn insert_loan(
        &self,
        _person_id: PersonId,
        _terms: LoanTerms,
    ) -> Result<Loan, StoreError> {
        self.fail().await
    }

    async fn get_person(&self, _person_id: PersonId) -> Result<Option<Person>, StoreError> {
        self.fail().await
    }

    async fn get_loan(&self, _loan_id: LoanId) -> Result<Option<Loan>, StoreError> {
        self.fail().await
    }

    async fn list_persons(&self, _page: PageRequest) -> Result<Vec<Person>, StoreError> {
        self.fail().await
    }

    async fn update_loan_status(
        &self,
        _loan_id: LoanId,
        _expected: LoanStatus,
        _next: LoanStatus,
    ) -> Result<Loan, StoreError> {
        self.fail().await
    }

    async fn delete_person(&self, _person_id: PersonId) -> Result<Option<Person>, StoreError> {
        self.fail().await
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("valid json body")
}
