//! Process-local store adapters used when no database URL is configured, and by tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::domain::{ApplicantProfile, Loan, LoanId, LoanStatus, LoanTerms, Person, PersonId};
use super::snapshot::ApplicationSnapshot;
use super::store::{AuditStore, IdentityStore, PageRequest, StoreError};

#[derive(Debug, Default)]
struct IdentityTables {
    last_person_id: i64,
    last_loan_id: i64,
    persons: BTreeMap<PersonId, ApplicantProfile>,
    loans: BTreeMap<LoanId, Loan>,
}

impl IdentityTables {
    fn allocate_loan(&mut self, person_id: PersonId, terms: LoanTerms) -> Loan {
        self.last_loan_id += 1;
        let loan = Loan {
            loan_id: LoanId(self.last_loan_id),
            person_id,
            terms,
            loan_status: LoanStatus::Pending,
        };
        self.loans.insert(loan.loan_id, loan.clone());
        loan
    }

    fn assemble(&self, person_id: PersonId) -> Option<Person> {
        let profile = self.persons.get(&person_id)?;
        let loans = self
            .loans
            .values()
            .filter(|loan| loan.person_id == person_id)
            .cloned()
            .collect();

        Some(Person {
            person_id,
            profile: profile.clone(),
            loans,
        })
    }
}

/// Identity store backed by ordered maps behind a mutex. Identifiers start at 1.
#[derive(Debug, Default, Clone)]
pub struct InMemoryIdentityStore {
    tables: Arc<Mutex<IdentityTables>>,
}

impl InMemoryIdentityStore {
    fn lock(&self) -> Result<MutexGuard<'_, IdentityTables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("identity tables lock poisoned".to_string()))
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn insert_person(
        &self,
        profile: ApplicantProfile,
        loans: Vec<LoanTerms>,
    ) -> Result<Person, StoreError> {
        let mut tables = self.lock()?;
        tables.last_person_id += 1;
        let person_id = PersonId(tables.last_person_id);
        tables.persons.insert(person_id, profile.clone());

        let loans = loans
            .into_iter()
            .map(|terms| tables.allocate_loan(person_id, terms))
            .collect();

        Ok(Person {
            person_id,
            profile,
            loans,
        })
    }

    async fn insert_loan(&self, person_id: PersonId, terms: LoanTerms) -> Result<Loan, StoreError> {
        let mut tables = self.lock()?;
        if !tables.persons.contains_key(&person_id) {
            return Err(StoreError::NotFound);
        }
        Ok(tables.allocate_loan(person_id, terms))
    }

    async fn get_person(&self, person_id: PersonId) -> Result<Option<Person>, StoreError> {
        Ok(self.lock()?.assemble(person_id))
    }

    async fn get_loan(&self, loan_id: LoanId) -> Result<Option<Loan>, StoreError> {
        Ok(self.lock()?.loans.get(&loan_id).cloned())
    }

    async fn list_persons(&self, page: PageRequest) -> Result<Vec<Person>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .persons
            .keys()
            .skip(page.skip as usize)
            .take(page.limit as usize)
            .filter_map(|person_id| tables.assemble(*person_id))
            .collect())
    }

    async fn update_loan_status(
        &self,
        loan_id: LoanId,
        expected: LoanStatus,
        next: LoanStatus,
    ) -> Result<Loan, StoreError> {
        let mut tables = self.lock()?;
        let loan = tables.loans.get_mut(&loan_id).ok_or(StoreError::NotFound)?;
        if loan.loan_status != expected {
            return Err(StoreError::StatusConflict {
                current: loan.loan_status,
                expected,
            });
        }
        loan.loan_status = next;
        Ok(loan.clone())
    }

    async fn delete_person(&self, person_id: PersonId) -> Result<Option<Person>, StoreError> {
        let mut tables = self.lock()?;
        let Some(person) = tables.assemble(person_id) else {
            return Ok(None);
        };
        tables.persons.remove(&person_id);
        tables.loans.retain(|_, loan| loan.person_id != person_id);
        Ok(Some(person))
    }
}

/// Audit store keeping snapshots in insertion order.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAuditStore {
    documents: Arc<Mutex<Vec<ApplicationSnapshot>>>,
}

impl InMemoryAuditStore {
    /// Copy of every stored document, oldest first.
    pub fn documents(&self) -> Vec<ApplicationSnapshot> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<ApplicationSnapshot>>, StoreError> {
        self.documents
            .lock()
            .map_err(|_| StoreError::Unavailable("audit documents lock poisoned".to_string()))
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn insert_snapshot(&self, snapshot: ApplicationSnapshot) -> Result<(), StoreError> {
        self.lock()?.push(snapshot);
        Ok(())
    }

    async fn update_status_by_loan_id(
        &self,
        loan_id: LoanId,
        status: LoanStatus,
    ) -> Result<u64, StoreError> {
        let mut documents = self.lock()?;
        let mut matched = 0;
        for document in documents
            .iter_mut()
            .filter(|document| document.sql_loan_id == loan_id)
        {
            document.loan_status = status;
            matched += 1;
        }
        Ok(matched)
    }

    async fn find_by_loan_id(
        &self,
        loan_id: LoanId,
    ) -> Result<Vec<ApplicationSnapshot>, StoreError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|document| document.sql_loan_id == loan_id)
            .cloned()
            .collect())
    }
}
