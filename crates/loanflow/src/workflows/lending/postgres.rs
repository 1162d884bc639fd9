//! PostgreSQL adapters for both stores.
//!
//! The identity store is a pair of relational tables with a foreign key from `loan` to
//! `person`. The audit store keeps each snapshot as a JSONB document next to an indexed
//! copy of its `sqlLoanId`, so it behaves like a document collection keyed loosely by
//! loan id.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;

use super::domain::{
    ApplicantProfile, Education, Gender, HomeOwnership, Loan, LoanId, LoanIntent, LoanStatus,
    LoanTerms, Person, PersonId,
};
use super::snapshot::ApplicationSnapshot;
use super::store::{AuditStore, IdentityStore, PageRequest, StoreError};

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

const PERSON_COLUMNS: &str = "person_id, age, gender, education, income, \
     employment_experience, home_ownership, credit_score, credit_history_length";

const LOAN_COLUMNS: &str = "loan_id, person_id, loan_amount, loan_interest_rate, \
     loan_percent_income, loan_intent, previous_loan_defaults, loan_status";

async fn connect_pool(database_url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await
        .map_err(|e| StoreError::Unavailable(format!("failed to connect postgres: {e}")))
}

async fn run_ddl(pool: &PgPool, statements: &[&str]) -> Result<(), StoreError> {
    for stmt in statements {
        sqlx::query(stmt)
            .execute(pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("schema init failed: {e}")))?;
    }
    Ok(())
}

fn backend(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => StoreError::NotFound,
        other => StoreError::Unavailable(other.to_string()),
    }
}

/// Relational identity store over the `person` and `loan` tables.
#[derive(Debug, Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = connect_pool(database_url, max_connections).await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: PgPool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        run_ddl(
            &self.pool,
            &[
                r#"
                CREATE TABLE IF NOT EXISTS person (
                    person_id BIGSERIAL PRIMARY KEY,
                    age INTEGER NOT NULL,
                    gender TEXT NOT NULL,
                    education TEXT NOT NULL,
                    income DOUBLE PRECISION NOT NULL,
                    employment_experience INTEGER NOT NULL,
                    home_ownership TEXT NOT NULL,
                    credit_score INTEGER NOT NULL,
                    credit_history_length INTEGER NOT NULL
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS loan (
                    loan_id BIGSERIAL PRIMARY KEY,
                    person_id BIGINT NOT NULL REFERENCES person (person_id) ON DELETE CASCADE,
                    loan_amount DOUBLE PRECISION NOT NULL,
                    loan_interest_rate DOUBLE PRECISION NOT NULL,
                    loan_percent_income DOUBLE PRECISION NOT NULL,
                    loan_intent TEXT NOT NULL,
                    previous_loan_defaults BOOLEAN NOT NULL,
                    loan_status TEXT NOT NULL
                        CHECK (loan_status IN ('Pending', 'Approved', 'Rejected'))
                )
                "#,
                "CREATE INDEX IF NOT EXISTS loan_person_id_idx ON loan (person_id)",
            ],
        )
        .await
    }
}

async fn insert_loan_row(
    conn: &mut PgConnection,
    person_id: PersonId,
    terms: LoanTerms,
) -> Result<Loan, StoreError> {
    let row = sqlx::query(
        r#"
        INSERT INTO loan
            (person_id, loan_amount, loan_interest_rate, loan_percent_income,
             loan_intent, previous_loan_defaults, loan_status)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING loan_id
        "#,
    )
    .bind(person_id.0)
    .bind(terms.loan_amount)
    .bind(terms.loan_interest_rate)
    .bind(terms.loan_percent_income)
    .bind(terms.loan_intent.label())
    .bind(terms.previous_loan_defaults)
    .bind(LoanStatus::Pending.label())
    .fetch_one(&mut *conn)
    .await
    .map_err(backend)?;

    Ok(Loan {
        loan_id: LoanId(row.try_get("loan_id").map_err(backend)?),
        person_id,
        terms,
        loan_status: LoanStatus::Pending,
    })
}

async fn fetch_person(
    conn: &mut PgConnection,
    person_id: PersonId,
) -> Result<Option<Person>, StoreError> {
    let row = sqlx::query(&format!(
        "SELECT {PERSON_COLUMNS} FROM person WHERE person_id = $1"
    ))
    .bind(person_id.0)
    .fetch_optional(&mut *conn)
    .await
    .map_err(backend)?;

    let Some(row) = row else {
        return Ok(None);
    };

    let loans = sqlx::query(&format!(
        "SELECT {LOAN_COLUMNS} FROM loan WHERE person_id = $1 ORDER BY loan_id"
    ))
    .bind(person_id.0)
    .fetch_all(&mut *conn)
    .await
    .map_err(backend)?
    .iter()
    .map(loan_from_row)
    .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(Person {
        person_id,
        profile: profile_from_row(&row)?,
        loans,
    }))
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn insert_person(
        &self,
        profile: ApplicantProfile,
        loans: Vec<LoanTerms>,
    ) -> Result<Person, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let row = sqlx::query(
            r#"
            INSERT INTO person
                (age, gender, education, income, employment_experience,
                 home_ownership, credit_score, credit_history_length)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING person_id
            "#,
        )
        .bind(i32::from(profile.age))
        .bind(profile.gender.label())
        .bind(profile.education.label())
        .bind(profile.income)
        .bind(i32::from(profile.employment_experience))
        .bind(profile.home_ownership.label())
        .bind(i32::from(profile.credit_score))
        .bind(i32::from(profile.credit_history_length))
        .fetch_one(&mut *tx)
        .await
        .map_err(backend)?;
        let person_id = PersonId(row.try_get("person_id").map_err(backend)?);

        let mut stored = Vec::with_capacity(loans.len());
        for terms in loans {
            stored.push(insert_loan_row(&mut *tx, person_id, terms).await?);
        }

        tx.commit().await.map_err(backend)?;

        Ok(Person {
            person_id,
            profile,
            loans: stored,
        })
    }

    async fn insert_loan(&self, person_id: PersonId, terms: LoanTerms) -> Result<Loan, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(backend)?;
        insert_loan_row(&mut *conn, person_id, terms).await
    }

    async fn get_person(&self, person_id: PersonId) -> Result<Option<Person>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(backend)?;
        fetch_person(&mut *conn, person_id).await
    }

    async fn get_loan(&self, loan_id: LoanId) -> Result<Option<Loan>, StoreError> {
        sqlx::query(&format!("SELECT {LOAN_COLUMNS} FROM loan WHERE loan_id = $1"))
            .bind(loan_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .as_ref()
            .map(loan_from_row)
            .transpose()
    }

    async fn list_persons(&self, page: PageRequest) -> Result<Vec<Person>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PERSON_COLUMNS} FROM person ORDER BY person_id LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(page.limit))
        .bind(i64::from(page.skip))
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut persons = BTreeMap::new();
        for row in &rows {
            let person_id = PersonId(row.try_get("person_id").map_err(backend)?);
            persons.insert(
                person_id,
                Person {
                    person_id,
                    profile: profile_from_row(row)?,
                    loans: Vec::new(),
                },
            );
        }

        if persons.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = persons.keys().map(|id| id.0).collect();
        let loan_rows = sqlx::query(&format!(
            "SELECT {LOAN_COLUMNS} FROM loan WHERE person_id = ANY($1) ORDER BY loan_id"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        for row in &loan_rows {
            let loan = loan_from_row(row)?;
            if let Some(person) = persons.get_mut(&loan.person_id) {
                person.loans.push(loan);
            }
        }

        Ok(persons.into_values().collect())
    }

    async fn update_loan_status(
        &self,
        loan_id: LoanId,
        expected: LoanStatus,
        next: LoanStatus,
    ) -> Result<Loan, StoreError> {
        let updated = sqlx::query(&format!(
            r#"
            UPDATE loan
               SET loan_status = $1
             WHERE loan_id = $2
               AND loan_status = $3
            RETURNING {LOAN_COLUMNS}
            "#
        ))
        .bind(next.label())
        .bind(loan_id.0)
        .bind(expected.label())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        if let Some(row) = updated {
            return loan_from_row(&row);
        }

        match self.get_loan(loan_id).await? {
            Some(current) => Err(StoreError::StatusConflict {
                current: current.loan_status,
                expected,
            }),
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete_person(&self, person_id: PersonId) -> Result<Option<Person>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let Some(person) = fetch_person(&mut *tx, person_id).await? else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM person WHERE person_id = $1")
            .bind(person_id.0)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        tx.commit().await.map_err(backend)?;

        Ok(Some(person))
    }
}

/// Document-style audit store over the `loan_applications` table.
#[derive(Debug, Clone)]
pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = connect_pool(database_url, max_connections).await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: PgPool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        run_ddl(
            &self.pool,
            &[
                r#"
                CREATE TABLE IF NOT EXISTS loan_applications (
                    document_id BIGSERIAL PRIMARY KEY,
                    sql_loan_id BIGINT NOT NULL,
                    document JSONB NOT NULL
                )
                "#,
                "CREATE INDEX IF NOT EXISTS loan_applications_sql_loan_id_idx \
                 ON loan_applications (sql_loan_id)",
            ],
        )
        .await
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn insert_snapshot(&self, snapshot: ApplicationSnapshot) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO loan_applications (sql_loan_id, document) VALUES ($1, $2)")
            .bind(snapshot.sql_loan_id.0)
            .bind(Json(&snapshot))
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn update_status_by_loan_id(
        &self,
        loan_id: LoanId,
        status: LoanStatus,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE loan_applications
               SET document = jsonb_set(document, '{loanStatus}', to_jsonb($2::TEXT))
             WHERE sql_loan_id = $1
            "#,
        )
        .bind(loan_id.0)
        .bind(status.label())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(result.rows_affected())
    }

    async fn find_by_loan_id(
        &self,
        loan_id: LoanId,
    ) -> Result<Vec<ApplicationSnapshot>, StoreError> {
        let rows = sqlx::query(
            "SELECT document FROM loan_applications WHERE sql_loan_id = $1 ORDER BY document_id",
        )
        .bind(loan_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter()
            .map(|row| {
                row.try_get::<Json<ApplicationSnapshot>, _>("document")
                    .map(|document| document.0)
                    .map_err(|e| StoreError::Malformed(e.to_string()))
            })
            .collect()
    }
}

fn small_int(row: &PgRow, column: &str) -> Result<u16, StoreError> {
    let value: i32 = row.try_get(column).map_err(backend)?;
    u16::try_from(value)
        .map_err(|_| StoreError::Malformed(format!("{column} out of range: {value}")))
}

fn label<T>(row: &PgRow, column: &str, parse: fn(&str) -> Option<T>) -> Result<T, StoreError> {
    let value: String = row.try_get(column).map_err(backend)?;
    parse(&value).ok_or_else(|| StoreError::Malformed(format!("unknown {column} '{value}'")))
}

fn profile_from_row(row: &PgRow) -> Result<ApplicantProfile, StoreError> {
    Ok(ApplicantProfile {
        age: small_int(row, "age")?,
        gender: label(row, "gender", Gender::from_label)?,
        education: label(row, "education", Education::from_label)?,
        income: row.try_get("income").map_err(backend)?,
        employment_experience: small_int(row, "employment_experience")?,
        home_ownership: label(row, "home_ownership", HomeOwnership::from_label)?,
        credit_score: small_int(row, "credit_score")?,
        credit_history_length: small_int(row, "credit_history_length")?,
    })
}

fn loan_from_row(row: &PgRow) -> Result<Loan, StoreError> {
    Ok(Loan {
        loan_id: LoanId(row.try_get("loan_id").map_err(backend)?),
        person_id: PersonId(row.try_get("person_id").map_err(backend)?),
        terms: LoanTerms {
            loan_amount: row.try_get("loan_amount").map_err(backend)?,
            loan_interest_rate: row.try_get("loan_interest_rate").map_err(backend)?,
            loan_percent_income: row.try_get("loan_percent_income").map_err(backend)?,
            loan_intent: label(row, "loan_intent", LoanIntent::from_label)?,
            previous_loan_defaults: row.try_get("previous_loan_defaults").map_err(backend)?,
        },
        loan_status: label(row, "loan_status", |value: &str| value.parse::<LoanStatus>().ok())?,
    })
}
