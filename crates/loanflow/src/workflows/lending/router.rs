use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::decision::{DecisionError, DecisionOutcome};
use super::domain::{ApplicationSubmission, Loan, LoanId, LoanRequest, LoanStatus, PersonId};
use super::intake::ValidationError;
use super::service::{AuditSync, Committed, LendingError, LoanApplicationService};
use super::store::{AuditStore, IdentityStore, PageRequest, StoreError};

/// Response header set to `stale` when the audit store missed a committed write.
pub const AUDIT_SYNC_HEADER: &str = "x-audit-sync";

#[derive(Debug, Clone, Deserialize)]
pub struct LoanStatusUpdate {
    pub loan_status: String,
}

#[derive(Debug, Serialize)]
struct EvaluationView<'a> {
    loan: &'a Loan,
    decision: &'a DecisionOutcome,
    audit: &'a AuditSync,
}

/// Router exposing application intake, lookups, transitions, and repair.
pub fn lending_router<I, A>(service: Arc<LoanApplicationService<I, A>>) -> Router
where
    I: IdentityStore + ?Sized + 'static,
    A: AuditStore + ?Sized + 'static,
{
    Router::new()
        .route("/applications", post(create_handler::<I, A>))
        .route("/persons", get(list_persons_handler::<I, A>))
        .route(
            "/persons/:person_id",
            get(person_handler::<I, A>).delete(delete_person_handler::<I, A>),
        )
        .route("/persons/:person_id/loans", post(submit_loan_handler::<I, A>))
        .route("/loans/:loan_id", put(update_status_handler::<I, A>))
        .route("/loans/:loan_id/decision", post(decision_handler::<I, A>))
        .route("/loans/:loan_id/reconcile", post(reconcile_handler::<I, A>))
        .with_state(service)
}

pub(crate) async fn create_handler<I, A>(
    State(service): State<Arc<LoanApplicationService<I, A>>>,
    axum::Json(submission): axum::Json<ApplicationSubmission>,
) -> Response
where
    I: IdentityStore + ?Sized + 'static,
    A: AuditStore + ?Sized + 'static,
{
    match service.create_application(submission).await {
        Ok(committed) => committed_response(StatusCode::CREATED, committed),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_loan_handler<I, A>(
    State(service): State<Arc<LoanApplicationService<I, A>>>,
    Path(person_id): Path<i64>,
    axum::Json(request): axum::Json<LoanRequest>,
) -> Response
where
    I: IdentityStore + ?Sized + 'static,
    A: AuditStore + ?Sized + 'static,
{
    match service.submit_loan(PersonId(person_id), request).await {
        Ok(committed) => committed_response(StatusCode::CREATED, committed),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn person_handler<I, A>(
    State(service): State<Arc<LoanApplicationService<I, A>>>,
    Path(person_id): Path<i64>,
) -> Response
where
    I: IdentityStore + ?Sized + 'static,
    A: AuditStore + ?Sized + 'static,
{
    match service.get_person(PersonId(person_id)).await {
        Ok(person) => (StatusCode::OK, axum::Json(person)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_persons_handler<I, A>(
    State(service): State<Arc<LoanApplicationService<I, A>>>,
    Query(page): Query<PageRequest>,
) -> Response
where
    I: IdentityStore + ?Sized + 'static,
    A: AuditStore + ?Sized + 'static,
{
    match service.list_persons(page).await {
        Ok(persons) => (StatusCode::OK, axum::Json(persons)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn delete_person_handler<I, A>(
    State(service): State<Arc<LoanApplicationService<I, A>>>,
    Path(person_id): Path<i64>,
) -> Response
where
    I: IdentityStore + ?Sized + 'static,
    A: AuditStore + ?Sized + 'static,
{
    match service.delete_person(PersonId(person_id)).await {
        Ok(person) => (StatusCode::OK, axum::Json(person)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_status_handler<I, A>(
    State(service): State<Arc<LoanApplicationService<I, A>>>,
    Path(loan_id): Path<i64>,
    axum::Json(update): axum::Json<LoanStatusUpdate>,
) -> Response
where
    I: IdentityStore + ?Sized + 'static,
    A: AuditStore + ?Sized + 'static,
{
    let status = match update.loan_status.parse::<LoanStatus>() {
        Ok(status) => status,
        Err(unknown) => return error_response(ValidationError::from(unknown).into()),
    };

    match service.transition_status(LoanId(loan_id), status).await {
        Ok(committed) => committed_response(StatusCode::OK, committed),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn decision_handler<I, A>(
    State(service): State<Arc<LoanApplicationService<I, A>>>,
    Path(loan_id): Path<i64>,
) -> Response
where
    I: IdentityStore + ?Sized + 'static,
    A: AuditStore + ?Sized + 'static,
{
    match service.evaluate(LoanId(loan_id)).await {
        Ok(evaluation) => {
            let view = EvaluationView {
                loan: &evaluation.loan.record,
                decision: &evaluation.outcome,
                audit: &evaluation.loan.audit,
            };
            let mut response = (StatusCode::OK, axum::Json(view)).into_response();
            mark_stale(&mut response, &evaluation.loan.audit);
            response
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn reconcile_handler<I, A>(
    State(service): State<Arc<LoanApplicationService<I, A>>>,
    Path(loan_id): Path<i64>,
) -> Response
where
    I: IdentityStore + ?Sized + 'static,
    A: AuditStore + ?Sized + 'static,
{
    match service.reconcile(LoanId(loan_id)).await {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

fn committed_response<T: Serialize>(status: StatusCode, committed: Committed<T>) -> Response {
    let mut response = (status, axum::Json(&committed.record)).into_response();
    mark_stale(&mut response, &committed.audit);
    response
}

fn mark_stale(response: &mut Response, audit: &AuditSync) {
    if audit.is_stale() {
        response
            .headers_mut()
            .insert(AUDIT_SYNC_HEADER, HeaderValue::from_static("stale"));
    }
}

pub(crate) fn error_status(error: &LendingError) -> StatusCode {
    match error {
        LendingError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        LendingError::NotFound { .. } => StatusCode::NOT_FOUND,
        LendingError::InvalidTransition { .. } | LendingError::AlreadyDecided { .. } => {
            StatusCode::CONFLICT
        }
        LendingError::Decision(DecisionError::InvalidFeatureVector { .. }) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        LendingError::Decision(_) => StatusCode::INTERNAL_SERVER_ERROR,
        LendingError::Store {
            source: StoreError::Timeout(_),
            ..
        } => StatusCode::GATEWAY_TIMEOUT,
        LendingError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: LendingError) -> Response {
    let status = error_status(&error);
    let payload = match &error {
        LendingError::NotFound { entity, .. } => json!({
            "error": format!("{} not found", capitalize(entity)),
        }),
        LendingError::InvalidTransition {
            current, requested, ..
        } => json!({
            "error": error.to_string(),
            "current_status": current.label(),
            "requested_status": requested.label(),
        }),
        LendingError::AlreadyDecided {
            status: decided, ..
        } => json!({
            "error": error.to_string(),
            "current_status": decided.label(),
        }),
        LendingError::Store { kind, .. } => json!({
            "error": error.to_string(),
            "store": kind.label(),
        }),
        _ => json!({
            "error": error.to_string(),
        }),
    };
    (status, axum::Json(payload)).into_response()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
